//! Progress output on stdout.

use std::io::{self, Write};

use serde::Serialize;

use testgrid_core::ProgressEvent;
use testgrid_runner::ProgressSink;

/// Human-readable progress lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::JobStarted {
                total_jobs,
                started_jobs,
            } => format!("[{}/{}] started", started_jobs, total_jobs),
            ProgressEvent::JobCompleted {
                url,
                platform,
                passed,
                tunnel_id,
            } => {
                let verdict = if *passed { "PASS" } else { "FAIL" };
                match tunnel_id {
                    Some(tunnel) => format!("{}  {}  {}  (tunnel {})", verdict, platform, url, tunnel),
                    None => format!("{}  {}  {}", verdict, platform, url),
                }
            }
            ProgressEvent::TestCompleted { passed } => {
                if *passed {
                    "PASSED".to_string()
                } else {
                    "FAILED".to_string()
                }
            }
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: &ProgressEvent) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", Self::render(event));
    }
}

/// A progress event stamped with the time it was emitted.
#[derive(Debug, Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a ProgressEvent,
}

/// One JSON object per event, for machine consumption.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesSink;

impl JsonLinesSink {
    pub fn render(event: &ProgressEvent) -> serde_json::Result<String> {
        serde_json::to_string(&JsonLine {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
        })
    }
}

impl ProgressSink for JsonLinesSink {
    fn emit(&self, event: &ProgressEvent) {
        if let Ok(json) = Self::render(event) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgrid_core::BrowserSpec;

    fn completion(passed: bool, tunnel_id: Option<&str>) -> ProgressEvent {
        ProgressEvent::JobCompleted {
            url: "http://localhost/test.html".to_string(),
            platform: BrowserSpec::new("Linux", "chrome", "latest"),
            passed,
            tunnel_id: tunnel_id.map(str::to_string),
        }
    }

    #[test]
    fn test_console_lines() {
        assert_eq!(
            ConsoleSink::render(&ProgressEvent::JobStarted {
                total_jobs: 4,
                started_jobs: 2
            }),
            "[2/4] started"
        );
        assert_eq!(
            ConsoleSink::render(&completion(false, None)),
            "FAIL  Linux/chrome/latest  http://localhost/test.html"
        );
        assert!(ConsoleSink::render(&completion(true, Some("t-1"))).ends_with("(tunnel t-1)"));
        assert_eq!(
            ConsoleSink::render(&ProgressEvent::TestCompleted { passed: true }),
            "PASSED"
        );
    }

    #[test]
    fn test_json_line_carries_event_and_timestamp() {
        let line = JsonLinesSink::render(&completion(true, None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["event"], "jobCompleted");
        assert_eq!(value["passed"], true);
        assert_eq!(value["platform"]["browserName"], "chrome");
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }
}
