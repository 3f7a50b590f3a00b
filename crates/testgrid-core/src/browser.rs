//! Browser specifications and the per-combination task descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A browser to run the test pages on.
///
/// Every field is optional in configuration and defaults to an empty
/// string, which the execution service interprets as "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSpec {
    /// Operating system / platform (e.g., "Windows 10", "OS X 10.15").
    pub platform: String,

    /// Browser name (e.g., "chrome", "firefox").
    pub browser_name: String,

    /// Browser version (e.g., "latest", "91").
    pub version: String,
}

impl BrowserSpec {
    /// Create a new BrowserSpec.
    pub fn new(
        platform: impl Into<String>,
        browser_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            browser_name: browser_name.into(),
            version: version.into(),
        }
    }

    /// The `[platform, browserName, version]` triple sent to the service.
    pub fn platform_triple(&self) -> [String; 3] {
        [
            self.platform.clone(),
            self.browser_name.clone(),
            self.version.clone(),
        ]
    }
}

impl fmt::Display for BrowserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.platform, self.browser_name, self.version)
    }
}

/// One unit of work: a single browser × URL combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskDescriptor {
    browser: BrowserSpec,
    url: String,
}

impl TaskDescriptor {
    /// Create a new TaskDescriptor.
    pub fn new(browser: BrowserSpec, url: impl Into<String>) -> Self {
        Self {
            browser,
            url: url.into(),
        }
    }

    /// Build the full browsers × URLs product, browser-major.
    pub fn matrix(browsers: &[BrowserSpec], urls: &[String]) -> Vec<TaskDescriptor> {
        browsers
            .iter()
            .flat_map(|browser| urls.iter().map(move |url| Self::new(browser.clone(), url)))
            .collect()
    }

    pub fn browser(&self) -> &BrowserSpec {
        &self.browser
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_spec_defaults_missing_fields() {
        let spec: BrowserSpec = serde_json::from_str(r#"{"browserName": "firefox"}"#).unwrap();
        assert_eq!(spec.platform, "");
        assert_eq!(spec.browser_name, "firefox");
        assert_eq!(spec.version, "");
    }

    #[test]
    fn test_platform_triple() {
        let spec = BrowserSpec::new("Linux", "chrome", "latest");
        assert_eq!(spec.platform_triple(), ["Linux", "chrome", "latest"]);
    }

    #[test]
    fn test_matrix_is_cartesian_product() {
        let browsers = vec![
            BrowserSpec::new("Linux", "chrome", ""),
            BrowserSpec::new("Windows 10", "firefox", "latest"),
        ];
        let urls = vec![
            "http://localhost/a.html".to_string(),
            "http://localhost/b.html".to_string(),
            "http://localhost/c.html".to_string(),
        ];

        let matrix = TaskDescriptor::matrix(&browsers, &urls);

        assert_eq!(matrix.len(), 6);
        assert_eq!(matrix[0].browser(), &browsers[0]);
        assert_eq!(matrix[0].url(), "http://localhost/a.html");
        assert_eq!(matrix[2].url(), "http://localhost/c.html");
        assert_eq!(matrix[3].browser(), &browsers[1]);
        assert_eq!(matrix[3].url(), "http://localhost/a.html");
    }

    #[test]
    fn test_matrix_empty_when_no_urls() {
        let browsers = vec![BrowserSpec::default()];
        assert!(TaskDescriptor::matrix(&browsers, &[]).is_empty());
    }
}
