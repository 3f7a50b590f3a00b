//! testgrid CLI - Run a browser × URL test matrix on a remote execution service.

mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use testgrid_client::HttpExecutionService;
use testgrid_runner::TestRunner;

use config::FileConfig;
use output::{ConsoleSink, JsonLinesSink};

const EXIT_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

/// testgrid - Run browser test pages on a remote grid
#[derive(Parser, Debug)]
#[command(name = "testgrid")]
#[command(about = "Run browser test pages on a remote execution service", long_about = None)]
pub struct Args {
    /// JSON config file with run and service settings
    #[arg(short, long, default_value = "testgrid.json")]
    config: PathBuf,

    /// Test framework (jasmine, qunit, mocha, "YUI Test", custom)
    #[arg(short, long)]
    framework: Option<String>,

    /// Maximum concurrently running jobs
    #[arg(short, long)]
    throttle: Option<usize>,

    /// Build identifier to group jobs under
    #[arg(long)]
    build: Option<String>,

    /// Display name for jobs
    #[arg(long)]
    name: Option<String>,

    /// Test page URL (repeatable, replaces the config file's list)
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Wait between status polls, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Route browsers through this tunnel
    #[arg(long)]
    tunnel_identifier: Option<String>,

    /// REST API root of the execution service
    #[arg(long)]
    base_url: Option<String>,

    /// Service account name
    #[arg(long, env = "TESTGRID_USERNAME")]
    username: Option<String>,

    /// Service access key
    #[arg(long, env = "TESTGRID_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Print progress as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout carries progress output.
    let filter = if args.verbose {
        EnvFilter::new("testgrid=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("testgrid=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            error!(error = %e, "Test run failed");
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let config = FileConfig::load(&args.config)?.apply(args)?;

    info!(
        config = %args.config.display(),
        service = %config.service.base_url,
        browsers = config.runner.browsers.len(),
        urls = config.runner.urls.len(),
        "Loaded configuration"
    );

    let service = HttpExecutionService::new(config.service)?;
    let runner = TestRunner::new(config.runner, Arc::new(service));
    let runner = if args.json {
        runner.with_progress_sink(JsonLinesSink)
    } else {
        runner.with_progress_sink(ConsoleSink)
    };

    Ok(runner.run_tests().await?)
}
