// race_probe.rs
// For use against systems you are authorized to test.

use std::io;
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;

use race_probe::cli::Cli;
use race_probe::{
    Dispatcher, JsonReporter, LineReporter, Reporter, ReqwestTransport, RequestSpec, Summary,
    parse_headers, probe,
};

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    // stdout is reserved for attempt lines
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn log_summary(summary: &Summary) {
    info!(
        "Finished {} attempts: {} completed, {} failed",
        summary.total,
        summary.completed(),
        summary.failed()
    );
    for (status, count) in &summary.statuses {
        info!("  status {}: {}", status, count);
    }
    for (kind, count) in &summary.failures {
        info!("  {} errors: {}", kind, count);
    }
    for (version, count) in &summary.versions {
        info!("  {} responses: {}", version, count);
    }
    info!(
        "Launch spread {:?}, completion spread {:?}",
        summary.launch_spread, summary.completion_spread
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let parsed = parse_headers(&cli.headers);
    let timeout = Duration::try_from_secs_f64(cli.timeout)
        .wrap_err_with(|| format!("invalid timeout {}", cli.timeout))?;
    let spec = RequestSpec::builder(cli.url.as_str())
        .method(cli.method.as_str())
        .headers(parsed.headers)
        .concurrency(cli.threads)
        .timeout(timeout)
        .build()?;

    let transport = ReqwestTransport::new()
        .insecure(cli.insecure)
        .proxy(cli.proxy.clone())
        .http2_prior_knowledge(cli.http2_prior_knowledge);
    let dispatcher = Dispatcher::new(transport).mode(cli.mode);
    let reporter: Box<dyn Reporter> = if cli.json {
        Box::new(JsonReporter::new(io::stdout()))
    } else {
        Box::new(LineReporter::new(io::stdout()))
    };

    let (attempts, _) = probe(&dispatcher, spec, reporter).await?;

    if !cli.no_summary {
        log_summary(&Summary::from_attempts(&attempts));
    }
    Ok(())
}
