use clap::Parser;

use crate::dispatch::LaunchMode;
use crate::spec::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};

#[derive(Parser, Debug)]
#[command(
    name = "race_probe",
    version,
    about = "Race condition tester: fires concurrent HTTP requests at a single URL"
)]
pub struct Cli {
    /// Target URL
    #[arg(short = 'u', long = "url")]
    pub url: String,

    /// HTTP method (GET, POST, etc.)
    #[arg(short = 'X', long = "method", default_value = "GET")]
    pub method: String,

    /// Custom header as "Key: Value", may be repeated
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Number of concurrent requests
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_CONCURRENCY)]
    pub threads: usize,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT.as_secs_f64())]
    pub timeout: f64,

    /// How the requests are released
    #[arg(long = "mode", value_enum, default_value_t = LaunchMode::Staggered)]
    pub mode: LaunchMode,

    /// Print one JSON object per attempt instead of plain lines
    #[arg(long = "json")]
    pub json: bool,

    /// Send every request through this proxy (e.g. http://127.0.0.1:8080)
    #[arg(short = 'x', long = "proxy")]
    pub proxy: Option<String>,

    /// Speak HTTP/2 without negotiation (h2c on cleartext targets)
    #[arg(long = "http2-prior-knowledge")]
    pub http2_prior_knowledge: bool,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long = "insecure")]
    pub insecure: bool,

    /// Do not log the summary after the run
    #[arg(long = "no-summary")]
    pub no_summary: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}
