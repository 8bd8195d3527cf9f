//! Race-condition probing: fire N identical HTTP requests at one URL at
//! (nearly) the same time and report how each one ended.
//!
//! The pipeline is [`headers::parse_headers`] → [`spec::RequestSpec`] →
//! [`dispatch::Dispatcher`] → [`report::Reporter`]. [`probe`] wires the last
//! two together.

pub mod cli;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod outcome;
pub mod report;
pub mod spec;
pub mod transport;

use std::sync::Arc;

use eyre::Result;
use tokio::sync::mpsc;

pub use dispatch::{Dispatcher, LaunchMode};
pub use error::ConfigError;
pub use headers::{ParsedHeaders, parse_headers};
pub use outcome::{Attempt, FailureKind, Outcome};
pub use report::{JsonReporter, LineReporter, Reporter, Summary};
pub use spec::RequestSpec;
pub use transport::{Reply, ReqwestTransport, Transport, TransportError};

/// Runs one probing round and reports every attempt in completion order.
///
/// Returns the attempts in index order together with the reporter once all
/// attempts are joined and the reporter has seen every one of them.
pub async fn probe<T, R>(dispatcher: &Dispatcher<T>, spec: RequestSpec, reporter: R) -> Result<(Vec<Attempt>, R)>
where
    T: Transport,
    R: Reporter,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let reporting = tokio::spawn(report::drain(rx, reporter));

    let attempts = dispatcher.dispatch(Arc::new(spec), tx).await;
    let reporter = reporting.await?;

    Ok((attempts, reporter))
}
