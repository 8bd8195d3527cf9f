//! Fatal configuration errors.
//!
//! Anything in here aborts the run before the first attempt is launched.
//! Per-attempt failures are never errors; they live in [`crate::outcome`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("URL {0:?} has no host")]
    MissingHost(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}
