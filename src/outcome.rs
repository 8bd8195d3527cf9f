//! Per-attempt results. Failure is data here, never control flow.

use std::fmt;
use std::time::Duration;

/// Coarse class of an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// DNS, refused connection, TLS handshake, unreachable host.
    Connect,
    Timeout,
    /// The connection came up but the exchange itself broke.
    Protocol,
    /// The request could not be built from the spec.
    InvalidRequest,
    /// The attempt's task died before producing an outcome.
    Aborted,
}

impl FailureKind {
    /// Short label used in output lines and JSON records.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connect => "connect",
            FailureKind::Timeout => "timeout",
            FailureKind::Protocol => "protocol",
            FailureKind::InvalidRequest => "invalid-request",
            FailureKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { status: u16 },
    Failed { kind: FailureKind, reason: String },
}

impl Outcome {
    /// A failure of class `kind`.
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Outcome::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// The failure recorded when a response misses the deadline.
    pub fn timeout() -> Self {
        Outcome::failed(FailureKind::Timeout, "timeout")
    }

    /// The status code of a completed attempt.
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Completed { status } => Some(*status),
            Outcome::Failed { .. } => None,
        }
    }

    /// Whether a response came back, whatever its status.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

/// The terminal record of one attempt.
///
/// `launched` is the offset from dispatch start at which the request was
/// handed to the transport, `None` if it never got that far. `elapsed` is how
/// long the send took. `version` is the protocol the response came back on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub index: usize,
    pub outcome: Outcome,
    pub launched: Option<Duration>,
    pub elapsed: Duration,
    pub version: Option<String>,
}

impl Attempt {
    /// Offset from dispatch start at which the request finished.
    pub fn finished(&self) -> Option<Duration> {
        self.launched.map(|launched| launched + self.elapsed)
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Completed { status } => write!(f, "[{}] Status: {}", self.index, status),
            Outcome::Failed { kind, reason } if reason == kind.as_str() => {
                write!(f, "[{}] Error: {}", self.index, reason)
            }
            Outcome::Failed { kind, reason } => {
                write!(f, "[{}] Error: {} ({})", self.index, reason, kind)
            }
        }
    }
}
