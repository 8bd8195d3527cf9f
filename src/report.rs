//! Emits attempts as they complete, plus an optional summary on top.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::error;

use crate::outcome::{Attempt, FailureKind, Outcome};

/// A sink for finished attempts.
pub trait Reporter: Send + 'static {
    /// Emits one attempt.
    fn report(&mut self, attempt: &Attempt) -> io::Result<()>;
}

impl Reporter for Box<dyn Reporter> {
    fn report(&mut self, attempt: &Attempt) -> io::Result<()> {
        (**self).report(attempt)
    }
}

/// `[<index>] Status: <code>` / `[<index>] Error: <description>` lines.
pub struct LineReporter<W> {
    out: W,
}

impl<W: Write + Send + 'static> LineReporter<W> {
    /// Writes lines to `out`, flushing after each one.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> Reporter for LineReporter<W> {
    fn report(&mut self, attempt: &Attempt) -> io::Result<()> {
        writeln!(self.out, "{}", attempt)?;
        self.out.flush()
    }
}

/// One JSON object per attempt, one per line.
pub struct JsonReporter<W> {
    out: W,
}

impl<W: Write + Send + 'static> JsonReporter<W> {
    /// Writes records to `out`, flushing after each one.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> Reporter for JsonReporter<W> {
    fn report(&mut self, attempt: &Attempt) -> io::Result<()> {
        let record = match &attempt.outcome {
            Outcome::Completed { status } => json!({
                "index": attempt.index,
                "status": status,
                "version": attempt.version,
                "launched_ms": attempt.launched.map(millis),
                "elapsed_ms": millis(attempt.elapsed),
            }),
            Outcome::Failed { kind, reason } => json!({
                "index": attempt.index,
                "error": reason,
                "kind": kind.as_str(),
                "launched_ms": attempt.launched.map(millis),
                "elapsed_ms": millis(attempt.elapsed),
            }),
        };
        writeln!(self.out, "{}", record)?;
        self.out.flush()
    }
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

/// Feeds every attempt from `events` to `reporter` in arrival order, until
/// the sending side is gone. Hands the reporter back afterwards.
///
/// The first write error is logged and silences the reporter; the channel is
/// still drained to the end so the run itself is unaffected.
pub async fn drain<R: Reporter>(mut events: mpsc::UnboundedReceiver<Attempt>, mut reporter: R) -> R {
    let mut broken = false;
    while let Some(attempt) = events.recv().await {
        if broken {
            continue;
        }
        if let Err(e) = reporter.report(&attempt) {
            error!("Reporting attempt #{} failed, dropping further output: {}", attempt.index, e);
            broken = true;
        }
    }
    reporter
}

/// Counts over a finished run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub statuses: BTreeMap<u16, usize>,
    pub failures: BTreeMap<FailureKind, usize>,
    /// Responses per negotiated protocol version.
    pub versions: BTreeMap<String, usize>,
    /// Gap between the first and the last request handed to the transport.
    pub launch_spread: Duration,
    /// Gap between the first and the last attempt to finish.
    pub completion_spread: Duration,
}

impl Summary {
    /// Tallies a run's attempts.
    pub fn from_attempts(attempts: &[Attempt]) -> Self {
        let mut summary = Summary {
            total: attempts.len(),
            ..Default::default()
        };

        for attempt in attempts {
            match &attempt.outcome {
                Outcome::Completed { status } => *summary.statuses.entry(*status).or_default() += 1,
                Outcome::Failed { kind, .. } => *summary.failures.entry(*kind).or_default() += 1,
            }
            if let Some(version) = &attempt.version {
                *summary.versions.entry(version.clone()).or_default() += 1;
            }
        }

        summary.launch_spread = spread(attempts.iter().filter_map(|a| a.launched));
        summary.completion_spread = spread(attempts.iter().filter_map(Attempt::finished));
        summary
    }

    /// Attempts that got a response.
    pub fn completed(&self) -> usize {
        self.statuses.values().sum()
    }

    /// Attempts that ended in a failure.
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

fn spread(points: impl Iterator<Item = Duration>) -> Duration {
    let mut bounds: Option<(Duration, Duration)> = None;
    for d in points {
        bounds = Some(match bounds {
            None => (d, d),
            Some((lo, hi)) => (lo.min(d), hi.max(d)),
        });
    }
    bounds.map_or(Duration::ZERO, |(lo, hi)| hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_version(outcome: &Outcome) -> Option<String> {
        outcome.is_completed().then(|| "HTTP/1.1".to_string())
    }

    fn attempt(index: usize, outcome: Outcome, launched_ms: u64, elapsed_ms: u64) -> Attempt {
        Attempt {
            index,
            launched: Some(Duration::from_millis(launched_ms)),
            elapsed: Duration::from_millis(elapsed_ms),
            version: outcome_version(&outcome),
            outcome,
        }
    }

    #[test]
    fn line_reporter_writes_one_line_per_attempt() {
        let mut reporter = LineReporter::new(Vec::new());
        reporter
            .report(&attempt(1, Outcome::Completed { status: 200 }, 0, 5))
            .unwrap();
        reporter.report(&attempt(0, Outcome::timeout(), 0, 10_000)).unwrap();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, "[1] Status: 200\n[0] Error: timeout\n");
    }

    #[test]
    fn json_reporter_tags_failures() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter
            .report(&attempt(2, Outcome::failed(FailureKind::Connect, "connection refused"), 1, 0))
            .unwrap();
        reporter
            .report(&attempt(0, Outcome::Completed { status: 409 }, 2, 3))
            .unwrap();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["index"], 2);
        assert_eq!(lines[0]["error"], "connection refused");
        assert_eq!(lines[0]["kind"], "connect");
        assert!(lines[0].get("status").is_none());
        assert_eq!(lines[1]["status"], 409);
        assert_eq!(lines[1]["elapsed_ms"], 3.0);
        assert_eq!(lines[1]["launched_ms"], 2.0);
        assert_eq!(lines[1]["version"], "HTTP/1.1");
    }

    #[tokio::test]
    async fn drain_keeps_arrival_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        for index in [3, 0, 2, 1] {
            tx.send(attempt(index, Outcome::Completed { status: 200 }, 0, 0)).unwrap();
        }
        drop(tx);

        let reporter = drain(rx, LineReporter::new(Vec::new())).await;
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let order: Vec<&str> = out.lines().map(|l| &l[..3]).collect();
        assert_eq!(order, vec!["[3]", "[0]", "[2]", "[1]"]);
    }

    /// Takes `lines` flushed lines, then fails like a closed pipe.
    struct BrokenPipe {
        written: Vec<u8>,
        lines: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.lines == 0 {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.lines = self.lines.saturating_sub(1);
            Ok(())
        }
    }

    #[tokio::test]
    async fn write_error_does_not_stop_draining() {
        let (tx, rx) = mpsc::unbounded_channel();
        for index in 0..4 {
            tx.send(attempt(index, Outcome::Completed { status: 200 }, 0, 0)).unwrap();
        }
        drop(tx);

        let pipe = BrokenPipe {
            written: Vec::new(),
            lines: 1,
        };
        let reporter = drain(rx, LineReporter::new(pipe)).await;

        let pipe = reporter.into_inner();
        assert_eq!(String::from_utf8(pipe.written).unwrap(), "[0] Status: 200\n");
    }

    #[test]
    fn summary_counts_statuses_and_failures() {
        let attempts = vec![
            attempt(0, Outcome::Completed { status: 200 }, 1, 20),
            attempt(1, Outcome::Completed { status: 409 }, 3, 10),
            attempt(2, Outcome::Completed { status: 200 }, 2, 40),
            attempt(3, Outcome::timeout(), 4, 100),
            Attempt {
                index: 4,
                outcome: Outcome::failed(FailureKind::InvalidRequest, "no client"),
                launched: None,
                elapsed: Duration::ZERO,
                version: None,
            },
        ];
        let summary = Summary::from_attempts(&attempts);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.statuses.get(&200), Some(&2));
        assert_eq!(summary.statuses.get(&409), Some(&1));
        assert_eq!(summary.failures.get(&FailureKind::Timeout), Some(&1));
        assert_eq!(summary.failures.get(&FailureKind::InvalidRequest), Some(&1));
        assert_eq!(summary.completed(), 3);
        assert_eq!(summary.versions.get("HTTP/1.1"), Some(&3));
        assert_eq!(summary.failed(), 2);
        // the unsent attempt does not count towards the spreads
        assert_eq!(summary.launch_spread, Duration::from_millis(3));
        assert_eq!(summary.completion_spread, Duration::from_millis(104 - 13));
    }

    #[test]
    fn summary_of_nothing_is_empty() {
        let summary = Summary::from_attempts(&[]);
        assert_eq!(summary, Summary::default());
    }
}
