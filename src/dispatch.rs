//! Launches the N attempts of a run and joins all of them.
//!
//! Each attempt runs in its own tokio task and owns its result until the task
//! finishes; the join handle is its outcome slot. Completed attempts are also
//! pushed onto a channel the moment they become terminal, so a reporter sees
//! them in completion order.
//!
//! Neither launch mode guarantees that requests reach the target at the same
//! instant. [`LaunchMode::Staggered`] skew is bounded by how quickly tasks can
//! be spawned; [`LaunchMode::Barrier`] only lines up the moment each request
//! is handed to the transport, the TCP/TLS handshakes still happen after that.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Barrier, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info};

use crate::outcome::{Attempt, FailureKind, Outcome};
use crate::spec::RequestSpec;
use crate::transport::Transport;

/// How attempts are released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LaunchMode {
    /// Spawn attempts 0..N in order without waiting on any of them.
    #[default]
    Staggered,
    /// Every attempt opens its session, then waits until all N have done so
    /// before sending.
    Barrier,
}

/// Runs probing rounds over one [`Transport`].
pub struct Dispatcher<T> {
    transport: Arc<T>,
    mode: LaunchMode,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher in [`LaunchMode::Staggered`] mode.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            mode: LaunchMode::default(),
        }
    }

    /// Sets how attempts are released.
    pub fn mode(mut self, mode: LaunchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Runs `spec.concurrency()` attempts and returns once every one of them
    /// is terminal. The result holds exactly one attempt per index, in index
    /// order. `events` receives each attempt as soon as it finishes; a closed
    /// receiver does not affect the run.
    pub async fn dispatch(
        &self,
        spec: Arc<RequestSpec>,
        events: mpsc::UnboundedSender<Attempt>,
    ) -> Vec<Attempt> {
        let n = spec.concurrency();
        let start = Instant::now();
        let gate = match self.mode {
            LaunchMode::Staggered => None,
            LaunchMode::Barrier => Some(Arc::new(Barrier::new(n))),
        };

        info!(
            "Launching {} {} attempts against {} ({:?} mode)",
            n,
            spec.method(),
            spec.url(),
            self.mode
        );

        let mut slots: Vec<JoinHandle<Attempt>> = Vec::with_capacity(n);
        for index in 0..n {
            let transport = Arc::clone(&self.transport);
            let spec = Arc::clone(&spec);
            let gate = gate.clone();
            let events = events.clone();

            slots.push(tokio::spawn(async move {
                let attempt = run_attempt(index, transport.as_ref(), &spec, gate.as_deref(), start).await;
                let _ = events.send(attempt.clone());
                attempt
            }));
        }
        debug!("All {} attempts spawned after {:?}", n, start.elapsed());

        let mut attempts = Vec::with_capacity(n);
        for (index, slot) in slots.into_iter().enumerate() {
            let attempt = match slot.await {
                Ok(attempt) => attempt,
                Err(e) => {
                    error!("Attempt #{} did not finish: {}", index, e);
                    let attempt = Attempt {
                        index,
                        outcome: Outcome::failed(FailureKind::Aborted, e.to_string()),
                        launched: None,
                        elapsed: Duration::ZERO,
                        version: None,
                    };
                    let _ = events.send(attempt.clone());
                    attempt
                }
            };
            attempts.push(attempt);
        }

        debug!("Joined {} attempts after {:?}", attempts.len(), start.elapsed());
        attempts
    }
}

async fn run_attempt<T: Transport>(
    index: usize,
    transport: &T,
    spec: &RequestSpec,
    gate: Option<&Barrier>,
    start: Instant,
) -> Attempt {
    // A failed or panicking open still has to arrive, or the others wait forever.
    let session = panic::catch_unwind(AssertUnwindSafe(|| transport.open(spec)));

    if let Some(gate) = gate {
        gate.wait().await;
    }

    let session = match session {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => return unsent(index, Outcome::failed(e.kind, e.reason)),
        Err(payload) => {
            error!("Task #{}: opening the session panicked", index);
            return unsent(index, Outcome::failed(FailureKind::Aborted, panic_message(payload.as_ref())));
        }
    };

    let launched = start.elapsed();
    let sent = Instant::now();
    let (outcome, version) = match timeout(spec.timeout(), transport.send(&session, spec)).await {
        Ok(Ok(reply)) => (Outcome::Completed { status: reply.status }, reply.version),
        Ok(Err(e)) => (Outcome::failed(e.kind, e.reason), None),
        Err(_) => (Outcome::timeout(), None),
    };
    let elapsed = sent.elapsed();

    debug!("Task #{}: finished after {:?}", index, elapsed);
    Attempt {
        index,
        outcome,
        launched: Some(launched),
        elapsed,
        version,
    }
}

/// An attempt that never reached the transport's send.
fn unsent(index: usize, outcome: Outcome) -> Attempt {
    Attempt {
        index,
        outcome,
        launched: None,
        elapsed: Duration::ZERO,
        version: None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
