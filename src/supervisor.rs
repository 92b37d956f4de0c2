//! Outer loop that reopens the file after a session ends.

use crate::config::Config;
use crate::error::Error;
use crate::output::{LineSink, TailEvent};
use crate::session::{SessionOutcome, SessionReport, TailSession};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// What to do after a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestartStep {
    Stop,
    Immediately,
    After(Duration),
}

/// Rate limits reopening the file.
///
/// Rotation and truncation may reopen without a cooldown once. The allowance
/// comes back only after a session that emitted at least one line, so a
/// rotation that keeps failing settles into the normal cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RestartPolicy {
    cooldown: Duration,
    skip_cooldown: bool,
}

impl RestartPolicy {
    pub(crate) fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            skip_cooldown: true,
        }
    }

    pub(crate) fn next_step(&mut self, report: &SessionReport) -> RestartStep {
        if report.lines_emitted > 0 {
            self.skip_cooldown = true;
        }

        match &report.outcome {
            SessionOutcome::ClosedByCaller | SessionOutcome::Exhausted | SessionOutcome::Fatal(_) => {
                RestartStep::Stop
            }
            SessionOutcome::Recoverable(cause) if cause.is_rotation() && self.skip_cooldown => {
                self.skip_cooldown = false;
                RestartStep::Immediately
            }
            SessionOutcome::Recoverable(_) => RestartStep::After(self.cooldown),
        }
    }
}

/// Runs sessions back to back until close, exhaustion or a fatal error.
///
/// A fatal cause is delivered once on `errors`; recoverable causes only
/// surface as [`TailEvent::TailRestarted`] and log output.
pub(crate) async fn supervise(
    path: PathBuf,
    config: Config,
    sink: LineSink,
    errors: oneshot::Sender<Error>,
) {
    let shutdown = sink.shutdown().clone();
    let mut policy = RestartPolicy::new(config.poll_interval);

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        info!(path = %path.display(), "Starting tail session");
        let report = match TailSession::open(&path, &config, &shutdown).await {
            Ok(session) => session.run(&sink).await,
            Err(outcome) => SessionReport::new(outcome),
        };
        let step = policy.next_step(&report);

        match report.outcome {
            SessionOutcome::ClosedByCaller => {
                debug!(path = %path.display(), "Tail closed by caller");
                break;
            }
            SessionOutcome::Exhausted => {
                debug!(path = %path.display(), "Reached end of file, not following");
                break;
            }
            SessionOutcome::Fatal(cause) => {
                error!(path = %path.display(), error = %cause, "Tail stopped");
                let _ = errors.send(cause);
                break;
            }
            SessionOutcome::Recoverable(cause) => {
                warn!(
                    path = %path.display(),
                    error = %cause,
                    step = ?step,
                    "Tail session ended, restarting"
                );
                if sink.send_event(TailEvent::TailRestarted).await.is_err() {
                    break;
                }
            }
        }

        match step {
            RestartStep::Stop => break,
            RestartStep::Immediately => {}
            RestartStep::After(cooldown) => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(cooldown) => {}
                }
            }
        }
    }
}
