//! Outbound side of the engine: emitted lines and inspection events.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle events published on the optional inspection channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailEvent {
    /// A drain pass reached the current end of the file. May repeat.
    EndOfCurrentData,
    /// A session ended with a recoverable cause and the file is being reopened.
    TailRestarted,
}

/// Delivers lines and events to the consumer with blocking-send semantics.
///
/// Every send races the caller's close signal so a consumer that stopped
/// reading can never keep the engine alive after close.
pub(crate) struct LineSink {
    lines: mpsc::Sender<String>,
    events: Option<mpsc::Sender<TailEvent>>,
    shutdown: CancellationToken,
    flush_timeout: Duration,
}

impl LineSink {
    pub(crate) fn new(
        lines: mpsc::Sender<String>,
        events: Option<mpsc::Sender<TailEvent>>,
        shutdown: CancellationToken,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            lines,
            events,
            shutdown,
            flush_timeout,
        }
    }

    /// Sends one line, waiting for the consumer to make room.
    ///
    /// Fails with [`Error::Closed`] once the tail is closed or the line
    /// receiver is gone.
    pub(crate) async fn send_line(&self, line: String) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Closed),
            sent = self.lines.send(line) => sent.map_err(|_| Error::Closed),
        }
    }

    /// Publishes an inspection event if anyone asked for them.
    ///
    /// Waits until the line channel has room first. The channel holds a single
    /// line, so an event is only published once the consumer has taken every
    /// line emitted before it. A dropped inspection receiver is ignored; only
    /// close stops the engine.
    pub(crate) async fn send_event(&self, event: TailEvent) -> Result<()> {
        let Some(events) = &self.events else {
            return Ok(());
        };
        self.wait_for_line_slot().await?;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Closed),
            _ = events.send(event) => Ok(()),
        }
    }

    async fn wait_for_line_slot(&self) -> Result<()> {
        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(Error::Closed),
            permit = self.lines.reserve() => permit.map_err(|_| Error::Closed)?,
        };
        // Unused; holding the slot proved the previous line was taken
        drop(permit);
        Ok(())
    }

    /// Emits the unterminated remainder of a session.
    ///
    /// Waits for the consumer like [`LineSink::send_line`]. Once the tail is
    /// closed the wait is bounded by the flush timeout instead, after which
    /// the fragment is dropped.
    pub(crate) async fn flush_final(&self, line: String) -> bool {
        if !self.shutdown.is_cancelled() {
            let reserved = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                permit = self.lines.reserve() => Some(permit),
            };
            match reserved {
                Some(Ok(permit)) => {
                    permit.send(line);
                    return true;
                }
                Some(Err(_)) => {
                    debug!("Line receiver gone, dropping final fragment");
                    return false;
                }
                // Closed while waiting, fall through to the bounded send
                None => {}
            }
        }

        match tokio::time::timeout(self.flush_timeout, self.lines.send(line)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!("Line receiver gone, dropping final fragment");
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.flush_timeout.as_millis() as u64,
                    "Consumer did not accept final fragment after close, dropping it"
                );
                false
            }
        }
    }

    pub(crate) fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}
