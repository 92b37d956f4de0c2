//! One open handle on the tailed file, from open to teardown.

use crate::config::Config;
use crate::error::Error;
use crate::identity::FileIdentity;
use crate::output::LineSink;
use crate::reader::{decode_line, drain_lines};
use crate::watcher::{ChangeNotifier, Notification};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a session ended.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// The caller closed the tail.
    ClosedByCaller,
    /// Non-follow mode read everything that was there.
    Exhausted,
    /// The file should be reopened.
    Recoverable(Error),
    /// The tail cannot continue.
    Fatal(Error),
}

impl From<Error> for SessionOutcome {
    fn from(error: Error) -> Self {
        match error {
            Error::Closed => SessionOutcome::ClosedByCaller,
            other => SessionOutcome::Recoverable(other),
        }
    }
}

/// What the supervisor learns from a finished session.
#[derive(Debug)]
pub(crate) struct SessionReport {
    pub(crate) outcome: SessionOutcome,
    pub(crate) lines_emitted: usize,
}

impl SessionReport {
    pub(crate) fn new(outcome: SessionOutcome) -> Self {
        Self {
            outcome,
            lines_emitted: 0,
        }
    }
}

pub(crate) struct TailSession {
    path: PathBuf,
    reader: BufReader<File>,
    fragment: Vec<u8>,
    observed_size: u64,
    notifier: ChangeNotifier,
    poll_interval: Duration,
    follow: bool,
    lines_emitted: usize,
}

impl TailSession {
    /// Opens the file, positions the cursor and starts change notification.
    pub(crate) async fn open(
        path: &Path,
        config: &Config,
        shutdown: &CancellationToken,
    ) -> Result<Self, SessionOutcome> {
        let mut file = open_file(path, config, shutdown).await?;

        let metadata = file.metadata().await.map_err(|source| {
            SessionOutcome::Recoverable(Error::Stat {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let size = metadata.len();
        let identity = FileIdentity::from_metadata(&metadata);

        let start = config.seek.resolve(size);
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| SessionOutcome::Recoverable(Error::Io(e)))?;

        let notifier = ChangeNotifier::start(
            path,
            identity,
            config.poll_interval,
            shutdown.child_token(),
        )
        .map_err(SessionOutcome::Recoverable)?;

        debug!(
            path = %path.display(),
            size,
            start,
            inode = identity.inode(),
            "Opened file for tailing"
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            fragment: Vec::new(),
            observed_size: size,
            notifier,
            poll_interval: config.poll_interval,
            follow: config.follow,
            lines_emitted: 0,
        })
    }

    /// Follows the file until close or failure, then tears the session down.
    pub(crate) async fn run(mut self, sink: &LineSink) -> SessionReport {
        let outcome = self.follow_file(sink).await;
        self.terminate(sink, outcome).await
    }

    async fn follow_file(&mut self, sink: &LineSink) -> SessionOutcome {
        if let Err(e) = self.drain(sink).await {
            return e.into();
        }
        if !self.follow {
            return SessionOutcome::Exhausted;
        }

        // Covers native events that never arrive
        let mut fallback =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let notification = tokio::select! {
                biased;
                _ = sink.shutdown().cancelled() => return SessionOutcome::ClosedByCaller,
                notification = self.notifier.recv() => notification,
                _ = fallback.tick() => Some(Notification::DataAvailable),
            };

            match notification {
                Some(Notification::DataAvailable) => {
                    self.notifier.coalesce_data();
                    if let Err(e) = self.refresh_size().await {
                        return e.into();
                    }
                    if let Err(e) = self.drain(sink).await {
                        return e.into();
                    }
                }
                Some(Notification::IdentityChanged) => {
                    return SessionOutcome::Recoverable(Error::Rotated {
                        path: self.path.clone(),
                    });
                }
                Some(Notification::TransportError(e)) => return SessionOutcome::Recoverable(e),
                None => return SessionOutcome::Recoverable(Error::NotifierStopped),
            }
        }
    }

    async fn drain(&mut self, sink: &LineSink) -> crate::Result<()> {
        let emitted = drain_lines(&mut self.reader, &mut self.fragment, sink).await?;
        self.lines_emitted += emitted;
        Ok(())
    }

    /// Re-stats the path and fails if the file shrank.
    async fn refresh_size(&mut self) -> crate::Result<()> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Rotated {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(Error::Stat {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let current = metadata.len();
        if current < self.observed_size {
            warn!(
                path = %self.path.display(),
                previous = self.observed_size,
                current,
                "File shrank, assuming truncation"
            );
            return Err(Error::Truncated {
                path: self.path.clone(),
                previous: self.observed_size,
                current,
            });
        }
        self.observed_size = current;
        Ok(())
    }

    /// Flushes the pending fragment, stops the workers and releases the file.
    ///
    /// The flush waits for the consumer unless the tail was closed.
    async fn terminate(self, sink: &LineSink, outcome: SessionOutcome) -> SessionReport {
        let TailSession {
            path,
            reader,
            fragment,
            notifier,
            mut lines_emitted,
            ..
        } = self;

        if !fragment.is_empty() {
            debug!(path = %path.display(), bytes = fragment.len(), "Flushing final fragment");
            if sink.flush_final(decode_line(fragment)).await {
                lines_emitted += 1;
            }
        }
        notifier.stop().await;
        drop(reader);

        SessionReport {
            outcome,
            lines_emitted,
        }
    }
}

/// Opens `path`, waiting for it to appear when configured to.
async fn open_file(
    path: &Path,
    config: &Config,
    shutdown: &CancellationToken,
) -> Result<File, SessionOutcome> {
    loop {
        match File::open(path).await {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !config.wait_for_file {
                    return Err(SessionOutcome::Fatal(Error::FileNotFound {
                        path: path.to_path_buf(),
                    }));
                }
                debug!(path = %path.display(), "Waiting for file to appear");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Err(SessionOutcome::ClosedByCaller),
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(source) => {
                return Err(SessionOutcome::Fatal(Error::Open {
                    path: path.to_path_buf(),
                    source,
                }));
            }
        }
    }
}
