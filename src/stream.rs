//! Public handle for a running tail.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{LineSink, TailEvent};
use crate::supervisor::supervise;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Closes a tail from anywhere. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    shutdown: CancellationToken,
}

impl CloseHandle {
    /// Stops the tail. Calling it again has no further effect.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// True once the tail was closed through any handle or by dropping the stream.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// A stream of lines from one followed file.
///
/// Lines travel through a channel that holds a single line, so the tail only
/// reads ahead by one line. A consumer that stops polling stalls the tail
/// until it resumes or the tail is closed; nothing is dropped in the
/// meantime. The inspection channel from [`TailStream::with_inspector`]
/// blocks the same way and must be drained as well.
///
/// Dropping the stream closes the tail.
pub struct TailStream {
    receiver: mpsc::Receiver<String>,
    errors: Option<oneshot::Receiver<Error>>,
    shutdown: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl TailStream {
    /// Starts following `path` on the current Tokio runtime.
    ///
    /// The configuration and path are checked before anything is spawned;
    /// problems opening the file itself are reported through
    /// [`TailStream::terminal_error`].
    pub fn new<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref();
        validate(path, &config)?;
        Ok(Self::spawn(path.to_path_buf(), config, None))
    }

    /// Like [`TailStream::new`], also returning the lifecycle event channel.
    pub fn with_inspector<P: AsRef<Path>>(
        path: P,
        config: Config,
    ) -> Result<(Self, mpsc::Receiver<TailEvent>)> {
        let path = path.as_ref();
        validate(path, &config)?;
        let (event_tx, event_rx) = mpsc::channel(1);
        let stream = Self::spawn(path.to_path_buf(), config, Some(event_tx));
        Ok((stream, event_rx))
    }

    fn spawn(path: PathBuf, config: Config, events: Option<mpsc::Sender<TailEvent>>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let (error_tx, error_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();

        let sink = LineSink::new(tx, events, shutdown.clone(), config.poll_interval);
        let task_handle = tokio::spawn(supervise(path, config, sink, error_tx));

        TailStream {
            receiver: rx,
            errors: Some(error_rx),
            shutdown,
            task_handle: Some(task_handle),
        }
    }

    /// Next line, or `None` once the tail has stopped and every line was read.
    pub async fn next_line(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Waits for the terminal error.
    ///
    /// Resolves to `None` when the tail stopped without one (closed, or not
    /// following), and on every call after the first.
    pub async fn terminal_error(&mut self) -> Option<Error> {
        let errors = self.errors.take()?;
        errors.await.ok()
    }

    /// Stops the tail. The final unterminated line, if any, is still
    /// delivered on the stream before it ends.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// A handle that can close the tail while the stream is borrowed or moved.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Waits for the background task to finish. Does not close the tail.
    pub async fn join(mut self) {
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }

    /// Check if the stream has been closed/dropped
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

fn validate(path: &Path, config: &Config) -> Result<()> {
    config.validate()?;
    if path.file_name().is_none() {
        return Err(Error::InvalidPath {
            message: format!("{} does not name a file", path.display()),
        });
    }
    Ok(())
}

impl Drop for TailStream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Stream for TailStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
