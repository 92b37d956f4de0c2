//! Change notification for the tailed file.
//!
//! Two workers feed one queue: a native filesystem watcher that reports
//! writes, and a poll loop that re-checks the file identity. The poll loop is
//! the authority on removal since native delete and rename events are not
//! reliably delivered on every platform.

use crate::error::{Error, Result};
use crate::identity::FileIdentity;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const NOTIFICATION_QUEUE: usize = 8;

/// Signals consumed by a tail session.
#[derive(Debug)]
pub(crate) enum Notification {
    /// New bytes may be readable.
    DataAvailable,
    /// The path no longer resolves to the opened file.
    IdentityChanged,
    /// A watcher or stat failure ended one of the workers.
    TransportError(Error),
}

/// Owns both notification workers for one session.
pub(crate) struct ChangeNotifier {
    receiver: mpsc::Receiver<Notification>,
    pending: Option<Notification>,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl ChangeNotifier {
    /// Registers the native watch and spawns both workers.
    ///
    /// `shutdown` is owned by the session; cancelling it stops both workers.
    pub(crate) fn start(
        path: &Path,
        identity: FileIdentity,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let file_name = target_file_name(path)?;
        let (tx, receiver) = mpsc::channel(NOTIFICATION_QUEUE);

        let watcher = FileWatcher::new(path)?;
        let native = tokio::spawn(native_worker(
            watcher,
            file_name,
            tx.clone(),
            shutdown.clone(),
        ));
        let poll = tokio::spawn(poll_worker(
            path.to_path_buf(),
            identity,
            poll_interval,
            tx,
            shutdown.clone(),
        ));

        Ok(Self {
            receiver,
            pending: None,
            shutdown,
            workers: vec![native, poll],
        })
    }

    /// Next notification, or `None` once both workers have exited.
    pub(crate) async fn recv(&mut self) -> Option<Notification> {
        if let Some(notification) = self.pending.take() {
            return Some(notification);
        }
        self.receiver.recv().await
    }

    /// Swallows data signals that are already queued.
    ///
    /// Stops at the first other notification and keeps it for the next
    /// [`recv`](Self::recv). Returns how many signals were folded.
    pub(crate) fn coalesce_data(&mut self) -> usize {
        let mut folded = 0;
        while self.pending.is_none() {
            match self.receiver.try_recv() {
                Ok(Notification::DataAvailable) => folded += 1,
                Ok(other) => self.pending = Some(other),
                Err(_) => break,
            }
        }
        folded
    }

    /// Cancels both workers and waits for them to exit.
    pub(crate) async fn stop(mut self) {
        self.shutdown.cancel();
        for worker in std::mem::take(&mut self.workers) {
            let _ = worker.await;
        }
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Native filesystem watch on the parent directory of the tailed file.
///
/// Watching the directory rather than the file keeps events flowing when the
/// file is replaced at the same path.
struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FileWatcher {
    fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&watch_dir(path), RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    async fn next_event(&mut self) -> Option<notify::Result<Event>> {
        self.receiver.recv().await
    }
}

/// Maps native events to data signals until cancelled or the watcher fails.
///
/// The watcher registration is dropped when this returns.
async fn native_worker(
    mut watcher: FileWatcher,
    file_name: String,
    tx: mpsc::Sender<Notification>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            event = watcher.next_event() => event,
        };

        match event {
            Some(Ok(event)) => {
                if !is_event_relevant_to_file(&event, &file_name) {
                    continue;
                }
                match classify_event(&event.kind) {
                    EventClass::Data => {
                        // A full queue already holds a pending signal
                        let _ = tx.try_send(Notification::DataAvailable);
                    }
                    EventClass::Removed => {
                        debug!(file = %file_name, "Native watcher saw file removal");
                    }
                    EventClass::Ignored => {
                        trace!(file = %file_name, kind = ?event.kind, "Ignoring event");
                    }
                }
            }
            Some(Err(e)) => {
                send_final(&tx, &shutdown, Notification::TransportError(Error::Watcher(e))).await;
                return;
            }
            None => return,
        }
    }
}

/// Re-checks the file identity every `poll_interval` until it changes.
async fn poll_worker(
    path: PathBuf,
    identity: FileIdentity,
    poll_interval: Duration,
    tx: mpsc::Sender<Notification>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let notification = match FileIdentity::capture(&path).await {
            Ok(current) if current.matches(&identity) => continue,
            Ok(_) => {
                info!(path = %path.display(), "Poll detected a different file at path");
                Notification::IdentityChanged
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Poll detected file removal");
                Notification::IdentityChanged
            }
            Err(source) => Notification::TransportError(Error::Stat {
                path: path.clone(),
                source,
            }),
        };
        send_final(&tx, &shutdown, notification).await;
        return;
    }
}

async fn send_final(
    tx: &mpsc::Sender<Notification>,
    shutdown: &CancellationToken,
    notification: Notification,
) {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {}
        _ = tx.send(notification) => {}
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EventClass {
    Data,
    Removed,
    Ignored,
}

fn classify_event(kind: &EventKind) -> EventClass {
    match kind {
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any => EventClass::Data,
        EventKind::Remove(_) => EventClass::Removed,
        EventKind::Access(_) | EventKind::Other => EventClass::Ignored,
    }
}

/// Check if a notify event is relevant to a specific file
fn is_event_relevant_to_file(event: &Event, target_file_name: &str) -> bool {
    event.paths.iter().any(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy() == target_file_name)
            .unwrap_or(false)
    })
}

fn target_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath {
            message: format!("{} has no file name", path.display()),
        })
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
