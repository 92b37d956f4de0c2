//! Follow a single log file the way `tail -F` does.
//!
//! The file is tailed line by line. Rotation (the path being replaced by a
//! new file) and truncation are detected and the file is reopened, while a
//! line that was still being written when the file went away is delivered
//! once when the tail moves on.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tail::{Config, SeekPolicy, tail_file};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default().with_seek(SeekPolicy::FromEnd);
//!     let mut stream = tail_file("app.log", config).await?;
//!
//!     while let Some(line) = stream.next().await {
//!         println!("{}", line);
//!     }
//!
//!     if let Some(error) = stream.terminal_error().await {
//!         eprintln!("Tail stopped: {}", error);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod identity;
mod output;
mod reader;
mod seek;
mod session;
mod stream;
mod supervisor;
mod watcher;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use config::{Config, DEFAULT_POLL_INTERVAL};
pub use error::{Error, Result};
pub use output::TailEvent;
pub use seek::{SeekOrigin, SeekPolicy};
pub use stream::{CloseHandle, TailStream};

use std::path::Path;

/// Starts following `path` and returns the stream of its lines.
///
/// The configuration and path are checked up front; problems opening the file
/// itself are reported through [`TailStream::terminal_error`].
///
/// # Example
///
/// ```rust,no_run
/// use log_tail::{Config, tail_file};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut stream = tail_file("app.log", Config::default()).await?;
///
///     while let Some(line) = stream.next_line().await {
///         println!("{}", line);
///     }
///
///     Ok(())
/// }
/// ```
pub async fn tail_file<P: AsRef<Path>>(path: P, config: Config) -> Result<TailStream> {
    TailStream::new(path, config)
}

/// Like [`tail_file`], also returning the lifecycle event channel.
pub async fn tail_file_inspected<P: AsRef<Path>>(
    path: P,
    config: Config,
) -> Result<(TailStream, tokio::sync::mpsc::Receiver<TailEvent>)> {
    TailStream::with_inspector(path, config)
}
