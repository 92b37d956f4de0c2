//! Detects when a path starts pointing at a different underlying file.
//!
//! Inode numbers are recycled once a file is deleted, so an inode match alone
//! can mistake a recreated file for the original. The identity therefore also
//! carries the file's creation timestamp where the platform reports one.
//! All platform specific metadata access lives in this module.

use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

/// Snapshot of what a path resolved to when it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileIdentity {
    device: u64,
    inode: u64,
    created: Option<SystemTime>,
}

impl FileIdentity {
    /// Builds an identity from metadata of an already opened handle.
    pub(crate) fn from_metadata(metadata: &Metadata) -> Self {
        let (device, inode) = device_and_inode(metadata);
        Self {
            device,
            inode,
            // Not every filesystem records a birth time
            created: metadata.created().ok(),
        }
    }

    /// Samples the identity of whatever `path` currently resolves to.
    pub(crate) async fn capture(path: &Path) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self::from_metadata(&metadata))
    }

    /// True only when both snapshots describe the same underlying file.
    pub(crate) fn matches(&self, other: &FileIdentity) -> bool {
        self.device == other.device && self.inode == other.inode && self.created == other.created
    }

    /// Inode number, for log fields.
    pub(crate) fn inode(&self) -> u64 {
        self.inode
    }
}

#[cfg(unix)]
fn device_and_inode(metadata: &Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

#[cfg(not(unix))]
fn device_and_inode(_metadata: &Metadata) -> (u64, u64) {
    (0, 0)
}
