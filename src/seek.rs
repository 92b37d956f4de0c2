//! Initial read position for a freshly opened file.

/// Reference point for [`SeekPolicy::FromOffset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    /// Position of a freshly opened handle, which is the start of the file.
    Current,
    End,
}

/// Where reading begins each time the file is (re)opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPolicy {
    /// Replay the whole file.
    FromStart,
    /// Only emit bytes appended after the open.
    FromEnd,
    /// Replay at most `max_backlog` trailing bytes.
    AutoTail { max_backlog: u64 },
    /// Explicit offset relative to `origin`.
    FromOffset { offset: i64, origin: SeekOrigin },
}

impl Default for SeekPolicy {
    fn default() -> Self {
        SeekPolicy::AutoTail { max_backlog: 1000 }
    }
}

impl SeekPolicy {
    /// Resolves the policy to an absolute offset within `[0, size]`.
    pub fn resolve(&self, size: u64) -> u64 {
        match *self {
            SeekPolicy::FromStart => 0,
            SeekPolicy::FromEnd => size,
            SeekPolicy::AutoTail { max_backlog } => size.saturating_sub(max_backlog),
            SeekPolicy::FromOffset { offset, origin } => {
                let base = match origin {
                    SeekOrigin::Start | SeekOrigin::Current => 0,
                    SeekOrigin::End => size,
                };
                apply_offset(base, offset).min(size)
            }
        }
    }
}

fn apply_offset(base: u64, offset: i64) -> u64 {
    if offset >= 0 {
        base.saturating_add(offset.unsigned_abs())
    } else {
        base.saturating_sub(offset.unsigned_abs())
    }
}
