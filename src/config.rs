//! Tail configuration.

use crate::error::{Error, Result};
use crate::seek::SeekPolicy;
use std::time::Duration;

/// Default cadence for identity checks, fallback drains and restart cooldown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Settings for a single tail. Fixed once the tail is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identity check cadence. Also paces the fallback drain, the wait for a
    /// missing file, and the cooldown between restarts after a failure.
    pub poll_interval: Duration,
    /// Initial cursor for every (re)opened file.
    pub seek: SeekPolicy,
    /// Keep retrying when the file does not exist yet instead of failing.
    pub wait_for_file: bool,
    /// Keep following appended data. When false the tail reads what is
    /// currently in the file and stops.
    pub follow: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            seek: SeekPolicy::default(),
            wait_for_file: false,
            follow: true,
        }
    }
}

impl Config {
    /// Sets the identity check cadence, which also paces fallback drains and restart cooldowns.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets where every (re)opened file starts reading.
    pub fn with_seek(mut self, seek: SeekPolicy) -> Self {
        self.seek = seek;
        self
    }

    /// Waits for a missing file to appear instead of failing.
    pub fn with_wait_for_file(mut self, wait_for_file: bool) -> Self {
        self.wait_for_file = wait_for_file;
        self
    }

    /// Keeps following appended data; `false` reads the current contents once.
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "poll interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
