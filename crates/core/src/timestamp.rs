use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// Milliseconds since Unix epoch, as assigned by the message store.
///
/// Two messages may carry the same timestamp; total ordering inside a
/// timeline is `(Timestamp, MessageId)`.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Absolute distance to another timestamp, in milliseconds.
    pub fn abs_diff(&self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }
}

/// Assigns creation timestamps on insert: strictly increasing within one
/// store even when the wall clock stalls or regresses. Timestamps from
/// different stores can still collide, which is why timeline order always
/// tie-breaks on id.
pub struct StoreClock {
    last_ms: u64,
}

impl StoreClock {
    pub fn new() -> Self {
        Self { last_ms: 0 }
    }

    pub fn now(&mut self) -> Result<Timestamp, CoreError> {
        let now = physical_now()?;
        self.last_ms = if now > self.last_ms {
            now
        } else {
            self.last_ms + 1
        };
        Ok(Timestamp(self.last_ms))
    }
}

impl Default for StoreClock {
    fn default() -> Self {
        Self::new()
    }
}
