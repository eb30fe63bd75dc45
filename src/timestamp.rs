//! FILETIME timestamps.
//!
//! The engine reports item times as Windows FILETIME values (100-nanosecond
//! intervals since January 1, 1601 UTC). Caller capabilities speak 32-bit
//! Unix seconds, so [`Timestamp`] converts between the two and reports
//! values that do not fit as absent instead of wrapping.
//!
//! ```rust
//! use sevenlink::Timestamp;
//!
//! let ts = Timestamp::from_unix_secs(1_700_000_000).unwrap();
//! assert_eq!(ts.to_unix_u32(), Some(1_700_000_000));
//! assert_eq!(Timestamp::from_filetime(0).to_unix_u32(), None);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Difference between the FILETIME and Unix epochs in 100-nanosecond intervals.
const FILETIME_UNIX_DIFF: u64 = 116444736000000000;

/// Number of 100-nanosecond intervals per second.
const INTERVALS_PER_SECOND: u64 = 10_000_000;

/// A FILETIME value as carried by time properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    filetime: u64,
}

impl Timestamp {
    /// Creates a timestamp from a raw FILETIME value.
    #[inline]
    pub const fn from_filetime(filetime: u64) -> Self {
        Self { filetime }
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Returns `None` if the value cannot be represented as a FILETIME.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        let intervals = secs.unsigned_abs().checked_mul(INTERVALS_PER_SECOND)?;
        let filetime = if secs < 0 {
            FILETIME_UNIX_DIFF.checked_sub(intervals)?
        } else {
            FILETIME_UNIX_DIFF.checked_add(intervals)?
        };
        Some(Self::from_filetime(filetime))
    }

    /// Creates a timestamp from the 32-bit Unix seconds used by stream
    /// capabilities.
    pub fn from_unix_u32(secs: u32) -> Self {
        Self::from_filetime(FILETIME_UNIX_DIFF + u64::from(secs) * INTERVALS_PER_SECOND)
    }

    /// Creates a timestamp from a `SystemTime`, truncated to whole seconds.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::from_unix_secs(i64::try_from(d.as_secs()).ok()?),
            Err(e) => Self::from_unix_secs(-i64::try_from(e.duration().as_secs()).ok()?),
        }
    }

    /// Returns the raw FILETIME value.
    #[inline]
    pub const fn as_filetime(&self) -> u64 {
        self.filetime
    }

    /// Returns Unix seconds, rounding towards negative infinity.
    pub fn as_unix_secs(&self) -> i64 {
        if self.filetime >= FILETIME_UNIX_DIFF {
            ((self.filetime - FILETIME_UNIX_DIFF) / INTERVALS_PER_SECOND) as i64
        } else {
            let intervals = FILETIME_UNIX_DIFF - self.filetime;
            -(intervals.div_ceil(INTERVALS_PER_SECOND) as i64)
        }
    }

    /// Returns Unix seconds if they fit the unsigned 32-bit range.
    pub fn to_unix_u32(&self) -> Option<u32> {
        u32::try_from(self.as_unix_secs()).ok()
    }

    /// Returns the timestamp as a `SystemTime`, truncated to whole seconds.
    pub fn as_system_time(&self) -> SystemTime {
        let secs = self.as_unix_secs();
        if secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time).unwrap_or_default()
    }
}
