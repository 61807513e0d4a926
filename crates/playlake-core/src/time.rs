//! Calendar decomposition of event timestamps.
//!
//! Log events carry their time as epoch milliseconds. The time dimension and
//! the songplays fact both need the same calendar breakdown of that instant,
//! taken in one configured time zone (a fixed UTC offset, UTC by default).
//!
//! Conventions:
//! - `week` is the ISO-8601 week of the (ISO) year, 1..=53;
//! - `weekday` counts from Sunday: 1 = Sunday .. 7 = Saturday.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Calendar fields derived from one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeParts {
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

/// Converts epoch-millisecond timestamps into [`TimeParts`] in a fixed
/// time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Calendar at a fixed offset east of UTC, in minutes.
    ///
    /// # Errors
    /// Returns [`Error::InvalidOffset`] for offsets of a day or more.
    pub fn with_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or(Error::InvalidOffset(minutes))
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Decompose an epoch-millisecond timestamp.
    ///
    /// # Errors
    /// Returns [`Error::TimestampOutOfRange`] when the instant cannot be
    /// represented.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn decompose(&self, ts_millis: i64) -> Result<TimeParts> {
        let secs = ts_millis.div_euclid(1000);
        let nanos = (ts_millis.rem_euclid(1000) * 1_000_000) as u32;
        let instant = DateTime::from_timestamp(secs, nanos)
            .ok_or(Error::TimestampOutOfRange(ts_millis))?
            .with_timezone(&self.offset);

        Ok(TimeParts {
            hour: instant.hour() as i32,
            day: instant.day() as i32,
            week: instant.iso_week().week() as i32,
            month: instant.month() as i32,
            year: instant.year(),
            weekday: instant.weekday().number_from_sunday() as i32,
        })
    }
}
