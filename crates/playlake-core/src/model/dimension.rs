//! Dimension table rows.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::model::ids::{ArtistId, SongId, UserId};
use crate::model::record::{LogEvent, SongRecord};
use crate::time::TimeParts;

/// A row of the songs dimension.
///
/// Equality and hashing compare `duration` bitwise so that rows can be
/// deduplicated as exact tuples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub song_id: SongId,
    pub artist_id: ArtistId,
    pub title: String,
    pub year: i32,
    pub duration: f64,
}

impl From<&SongRecord> for Song {
    fn from(record: &SongRecord) -> Self {
        Self {
            song_id: record.song_id.clone(),
            artist_id: record.artist_id.clone(),
            title: record.title.clone(),
            year: record.year,
            duration: record.duration,
        }
    }
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.song_id == other.song_id
            && self.artist_id == other.artist_id
            && self.title == other.title
            && self.year == other.year
            && self.duration.to_bits() == other.duration.to_bits()
    }
}

impl Eq for Song {}

impl Hash for Song {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.song_id.hash(state);
        self.artist_id.hash(state);
        self.title.hash(state);
        self.year.hash(state);
        self.duration.to_bits().hash(state);
    }
}

/// A row of the artists dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
}

impl Artist {
    fn coordinate_bits(&self) -> (Option<u64>, Option<u64>) {
        (
            self.artist_latitude.map(f64::to_bits),
            self.artist_longitude.map(f64::to_bits),
        )
    }
}

impl From<&SongRecord> for Artist {
    fn from(record: &SongRecord) -> Self {
        Self {
            artist_id: record.artist_id.clone(),
            artist_name: record.artist_name.clone(),
            artist_location: record.artist_location.clone(),
            artist_latitude: record.artist_latitude,
            artist_longitude: record.artist_longitude,
        }
    }
}

impl PartialEq for Artist {
    fn eq(&self, other: &Self) -> bool {
        self.artist_id == other.artist_id
            && self.artist_name == other.artist_name
            && self.artist_location == other.artist_location
            && self.coordinate_bits() == other.coordinate_bits()
    }
}

impl Eq for Artist {}

impl Hash for Artist {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.artist_id.hash(state);
        self.artist_name.hash(state);
        self.artist_location.hash(state);
        self.coordinate_bits().hash(state);
    }
}

/// A row of the users dimension.
///
/// A user whose subscription level changed between events appears once per
/// distinct level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub user_id: Option<UserId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

impl From<&LogEvent> for User {
    fn from(event: &LogEvent) -> Self {
        Self {
            user_id: event.user_id.clone(),
            first_name: event.first_name.clone(),
            last_name: event.last_name.clone(),
            gender: event.gender.clone(),
            level: event.level.clone(),
        }
    }
}

/// A row of the time dimension: one event timestamp and its calendar parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRow {
    /// Epoch milliseconds, as found in the log event.
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

impl TimeRow {
    #[must_use]
    pub const fn new(start_time: i64, parts: TimeParts) -> Self {
        Self {
            start_time,
            hour: parts.hour,
            day: parts.day,
            week: parts.week,
            month: parts.month,
            year: parts.year,
            weekday: parts.weekday,
        }
    }
}
