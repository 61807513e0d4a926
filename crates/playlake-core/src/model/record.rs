//! Raw input records.
//!
//! These are the declared schemas the JSON-lines sources are parsed against.
//! Fields not listed here are ignored; a record missing a required field or
//! carrying a field of the wrong type fails to parse.

use serde::{Deserialize, Serialize};

use crate::model::ids::{ArtistId, SongId, UserId};

/// Page name of log events that represent a song being played.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// One song metadata record, with its artist's attributes embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub song_id: SongId,
    pub artist_id: ArtistId,
    pub title: String,
    pub year: i32,
    pub duration: f64,
    pub artist_name: String,
    #[serde(default)]
    pub artist_location: Option<String>,
    #[serde(default)]
    pub artist_latitude: Option<f64>,
    #[serde(default)]
    pub artist_longitude: Option<f64>,
}

/// One application usage-log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Event time as epoch milliseconds.
    pub ts: i64,
    pub page: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Subscription tier at the time of the event.
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl LogEvent {
    /// Whether this event is a song play.
    #[must_use]
    pub fn is_play(&self) -> bool {
        self.page == NEXT_SONG_PAGE
    }
}
