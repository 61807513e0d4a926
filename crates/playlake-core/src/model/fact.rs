use serde::{Deserialize, Serialize};

use crate::model::ids::{ArtistId, SongId, SongplayId, UserId};
use crate::model::record::{LogEvent, SongRecord};
use crate::time::TimeParts;

/// A play event matched to a song, before it is given a surrogate key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Play {
    pub start_time: i64,
    pub user_id: Option<UserId>,
    pub artist_id: ArtistId,
    pub song_id: SongId,
    pub level: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

impl Play {
    /// Combine a play event with the song it matched on.
    #[must_use]
    pub fn new(event: &LogEvent, song: &SongRecord, parts: TimeParts) -> Self {
        Self {
            start_time: event.ts,
            user_id: event.user_id.clone(),
            artist_id: song.artist_id.clone(),
            song_id: song.song_id.clone(),
            level: event.level.clone(),
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
            month: parts.month,
            year: parts.year,
            weekday: parts.weekday,
        }
    }
}

/// A row of the songplays fact table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Songplay {
    pub songplay_id: SongplayId,
    #[serde(flatten)]
    pub play: Play,
}
