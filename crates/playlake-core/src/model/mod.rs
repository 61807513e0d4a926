pub mod dimension;
pub mod fact;
pub mod ids;
pub mod record;

pub use dimension::{Artist, Song, TimeRow, User};
pub use fact::{Play, Songplay};
pub use ids::{ArtistId, SongId, SongplayId, UserId};
pub use record::{LogEvent, SongRecord, NEXT_SONG_PAGE};
