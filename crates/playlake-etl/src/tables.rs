//! Arrow schemas and output table definitions of the star schema.

use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use playlake_core::model::{Artist, Song, Songplay, TimeRow, User};

use crate::writer::Tabular;

pub const SONG_TABLE: &str = "song_table";
pub const ARTISTS_TABLE: &str = "artists_table";
pub const USER_TABLE: &str = "user_table";
pub const TIME_TABLE: &str = "time_table";
pub const SONGPLAYS_TABLE: &str = "songplays_table";

/// Every table a full run produces, in write order.
pub const ALL_TABLES: [&str; 5] = [
    SONG_TABLE,
    ARTISTS_TABLE,
    USER_TABLE,
    TIME_TABLE,
    SONGPLAYS_TABLE,
];

static SONGS: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, false),
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("duration", DataType::Float64, false),
    ]))
});

static ARTISTS: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("artist_name", DataType::Utf8, false),
        Field::new("artist_location", DataType::Utf8, true),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
    ]))
});

static USERS: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("userId", DataType::Utf8, true),
        Field::new("firstName", DataType::Utf8, true),
        Field::new("lastName", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ]))
});

static TIME: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("starttime", DataType::Int64, false),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
});

static SONGPLAYS: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("songplay_id", DataType::Int64, false),
        Field::new("starttime", DataType::Int64, false),
        Field::new("userId", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("song_id", DataType::Utf8, false),
        Field::new("level", DataType::Utf8, true),
        Field::new("sessionId", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("userAgent", DataType::Utf8, true),
        Field::new("month", DataType::Int32, false),
        Field::new("year", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
});

fn strings<'a, T: 'a>(rows: &[&'a T], f: impl Fn(&'a T) -> &'a str) -> ArrayRef {
    Arc::new(rows.iter().copied().map(f).map(Some).collect::<StringArray>())
}

fn optional_strings<'a, T: 'a>(rows: &[&'a T], f: impl Fn(&'a T) -> Option<&'a str>) -> ArrayRef {
    Arc::new(rows.iter().copied().map(f).collect::<StringArray>())
}

fn int32s<T>(rows: &[&T], f: impl Fn(&T) -> i32) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(rows.iter().copied().map(f)))
}

impl Tabular for Song {
    const TABLE: &'static str = SONG_TABLE;
    const PARTITION_BY: &'static [&'static str] = &["year", "artist_id"];

    fn schema() -> SchemaRef {
        Arc::clone(&SONGS)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.year.to_string()),
            Some(self.artist_id.to_string()),
        ]
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows, |r| r.song_id.as_str()),
                strings(rows, |r| r.artist_id.as_str()),
                strings(rows, |r| r.title.as_str()),
                int32s(rows, |r| r.year),
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.duration))),
            ],
        )
    }
}

impl Tabular for Artist {
    const TABLE: &'static str = ARTISTS_TABLE;
    const PARTITION_BY: &'static [&'static str] = &[];

    fn schema() -> SchemaRef {
        Arc::clone(&ARTISTS)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        Vec::new()
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(rows, |r| r.artist_id.as_str()),
                strings(rows, |r| r.artist_name.as_str()),
                optional_strings(rows, |r| r.artist_location.as_deref()),
                Arc::new(rows.iter().map(|r| r.artist_latitude).collect::<Float64Array>()),
                Arc::new(rows.iter().map(|r| r.artist_longitude).collect::<Float64Array>()),
            ],
        )
    }
}

impl Tabular for User {
    const TABLE: &'static str = USER_TABLE;
    const PARTITION_BY: &'static [&'static str] = &[];

    fn schema() -> SchemaRef {
        Arc::clone(&USERS)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        Vec::new()
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                optional_strings(rows, |r| r.user_id.as_ref().map(|id| id.as_str())),
                optional_strings(rows, |r| r.first_name.as_deref()),
                optional_strings(rows, |r| r.last_name.as_deref()),
                optional_strings(rows, |r| r.gender.as_deref()),
                optional_strings(rows, |r| r.level.as_deref()),
            ],
        )
    }
}

impl Tabular for TimeRow {
    const TABLE: &'static str = TIME_TABLE;
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn schema() -> SchemaRef {
        Arc::clone(&TIME)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![Some(self.year.to_string()), Some(self.month.to_string())]
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.start_time))),
                int32s(rows, |r| r.hour),
                int32s(rows, |r| r.day),
                int32s(rows, |r| r.week),
                int32s(rows, |r| r.month),
                int32s(rows, |r| r.year),
                int32s(rows, |r| r.weekday),
            ],
        )
    }
}

impl Tabular for Songplay {
    const TABLE: &'static str = SONGPLAYS_TABLE;
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn schema() -> SchemaRef {
        Arc::clone(&SONGPLAYS)
    }

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.play.year.to_string()),
            Some(self.play.month.to_string()),
        ]
    }

    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(Int64Array::from_iter_values(
                    rows.iter().map(|r| r.songplay_id.value()),
                )),
                Arc::new(Int64Array::from_iter_values(
                    rows.iter().map(|r| r.play.start_time),
                )),
                optional_strings(rows, |r| r.play.user_id.as_ref().map(|id| id.as_str())),
                strings(rows, |r| r.play.artist_id.as_str()),
                strings(rows, |r| r.play.song_id.as_str()),
                optional_strings(rows, |r| r.play.level.as_deref()),
                Arc::new(rows.iter().map(|r| r.play.session_id).collect::<Int64Array>()),
                optional_strings(rows, |r| r.play.location.as_deref()),
                optional_strings(rows, |r| r.play.user_agent.as_deref()),
                int32s(rows, |r| r.play.month),
                int32s(rows, |r| r.play.year),
                int32s(rows, |r| r.play.weekday),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use playlake_core::model::{ArtistId, SongId, UserId};

    #[test]
    fn test_partition_columns_exist_in_schemas() {
        fn check<T: Tabular>() {
            let schema = T::schema();
            for column in T::PARTITION_BY {
                assert!(
                    schema.field_with_name(column).is_ok(),
                    "{} lacks partition column {column}",
                    T::TABLE
                );
            }
        }
        check::<Song>();
        check::<Artist>();
        check::<User>();
        check::<TimeRow>();
        check::<Songplay>();
    }

    #[test]
    fn test_song_partition_values() {
        let song = Song {
            song_id: SongId::from("S1"),
            artist_id: ArtistId::from("A1"),
            title: "X".to_string(),
            year: 2000,
            duration: 200.0,
        };
        assert_eq!(
            song.partition_values(),
            vec![Some("2000".to_string()), Some("A1".to_string())]
        );
    }

    #[test]
    fn test_user_batch_keeps_nulls() {
        let users = [
            User {
                user_id: Some(UserId::from("9")),
                first_name: Some("Ana".to_string()),
                last_name: None,
                gender: Some("F".to_string()),
                level: Some("paid".to_string()),
            },
            User {
                user_id: None,
                first_name: None,
                last_name: None,
                gender: None,
                level: None,
            },
        ];
        let rows: Vec<&User> = users.iter().collect();
        let batch = User::to_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 5);
        assert_eq!(batch.column(0).null_count(), 1);
        assert_eq!(batch.column(2).null_count(), 2);
    }

    #[test]
    fn test_empty_batch_has_schema() {
        let batch = Artist::to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema(), Artist::schema());
    }
}
