//! Songplays stage: the fact table.
//!
//! Plays are matched to song records on artist name alone. A play whose
//! artist has no song record is dropped without error; a play whose artist
//! has several songs yields one row per song. Both behaviours are part of
//! the table's contract.

use std::collections::HashMap;

use treadle::{Stage, StageContext, StageOutcome};

use playlake_core::model::{LogEvent, Play, SongRecord, Songplay, SongplayId};
use playlake_core::Calendar;

use crate::dataset::Dataset;
use crate::error::{EtlError, EtlResult};
use crate::events::filter_plays;
use crate::stage::{record_summaries, stage_failure, RunSettings};
use crate::writer::WriteSummary;

/// Song records keyed by artist name.
#[derive(Debug, Default)]
pub struct ArtistIndex<'a> {
    by_name: HashMap<&'a str, Vec<&'a SongRecord>>,
}

impl<'a> ArtistIndex<'a> {
    pub fn new(records: impl IntoIterator<Item = &'a SongRecord>) -> Self {
        let mut by_name: HashMap<&'a str, Vec<&'a SongRecord>> = HashMap::new();
        for record in records {
            by_name
                .entry(record.artist_name.as_str())
                .or_default()
                .push(record);
        }
        Self { by_name }
    }

    /// Song records whose artist name equals `artist`. A missing artist
    /// matches nothing.
    pub fn matches(&self, artist: Option<&str>) -> &[&'a SongRecord] {
        artist
            .and_then(|name| self.by_name.get(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Inner-join plays to song records.
///
/// # Errors
/// Fails if a matched play's timestamp cannot be placed on the calendar.
pub fn join_plays(
    plays: &Dataset<LogEvent>,
    index: &ArtistIndex<'_>,
    calendar: &Calendar,
) -> EtlResult<Dataset<Play>> {
    plays.try_flat_map(|event| -> EtlResult<Vec<Play>> {
        let songs = index.matches(event.artist.as_deref());
        if songs.is_empty() {
            return Ok(Vec::new());
        }
        let parts = calendar.decompose(event.ts)?;
        Ok(songs
            .iter()
            .map(|song| Play::new(event, song, parts))
            .collect())
    })
}

/// Give every play a surrogate key built from its partition index and its
/// position in that partition.
///
/// # Errors
/// Fails if a partition index or position does not fit the key layout.
pub fn assign_ids(plays: Dataset<Play>) -> EtlResult<Dataset<Songplay>> {
    plays.try_map_partitions_with_index(|index, partition| -> EtlResult<Vec<Songplay>> {
        let partition_index = u32::try_from(index).unwrap_or(u32::MAX);
        partition
            .into_iter()
            .enumerate()
            .map(|(sequence, play)| {
                let songplay_id = SongplayId::from_parts(
                    partition_index,
                    u64::try_from(sequence).unwrap_or(u64::MAX),
                )?;
                Ok::<_, EtlError>(Songplay { songplay_id, play })
            })
            .collect()
    })
}

/// Build the songplays fact from raw log events and raw song records.
///
/// # Errors
/// Fails if a timestamp cannot be decomposed or a key cannot be assigned.
pub fn build_songplays(
    events: Dataset<LogEvent>,
    songs: &Dataset<SongRecord>,
    calendar: &Calendar,
) -> EtlResult<Dataset<Songplay>> {
    let plays = filter_plays(events);
    let index = ArtistIndex::new(songs.iter());

    let misses = plays
        .iter()
        .filter(|event| index.matches(event.artist.as_deref()).is_empty())
        .count();
    if misses > 0 {
        log::debug!(
            "{} of {} plays matched no song record",
            misses,
            plays.len()
        );
    }

    let joined = join_plays(&plays, &index, calendar)?.distinct();
    assign_ids(joined)
}

/// The songplays stage: join usage logs to song metadata and write
/// `songplays_table`.
#[derive(Debug)]
pub struct SongplaysStage {
    settings: RunSettings,
}

impl SongplaysStage {
    #[must_use]
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Run the stage synchronously.
    ///
    /// # Errors
    /// Fails if either source cannot be read or the table cannot be written.
    pub fn run(&self) -> EtlResult<Vec<WriteSummary>> {
        let events = self
            .settings
            .log_source()
            .read::<LogEvent>(self.settings.malformed)?;
        let songs = self
            .settings
            .song_source()
            .read::<SongRecord>(self.settings.malformed)?;

        let songplays = build_songplays(events, &songs, &self.settings.calendar)?;
        let writer = self.settings.writer();
        Ok(vec![writer.write(songplays.iter())?])
    }
}

#[async_trait::async_trait]
impl Stage for SongplaysStage {
    fn name(&self) -> &str {
        "songplays"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Starting songplays stage");

        let summaries = self.run().map_err(|e| stage_failure(self.name(), &e))?;
        record_summaries(ctx, &summaries);

        log::info!("Songplays stage complete");
        Ok(StageOutcome::Complete)
    }
}
