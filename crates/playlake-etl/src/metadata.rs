//! Song metadata stage: the songs and artists dimensions.

use treadle::{Stage, StageContext, StageOutcome};

use playlake_core::model::{Artist, Song, SongRecord};

use crate::dataset::Dataset;
use crate::error::EtlResult;
use crate::stage::{record_summaries, stage_failure, RunSettings};
use crate::writer::WriteSummary;

/// Songs and artists derived from one set of song records.
#[derive(Debug, Default)]
pub struct MetadataTables {
    pub songs: Dataset<Song>,
    pub artists: Dataset<Artist>,
}

/// Project song records into the two deduplicated dimensions.
pub fn extract_metadata(records: &Dataset<SongRecord>) -> MetadataTables {
    MetadataTables {
        songs: records.map(|record| Song::from(record)).distinct(),
        artists: records.map(|record| Artist::from(record)).distinct(),
    }
}

/// The songs stage: read song metadata, write `song_table` and
/// `artists_table`.
#[derive(Debug)]
pub struct MetadataStage {
    settings: RunSettings,
}

impl MetadataStage {
    #[must_use]
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Run the stage synchronously.
    ///
    /// # Errors
    /// Fails if the song source cannot be read or a table cannot be written.
    pub fn run(&self) -> EtlResult<Vec<WriteSummary>> {
        let source = self.settings.song_source();
        let records = source.read::<SongRecord>(self.settings.malformed)?;
        log::info!(
            "Read {} song records from {} files under {}",
            records.len(),
            records.num_partitions(),
            source.root().display()
        );

        let tables = extract_metadata(&records);
        let writer = self.settings.writer();
        Ok(vec![
            writer.write(tables.songs.iter())?,
            writer.write(tables.artists.iter())?,
        ])
    }
}

#[async_trait::async_trait]
impl Stage for MetadataStage {
    fn name(&self) -> &str {
        "songs"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Starting song metadata stage");

        let summaries = self.run().map_err(|e| stage_failure(self.name(), &e))?;
        record_summaries(ctx, &summaries);

        log::info!("Song metadata stage complete");
        Ok(StageOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlake_core::model::{ArtistId, SongId};

    fn record(song: &str, artist: &str, name: &str) -> SongRecord {
        SongRecord {
            song_id: SongId::from(song),
            artist_id: ArtistId::from(artist),
            title: format!("title of {song}"),
            year: 2000,
            duration: 200.0,
            artist_name: name.to_string(),
            artist_location: Some("Memphis, TN".to_string()),
            artist_latitude: Some(35.14968),
            artist_longitude: Some(-90.04892),
        }
    }

    #[test]
    fn test_extract_metadata_dedups_across_partitions() {
        let records = Dataset::from_partitions(vec![
            vec![record("S1", "A1", "Foo"), record("S2", "A1", "Foo")],
            vec![record("S1", "A1", "Foo")],
        ]);
        let tables = extract_metadata(&records);
        assert_eq!(tables.songs.len(), 2);
        assert_eq!(tables.artists.len(), 1);
    }

    #[test]
    fn test_artist_variants_are_kept() {
        let mut moved = record("S3", "A1", "Foo");
        moved.artist_location = None;
        let records = Dataset::from_rows(vec![record("S1", "A1", "Foo"), moved]);
        let tables = extract_metadata(&records);
        assert_eq!(tables.artists.len(), 2);
    }

    #[test]
    fn test_extract_metadata_is_idempotent() {
        let records = Dataset::from_rows(vec![
            record("S1", "A1", "Foo"),
            record("S1", "A1", "Foo"),
            record("S2", "A2", "Bar"),
        ]);
        let once = extract_metadata(&records);
        let twice = once.songs.clone().distinct();
        assert_eq!(once.songs, twice);
    }

    #[test]
    fn test_extract_metadata_empty() {
        let tables = extract_metadata(&Dataset::default());
        assert!(tables.songs.is_empty());
        assert!(tables.artists.is_empty());
    }

    #[test]
    fn test_metadata_stage_name() {
        let stage = MetadataStage::new(RunSettings::new("/in".into(), "/out".into()));
        assert_eq!(stage.name(), "songs");
    }
}
