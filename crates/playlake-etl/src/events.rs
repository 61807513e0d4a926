//! Usage-log stage: the users and time dimensions.
//!
//! Only `NextSong` events are plays; every other page view is discarded
//! before any table is derived.

use treadle::{Stage, StageContext, StageOutcome};

use playlake_core::model::{LogEvent, TimeRow, User};
use playlake_core::Calendar;

use crate::dataset::Dataset;
use crate::error::{EtlError, EtlResult};
use crate::stage::{record_summaries, stage_failure, RunSettings};
use crate::writer::WriteSummary;

/// Users and time rows derived from one set of log events.
#[derive(Debug, Default)]
pub struct EventTables {
    pub users: Dataset<User>,
    pub time: Dataset<TimeRow>,
}

/// Keep only song-play events.
pub fn filter_plays(events: Dataset<LogEvent>) -> Dataset<LogEvent> {
    events.filter(LogEvent::is_play)
}

/// Distinct user tuples among plays.
pub fn extract_users(plays: &Dataset<LogEvent>) -> Dataset<User> {
    plays.map(|event| User::from(event)).distinct()
}

/// One time row per distinct play timestamp.
///
/// # Errors
/// Fails if a timestamp cannot be placed on the calendar.
pub fn extract_time(plays: &Dataset<LogEvent>, calendar: &Calendar) -> EtlResult<Dataset<TimeRow>> {
    plays
        .map(|event| event.ts)
        .distinct()
        .try_map_partitions_with_index(|_, timestamps| -> EtlResult<Vec<TimeRow>> {
            timestamps
                .into_iter()
                .map(|ts| Ok::<_, EtlError>(TimeRow::new(ts, calendar.decompose(ts)?)))
                .collect()
        })
}

/// Filter raw events to plays and derive both dimensions.
///
/// # Errors
/// Fails if a play timestamp cannot be placed on the calendar.
pub fn extract_events(events: Dataset<LogEvent>, calendar: &Calendar) -> EtlResult<EventTables> {
    let plays = filter_plays(events);
    Ok(EventTables {
        users: extract_users(&plays),
        time: extract_time(&plays, calendar)?,
    })
}

/// The logs stage: read usage logs, write `user_table` and `time_table`.
#[derive(Debug)]
pub struct EventStage {
    settings: RunSettings,
}

impl EventStage {
    #[must_use]
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Run the stage synchronously.
    ///
    /// # Errors
    /// Fails if the log source cannot be read or a table cannot be written.
    pub fn run(&self) -> EtlResult<Vec<WriteSummary>> {
        let source = self.settings.log_source();
        let events = source.read::<LogEvent>(self.settings.malformed)?;
        log::info!(
            "Read {} log events from {} files under {}",
            events.len(),
            events.num_partitions(),
            source.root().display()
        );

        let tables = extract_events(events, &self.settings.calendar)?;
        let writer = self.settings.writer();
        Ok(vec![
            writer.write(tables.users.iter())?,
            writer.write(tables.time.iter())?,
        ])
    }
}

#[async_trait::async_trait]
impl Stage for EventStage {
    fn name(&self) -> &str {
        "logs"
    }

    async fn execute(
        &self,
        _item: &dyn treadle::WorkItem,
        ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Starting usage log stage");

        let summaries = self.run().map_err(|e| stage_failure(self.name(), &e))?;
        record_summaries(ctx, &summaries);

        log::info!("Usage log stage complete");
        Ok(StageOutcome::Complete)
    }
}
