//! Settings and helpers shared by the pipeline stages.

use std::path::PathBuf;

use treadle::StageContext;

use playlake_core::Calendar;

use crate::config::Config;
use crate::error::{EtlError, EtlResult};
use crate::source::{JsonLinesSource, MalformedPolicy};
use crate::writer::{TableWriter, WriteSummary};

/// Everything a stage needs to know about one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub calendar: Calendar,
    pub malformed: MalformedPolicy,
}

impl RunSettings {
    #[must_use]
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
            calendar: Calendar::utc(),
            malformed: MalformedPolicy::default(),
        }
    }

    /// Settings for the directories and policies in `config`.
    ///
    /// # Errors
    /// Returns an error if the configured UTC offset is invalid.
    pub fn from_config(config: &Config) -> EtlResult<Self> {
        Ok(Self {
            input_dir: config.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            calendar: config.calendar()?,
            malformed: config.malformed_records,
        })
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    #[must_use]
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    #[must_use]
    pub fn song_source(&self) -> JsonLinesSource {
        JsonLinesSource::song_data(&self.input_dir)
    }

    #[must_use]
    pub fn log_source(&self) -> JsonLinesSource {
        JsonLinesSource::log_data(&self.input_dir)
    }

    #[must_use]
    pub fn writer(&self) -> TableWriter {
        TableWriter::new(self.output_dir.clone())
    }
}

/// Wrap a stage failure for treadle.
pub(crate) fn stage_failure(stage: &str, error: &EtlError) -> treadle::TreadleError {
    let kind = if error.is_source_error() {
        "reading input"
    } else {
        "building tables"
    };
    treadle::TreadleError::StageExecution(format!("Stage {stage} failed while {kind}: {error}"))
}

/// Record per-table row counts in the stage context.
pub(crate) fn record_summaries(ctx: &mut StageContext, summaries: &[WriteSummary]) {
    for summary in summaries {
        ctx.metadata.insert(
            format!("{}_rows", summary.table),
            serde_json::json!(summary.rows),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_follow_input_dir() {
        let settings = RunSettings::new(PathBuf::from("/data"), PathBuf::from("/lake"));
        assert_eq!(settings.song_source().root(), PathBuf::from("/data/song_data"));
        assert_eq!(settings.log_source().root(), PathBuf::from("/data/log_data"));
        assert_eq!(settings.writer().output_dir(), PathBuf::from("/lake"));
    }

    #[test]
    fn test_stage_failure_names_the_phase() {
        let error = EtlError::SourceUnavailable {
            path: PathBuf::from("/data/log_data"),
            message: "missing".to_string(),
        };
        let message = stage_failure("logs", &error).to_string();
        assert!(message.contains("logs"));
        assert!(message.contains("reading input"));
    }

    #[test]
    fn test_record_summaries() {
        let mut ctx = StageContext::new("songs".to_string());
        record_summaries(
            &mut ctx,
            &[WriteSummary {
                table: "song_table",
                rows: 3,
                partitions: 2,
            }],
        );
        assert_eq!(ctx.metadata.get("song_table_rows"), Some(&serde_json::json!(3)));
    }
}
