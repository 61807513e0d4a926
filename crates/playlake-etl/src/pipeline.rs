use treadle::Workflow;

use crate::{Config, EventStage, MetadataStage, RunSettings, SongplaysStage};

/// Build the songs + logs + songplays workflow.
///
/// The two dimension stages are independent; the fact stage waits for both.
///
/// # Errors
/// Returns an error if the configured offset is invalid or the workflow
/// cannot be built.
pub fn build_pipeline(config: &Config) -> treadle::Result<Workflow> {
    let settings = RunSettings::from_config(config).map_err(|e| {
        treadle::TreadleError::InvalidWorkflow(format!("Failed to configure stages: {e}"))
    })?;
    build_pipeline_with(&settings)
}

/// Build the workflow for already resolved run settings.
///
/// # Errors
/// Returns an error if the workflow cannot be built.
pub fn build_pipeline_with(settings: &RunSettings) -> treadle::Result<Workflow> {
    Workflow::builder()
        .stage("songs", MetadataStage::new(settings.clone()))
        .stage("logs", EventStage::new(settings.clone()))
        .stage("songplays", SongplaysStage::new(settings.clone()))
        .dependency("songplays", "songs")
        .dependency("songplays", "logs")
        .build()
}
