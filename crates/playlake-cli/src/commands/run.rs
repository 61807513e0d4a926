use anyhow::{Context, Result};
use treadle::{StageStatus, StateStore, WorkItem, WorkflowEvent};

use playlake_etl::{build_pipeline_with, Config, EtlRun, RunSettings};

/// Run the songs, logs and songplays stages once over the configured input.
pub async fn run_pipeline(config: &Config) -> Result<()> {
    println!("\nPlaylake ETL\n");
    println!("  Input:  {}", config.input_dir.display());
    println!("  Output: {}", config.output_dir.display());
    println!();

    let settings = RunSettings::from_config(config).context("Invalid configuration")?;
    let workflow = build_pipeline_with(&settings).context("Failed to build pipeline")?;

    std::fs::create_dir_all(&config.state_dir).context("Failed to create state directory")?;
    let mut store = treadle::SqliteStateStore::open(&config.state_path())
        .await
        .context("Failed to open pipeline state store")?;

    let run = EtlRun::new(config.input_dir.clone());
    log::info!("Starting {run}");

    let mut progress = workflow.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            match event {
                WorkflowEvent::StageStarted { stage, .. } => {
                    println!("  [{stage}] Starting...");
                }
                WorkflowEvent::StageCompleted { stage, .. } => {
                    println!("  ✓ [{stage}] Complete");
                }
                WorkflowEvent::StageFailed { stage, error, .. } => {
                    eprintln!("  ✗ [{stage}] FAILED: {error}");
                }
                _ => {}
            }
        }
    });

    workflow
        .advance(&run, &mut store)
        .await
        .context("Pipeline execution failed")?;

    let failed = failed_stages(&store, run.id()).await?;
    if !failed.is_empty() {
        anyhow::bail!("Pipeline failed in stage(s): {}", failed.join(", "));
    }

    println!("\n✓ All tables written to {}", config.output_dir.display());
    println!("\nRun 'playlake status' to inspect them.");

    Ok(())
}

/// Stages the store records as failed for `item_id`, sorted by name.
///
/// A lagging event subscriber misses events, so failures are read from the
/// store once `advance` returns.
async fn failed_stages<S: StateStore>(store: &S, item_id: &str) -> Result<Vec<String>> {
    let states = store
        .get_all_stage_states(item_id)
        .await
        .context("Failed to read pipeline state")?;
    let mut failed: Vec<String> = states
        .into_iter()
        .filter(|(_, state)| state.status == StageStatus::Failed)
        .map(|(stage, _)| stage)
        .collect();
    failed.sort();
    Ok(failed)
}
