use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use treadle::WorkItem;

/// One execution of the ETL over an input directory.
///
/// This is the treadle `WorkItem` that flows through the songs, logs and
/// songplays stages. Every run gets a fresh id so that no stage is skipped
/// as already complete from an earlier run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlRun {
    id: String,
    pub input_dir: PathBuf,
}

impl EtlRun {
    #[must_use]
    pub fn new(input_dir: PathBuf) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), input_dir)
    }

    #[must_use]
    pub fn with_id(id: impl Into<String>, input_dir: PathBuf) -> Self {
        Self {
            id: id.into(),
            input_dir,
        }
    }
}

impl WorkItem for EtlRun {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EtlRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} of {}", self.id, self.input_dir.display())
    }
}
