//! ETL stages for playlake.
//!
//! Reads song metadata and usage logs as JSON lines, derives the songs,
//! artists, users and time dimensions and the songplays fact, and writes
//! each as a partitioned Parquet table. The three stages are treadle
//! `Stage` implementations wired together by [`build_pipeline`].

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod events;
pub mod metadata;
pub mod pipeline;
pub mod songplays;
pub mod source;
pub mod stage;
pub mod tables;
pub mod work_item;
pub mod writer;

pub use config::Config;
pub use dataset::Dataset;
pub use error::{EtlError, EtlResult};
pub use events::EventStage;
pub use metadata::MetadataStage;
pub use pipeline::{build_pipeline, build_pipeline_with};
pub use songplays::SongplaysStage;
pub use source::{JsonLinesSource, MalformedPolicy};
pub use stage::RunSettings;
pub use work_item::EtlRun;
pub use writer::{table_status, TableStatus, TableWriter, WriteSummary};
