//! Newline-delimited JSON sources.
//!
//! A source is a directory whose record files sit at a fixed depth below it
//! (`song_data/*/*/*/*.json`, `log_data/*/*/*.json`). Every file becomes one
//! partition of the resulting [`Dataset`], in path order.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::dataset::Dataset;
use crate::error::{EtlError, EtlResult};

/// What to do with a line that does not parse as the declared record type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Skip the line and keep reading.
    #[default]
    Drop,
    /// Abort the read with [`EtlError::MalformedRecord`].
    Fail,
}

impl fmt::Display for MalformedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// A directory of JSON-lines files at a fixed depth.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    root: PathBuf,
    depth: usize,
}

impl JsonLinesSource {
    #[must_use]
    pub fn new(root: PathBuf, depth: usize) -> Self {
        Self { root, depth }
    }

    /// Song metadata under `<input>/song_data`, three directory levels deep.
    #[must_use]
    pub fn song_data(input_dir: &Path) -> Self {
        Self::new(input_dir.join("song_data"), 4)
    }

    /// Usage logs under `<input>/log_data`, two directory levels deep.
    #[must_use]
    pub fn log_data(input_dir: &Path) -> Self {
        Self::new(input_dir.join("log_data"), 3)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_record_file(path: &Path) -> bool {
        let visible = path
            .file_name()
            .map(|name| {
                let name = name.to_string_lossy();
                !name.starts_with('.') && !name.starts_with('_')
            })
            .unwrap_or(false);
        visible && path.extension().is_some_and(|ext| ext == "json")
    }

    /// List the record files of this source, sorted by path.
    ///
    /// # Errors
    /// Returns [`EtlError::SourceUnavailable`] if the root directory is
    /// missing or cannot be walked.
    pub fn files(&self) -> EtlResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(EtlError::SourceUnavailable {
                path: self.root.clone(),
                message: "not a readable directory".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(self.depth)
            .max_depth(self.depth)
            .follow_links(true)
        {
            let entry = entry.map_err(|e| EtlError::SourceUnavailable {
                path: self.root.clone(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if entry.file_type().is_file() && Self::is_record_file(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Read every record file into its own partition.
    ///
    /// An existing source with no record files yields an empty dataset.
    ///
    /// # Errors
    /// Returns [`EtlError::SourceUnavailable`] when the source or one of its
    /// files cannot be read, and [`EtlError::MalformedRecord`] when a line
    /// fails to parse under [`MalformedPolicy::Fail`].
    pub fn read<T>(&self, policy: MalformedPolicy) -> EtlResult<Dataset<T>>
    where
        T: DeserializeOwned + Send,
    {
        let files = self.files()?;
        log::debug!(
            "Reading {} files from {}",
            files.len(),
            self.root.display()
        );

        let partitions = files
            .par_iter()
            .map(|path| read_file(path, policy))
            .collect::<EtlResult<Vec<_>>>()?;
        Ok(Dataset::from_partitions(partitions))
    }
}

fn read_file<T: DeserializeOwned>(path: &Path, policy: MalformedPolicy) -> EtlResult<Vec<T>> {
    let file = File::open(path).map_err(|e| EtlError::SourceUnavailable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_lines(path, BufReader::new(file), policy)
}

/// Parse JSON lines from `reader`, skipping blank lines.
///
/// Lines are read as raw bytes, so a line that is not valid UTF-8 is a
/// malformed record like any other.
///
/// `path` is used for error reporting only.
pub(crate) fn parse_lines<T, R>(path: &Path, reader: R, policy: MalformedPolicy) -> EtlResult<Vec<T>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut records = Vec::new();
    let mut dropped = 0_usize;

    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(|e| EtlError::SourceUnavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        // Invalid UTF-8 surfaces here as a parse error for this line only.
        match serde_json::from_slice::<T>(line) {
            Ok(record) => records.push(record),
            Err(e) => match policy {
                MalformedPolicy::Drop => dropped += 1,
                MalformedPolicy::Fail => {
                    return Err(EtlError::MalformedRecord {
                        path: path.to_path_buf(),
                        line: index + 1,
                        message: e.to_string(),
                    })
                }
            },
        }
    }

    if dropped > 0 {
        log::warn!(
            "Dropped {} malformed records from {}",
            dropped,
            path.display()
        );
    }
    Ok(records)
}
