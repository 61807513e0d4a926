//! Partitioned Parquet output with full-overwrite semantics.
//!
//! Layout of one table:
//!
//! ```text
//! <output>/<table>/year=2018/month=11/part-00000.parquet
//! <output>/<table>/_SUCCESS
//! ```
//!
//! Partition columns are encoded in the directory names and left out of the
//! data files. A table is first written to a hidden staging directory next
//! to it and only swapped in once every file is complete, so a failed write
//! leaves the previous contents of that table in place.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{EtlError, EtlResult};

/// Directory name used for a null or empty partition value.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Marker file written once a table is complete.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

const PART_FILE: &str = "part-00000.parquet";

/// Bytes escaped in partition directory names, on top of every non-ASCII
/// byte.
const PARTITION_UNSAFE: &AsciiSet = &CONTROLS
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'*')
    .add(b'/')
    .add(b':')
    .add(b'=')
    .add(b'?')
    .add(b'\\')
    .add(b'{')
    .add(b'[')
    .add(b']')
    .add(b'^');

/// A row type that can be written as an output table.
pub trait Tabular: Sized {
    /// Name of the table directory under the output root.
    const TABLE: &'static str;

    /// Partition columns, outermost directory level first.
    const PARTITION_BY: &'static [&'static str];

    /// Schema of the full table, partition columns included.
    fn schema() -> SchemaRef;

    /// Values of the [`Self::PARTITION_BY`] columns for this row, in order.
    fn partition_values(&self) -> Vec<Option<String>>;

    /// Build a batch with every column of [`Self::schema`].
    fn to_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError>;
}

/// Result of writing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: &'static str,
    pub rows: usize,
    pub partitions: usize,
}

/// Writes tables under one output root.
#[derive(Debug, Clone)]
pub struct TableWriter {
    output_dir: PathBuf,
}

impl TableWriter {
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.output_dir.join(table)
    }

    /// Replace the table of `T` with `rows`.
    ///
    /// # Errors
    /// Returns [`EtlError::WriteFailure`] if any part of the table cannot be
    /// written or published.
    pub fn write<'a, T, I>(&self, rows: I) -> EtlResult<WriteSummary>
    where
        T: Tabular + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.write_table(rows).map_err(|e| EtlError::WriteFailure {
            table: T::TABLE.to_string(),
            message: e.to_string(),
        })
    }

    fn write_table<'a, T, I>(&self, rows: I) -> EtlResult<WriteSummary>
    where
        T: Tabular + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut groups: BTreeMap<Vec<Option<String>>, Vec<&T>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.partition_values()).or_default().push(row);
        }
        if T::PARTITION_BY.is_empty() && groups.is_empty() {
            groups.insert(Vec::new(), Vec::new());
        }

        let table_dir = self.table_dir(T::TABLE);
        let staging = self
            .output_dir
            .join(format!(".{}.staging-{}", T::TABLE, Uuid::new_v4()));
        let retired = self
            .output_dir
            .join(format!(".{}.old-{}", T::TABLE, Uuid::new_v4()));

        let published = fs::create_dir_all(&staging)
            .map_err(EtlError::from)
            .and_then(|()| write_groups::<T>(&staging, &groups))
            .and_then(|()| publish(&staging, &table_dir, &retired));
        if let Err(e) = published {
            discard(&staging);
            return Err(e);
        }

        let summary = WriteSummary {
            table: T::TABLE,
            rows: groups.values().map(Vec::len).sum(),
            partitions: if T::PARTITION_BY.is_empty() {
                0
            } else {
                groups.len()
            },
        };
        log::info!(
            "Wrote {} rows to {} ({} partitions)",
            summary.rows,
            table_dir.display(),
            summary.partitions
        );
        Ok(summary)
    }
}

/// Swap `staging` in as `table_dir`.
///
/// A previous table is moved to `retired` first and only deleted once the
/// new one is in place; if the swap fails it is moved back.
fn publish(staging: &Path, table_dir: &Path, retired: &Path) -> EtlResult<()> {
    let had_previous = table_dir.exists();
    if had_previous {
        fs::rename(table_dir, retired)?;
    }

    if let Err(e) = fs::rename(staging, table_dir) {
        if had_previous {
            if let Err(restore) = fs::rename(retired, table_dir) {
                log::warn!(
                    "Failed to restore {} from {}: {}",
                    table_dir.display(),
                    retired.display(),
                    restore
                );
            }
        }
        return Err(e.into());
    }

    if had_previous {
        discard(retired);
    }
    Ok(())
}

/// Remove a scratch directory, logging rather than failing.
fn discard(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(dir) {
        log::warn!("Failed to remove {}: {}", dir.display(), e);
    }
}

fn write_groups<T: Tabular>(
    staging: &Path,
    groups: &BTreeMap<Vec<Option<String>>, Vec<&T>>,
) -> EtlResult<()> {
    let schema = T::schema();
    let data_columns: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| !T::PARTITION_BY.contains(&field.name().as_str()))
        .map(|(index, _)| index)
        .collect();

    for (values, rows) in groups {
        let dir = staging.join(partition_path(T::PARTITION_BY, values));
        fs::create_dir_all(&dir)?;
        let batch = T::to_batch(rows)?.project(&data_columns)?;
        write_parquet(&dir.join(PART_FILE), &batch)?;
    }

    File::create(staging.join(SUCCESS_MARKER))?;
    Ok(())
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> EtlResult<()> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Relative directory for one partition, e.g. `year=2018/month=11`.
pub fn partition_path(columns: &[&str], values: &[Option<String>]) -> PathBuf {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| {
            let value = match value.as_deref() {
                None | Some("") => DEFAULT_PARTITION.to_string(),
                Some(v) => escape_partition_value(v),
            };
            format!("{column}={value}")
        })
        .collect()
}

/// Percent-encode characters that are unsafe in a partition directory name.
pub fn escape_partition_value(value: &str) -> String {
    utf8_percent_encode(value, PARTITION_UNSAFE).to_string()
}

/// On-disk state of one output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub table: String,
    pub complete: bool,
    pub partitions: usize,
    pub files: usize,
}

/// Inspect a table directory under `output_dir`.
///
/// Returns `Ok(None)` when the table has never been written.
///
/// # Errors
/// Returns an error if the table directory cannot be walked.
pub fn table_status(output_dir: &Path, table: &str) -> EtlResult<Option<TableStatus>> {
    let table_dir = output_dir.join(table);
    if !table_dir.is_dir() {
        return Ok(None);
    }

    let mut files = 0;
    let mut partitions = 0;
    for entry in WalkDir::new(&table_dir) {
        let entry = entry.map_err(|e| EtlError::Io(e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            files += 1;
            if path.parent() != Some(table_dir.as_path()) {
                partitions += 1;
            }
        }
    }

    Ok(Some(TableStatus {
        table: table.to_string(),
        complete: table_dir.join(SUCCESS_MARKER).is_file(),
        partitions,
        files,
    }))
}
