//! Integration tests for the songs → logs → songplays pipeline.
//!
//! Each test lays out a small input directory in the same shape as the
//! production data and reads the written Parquet tables back.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::array::AsArray;
use arrow::record_batch::RecordBatch;
use arrow::datatypes::{Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use playlake_etl::tables::{
    ARTISTS_TABLE, SONGPLAYS_TABLE, SONG_TABLE, TIME_TABLE, USER_TABLE,
};
use playlake_etl::{
    build_pipeline_with, table_status, EtlError, EtlRun, EventStage, MalformedPolicy,
    MetadataStage, RunSettings, SongplaysStage,
};
use tempfile::TempDir;

const SONG_S1: &str = r#"{"num_songs": 1, "artist_id": "A1", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Foo", "song_id": "S1", "title": "X", "duration": 200.0, "year": 2000}"#;
const SONG_S2: &str = r#"{"num_songs": 1, "artist_id": "A2", "artist_latitude": 35.14968, "artist_longitude": -90.04892, "artist_location": "Memphis, TN", "artist_name": "Baz", "song_id": "S2", "title": "Y", "duration": 180.5, "year": 1999}"#;

const PLAY_FOO: &str = r#"{"artist":"Foo","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":0,"lastName":"Koch","length":200.0,"level":"paid","location":"Chicago-Naperville-Elgin, IL-IN-WI","method":"PUT","page":"NextSong","registration":1541048010796.0,"sessionId":139,"song":"X","status":200,"ts":1541470364796,"userAgent":"Mozilla\/5.0","userId":"9"}"#;
const PLAY_BAR: &str = r#"{"artist":"Bar","auth":"Logged In","firstName":"Lily","gender":"F","itemInSession":1,"lastName":"Koch","length":100.0,"level":"paid","location":"Chicago-Naperville-Elgin, IL-IN-WI","method":"PUT","page":"NextSong","registration":1541048010796.0,"sessionId":139,"song":"Z","status":200,"ts":1541470564796,"userAgent":"Mozilla\/5.0","userId":"9"}"#;
const HOME: &str = r#"{"artist":null,"auth":"Logged In","firstName":"Ryan","gender":"M","itemInSession":2,"lastName":"Smith","length":null,"level":"free","location":"San Jose-Sunnyvale-Santa Clara, CA","method":"GET","page":"Home","registration":1541016707796.0,"sessionId":583,"song":null,"status":200,"ts":1541470600000,"userAgent":"Mozilla\/5.0","userId":"26"}"#;

fn write_lines(path: &Path, lines: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, lines.join("\n")).unwrap();
}

fn song_file(input: &Path, name: &str) -> PathBuf {
    input
        .join("song_data")
        .join("A")
        .join("A")
        .join("A")
        .join(format!("{name}.json"))
}

fn log_file(input: &Path, name: &str) -> PathBuf {
    input
        .join("log_data")
        .join("2018")
        .join("11")
        .join(format!("{name}-events.json"))
}

/// Lay out one song file per record and a single log file.
fn layout(input: &Path, songs: &[&str], events: &[&str]) {
    for (i, song) in songs.iter().enumerate() {
        write_lines(&song_file(input, &format!("TRAAA{i}")), &[song]);
    }
    write_lines(&log_file(input, "2018-11-06"), events);
}

fn settings(temp: &TempDir) -> RunSettings {
    RunSettings::new(temp.path().join("input"), temp.path().join("output"))
}

fn run_all(settings: &RunSettings) {
    MetadataStage::new(settings.clone()).run().unwrap();
    EventStage::new(settings.clone()).run().unwrap();
    SongplaysStage::new(settings.clone()).run().unwrap();
}

fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .map(|entry| entry.unwrap().into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    files
}

fn read_batches(file: &Path) -> Vec<RecordBatch> {
    ParquetRecordBatchReaderBuilder::try_new(File::open(file).unwrap())
        .unwrap()
        .build()
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

fn count_rows(table_dir: &Path) -> usize {
    parquet_files(table_dir)
        .iter()
        .flat_map(|file| read_batches(file))
        .map(|batch| batch.num_rows())
        .sum()
}

fn strings(batch: &RecordBatch, column: &str) -> Vec<String> {
    batch
        .column_by_name(column)
        .unwrap()
        .as_string::<i32>()
        .iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_end_to_end_single_play() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(&settings.input_dir, &[SONG_S1], &[PLAY_FOO, HOME]);

    run_all(&settings);

    let table = settings.output_dir.join(SONGPLAYS_TABLE);
    let files = parquet_files(&table);
    assert_eq!(
        files,
        vec![table.join("year=2018").join("month=11").join("part-00000.parquet")]
    );

    let batches = read_batches(&files[0]);
    assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 1);
    let batch = &batches[0];
    assert_eq!(strings(batch, "song_id"), vec!["S1"]);
    assert_eq!(strings(batch, "artist_id"), vec!["A1"]);
    assert_eq!(strings(batch, "userId"), vec!["9"]);
    assert_eq!(strings(batch, "level"), vec!["paid"]);
    assert_eq!(
        batch
            .column_by_name("starttime")
            .unwrap()
            .as_primitive::<Int64Type>()
            .value(0),
        1_541_470_364_796
    );
    assert_eq!(
        batch
            .column_by_name("weekday")
            .unwrap()
            .as_primitive::<Int32Type>()
            .value(0),
        3
    );
    assert!(batch.column_by_name("year").is_none());
    assert!(batch.column_by_name("month").is_none());
}

#[test]
fn test_dimension_tables_written() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(
        &settings.input_dir,
        &[SONG_S1, SONG_S2, SONG_S1],
        &[PLAY_FOO, PLAY_BAR, HOME],
    );

    run_all(&settings);

    let out = &settings.output_dir;
    assert_eq!(count_rows(&out.join(SONG_TABLE)), 2);
    assert_eq!(count_rows(&out.join(ARTISTS_TABLE)), 2);
    // Only user 9 played anything; user 26 only visited Home.
    assert_eq!(count_rows(&out.join(USER_TABLE)), 1);
    assert_eq!(count_rows(&out.join(TIME_TABLE)), 2);

    let users = read_batches(&out.join(USER_TABLE).join("part-00000.parquet"));
    assert_eq!(strings(&users[0], "userId"), vec!["9"]);

    for table in [SONG_TABLE, ARTISTS_TABLE, USER_TABLE, TIME_TABLE, SONGPLAYS_TABLE] {
        let status = table_status(out, table).unwrap().unwrap();
        assert!(status.complete, "{table} has no success marker");
    }
}

#[test]
fn test_rows_land_in_matching_partitions() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(&settings.input_dir, &[SONG_S1, SONG_S2], &[PLAY_FOO]);

    run_all(&settings);

    let songs = settings.output_dir.join(SONG_TABLE);
    let s1 = songs.join("year=2000").join("artist_id=A1").join("part-00000.parquet");
    let s2 = songs.join("year=1999").join("artist_id=A2").join("part-00000.parquet");
    assert_eq!(strings(&read_batches(&s1)[0], "song_id"), vec!["S1"]);
    assert_eq!(strings(&read_batches(&s2)[0], "song_id"), vec!["S2"]);

    let time = settings.output_dir.join(TIME_TABLE);
    assert_eq!(
        parquet_files(&time),
        vec![time.join("year=2018").join("month=11").join("part-00000.parquet")]
    );
}

#[test]
fn test_unmatched_artist_yields_empty_fact() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(&settings.input_dir, &[SONG_S1], &[PLAY_BAR]);

    run_all(&settings);

    let status = table_status(&settings.output_dir, SONGPLAYS_TABLE)
        .unwrap()
        .unwrap();
    assert!(status.complete);
    assert_eq!(status.files, 0);
    assert_eq!(count_rows(&settings.output_dir.join(TIME_TABLE)), 1);
}

#[test]
fn test_second_run_overwrites() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(&settings.input_dir, &[SONG_S1, SONG_S2], &[PLAY_FOO]);
    run_all(&settings);
    assert_eq!(count_rows(&settings.output_dir.join(SONG_TABLE)), 2);

    fs::remove_dir_all(&settings.input_dir).unwrap();
    layout(&settings.input_dir, &[SONG_S2], &[PLAY_FOO]);
    run_all(&settings);

    let songs = settings.output_dir.join(SONG_TABLE);
    assert_eq!(count_rows(&songs), 1);
    assert!(!songs.join("year=2000").exists());
    assert_eq!(count_rows(&settings.output_dir.join(SONGPLAYS_TABLE)), 0);

    let leftovers: Vec<_> = fs::read_dir(&settings.output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

#[test]
fn test_malformed_records_dropped_by_default() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(&settings.input_dir, &[SONG_S1], &[PLAY_FOO, "{not json", r#"{"page":"NextSong"}"#]);

    run_all(&settings);

    assert_eq!(count_rows(&settings.output_dir.join(SONGPLAYS_TABLE)), 1);
}

#[test]
fn test_malformed_records_fail_when_configured() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp).with_malformed_policy(MalformedPolicy::Fail);
    layout(&settings.input_dir, &[SONG_S1], &[PLAY_FOO, "{not json"]);

    let error = EventStage::new(settings.clone()).run().unwrap_err();
    match error {
        EtlError::MalformedRecord { path, line, .. } => {
            assert!(path.ends_with("2018-11-06-events.json"));
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!settings.output_dir.join(USER_TABLE).exists());
}

#[test]
fn test_missing_source_is_unavailable() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    write_lines(&song_file(&settings.input_dir, "TRAAA0"), &[SONG_S1]);

    let error = EventStage::new(settings).run().unwrap_err();
    assert!(matches!(error, EtlError::SourceUnavailable { .. }));
    assert!(error.is_source_error());
}

#[tokio::test]
async fn test_workflow_runs_all_stages() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp);
    layout(&settings.input_dir, &[SONG_S1], &[PLAY_FOO]);

    let workflow = build_pipeline_with(&settings).unwrap();
    let mut store = treadle::SqliteStateStore::open(&temp.path().join("pipeline.db"))
        .await
        .unwrap();
    let run = EtlRun::new(settings.input_dir.clone());

    workflow.advance(&run, &mut store).await.unwrap();

    assert_eq!(count_rows(&settings.output_dir.join(SONG_TABLE)), 1);
    assert_eq!(count_rows(&settings.output_dir.join(USER_TABLE)), 1);
    assert_eq!(count_rows(&settings.output_dir.join(SONGPLAYS_TABLE)), 1);
}
