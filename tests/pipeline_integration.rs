//! End-to-end tests: JSON trees in, partitioned Parquet out

use arrow::array::{Array, AsArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{Int64Type, TimestampSecondType};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use songplay_etl::config::InputConfig;
use songplay_etl::{EtlConfig, EtlJob, JobScope};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const SCENARIO_TS: i64 = 1_542_242_400_000;

// ============================================================================
// Fixtures
// ============================================================================

fn song(song_id: &str, artist_id: &str, artist: &str, title: &str, duration: f64, year: i64) -> Value {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": 42.33,
        "artist_longitude": -83.05,
        "artist_location": "Detroit, MI",
        "artist_name": artist,
        "song_id": song_id,
        "title": title,
        "duration": duration,
        "year": year
    })
}

fn log_event(page: &str, user_id: &str, level: &str, artist: Value, song: Value, length: Value, ts: i64) -> Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Jacob",
        "gender": "M",
        "itemInSession": 3,
        "lastName": "Klein",
        "length": length,
        "level": level,
        "location": "Tampa-St. Petersburg-Clearwater, FL",
        "method": "PUT",
        "page": page,
        "registration": 1_540_558_108_796.0,
        "sessionId": 518,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0 (Macintosh)",
        "userId": user_id
    })
}

fn write_json(root: &Path, relative: &str, records: &[Value]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body: Vec<String> = records.iter().map(Value::to_string).collect();
    fs::write(path, body.join("\n")).unwrap();
}

/// Input tree in the layout of the public dataset: nested catalog files,
/// one newline-delimited event file per day
fn sample_input() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();

    let eminem = song("SOABC123", "ARXYZ456", "Eminem", "Lose Yourself", 326.43, 2002);
    write_json(root, "song_data/A/B/C/TRABC001.json", &[eminem.clone()]);
    // Exact duplicate in another shard
    write_json(root, "song_data/A/B/D/TRABD001.json", &[eminem]);
    write_json(
        root,
        "song_data/A/C/TRACX001.json",
        &[song("SOHELLO1", "ARADELE1", "Adele", "Hello", 295.5, 2015)],
    );
    write_json(
        root,
        "song_data/B/TRBUNK01.json",
        &[song("SOUNK001", "ARUNK001", "Unknown", "Untitled", 100.0, 0)],
    );
    // Bookkeeping files are ignored
    write_json(root, "song_data/_tmp/ignored.json", &[json!({"song_id": "BAD"})]);
    write_json(root, "song_data/.hidden.json", &[json!({"song_id": "BAD"})]);

    let play = |user: &str, level: &str, artist: &str, title: &str, length: f64, ts: i64| {
        log_event("NextSong", user, level, json!(artist), json!(title), json!(length), ts)
    };
    write_json(
        root,
        "log_data/2018/11/2018-11-15-events.json",
        &[
            play("10", "free", "Eminem", "Lose Yourself", 326.43, SCENARIO_TS),
            // Duplicate event line
            play("10", "free", "Eminem", "Lose Yourself", 326.43, SCENARIO_TS),
            play("10", "free", "Coldplay", "Yellow", 266.0, SCENARIO_TS + 60_000),
            log_event("Home", "10", "free", Value::Null, Value::Null, Value::Null, SCENARIO_TS + 1),
            log_event("Login", "77", "paid", Value::Null, Value::Null, Value::Null, SCENARIO_TS + 2),
        ],
    );
    write_json(
        root,
        "log_data/2018/12/2018-12-01-events.json",
        &[play("26", "paid", "Adele", "Hello", 295.5, 1_543_622_400_000)],
    );

    dir
}

fn config_for(input: &Path, output: &Path) -> EtlConfig {
    EtlConfig {
        input: InputConfig {
            root: Some(input.to_string_lossy().to_string()),
            ..InputConfig::default()
        },
        output: Some(output.to_string_lossy().to_string()),
        ..EtlConfig::default()
    }
}

fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "parquet") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn read_file(path: &Path) -> RecordBatch {
    let file = fs::File::open(path).unwrap();
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
    let schema = builder.schema().clone();
    let batches: Vec<RecordBatch> = builder.build().unwrap().map(|b| b.unwrap()).collect();
    concat_batches(&schema, &batches).unwrap()
}

/// Partition directories of a table, relative to the table directory
fn partitions(table_dir: &Path) -> BTreeSet<String> {
    parquet_files(table_dir)
        .iter()
        .filter_map(|file| {
            let relative = file.parent()?.strip_prefix(table_dir).ok()?;
            Some(relative.to_string_lossy().to_string())
        })
        .filter(|p| !p.is_empty())
        .collect()
}

fn row_count(table_dir: &Path) -> usize {
    parquet_files(table_dir).iter().map(|f| read_file(f).num_rows()).sum()
}

fn string_values(batch: &RecordBatch, column: &str) -> Vec<Option<String>> {
    batch
        .column_by_name(column)
        .unwrap()
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

async fn run(input: &Path, output: &Path, scope: JobScope) -> songplay_etl::JobReport {
    EtlJob::new(&config_for(input, output))
        .unwrap()
        .run(scope)
        .await
        .unwrap()
}

// ============================================================================
// Full Job
// ============================================================================

#[tokio::test]
async fn test_full_run_writes_all_tables() {
    let input = sample_input();
    let output = tempdir().unwrap();
    let report = run(input.path(), output.path(), JobScope::All).await;

    let names: Vec<&str> = report.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(names, vec!["songs", "artists", "users", "time", "songplays"]);

    for table in &names {
        assert!(
            output.path().join(table).join("_SUCCESS").exists(),
            "{table} has no success marker"
        );
    }

    assert_eq!(report.table("songs").unwrap().rows, 3);
    assert_eq!(report.table("artists").unwrap().rows, 3);
    // User 10 and user 26; user 77 only logged in
    assert_eq!(report.table("users").unwrap().rows, 2);
    assert_eq!(report.table("time").unwrap().rows, 3);
    assert_eq!(report.table("songplays").unwrap().rows, 3);
}

#[tokio::test]
async fn test_songs_deduplicated_and_partitioned() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::Catalog).await;

    let songs_dir = output.path().join("songs");
    assert_eq!(
        partitions(&songs_dir),
        BTreeSet::from([
            "year=0/artist_id=ARUNK001".to_string(),
            "year=2002/artist_id=ARXYZ456".to_string(),
            "year=2015/artist_id=ARADELE1".to_string(),
        ])
    );

    let batch = read_file(&songs_dir.join("year=2002/artist_id=ARXYZ456/part-00000.parquet"));
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(string_values(&batch, "song_id"), vec![Some("SOABC123".to_string())]);
    // Partition columns live in the directory names only
    assert!(batch.column_by_name("year").is_none());
    assert!(batch.column_by_name("artist_id").is_none());

    // Catalog-only run leaves event tables alone
    assert!(!output.path().join("songplays").exists());
}

#[tokio::test]
async fn test_artists_unpartitioned_with_renamed_columns() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::Catalog).await;

    let batch = read_file(&output.path().join("artists/part-00000.parquet"));
    let names: Vec<String> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, vec!["artist_id", "latitude", "longitude", "location", "name"]);
    assert_eq!(batch.num_rows(), 3);
}

#[tokio::test]
async fn test_songplays_resolved_against_catalog() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::All).await;

    let songplays_dir = output.path().join("songplays");
    assert_eq!(
        partitions(&songplays_dir),
        BTreeSet::from(["year=2018/month=11".to_string(), "year=2018/month=12".to_string()])
    );

    let november = read_file(&songplays_dir.join("year=2018/month=11/part-00000.parquet"));
    assert_eq!(november.num_rows(), 2);
    assert_eq!(
        string_values(&november, "song_id"),
        vec![Some("SOABC123".to_string()), None]
    );
    assert_eq!(
        string_values(&november, "artist_id"),
        vec![Some("ARXYZ456".to_string()), None]
    );
    assert_eq!(
        string_values(&november, "level"),
        vec![Some("free".to_string()), Some("free".to_string())]
    );
    let start = november
        .column_by_name("start_time")
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(start.value(0), SCENARIO_TS);
    let users = november
        .column_by_name("user_id")
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(users.value(0), 10);
    // Unmatched play keeps every other field
    assert!(!november.column_by_name("user_agent").unwrap().is_null(1));
    assert!(!november.column_by_name("session_id").unwrap().is_null(1));

    let december = read_file(&songplays_dir.join("year=2018/month=12/part-00000.parquet"));
    assert_eq!(
        string_values(&december, "song_id"),
        vec![Some("SOHELLO1".to_string())]
    );
}

#[tokio::test]
async fn test_time_table_from_playback_events_only() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::All).await;

    let time_dir = output.path().join("time");
    let november = read_file(&time_dir.join("year=2018/month=11/part-00000.parquet"));
    // Two distinct playback instants; the Home event one millisecond later is not one of them
    assert_eq!(november.num_rows(), 2);

    let start = november
        .column_by_name("start_time")
        .unwrap()
        .as_primitive::<TimestampSecondType>();
    assert_eq!(start.value(0), 1_542_242_400);
    assert_eq!(string_values(&november, "weekday")[0].as_deref(), Some("Thu"));
    let week = november.column_by_name("week").unwrap();
    assert_eq!(
        week.as_primitive::<arrow::datatypes::Int32Type>().value(0),
        46
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let input = sample_input();
    let output = tempdir().unwrap();

    let first = run(input.path(), output.path(), JobScope::All).await;
    let first_files: Vec<(PathBuf, RecordBatch)> = parquet_files(output.path())
        .into_iter()
        .map(|f| {
            let batch = read_file(&f);
            (f, batch)
        })
        .collect();

    let second = run(input.path(), output.path(), JobScope::All).await;
    let second_files: Vec<(PathBuf, RecordBatch)> = parquet_files(output.path())
        .into_iter()
        .map(|f| {
            let batch = read_file(&f);
            (f, batch)
        })
        .collect();

    assert_eq!(first.tables, second.tables);
    assert_eq!(first_files, second_files);
}

#[tokio::test]
async fn test_rerun_replaces_stale_partitions() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::Catalog).await;

    // Shrink the catalog to a single song and rerun
    fs::remove_dir_all(input.path().join("song_data")).unwrap();
    write_json(
        input.path(),
        "song_data/X/TRX.json",
        &[song("SONEW001", "ARNEW001", "New", "Fresh", 200.0, 2020)],
    );
    run(input.path(), output.path(), JobScope::Catalog).await;

    assert_eq!(
        partitions(&output.path().join("songs")),
        BTreeSet::from(["year=2020/artist_id=ARNEW001".to_string()])
    );
    assert_eq!(row_count(&output.path().join("artists")), 1);
}

#[tokio::test]
async fn test_partition_completeness() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::All).await;

    // Every (year, month) of a playback event has a songplays and a time partition
    let songplays = partitions(&output.path().join("songplays"));
    let time = partitions(&output.path().join("time"));
    assert_eq!(songplays, time);
}

#[tokio::test]
async fn test_missing_log_data_aborts_before_writing() {
    let input = sample_input();
    fs::remove_dir_all(input.path().join("log_data")).unwrap();
    let output = tempdir().unwrap();

    let err = EtlJob::new(&config_for(input.path(), output.path()))
        .unwrap()
        .run(JobScope::All)
        .await
        .unwrap_err();
    assert!(err.is_input_error());
    assert!(!output.path().join("songs").exists());
}

#[tokio::test]
async fn test_empty_log_data_aborts_before_writing() {
    let input = sample_input();
    fs::remove_dir_all(input.path().join("log_data")).unwrap();
    fs::create_dir_all(input.path().join("log_data/2018/11")).unwrap();
    let output = tempdir().unwrap();

    let err = EtlJob::new(&config_for(input.path(), output.path()))
        .unwrap()
        .run(JobScope::All)
        .await
        .unwrap_err();
    assert!(err.is_input_error());
    assert!(!output.path().join("songs").exists());
    assert!(!output.path().join("artists").exists());
}

#[tokio::test]
async fn test_malformed_log_file_aborts_before_writing() {
    let input = sample_input();
    fs::write(input.path().join("log_data/2018/11/broken.json"), "{not json").unwrap();
    let output = tempdir().unwrap();

    let err = EtlJob::new(&config_for(input.path(), output.path()))
        .unwrap()
        .run(JobScope::All)
        .await
        .unwrap_err();
    assert!(err.is_input_error());
    let message = err.to_string();
    assert!(message.contains("log_data/2018/11/broken.json"), "{message}");
    assert!(!output.path().join("songs").exists());
}

#[tokio::test]
async fn test_failed_rerun_keeps_previous_output() {
    let input = sample_input();
    let output = tempdir().unwrap();
    run(input.path(), output.path(), JobScope::All).await;
    let songs_before = parquet_files(&output.path().join("songs"));

    fs::write(input.path().join("log_data/2018/11/broken.json"), "[1, 2").unwrap();
    let result = EtlJob::new(&config_for(input.path(), output.path()))
        .unwrap()
        .run(JobScope::All)
        .await;
    assert!(result.is_err());

    assert_eq!(parquet_files(&output.path().join("songs")), songs_before);
    assert_eq!(row_count(&output.path().join("songs")), 3);
    assert!(output.path().join("songplays/_SUCCESS").exists());
}

#[tokio::test]
async fn test_empty_playback_set_writes_empty_tables() {
    let input = tempdir().unwrap();
    write_json(
        input.path(),
        "song_data/TR1.json",
        &[song("S1", "AR1", "Eminem", "Lose Yourself", 326.43, 2002)],
    );
    write_json(
        input.path(),
        "log_data/events.json",
        &[log_event("Home", "10", "free", Value::Null, Value::Null, Value::Null, SCENARIO_TS)],
    );
    let output = tempdir().unwrap();
    let report = run(input.path(), output.path(), JobScope::Events).await;

    assert_eq!(report.table("users").unwrap().rows, 0);
    assert_eq!(report.table("songplays").unwrap().files, 0);
    assert!(output.path().join("songplays/_SUCCESS").exists());
    let users = read_file(&output.path().join("users/part-00000.parquet"));
    assert_eq!(users.num_rows(), 0);
    assert_eq!(users.num_columns(), 5);
}
