//! Tests for output module

use super::*;
use crate::frame::Frame;
use crate::storage::StorageLocation;
use crate::types::Table;
use arrow::array::{ArrayRef, AsArray, Int32Array, Int64Array, StringArray};
use arrow::datatypes::Int64Type;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn songs() -> Frame {
    let batch = RecordBatch::try_from_iter_with_nullable(vec![
        (
            "song_id",
            Arc::new(StringArray::from(vec![Some("S1"), Some("S2"), Some("S3")])) as ArrayRef,
            true,
        ),
        (
            "title",
            Arc::new(StringArray::from(vec![Some("A"), Some("B"), Some("C")])) as ArrayRef,
            true,
        ),
        (
            "year",
            Arc::new(Int64Array::from(vec![Some(2001), Some(1999), None])) as ArrayRef,
            true,
        ),
        (
            "artist_id",
            Arc::new(StringArray::from(vec![Some("AR1"), Some("AR1"), Some("AR2")])) as ArrayRef,
            true,
        ),
    ])
    .unwrap();
    Frame::new(batch)
}

fn memory_writer() -> (Arc<InMemory>, TableWriter) {
    let store = Arc::new(InMemory::new());
    let root = StorageLocation::from_store(store.clone(), "out", "memory://out");
    (store, TableWriter::new(root, ParquetWriterConfig::default()))
}

async fn object_names(store: &InMemory, prefix: &str) -> Vec<String> {
    use futures::TryStreamExt;
    let prefix = ObjectPath::from(prefix);
    let mut names: Vec<String> = store
        .list(Some(&prefix))
        .map_ok(|meta| meta.location.to_string())
        .try_collect()
        .await
        .unwrap();
    names.sort();
    names
}

async fn read_parquet(store: &InMemory, path: &str) -> RecordBatch {
    let data = store
        .get(&ObjectPath::from(path))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
    let schema = batches[0].schema();
    arrow::compute::concat_batches(&schema, &batches).unwrap()
}

// ============================================================================
// Parquet Encoding Tests
// ============================================================================

#[test]
fn test_parquet_writer_config_default() {
    let config = ParquetWriterConfig::default();
    assert_eq!(config.compression, Compression::SNAPPY);
    assert_eq!(config.max_row_group_size, 1024 * 1024);
}

#[test]
fn test_parquet_writer_config_from_writer_config() {
    let writer = crate::config::WriterConfig {
        compression: crate::types::Compression::Zstd,
        row_group_size: 500,
    };
    let config = ParquetWriterConfig::from(&writer);
    assert!(matches!(config.compression, Compression::ZSTD(_)));
    assert_eq!(config.max_row_group_size, 500);
}

#[test]
fn test_encode_parquet_round_trips_rows() {
    let frame = songs();
    let data = encode_parquet(frame.batch(), &ParquetWriterConfig::default()).unwrap();
    assert_eq!(&data[..4], b"PAR1");

    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .unwrap()
        .build()
        .unwrap();
    let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(rows, 3);
}

#[test]
fn test_encode_parquet_empty_batch_keeps_schema() {
    let frame = songs().filter_eq("song_id", "none").unwrap();
    let data = encode_parquet(frame.batch(), &ParquetWriterConfig::default()).unwrap();

    let builder = ParquetRecordBatchReaderBuilder::try_new(data).unwrap();
    assert_eq!(builder.schema().fields().len(), 4);
    assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
}

#[test]
fn test_parquet_writer_appends_batches() {
    let frame = songs();
    let mut writer = ParquetWriter::new(frame.schema(), &ParquetWriterConfig::default()).unwrap();
    writer.write(frame.batch()).unwrap();
    writer.write(frame.batch()).unwrap();

    let builder = ParquetRecordBatchReaderBuilder::try_new(writer.finish().unwrap()).unwrap();
    assert_eq!(builder.metadata().file_metadata().num_rows(), 6);
}

// ============================================================================
// Partitioning Tests
// ============================================================================

#[test]
fn test_split_partitions_sorted_and_projected() {
    let partitions = split_partitions(&songs(), &["year", "artist_id"]).unwrap();
    let paths: Vec<String> = partitions.iter().map(Partition::path).collect();
    assert_eq!(
        paths,
        vec![
            "year=1999/artist_id=AR1",
            "year=2001/artist_id=AR1",
            "year=__HIVE_DEFAULT_PARTITION__/artist_id=AR2",
        ]
    );
    for partition in &partitions {
        assert_eq!(partition.frame.column_names(), vec!["song_id", "title"]);
        assert_eq!(partition.frame.num_rows(), 1);
    }
}

#[test]
fn test_split_partitions_groups_rows() {
    let partitions = split_partitions(&songs(), &["artist_id"]).unwrap();
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].dirs, vec!["artist_id=AR1"]);
    assert_eq!(partitions[0].frame.num_rows(), 2);
}

#[test]
fn test_split_partitions_unknown_column() {
    assert!(split_partitions(&songs(), &["month"]).is_err());
}

#[test]
fn test_split_partitions_renders_integers_plainly() {
    let batch = RecordBatch::try_from_iter(vec![
        ("month", Arc::new(Int32Array::from(vec![11])) as ArrayRef),
        ("v", Arc::new(Int32Array::from(vec![1])) as ArrayRef),
    ])
    .unwrap();
    let partitions = split_partitions(&Frame::new(batch), &["month"]).unwrap();
    assert_eq!(partitions[0].path(), "month=11");
}

// ============================================================================
// Table Writer Tests
// ============================================================================

#[tokio::test]
async fn test_write_partitioned_table_layout() {
    let (store, writer) = memory_writer();
    let summary = writer.write(Table::Songs, &songs()).await.unwrap();

    assert_eq!(summary.table, "songs");
    assert_eq!(summary.location, "memory://out/songs");
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.files, 3);
    assert_eq!(
        object_names(&store, "out/songs").await,
        vec![
            "out/songs/_SUCCESS",
            "out/songs/year=1999/artist_id=AR1/part-00000.parquet",
            "out/songs/year=2001/artist_id=AR1/part-00000.parquet",
            "out/songs/year=__HIVE_DEFAULT_PARTITION__/artist_id=AR2/part-00000.parquet",
        ]
    );

    let batch = read_parquet(&store, "out/songs/year=2001/artist_id=AR1/part-00000.parquet").await;
    assert_eq!(batch.num_columns(), 2);
    assert_eq!(batch.column(0).as_string::<i32>().value(0), "S1");
}

#[tokio::test]
async fn test_write_unpartitioned_table() {
    let (store, writer) = memory_writer();
    let summary = writer.write(Table::Users, &songs()).await.unwrap();

    assert_eq!(summary.files, 1);
    assert!(summary.partitions.is_empty());
    let batch = read_parquet(&store, "out/users/part-00000.parquet").await;
    assert_eq!(batch.num_rows(), 3);
    assert_eq!(batch.num_columns(), 4);
    let years = batch.column(2).as_primitive::<Int64Type>();
    assert_eq!(years.value(0), 2001);
}

#[tokio::test]
async fn test_write_empty_tables() {
    let (store, writer) = memory_writer();
    let empty = songs().filter_eq("song_id", "none").unwrap();

    let partitioned = writer.write(Table::Songs, &empty).await.unwrap();
    assert_eq!(partitioned.files, 0);
    assert_eq!(object_names(&store, "out/songs").await, vec!["out/songs/_SUCCESS"]);

    let flat = writer.write(Table::Artists, &empty).await.unwrap();
    assert_eq!(flat.files, 1);
    assert_eq!(
        object_names(&store, "out/artists").await,
        vec!["out/artists/_SUCCESS", "out/artists/part-00000.parquet"]
    );
}

#[tokio::test]
async fn test_write_overwrites_previous_contents() {
    let (store, writer) = memory_writer();
    store
        .put(
            &ObjectPath::from("out/songs/year=1900/artist_id=OLD/part-00000.parquet"),
            Bytes::from_static(b"stale").into(),
        )
        .await
        .unwrap();
    store
        .put(
            &ObjectPath::from("out/artists/part-00000.parquet"),
            Bytes::from_static(b"sibling").into(),
        )
        .await
        .unwrap();

    writer.write(Table::Songs, &songs()).await.unwrap();

    let names = object_names(&store, "out/songs").await;
    assert!(!names.iter().any(|n| n.contains("year=1900")));
    assert_eq!(names.len(), 4);
    // Other tables are left alone
    assert_eq!(object_names(&store, "out/artists").await.len(), 1);
}

#[tokio::test]
async fn test_write_twice_is_idempotent_on_disk() {
    let temp_dir = tempdir().unwrap();
    let root = StorageLocation::parse(
        temp_dir.path().to_str().unwrap(),
        &crate::config::CredentialsConfig::default(),
        crate::storage::AccessMode::Write,
    )
    .unwrap();
    let writer = TableWriter::new(root, ParquetWriterConfig::default());

    let first = writer.write(Table::Songs, &songs()).await.unwrap();
    let second = writer.write(Table::Songs, &songs()).await.unwrap();
    assert_eq!(first, second);

    let songs_dir = temp_dir.path().join("songs");
    assert!(songs_dir.join("_SUCCESS").exists());
    let years: Vec<String> = {
        let mut names: Vec<String> = std::fs::read_dir(&songs_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with("year="))
            .collect();
        names.sort();
        names
    };
    assert_eq!(
        years,
        vec!["year=1999", "year=2001", "year=__HIVE_DEFAULT_PARTITION__"]
    );
}
