//! End-to-end capture: form in, folder + images + table row + remote row out.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use deliverylog::sink::{CsvFileSink, MemorySink};
use deliverylog::{
    DeliveryForm, Error, MediaStore, Outbox, Recorder, RemoteSink, SessionTable, SyncStatus,
    Tonnage, COLUMNS,
};
use tempfile::TempDir;

fn march_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn form(worker: &str, plate: &str) -> DeliveryForm {
    DeliveryForm::today(worker, "Ben", plate, "Cement", 50, "12.50".parse().unwrap())
        .with_date(march_first())
}

fn recorder_in(dir: &TempDir) -> Recorder {
    Recorder::new(MediaStore::new(dir.path().join("data")))
}

fn shared_sink(recorder: Recorder) -> (Recorder, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (recorder.with_sink(Box::new(Arc::clone(&sink))), sink)
}

#[tokio::test]
async fn scenario_row_and_images() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = recorder_in(&dir);
    let mut table = SessionTable::new();

    let delivery = DeliveryForm::today(
        "Ana",
        "Ben",
        "XYZ123",
        "Cement",
        50,
        Tonnage::from_hundredths(1250),
    )
    .with_date(march_first())
    .with_plate_image(b"plate-bytes".to_vec())
    .with_goods_image(b"goods-bytes".to_vec());

    let submission = recorder.submit(&mut table, delivery).await.unwrap();
    let values = submission.record.values();

    assert_eq!(
        values[..7],
        ["2024-03-01", "Ana", "Ben", "XYZ123", "Cement", "50", "12.50"]
    );
    assert!(Path::new(&values[7]).ends_with("data/2024-03-01_XYZ123/plate.jpg"));
    assert!(Path::new(&values[8]).ends_with("data/2024-03-01_XYZ123/goods.jpg"));

    let folder = dir.path().join("data/2024-03-01_XYZ123");
    assert_eq!(std::fs::read(folder.join("plate.jpg")).unwrap(), b"plate-bytes");
    assert_eq!(std::fs::read(folder.join("goods.jpg")).unwrap(), b"goods-bytes");
    assert_eq!(table.rows(), vec![values]);
}

#[tokio::test]
async fn submissions_append_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = recorder_in(&dir);
    let mut table = SessionTable::new();

    let plates = ["AAA1", "BBB2", "CCC3", "DDD4"];
    for (i, plate) in plates.iter().enumerate() {
        let submission = recorder.submit(&mut table, form("Ana", plate)).await.unwrap();
        assert_eq!(submission.row_index, i);
    }

    let recorded: Vec<_> = table.iter().map(|r| r.track_plate.as_str()).collect();
    assert_eq!(recorded, plates);
}

#[tokio::test]
async fn headers_agree_across_table_csv_and_sink() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, sink) = shared_sink(recorder_in(&dir));
    let mut table = SessionTable::new();
    recorder.submit(&mut table, form("Ana", "XYZ123")).await.unwrap();

    let csv = table.to_csv_string().unwrap();
    let csv_header: Vec<&str> = csv.lines().next().unwrap().split(',').collect();

    assert_eq!(table.header(), COLUMNS);
    assert_eq!(csv_header, COLUMNS);
    assert_eq!(sink.rows()[0], COLUMNS);
}

#[tokio::test]
async fn no_images_means_no_paths_and_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = recorder_in(&dir);
    let mut table = SessionTable::new();

    let submission = recorder.submit(&mut table, form("Ana", "XYZ123")).await.unwrap();
    assert!(submission.record.plate_image_path.is_none());
    assert!(submission.record.goods_image_path.is_none());

    let values = submission.record.values();
    assert_eq!(values[7], "");
    assert_eq!(values[8], "");

    let folder = dir.path().join("data/2024-03-01_XYZ123");
    assert!(folder.is_dir());
    assert_eq!(std::fs::read_dir(folder).unwrap().count(), 0);
}

#[tokio::test]
async fn same_date_and_plate_reuses_folder_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = recorder_in(&dir);
    let mut table = SessionTable::new();

    let first = form("Ana", "XYZ123").with_plate_image(b"first".to_vec());
    let second = form("Bea", "XYZ123").with_plate_image(b"second".to_vec());
    let a = recorder.submit(&mut table, first).await.unwrap();
    let b = recorder.submit(&mut table, second).await.unwrap();

    assert_eq!(a.record.plate_image_path, b.record.plate_image_path);
    assert_eq!(table.len(), 2);
    assert_eq!(std::fs::read_dir(dir.path().join("data")).unwrap().count(), 1);
    assert_eq!(
        std::fs::read(dir.path().join("data/2024-03-01_XYZ123/plate.jpg")).unwrap(),
        b"second"
    );
}

#[tokio::test]
async fn header_written_once_then_one_row_per_submission() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, sink) = shared_sink(recorder_in(&dir));
    let mut table = SessionTable::new();

    recorder.submit(&mut table, form("Ana", "AAA1")).await.unwrap();
    assert_eq!(sink.row_count(), 2);
    recorder.submit(&mut table, form("Ana", "BBB2")).await.unwrap();
    assert_eq!(sink.row_count(), 3);
    recorder.submit(&mut table, form("Ana", "CCC3")).await.unwrap();
    assert_eq!(sink.row_count(), 4);

    let rows = sink.rows();
    assert_eq!(rows[0], COLUMNS);
    for (row, record) in rows[1..].iter().zip(table.iter()) {
        assert_eq!(row, &record.values());
    }
}

#[tokio::test]
async fn csv_file_sink_starts_with_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = dir.path().join("mirror.csv");
    let mut table = SessionTable::new();

    // Two processes writing to the same mirror file.
    for plate in ["AAA1", "BBB2"] {
        let recorder = recorder_in(&dir).with_sink(Box::new(CsvFileSink::new(&mirror)));
        recorder.submit(&mut table, form("Ana", plate)).await.unwrap();
    }

    let mut reader = csv::Reader::from_path(&mirror).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, COLUMNS);
    let plates: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[3].to_string())
        .collect();
    assert_eq!(plates, ["AAA1", "BBB2"]);
}

#[tokio::test]
async fn offline_rows_are_queued_then_flushed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, sink) = shared_sink(recorder_in(&dir));
    let outbox = Outbox::open(dir.path().join("outbox.db")).unwrap();
    let recorder = recorder.with_outbox(outbox);
    let mut table = SessionTable::new();

    sink.fail_with("HTTP 503 Service Unavailable");
    for plate in ["AAA1", "BBB2"] {
        let submission = recorder.submit(&mut table, form("Ana", plate)).await.unwrap();
        assert!(matches!(submission.sync, SyncStatus::Queued { .. }));
    }
    assert_eq!(table.len(), 2);
    assert_eq!(recorder.outbox().unwrap().count().unwrap(), 2);

    sink.recover();
    let report = recorder.flush_outbox().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.remaining, 0);

    let plates: Vec<_> = sink.rows().iter().map(|r| r[3].clone()).collect();
    assert_eq!(plates, ["track_plate", "AAA1", "BBB2"]);
}

#[tokio::test]
async fn offline_without_outbox_reports_error_but_keeps_row() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, sink) = shared_sink(recorder_in(&dir));
    sink.fail_with("connection refused");
    let mut table = SessionTable::new();

    let err = recorder
        .submit(&mut table, form("Ana", "XYZ123"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteSink { .. }));
    assert_eq!(table.len(), 1);
    assert!(dir.path().join("data/2024-03-01_XYZ123").is_dir());
}

#[tokio::test]
async fn invalid_form_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, sink) = shared_sink(recorder_in(&dir));
    let mut table = SessionTable::new();

    let mut bad = form("", "XYZ123").with_goods_image(b"goods".to_vec());
    bad.driver_name = "   ".to_string();
    let err = recorder.submit(&mut table, bad).await.unwrap_err();

    let fields: Vec<_> = err.issues().iter().map(|i| i.field).collect();
    assert_eq!(fields, ["worker_name", "driver_name"]);
    assert!(table.is_empty());
    assert!(!dir.path().join("data").exists());
    assert!(sink.is_empty().await.unwrap());
}
