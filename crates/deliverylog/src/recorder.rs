//! Delivery capture and append.
//!
//! [`Recorder::submit`] turns one form submission into a [`DeliveryRecord`]:
//! it validates the form, writes the photos under the delivery's folder,
//! appends the record to the session table and mirrors it to the remote
//! sink when one is configured.
//!
//! Local effects always happen first and are never rolled back. When the
//! sink fails and an outbox is attached, the row is queued and the
//! submission still succeeds with [`SyncStatus::Queued`]; without an outbox
//! the sink error is returned to the caller.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::media::{FolderKey, ImageSlot, MediaStore};
use crate::outbox::Outbox;
use crate::record::{DeliveryForm, DeliveryRecord};
use crate::sink::{self, RemoteSink};
use crate::table::SessionTable;
use crate::validate::Validator;

/// Maximum rows delivered from the outbox in one flush.
const FLUSH_BATCH: usize = 500;

/// What happened to the remote copy of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    /// No remote sink is configured.
    NotConfigured,
    /// The row was appended to the remote sink.
    Synced {
        /// Whether the header row was written first.
        header_written: bool,
    },
    /// Saved locally but not synced; the row waits in the outbox.
    Queued {
        /// Outbox row ID.
        outbox_id: i64,
        /// Why the row could not be sent.
        reason: String,
    },
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "saved locally"),
            Self::Synced { .. } => write!(f, "saved locally and synced"),
            Self::Queued { reason, .. } => {
                write!(f, "saved locally but not synced ({reason})")
            }
        }
    }
}

/// The outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// Index of the new row in the session table.
    pub row_index: usize,
    /// The appended record.
    pub record: DeliveryRecord,
    /// Remote mirroring outcome.
    pub sync: SyncStatus,
}

/// Result of delivering queued rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Rows appended to the sink.
    pub delivered: usize,
    /// Rows still waiting.
    pub remaining: i64,
    /// The failure that stopped the flush, if any.
    pub error: Option<String>,
}

/// Captures deliveries.
///
/// Owns the image store, validator, and (optionally) the remote sink and
/// outbox. The session table is passed in by the caller.
#[derive(Debug)]
pub struct Recorder {
    media: MediaStore,
    validator: Validator,
    sink: Option<Box<dyn RemoteSink>>,
    outbox: Option<Outbox>,
    header_confirmed: AtomicBool,
}

impl Recorder {
    /// Create a recorder storing images under `media` with default validation,
    /// no sink and no outbox.
    #[must_use]
    pub fn new(media: MediaStore) -> Self {
        Self {
            media,
            validator: Validator::default(),
            sink: None,
            outbox: None,
            header_confirmed: AtomicBool::new(false),
        }
    }

    /// Use `validator` for submitted forms.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Mirror records to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn RemoteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Queue rows the sink rejects in `outbox`.
    #[must_use]
    pub fn with_outbox(mut self, outbox: Outbox) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// The image store.
    #[must_use]
    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// The configured sink, if any.
    #[must_use]
    pub fn sink(&self) -> Option<&dyn RemoteSink> {
        self.sink.as_deref()
    }

    /// The attached outbox, if any.
    #[must_use]
    pub fn outbox(&self) -> Option<&Outbox> {
        self.outbox.as_ref()
    }

    /// Record one delivery.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`](crate::Error::Validation) or
    ///   [`Error::InvalidFolderKey`](crate::Error::InvalidFolderKey) before
    ///   anything is written.
    /// - Filesystem errors while creating the folder or writing images.
    /// - [`Error::RemoteSink`](crate::Error::RemoteSink) when the sink fails
    ///   and no outbox is attached. The record is already in `table`.
    pub async fn submit(
        &self,
        table: &mut SessionTable,
        mut form: DeliveryForm,
    ) -> Result<Submission> {
        form.trim_text();
        self.validator.check(&form)?;
        let key = FolderKey::new(form.date, &form.track_plate)?;

        self.media.ensure_folder(&key)?;
        let plate_image_path =
            self.media
                .store(&key, ImageSlot::Plate, form.plate_image.as_ref())?;
        let goods_image_path =
            self.media
                .store(&key, ImageSlot::Goods, form.goods_image.as_ref())?;

        let record = DeliveryRecord {
            date: form.date,
            worker_name: form.worker_name,
            driver_name: form.driver_name,
            track_plate: form.track_plate,
            goods_description: form.goods_description,
            goods_number: form.goods_number,
            weight_tons: form.weight_tons,
            plate_image_path,
            goods_image_path,
        };

        let row_index = table.append(record.clone());
        info!(
            "Recorded delivery {} for plate {} on {}",
            row_index + 1,
            record.track_plate,
            record.date_string()
        );

        let sync = self.mirror(&record).await?;
        Ok(Submission {
            row_index,
            record,
            sync,
        })
    }

    /// Send one record to the sink, queueing it if the sink is unavailable.
    async fn mirror(&self, record: &DeliveryRecord) -> Result<SyncStatus> {
        let Some(sink) = self.sink.as_deref() else {
            return Ok(SyncStatus::NotConfigured);
        };
        let values = record.values();

        // Earlier rows must reach the sink first.
        if let Some(outbox) = &self.outbox {
            if outbox.count_for(sink.name())? > 0 {
                let report = self.flush_outbox().await?;
                if report.remaining > 0 {
                    let reason = match report.error {
                        Some(error) => format!(
                            "waiting behind {} earlier rows: {error}",
                            report.remaining
                        ),
                        None => format!("waiting behind {} earlier rows", report.remaining),
                    };
                    let outbox_id = outbox.enqueue_waiting(sink.name(), &values)?;
                    return Ok(SyncStatus::Queued { outbox_id, reason });
                }
            }
        }

        match self.append(sink, &values).await {
            Ok(header_written) => Ok(SyncStatus::Synced { header_written }),
            Err(err) if err.is_remote_error() => match &self.outbox {
                Some(outbox) => {
                    warn!("Remote sync failed, queueing row: {}", err);
                    let reason = err.to_string();
                    let outbox_id = outbox.enqueue(sink.name(), &values, &reason)?;
                    Ok(SyncStatus::Queued { outbox_id, reason })
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Append one row, writing the header first if this process has not yet
    /// confirmed it. Returns whether the header was written.
    async fn append(&self, sink: &dyn RemoteSink, values: &[String]) -> Result<bool> {
        let header_written = if self.header_confirmed.load(Ordering::Relaxed) {
            false
        } else {
            let written = sink::ensure_header(sink).await?;
            self.header_confirmed.store(true, Ordering::Relaxed);
            written
        };
        sink.append_row(values).await?;
        debug!("Mirrored row to {} sink", sink.name());
        Ok(header_written)
    }

    /// Deliver queued rows to the sink, oldest first.
    ///
    /// Stops at the first failure so rows stay in order; the failure is
    /// recorded on the row and reported, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the outbox itself cannot be read or updated.
    pub async fn flush_outbox(&self) -> Result<FlushReport> {
        let (Some(sink), Some(outbox)) = (self.sink.as_deref(), &self.outbox) else {
            return Ok(FlushReport::default());
        };

        let mut report = FlushReport::default();
        for row in outbox.pending_for(sink.name(), FLUSH_BATCH)? {
            match self.append(sink, &row.values).await {
                Ok(_) => {
                    outbox.remove(row.id)?;
                    report.delivered += 1;
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!("Outbox row {} still not delivered: {}", row.id, message);
                    outbox.record_failure(row.id, &message)?;
                    report.error = Some(message);
                    break;
                }
            }
        }
        report.remaining = outbox.count_for(sink.name())?;

        if report.delivered > 0 {
            info!(
                "Delivered {} queued rows to {} sink ({} remaining)",
                report.delivered,
                sink.name(),
                report.remaining
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::error::Error;
    use crate::record::{Tonnage, COLUMNS};
    use crate::sink::MemorySink;

    fn form(plate: &str) -> DeliveryForm {
        DeliveryForm::today("Ana", "Ben", plate, "Cement", 50, Tonnage::from_hundredths(1250))
            .with_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn recorder(dir: &tempfile::TempDir) -> Recorder {
        Recorder::new(MediaStore::new(dir.path().join("data")))
    }

    fn with_memory_sink(recorder: Recorder) -> (Recorder, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let recorder = recorder.with_sink(Box::new(Arc::clone(&sink)));
        (recorder, sink)
    }

    #[tokio::test]
    async fn test_submit_without_sink() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder(&dir);
        let mut table = SessionTable::new();

        let submission = recorder.submit(&mut table, form("XYZ123")).await.unwrap();
        assert_eq!(submission.row_index, 0);
        assert_eq!(submission.sync, SyncStatus::NotConfigured);
        assert_eq!(table.len(), 1);
        assert!(dir.path().join("data/2024-03-01_XYZ123").is_dir());
    }

    #[tokio::test]
    async fn test_submit_trims_text() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder(&dir);
        let mut table = SessionTable::new();

        let mut f = form(" XYZ123 ");
        f.worker_name = "  Ana".to_string();
        let submission = recorder.submit(&mut table, f).await.unwrap();
        assert_eq!(submission.record.track_plate, "XYZ123");
        assert_eq!(submission.record.worker_name, "Ana");
    }

    #[tokio::test]
    async fn test_validation_failure_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder(&dir);
        let mut table = SessionTable::new();

        let mut f = form("XYZ123").with_plate_image(b"jpeg".to_vec());
        f.worker_name = String::new();
        let err = recorder.submit(&mut table, f).await.unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert!(table.is_empty());
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_traversal_plate_rejected_even_without_validation() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder(&dir).with_validator(Validator::permissive());
        let mut table = SessionTable::new();

        let err = recorder.submit(&mut table, form("../escape")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidFolderKey { .. }));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_first_submission_writes_header_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, sink) = with_memory_sink(recorder(&dir));
        let mut table = SessionTable::new();

        let first = recorder.submit(&mut table, form("A1")).await.unwrap();
        assert_eq!(first.sync, SyncStatus::Synced { header_written: true });
        assert_eq!(sink.row_count(), 2);
        assert_eq!(sink.rows()[0], COLUMNS.map(String::from).to_vec());
        assert_eq!(sink.rows()[1], first.record.values().to_vec());

        let second = recorder.submit(&mut table, form("B2")).await.unwrap();
        assert_eq!(second.sync, SyncStatus::Synced { header_written: false });
        assert_eq!(sink.row_count(), 3);
    }

    #[tokio::test]
    async fn test_existing_sink_rows_get_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, sink) = with_memory_sink(recorder(&dir));
        sink.append_row(&COLUMNS.map(String::from)).await.unwrap();
        let mut table = SessionTable::new();

        let submission = recorder.submit(&mut table, form("A1")).await.unwrap();
        assert_eq!(submission.sync, SyncStatus::Synced { header_written: false });
        assert_eq!(sink.row_count(), 2);
    }

    #[tokio::test]
    async fn test_sink_failure_without_outbox_keeps_local_state() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, sink) = with_memory_sink(recorder(&dir));
        sink.fail_with("network unreachable");
        let mut table = SessionTable::new();

        let f = form("XYZ123").with_plate_image(b"jpeg".to_vec());
        let err = recorder.submit(&mut table, f).await.unwrap_err();

        assert!(err.is_remote_error());
        assert_eq!(table.len(), 1);
        assert!(dir.path().join("data/2024-03-01_XYZ123/plate.jpg").exists());
    }

    #[tokio::test]
    async fn test_sink_failure_with_outbox_queues_row() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, sink) = with_memory_sink(recorder(&dir));
        let recorder = recorder.with_outbox(Outbox::open_in_memory().unwrap());
        sink.fail_with("HTTP 503");
        let mut table = SessionTable::new();

        let submission = recorder.submit(&mut table, form("A1")).await.unwrap();
        match &submission.sync {
            SyncStatus::Queued { reason, .. } => assert!(reason.contains("HTTP 503")),
            other => panic!("expected queued, got {other:?}"),
        }
        assert!(submission.sync.to_string().starts_with("saved locally but not synced"));
        assert_eq!(recorder.outbox().unwrap().count().unwrap(), 1);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_queued_rows_go_before_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, sink) = with_memory_sink(recorder(&dir));
        let recorder = recorder.with_outbox(Outbox::open_in_memory().unwrap());
        let mut table = SessionTable::new();

        sink.fail_with("offline");
        recorder.submit(&mut table, form("A1")).await.unwrap();
        let second = recorder.submit(&mut table, form("B2")).await.unwrap();
        match &second.sync {
            SyncStatus::Queued { reason, .. } => {
                assert!(reason.starts_with("waiting behind 1 earlier rows"));
            }
            other => panic!("expected queued, got {other:?}"),
        }
        let pending = recorder.outbox().unwrap().pending(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[1].attempts, 0);
        assert!(pending[1].last_error.is_none());

        sink.recover();
        let third = recorder.submit(&mut table, form("C3")).await.unwrap();
        assert!(matches!(third.sync, SyncStatus::Synced { .. }));

        let plates: Vec<_> = sink.rows().iter().map(|r| r[3].clone()).collect();
        assert_eq!(plates, vec!["track_plate", "A1", "B2", "C3"]);
        assert_eq!(recorder.outbox().unwrap().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flush_outbox_stops_at_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, sink) = with_memory_sink(recorder(&dir));
        let recorder = recorder.with_outbox(Outbox::open_in_memory().unwrap());
        let mut table = SessionTable::new();

        sink.fail_with("offline");
        recorder.submit(&mut table, form("A1")).await.unwrap();

        let report = recorder.flush_outbox().await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.remaining, 1);
        assert!(report.error.unwrap().contains("offline"));

        let row = &recorder.outbox().unwrap().pending(1).unwrap()[0];
        assert_eq!(row.attempts, 2);

        sink.recover();
        let report = recorder.flush_outbox().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.remaining, 0);
        assert!(report.error.is_none());
        assert_eq!(sink.row_count(), 2);
    }

    #[tokio::test]
    async fn test_flush_without_sink_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder(&dir).with_outbox(Outbox::open_in_memory().unwrap());
        assert_eq!(recorder.flush_outbox().await.unwrap(), FlushReport::default());
    }
}
