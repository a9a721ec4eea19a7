//! One step of an interactive recording session.
//!
//! A failed step never ends the session: the rows already in the table stay
//! there and can still be exported when the session closes.

use tracing::warn;

use crate::error::Error;
use crate::prompt::FormAnswers;
use crate::recorder::{Recorder, Submission};
use crate::table::SessionTable;

/// Outcome of recording one set of answers.
#[derive(Debug)]
pub enum StepOutcome {
    /// The delivery was recorded (and possibly queued for the sink).
    Recorded(Submission),
    /// The answers could not be recorded. The session continues.
    Failed {
        /// What went wrong.
        error: Error,
        /// Whether the row made it into the table anyway (remote failures).
        kept_locally: bool,
    },
}

/// Parse `answers` and submit them, turning every error into
/// [`StepOutcome::Failed`].
pub async fn record_answers(
    recorder: &Recorder,
    table: &mut SessionTable,
    answers: FormAnswers,
) -> StepOutcome {
    let form = match answers.into_form() {
        Ok(form) => form,
        Err(error) => {
            return StepOutcome::Failed {
                error,
                kept_locally: false,
            }
        }
    };

    let rows_before = table.len();
    match recorder.submit(table, form).await {
        Ok(submission) => StepOutcome::Recorded(submission),
        Err(error) => {
            if !error.is_validation_error() {
                warn!("Delivery not fully recorded: {}", error);
            }
            StepOutcome::Failed {
                error,
                kept_locally: table.len() > rows_before,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::media::MediaStore;
    use crate::sink::MemorySink;

    fn answers(plate: &str) -> FormAnswers {
        FormAnswers {
            date: "2024-03-01".to_string(),
            worker_name: "Ana".to_string(),
            driver_name: "Ben".to_string(),
            track_plate: plate.to_string(),
            goods_description: "Cement".to_string(),
            goods_number: "50".to_string(),
            weight_tons: "12.50".to_string(),
            plate_image: String::new(),
            goods_image: String::new(),
        }
    }

    #[tokio::test]
    async fn test_local_failure_keeps_earlier_rows() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let recorder = Recorder::new(MediaStore::new(&data));
        let mut table = SessionTable::new();

        for plate in ["AAA1", "BBB2"] {
            let outcome = record_answers(&recorder, &mut table, answers(plate)).await;
            assert!(matches!(outcome, StepOutcome::Recorded(_)));
        }

        // A plain file where the third delivery's folder should go.
        std::fs::write(data.join("2024-03-01_CCC3"), b"").unwrap();
        let outcome = record_answers(&recorder, &mut table, answers("CCC3")).await;
        match outcome {
            StepOutcome::Failed {
                error,
                kept_locally,
            } => {
                assert!(matches!(error, Error::DirectoryCreate { .. }));
                assert!(!kept_locally);
            }
            StepOutcome::Recorded(_) => panic!("expected a failure"),
        }
        assert_eq!(table.len(), 2);

        // The session carries on and the earlier rows still export.
        let outcome = record_answers(&recorder, &mut table, answers("DDD4")).await;
        assert!(matches!(outcome, StepOutcome::Recorded(_)));
        let export = dir.path().join("session.csv");
        table.export_csv(&export).unwrap();
        assert_eq!(std::fs::read_to_string(export).unwrap().lines().count(), 4);
    }

    #[tokio::test]
    async fn test_unparsable_answers_fail_without_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(MediaStore::new(dir.path().join("data")));
        let mut table = SessionTable::new();

        let mut bad = answers("AAA1");
        bad.weight_tons = "a lot".to_string();
        let outcome = record_answers(&recorder, &mut table, bad).await;
        assert!(matches!(
            outcome,
            StepOutcome::Failed {
                kept_locally: false,
                ..
            }
        ));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_kept_locally() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        sink.fail_with("offline");
        let recorder = Recorder::new(MediaStore::new(dir.path().join("data")))
            .with_sink(Box::new(Arc::clone(&sink)));
        let mut table = SessionTable::new();

        let outcome = record_answers(&recorder, &mut table, answers("AAA1")).await;
        match outcome {
            StepOutcome::Failed {
                error,
                kept_locally,
            } => {
                assert!(error.is_remote_error());
                assert!(kept_locally);
            }
            StepOutcome::Recorded(_) => panic!("expected a failure"),
        }
        assert_eq!(table.len(), 1);
    }
}
