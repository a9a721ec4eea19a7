//! `deliverylog` - Delivery record capture
//!
//! This library records incoming deliveries: it validates the delivery form,
//! stores the plate and goods photos in a per-delivery folder, keeps an
//! in-session table that can be exported as CSV, and mirrors each row to a
//! remote spreadsheet, queueing rows locally while the spreadsheet is
//! unreachable.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod outbox;
pub mod prompt;
pub mod record;
pub mod recorder;
pub mod session;
pub mod sink;
pub mod table;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use media::MediaStore;
pub use outbox::{Outbox, OutboxStats};
pub use record::{DeliveryForm, DeliveryRecord, ImagePayload, Tonnage, COLUMNS};
pub use recorder::{FlushReport, Recorder, Submission, SyncStatus};
pub use sink::RemoteSink;
pub use table::SessionTable;
pub use validate::Validator;
