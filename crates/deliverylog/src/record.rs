//! Core record types for deliverylog.
//!
//! This module defines the delivery record, its fixed column layout, and the
//! raw form input the recorder turns into a record.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Date format used in records, folder keys and exports.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column names in their fixed order.
///
/// Shared by the session table, the CSV export and the remote sink header.
pub const COLUMNS: [&str; 9] = [
    "date",
    "worker_name",
    "driver_name",
    "track_plate",
    "goods_description",
    "goods_number",
    "weight_tons",
    "plate_image_path",
    "goods_image_path",
];

/// A weight in tons with two-decimal precision.
///
/// Stored as whole hundredths so that `12.5` always renders as `12.50` and
/// a negative weight cannot be represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tonnage(u64);

impl Tonnage {
    /// Create a weight from hundredths of a ton.
    #[must_use]
    pub const fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    /// The weight in hundredths of a ton.
    #[must_use]
    pub const fn hundredths(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tonnage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Tonnage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: &str| Error::invalid_value("weight_tons", message);

        let s = s.trim();
        if s.starts_with('-') {
            return Err(invalid("must not be negative"));
        }
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("expected a number such as 12.50"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("expected a number such as 12.50"));
        }
        if fraction.len() > 2 {
            return Err(invalid("at most two decimal places are allowed"));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("value is too large"))?
        };
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().unwrap_or(0) * 10,
            _ => fraction.parse().unwrap_or(0),
        };

        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .map(Self)
            .ok_or_else(|| invalid("value is too large"))
    }
}

impl Serialize for Tonnage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tonnage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Raw bytes of a captured photo.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload(Vec<u8>);

impl ImagePayload {
    /// Wrap captured image bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImagePayload({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for ImagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// One form submission, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryForm {
    /// Delivery date.
    pub date: NaiveDate,
    /// Who logged the delivery.
    pub worker_name: String,
    /// Who drove the truck.
    pub driver_name: String,
    /// Truck plate number; also names the image folder.
    pub track_plate: String,
    /// Free-text description of the goods.
    pub goods_description: String,
    /// Number of goods units.
    pub goods_number: u64,
    /// Total weight.
    pub weight_tons: Tonnage,
    /// Photo of the plate, if one was captured.
    pub plate_image: Option<ImagePayload>,
    /// Photo of the goods, if one was captured.
    pub goods_image: Option<ImagePayload>,
}

impl DeliveryForm {
    /// Create a form dated today (local time) with no images.
    #[must_use]
    pub fn today(
        worker_name: impl Into<String>,
        driver_name: impl Into<String>,
        track_plate: impl Into<String>,
        goods_description: impl Into<String>,
        goods_number: u64,
        weight_tons: Tonnage,
    ) -> Self {
        Self {
            date: chrono::Local::now().date_naive(),
            worker_name: worker_name.into(),
            driver_name: driver_name.into(),
            track_plate: track_plate.into(),
            goods_description: goods_description.into(),
            goods_number,
            weight_tons,
            plate_image: None,
            goods_image: None,
        }
    }

    /// Set the delivery date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Attach a plate photo.
    #[must_use]
    pub fn with_plate_image(mut self, image: impl Into<ImagePayload>) -> Self {
        self.plate_image = Some(image.into());
        self
    }

    /// Attach a goods photo.
    #[must_use]
    pub fn with_goods_image(mut self, image: impl Into<ImagePayload>) -> Self {
        self.goods_image = Some(image.into());
        self
    }

    /// Trim surrounding whitespace from every text field.
    pub(crate) fn trim_text(&mut self) {
        for field in [
            &mut self.worker_name,
            &mut self.driver_name,
            &mut self.track_plate,
            &mut self.goods_description,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
    }
}

/// One logged delivery.
///
/// Records are built by the recorder and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Delivery date.
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    /// Who logged the delivery.
    pub worker_name: String,
    /// Who drove the truck.
    pub driver_name: String,
    /// Truck plate number.
    pub track_plate: String,
    /// Free-text description of the goods.
    pub goods_description: String,
    /// Number of goods units.
    pub goods_number: u64,
    /// Total weight.
    pub weight_tons: Tonnage,
    /// Where the plate photo was written, if one was captured.
    pub plate_image_path: Option<PathBuf>,
    /// Where the goods photo was written, if one was captured.
    pub goods_image_path: Option<PathBuf>,
}

impl DeliveryRecord {
    /// The date formatted as `YYYY-MM-DD`.
    #[must_use]
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// The record's values as text, in [`COLUMNS`] order.
    ///
    /// Absent image paths become empty strings.
    #[must_use]
    pub fn values(&self) -> [String; 9] {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        [
            self.date_string(),
            self.worker_name.clone(),
            self.driver_name.clone(),
            self.track_plate.clone(),
            self.goods_description.clone(),
            self.goods_number.to_string(),
            self.weight_tons.to_string(),
            path(&self.plate_image_path),
            path(&self.goods_image_path),
        ]
    }
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] if the string is not a valid date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| Error::invalid_value("date", format!("expected YYYY-MM-DD ({e})")))
}

mod date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(d)?;
        NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
