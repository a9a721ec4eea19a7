//! The session table.
//!
//! An append-only, insertion-ordered list of the deliveries recorded since
//! the session started, with a plain-text grid view and CSV export.

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::record::{DeliveryRecord, COLUMNS};

/// Records captured in this session, in submission order.
///
/// The only mutation is [`SessionTable::append`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTable {
    records: Vec<DeliveryRecord>,
}

impl SessionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The column names, in order.
    #[must_use]
    pub fn header(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    /// Append a record and return its row index.
    pub fn append(&mut self, record: DeliveryRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no deliveries were recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DeliveryRecord> {
        self.records.get(index)
    }

    /// All records in submission order.
    #[must_use]
    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    /// Iterate over the records in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, DeliveryRecord> {
        self.records.iter()
    }

    /// Every row as text values, in column order.
    #[must_use]
    pub fn rows(&self) -> Vec<[String; 9]> {
        self.records.iter().map(DeliveryRecord::values).collect()
    }

    /// Write the table as CSV (header first) to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(COLUMNS)?;
        for record in &self.records {
            csv.write_record(record.values())?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Render the table as a CSV string.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::internal(format!("CSV output not UTF-8: {e}")))
    }

    /// Export the table to a CSV file, replacing it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))?;
        info!("Exported {} deliveries to {}", self.len(), path.display());
        Ok(())
    }

    /// Render the table as an aligned text grid.
    #[must_use]
    pub fn render(&self) -> String {
        let rows = self.rows();
        let mut widths: Vec<usize> = COLUMNS.iter().map(|c| c.chars().count()).collect();
        for row in &rows {
            for (width, value) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(value.chars().count());
            }
        }

        let mut out = String::new();
        push_line(&mut out, &COLUMNS, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);
        for row in &rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

/// Append one padded grid line to `out`.
fn push_line<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let start = out.len();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let cell = cell.as_ref();
        if i > 0 {
            out.push_str(" | ");
        }
        out.push_str(cell);
        let pad = width.saturating_sub(cell.chars().count());
        out.extend(std::iter::repeat(' ').take(pad));
    }
    let end = start + out[start..].trim_end_matches(' ').len();
    out.truncate(end);
    out.push('\n');
}

impl<'a> IntoIterator for &'a SessionTable {
    type Item = &'a DeliveryRecord;
    type IntoIter = std::slice::Iter<'a, DeliveryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
