//! Image storage for delivery records.
//!
//! Each delivery's photos live in a folder named `{date}_{plate}` under the
//! configured data root. The folder is created on first use and images are
//! overwritten when a later delivery shares the same date and plate.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{ImagePayload, DATE_FORMAT};

/// File name of the plate photo inside a delivery folder.
pub const PLATE_IMAGE_NAME: &str = "plate.jpg";

/// File name of the goods photo inside a delivery folder.
pub const GOODS_IMAGE_NAME: &str = "goods.jpg";

/// The two photo slots of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    /// Photo of the truck's plate.
    Plate,
    /// Photo of the delivered goods.
    Goods,
}

impl ImageSlot {
    /// The fixed file name for this slot.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Plate => PLATE_IMAGE_NAME,
            Self::Goods => GOODS_IMAGE_NAME,
        }
    }
}

/// Deterministic folder name for a delivery: `{date}_{plate}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderKey(String);

impl FolderKey {
    /// Build the folder key for a date and plate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFolderKey`] if the plate would escape the data
    /// root or split into nested directories.
    pub fn new(date: NaiveDate, plate: &str) -> Result<Self> {
        let reject = |reason| Error::InvalidFolderKey {
            plate: plate.to_string(),
            reason,
        };
        if plate.contains(['/', '\\']) {
            return Err(reject("contains a path separator"));
        }
        if plate.contains("..") {
            return Err(reject("contains '..'"));
        }
        if plate.contains('\0') {
            return Err(reject("contains a NUL byte"));
        }
        Ok(Self(format!("{}_{plate}", date.format(DATE_FORMAT))))
    }

    /// The folder name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Create a store rooted at `root`. Nothing is created on disk yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the folder for `key`.
    #[must_use]
    pub fn folder_path(&self, key: &FolderKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Path an image for `slot` is written to.
    #[must_use]
    pub fn image_path(&self, key: &FolderKey, slot: ImageSlot) -> PathBuf {
        self.folder_path(key).join(slot.file_name())
    }

    /// Ensure the folder for `key` exists, creating it and the data root if needed.
    ///
    /// Calling this again for the same key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryCreate`] if the folder cannot be created.
    pub fn ensure_folder(&self, key: &FolderKey) -> Result<PathBuf> {
        let path = self.folder_path(key);
        std::fs::create_dir_all(&path).map_err(|source| Error::DirectoryCreate {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Write the image for `slot` if one was captured.
    ///
    /// Returns the written path, or `None` when there is no payload. Existing
    /// files are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageWrite`] if the file cannot be written.
    pub fn store(
        &self,
        key: &FolderKey,
        slot: ImageSlot,
        payload: Option<&ImagePayload>,
    ) -> Result<Option<PathBuf>> {
        let Some(payload) = payload else {
            return Ok(None);
        };
        let path = self.image_path(key, slot);
        std::fs::write(&path, payload.as_bytes()).map_err(|source| Error::ImageWrite {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {} bytes to {}", payload.len(), path.display());
        Ok(Some(path))
    }
}

/// Read an image file from disk to attach to a form.
///
/// # Errors
///
/// Returns [`Error::ImageRead`] if the file cannot be read.
pub fn read_image(path: impl AsRef<Path>) -> Result<ImagePayload> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(ImagePayload::new(bytes))
}
