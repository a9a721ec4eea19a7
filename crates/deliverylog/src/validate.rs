//! Form validation.
//!
//! Checks a [`DeliveryForm`] before the recorder touches the filesystem.
//! Every problem is collected so the presentation layer can show them all
//! at once.

use regex::Regex;

use crate::config::ValidationConfig;
use crate::error::{Error, FieldIssue, Result};
use crate::record::DeliveryForm;

/// Validates delivery forms against the configured rules.
#[derive(Debug, Clone)]
pub struct Validator {
    enabled: bool,
    plate_pattern: Option<Regex>,
    max_text_length: usize,
}

impl Validator {
    /// Build a validator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the plate pattern is not a valid regex.
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        let plate_pattern =
            Regex::new(&config.plate_pattern).map_err(|e| Error::ConfigValidation {
                message: format!("invalid plate_pattern {:?}: {e}", config.plate_pattern),
            })?;
        Ok(Self {
            enabled: config.enabled,
            plate_pattern: Some(plate_pattern),
            max_text_length: config.max_text_length,
        })
    }

    /// A validator that accepts every form.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            enabled: false,
            plate_pattern: None,
            max_text_length: usize::MAX,
        }
    }

    /// Whether any rules are applied.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check the form, returning every problem found.
    ///
    /// Text fields are expected to be trimmed already.
    #[must_use]
    pub fn issues(&self, form: &DeliveryForm) -> Vec<FieldIssue> {
        if !self.enabled {
            return Vec::new();
        }

        let mut issues = Vec::new();
        let required = [
            ("worker_name", &form.worker_name),
            ("driver_name", &form.driver_name),
            ("track_plate", &form.track_plate),
        ];
        for (field, value) in required {
            if value.is_empty() {
                issues.push(FieldIssue::new(field, "must not be empty"));
            }
        }

        if let Some(pattern) = &self.plate_pattern {
            if !form.track_plate.is_empty() && !pattern.is_match(&form.track_plate) {
                issues.push(FieldIssue::new(
                    "track_plate",
                    format!(
                        "'{}' does not match the plate format {}",
                        form.track_plate,
                        pattern.as_str()
                    ),
                ));
            }
        }

        let text = [
            ("worker_name", &form.worker_name),
            ("driver_name", &form.driver_name),
            ("track_plate", &form.track_plate),
            ("goods_description", &form.goods_description),
        ];
        for (field, value) in text {
            let len = value.chars().count();
            if len > self.max_text_length {
                issues.push(FieldIssue::new(
                    field,
                    format!("is {len} characters, at most {} allowed", self.max_text_length),
                ));
            }
        }

        issues
    }

    /// Check the form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every problem if any were found.
    pub fn check(&self, form: &DeliveryForm) -> Result<()> {
        let issues = self.issues(form);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { issues })
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default()).unwrap_or_else(|_| Self::permissive())
    }
}
