//! Interactive delivery form.
//!
//! Prompts for each field on the terminal with `dialoguer`, then builds a
//! [`DeliveryForm`] from the answers. The worker and date of the previous
//! entry are offered as defaults since a session is usually one worker on one
//! day.

use std::path::PathBuf;

use dialoguer::{Confirm, Input};

use crate::error::{Error, Result};
use crate::media::read_image;
use crate::record::{parse_date, DeliveryForm, Tonnage, DATE_FORMAT};

/// Raw answers to the delivery prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormAnswers {
    /// Delivery date, `YYYY-MM-DD`.
    pub date: String,
    /// Worker name.
    pub worker_name: String,
    /// Driver name.
    pub driver_name: String,
    /// Truck plate.
    pub track_plate: String,
    /// Goods description.
    pub goods_description: String,
    /// Number of units.
    pub goods_number: String,
    /// Weight in tons.
    pub weight_tons: String,
    /// Plate photo path; empty for none.
    pub plate_image: String,
    /// Goods photo path; empty for none.
    pub goods_image: String,
}

impl FormAnswers {
    /// Parse the answers into a form, reading any image files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for an unparsable date, number or
    /// weight, and [`Error::ImageRead`] for an unreadable image path.
    pub fn into_form(self) -> Result<DeliveryForm> {
        let date = parse_date(&self.date)?;
        let goods_number = self
            .goods_number
            .trim()
            .parse::<u64>()
            .map_err(|e| Error::invalid_value("goods_number", e.to_string()))?;
        let weight_tons: Tonnage = self.weight_tons.parse()?;

        let mut form = DeliveryForm::today(
            self.worker_name,
            self.driver_name,
            self.track_plate,
            self.goods_description,
            goods_number,
            weight_tons,
        )
        .with_date(date);
        if let Some(path) = non_empty_path(&self.plate_image) {
            form = form.with_plate_image(read_image(path)?);
        }
        if let Some(path) = non_empty_path(&self.goods_image) {
            form = form.with_goods_image(read_image(path)?);
        }
        Ok(form)
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// Ask for every field of one delivery.
///
/// `previous` supplies defaults for the date and worker.
///
/// # Errors
///
/// Returns [`Error::Prompt`] if the terminal cannot be read.
pub fn ask_form(previous: Option<&FormAnswers>) -> Result<FormAnswers> {
    let today = chrono::Local::now().date_naive().format(DATE_FORMAT).to_string();
    let date_default = previous.map_or(today, |p| p.date.clone());

    let date: String = Input::new()
        .with_prompt("Date")
        .default(date_default)
        .validate_with(|s: &String| parse_date(s).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;

    let mut worker = Input::<String>::new().with_prompt("Worker name");
    if let Some(previous) = previous {
        worker = worker.default(previous.worker_name.clone());
    }
    let worker_name = worker.interact_text()?;

    let driver_name: String = Input::new().with_prompt("Driver name").interact_text()?;
    let track_plate: String = Input::new().with_prompt("Truck plate").interact_text()?;
    let goods_description: String = Input::new()
        .with_prompt("Goods description")
        .allow_empty(true)
        .interact_text()?;
    let goods_number: String = Input::new()
        .with_prompt("Number of goods")
        .validate_with(|s: &String| s.trim().parse::<u64>().map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;
    let weight_tons: String = Input::new()
        .with_prompt("Weight (tons)")
        .validate_with(|s: &String| s.parse::<Tonnage>().map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;
    let plate_image: String = Input::new()
        .with_prompt("Plate photo (path, empty for none)")
        .allow_empty(true)
        .interact_text()?;
    let goods_image: String = Input::new()
        .with_prompt("Goods photo (path, empty for none)")
        .allow_empty(true)
        .interact_text()?;

    Ok(FormAnswers {
        date,
        worker_name,
        driver_name,
        track_plate,
        goods_description,
        goods_number,
        weight_tons,
        plate_image,
        goods_image,
    })
}

/// Ask a yes/no question.
///
/// # Errors
///
/// Returns [`Error::Prompt`] if the terminal cannot be read.
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}
