//! CSV export of a plan's day logs.
//!
//! One row per day, with the scalar summary of the logged sessions. The file
//! is fsynced before the function reports success.

use crate::{DayLog, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    planned_activity: String,
    actual_distance_km: Option<f64>,
    duration: Option<String>,
    rpe: Option<u8>,
    feeling: Option<String>,
    completed: bool,
    coach_feedback: Option<String>,
}

impl From<&DayLog> for CsvRow {
    fn from(log: &DayLog) -> Self {
        CsvRow {
            date: log.date.to_string(),
            planned_activity: log.planned_activity.clone().unwrap_or_default(),
            actual_distance_km: log.actual_distance,
            duration: log.duration.clone(),
            rpe: log.rpe,
            feeling: log.feeling.clone(),
            completed: log.is_completed(),
            coach_feedback: log.coach_feedback.clone(),
        }
    }
}

/// Write a plan's day logs to a CSV file, returning the row count
pub fn export_plan_csv(days: &BTreeMap<NaiveDate, DayLog>, csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(csv_path)?;
    let mut writer = csv::Writer::from_writer(&file);

    for log in days.values() {
        writer.serialize(CsvRow::from(log))?;
    }
    writer.flush()?;
    file.sync_all()?;

    tracing::info!("Exported {} day logs to {:?}", days.len(), csv_path);
    Ok(days.len())
}
