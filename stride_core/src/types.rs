//! Core domain types for the Stride training-plan tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Plans and their date ranges
//! - Day logs and activity entries
//! - Proposed day records coming back from the generative endpoint
//! - Chat transcript turns

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Plan Types
// ============================================================================

/// A training plan: a goal plus an inclusive date range owning day logs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub race_date: NaiveDate,
    /// Assigned by the store at first write
    pub created_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// Create a new plan with a fresh id
    ///
    /// The title defaults to the goal when not supplied. A one-day range
    /// (start == race) is valid; an inverted range is not.
    pub fn new(
        goal: impl Into<String>,
        title: Option<String>,
        start_date: NaiveDate,
        race_date: NaiveDate,
    ) -> Result<Self> {
        if race_date < start_date {
            return Err(Error::Plan(format!(
                "race date {} is before start date {}",
                race_date, start_date
            )));
        }
        let goal = goal.into();
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| goal.clone());
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            goal,
            title,
            start_date,
            race_date,
            created_at: None,
        })
    }
}

// ============================================================================
// Day Log Types
// ============================================================================

/// One logged workout session within a day (a double day has several)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    /// Distance covered, in kilometers
    pub actual_distance: f64,
    /// Free-text duration, canonically `MM:SS` or `HH:MM:SS`
    #[serde(default)]
    pub duration: String,
    /// Rating of Perceived Exertion, 1-10
    #[serde(default = "default_rpe")]
    pub rpe: u8,
    /// Free-text notes
    #[serde(default)]
    pub feeling: String,
}

fn default_rpe() -> u8 {
    5
}

/// The record for one calendar date within a plan
///
/// `activities` is the source of truth for actuals; the scalar mirror fields
/// are a write-time projection kept for older records and summary display
/// (distance = sum, rpe = max, feeling = notes joined, duration = summed).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DayLog {
    pub date: NaiveDate,

    /// Prescribed workout; absence means no plan for this date (rest/TBD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_activity: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<ActivityEntry>,

    // Scalar mirrors projected from `activities`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeling: Option<String>,

    /// On-demand coach analysis, empty until requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_feedback: Option<String>,
}

impl DayLog {
    /// Create an empty log for a date
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            planned_activity: None,
            activities: Vec::new(),
            actual_distance: None,
            duration: None,
            rpe: None,
            feeling: None,
            coach_feedback: None,
        }
    }

    /// A day is completed iff some session covered a positive distance
    ///
    /// Derived on demand, never stored as a flag.
    pub fn is_completed(&self) -> bool {
        if !self.activities.is_empty() {
            self.activities.iter().any(|a| a.actual_distance > 0.0)
        } else {
            self.actual_distance.is_some_and(|d| d > 0.0)
        }
    }

    /// Overlay the fields present in `patch` onto this log
    ///
    /// Fields absent from the patch are left untouched, so logged actuals
    /// survive a planned-activity-only update. Setting `activities`
    /// re-projects the scalar mirrors.
    pub fn apply(&mut self, patch: &DayPatch) {
        if let Some(planned) = &patch.planned_activity {
            self.planned_activity = Some(planned.clone());
        }
        if let Some(activities) = &patch.activities {
            self.activities = activities.clone();
            self.project_mirrors();
        }
        if let Some(feedback) = &patch.coach_feedback {
            self.coach_feedback = Some(feedback.clone());
        }
    }

    /// Recompute the scalar mirrors from `activities`
    fn project_mirrors(&mut self) {
        if self.activities.is_empty() {
            self.actual_distance = None;
            self.duration = None;
            self.rpe = None;
            self.feeling = None;
            return;
        }

        self.actual_distance = Some(self.activities.iter().map(|a| a.actual_distance).sum());
        self.rpe = self.activities.iter().map(|a| a.rpe).max();

        let total_seconds: u32 = self
            .activities
            .iter()
            .filter_map(|a| crate::pace::parse_duration(&a.duration))
            .sum();
        self.duration = if total_seconds > 0 {
            Some(crate::pace::format_duration(total_seconds))
        } else {
            None
        };

        let notes: Vec<&str> = self
            .activities
            .iter()
            .map(|a| a.feeling.trim())
            .filter(|f| !f.is_empty())
            .collect();
        self.feeling = if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        };
    }
}

/// A merge-upsert payload for one day
///
/// Only the `Some` fields are written; everything else already stored for the
/// date is preserved.
#[derive(Clone, Debug, Default)]
pub struct DayPatch {
    pub date: NaiveDate,
    pub planned_activity: Option<String>,
    pub activities: Option<Vec<ActivityEntry>>,
    pub coach_feedback: Option<String>,
}

// ============================================================================
// Endpoint Payload Types
// ============================================================================

/// One proposed day as it appears in generation and chat payloads
///
/// Deliberately loose: both fields default to empty so a partially-formed
/// record survives deserialization and is dropped by the merge engine instead
/// of poisoning its whole batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDay {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub planned_activity: String,
}

// ============================================================================
// Chat Types
// ============================================================================

/// Who produced a transcript turn
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn in the coach-chat transcript
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}
