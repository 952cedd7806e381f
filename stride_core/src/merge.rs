//! The merge engine.
//!
//! Turns proposed day records (from generation or coach chat) into batched
//! merge-upserts against the store, and builds the cascade batch for plan
//! deletion. Validation is per record: a malformed entry is dropped so the
//! model's other valid records still land.

use crate::store::{WriteBatch, WriteOp};
use crate::{ActivityEntry, DayPatch, Plan, PlannedDay};
use chrono::NaiveDate;

/// Build the batch applying proposed days to a plan
///
/// Records are dropped (never an error) when the date is missing or
/// unparseable, the planned activity is empty, or the date falls outside the
/// plan's range.
pub fn plan_update_batch(plan: &Plan, proposals: &[PlannedDay]) -> WriteBatch {
    let mut batch = WriteBatch::new();

    for proposal in proposals {
        let Ok(parsed_date) = proposal.date.trim().parse::<NaiveDate>() else {
            tracing::debug!("Dropping proposed day with bad date: {:?}", proposal.date);
            continue;
        };
        let planned = proposal.planned_activity.trim();
        if planned.is_empty() {
            tracing::debug!("Dropping proposed day {} with no activity", parsed_date);
            continue;
        }
        if parsed_date < plan.start_date || parsed_date > plan.race_date {
            tracing::debug!(
                "Dropping proposed day {} outside plan range {}..{}",
                parsed_date,
                plan.start_date,
                plan.race_date
            );
            continue;
        }

        batch.push(WriteOp::PatchDay {
            plan_id: plan.id.clone(),
            patch: DayPatch {
                date: parsed_date,
                planned_activity: Some(planned.to_string()),
                ..Default::default()
            },
        });
    }

    batch
}

/// Build the batch replacing one day's logged sessions
pub fn log_day_batch(plan_id: &str, date: NaiveDate, activities: Vec<ActivityEntry>) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::PatchDay {
        plan_id: plan_id.to_string(),
        patch: DayPatch {
            date,
            activities: Some(activities),
            ..Default::default()
        },
    });
    batch
}

/// Build the batch recording coach feedback for one day
pub fn feedback_batch(plan_id: &str, date: NaiveDate, feedback: String) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::PatchDay {
        plan_id: plan_id.to_string(),
        patch: DayPatch {
            date,
            coach_feedback: Some(feedback),
            ..Default::default()
        },
    });
    batch
}

/// Build the cascade batch deleting a plan and every one of its day logs
///
/// One atomic batch, so the plan and its logs can never outlive each other.
pub fn delete_plan_batch(plan_id: &str, day_keys: impl IntoIterator<Item = NaiveDate>) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for date in day_keys {
        batch.push(WriteOp::DeleteDay {
            plan_id: plan_id.to_string(),
            date,
        });
    }
    batch.push(WriteOp::DeletePlan(plan_id.to_string()));
    batch
}
