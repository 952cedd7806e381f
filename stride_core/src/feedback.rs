//! On-demand coach feedback for a single day.
//!
//! A one-shot endpoint call summarizing one day's planned and actual
//! training; the reply is stored on the day log through a merge-upsert by
//! the caller.

use crate::endpoint::{CoachEndpoint, Content, GenerateContentRequest};
use crate::{DayLog, Plan};

fn feedback_prompt(plan: &Plan, day: &DayLog) -> String {
    let planned = day.planned_activity.as_deref().unwrap_or("nothing planned");
    let mut prompt = format!(
        "The athlete is training for \"{}\" (race on {}).\n\
         On {} the plan was: {}.\n",
        plan.goal, plan.race_date, day.date, planned
    );

    if day.activities.is_empty() {
        prompt.push_str("No workout was logged for that day.\n");
    } else {
        prompt.push_str("Logged sessions:\n");
        for activity in &day.activities {
            let pace = crate::pace::pace_per_km(activity.actual_distance, &activity.duration)
                .unwrap_or_else(|| "-".into());
            prompt.push_str(&format!(
                "- {:.1} km in {}, pace {}, RPE {}, notes: {}\n",
                activity.actual_distance, activity.duration, pace, activity.rpe, activity.feeling
            ));
        }
    }

    prompt.push_str(
        "Give two or three sentences of coaching feedback on this day. \
         Plain text only.",
    );
    prompt
}

/// Ask the coach for feedback on one day, or None when no feedback came back
pub fn request_feedback(endpoint: &CoachEndpoint, plan: &Plan, day: &DayLog) -> Option<String> {
    let request = GenerateContentRequest {
        contents: vec![Content::text(Some("user"), feedback_prompt(plan, day))],
        system_instruction: Some(Content::text(
            None,
            "You are a supportive but honest running coach.",
        )),
        generation_config: None,
    };

    match endpoint.generate(&request) {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            tracing::warn!("Feedback call failed: {}", e);
            None
        }
    }
}
