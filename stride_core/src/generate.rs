//! Plan generation client.
//!
//! Builds the generation request (window computation, role framing, task
//! prompt, strict output schema) and defensively parses the reply. The
//! endpoint's text is untrusted: it runs through a two-stage pipeline of
//! lexical fence stripping followed by a fallible JSON parse, and a failure
//! at any stage yields "no plan produced" rather than an error.

use crate::endpoint::{CoachEndpoint, Content, GenerateContentRequest, GenerationConfig};
use crate::{DayLog, Plan, PlannedDay};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Each generation call covers at most this many days past its window start
pub const GENERATION_WINDOW_DAYS: i64 = 28;

const COACH_ROLE: &str = "You are an experienced running coach. You write \
day-by-day training schedules that balance workload and recovery, and you \
respond only with the requested JSON.";

/// The date window one generation call covers
///
/// A fresh plan is generated from its start date; an adjustment regenerates
/// the remaining, not-yet-lived portion and therefore starts at today. Both
/// are capped at 28 days and clamped to the race date. Returns None when an
/// adjustment is requested after the race date has passed.
pub fn generation_window(
    plan: &Plan,
    today: NaiveDate,
    is_adjustment: bool,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = if is_adjustment { today } else { plan.start_date };
    if start > plan.race_date {
        return None;
    }
    let capped = start + Duration::days(GENERATION_WINDOW_DAYS);
    Some((start, capped.min(plan.race_date)))
}

/// One line per completed log: planned vs. actual, for the adjustment prompt
pub fn performance_summary(days: &BTreeMap<NaiveDate, DayLog>) -> String {
    days.values()
        .filter(|log| log.is_completed())
        .map(summary_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn summary_line(log: &DayLog) -> String {
    let planned = log.planned_activity.as_deref().unwrap_or("nothing");
    let distance = log.actual_distance.unwrap_or(0.0);
    let duration = log.duration.as_deref().unwrap_or("-");
    let rpe = log
        .rpe
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".into());
    let notes = log.feeling.as_deref().unwrap_or("");
    format!(
        "{}: planned \"{}\", actual {:.1} km in {}, RPE {}, notes: {}",
        log.date, planned, distance, duration, rpe, notes
    )
}

/// The schema constraint sent with every generation request
fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "date": { "type": "STRING" },
                "plannedActivity": { "type": "STRING" }
            },
            "required": ["date", "plannedActivity"]
        }
    })
}

/// Build the generation request for a window
pub fn build_request(
    plan: &Plan,
    window: (NaiveDate, NaiveDate),
    history_summary: Option<&str>,
) -> GenerateContentRequest {
    let (from, to) = window;
    let mut prompt = format!(
        "Write a training schedule for the goal \"{}\".\n\
         Cover every date from {} to {} inclusive.\n\
         The race is on {}.\n\
         Return a JSON array of objects with the string fields \"date\" \
         (YYYY-MM-DD) and \"plannedActivity\".",
        plan.goal, from, to, plan.race_date
    );
    if let Some(summary) = history_summary.filter(|s| !s.is_empty()) {
        prompt.push_str(
            "\n\nThe schedule so far has been partially completed. \
             Adjust the remaining days to the logged performance:\n",
        );
        prompt.push_str(summary);
    }

    GenerateContentRequest {
        contents: vec![Content::text(Some("user"), prompt)],
        system_instruction: Some(Content::text(None, COACH_ROLE)),
        generation_config: Some(GenerationConfig {
            response_mime_type: "application/json".into(),
            response_schema: response_schema(),
        }),
    }
}

/// Request a plan for the window, or None when no plan was produced
///
/// Any transport, endpoint or parse failure is logged and reported as None;
/// user-facing messaging is the caller's concern.
pub fn request_plan(
    endpoint: &CoachEndpoint,
    plan: &Plan,
    days: &BTreeMap<NaiveDate, DayLog>,
    today: NaiveDate,
    is_adjustment: bool,
) -> Option<Vec<PlannedDay>> {
    let window = generation_window(plan, today, is_adjustment)?;
    let summary = is_adjustment.then(|| performance_summary(days));
    let request = build_request(plan, window, summary.as_deref());

    let text = match endpoint.generate(&request) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Generation call failed: {}", e);
            return None;
        }
    };

    parse_planned_days(&text)
}

/// Strip a leading/trailing code-fence marker, if present
///
/// The endpoint is asked for bare JSON but frequently wraps it in a
/// json-tagged code fence anyway.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        let end = after.find("```").unwrap_or(after.len());
        after[..end].trim()
    } else if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let end = after.find("```").unwrap_or(after.len());
        after[..end].trim()
    } else {
        text
    }
}

/// Parse reply text into proposed days, or None when it isn't a JSON array
///
/// Individual malformed entries are dropped rather than poisoning the rest;
/// semantic validation (date range, empty activity) is the merge engine's
/// job.
pub fn parse_planned_days(text: &str) -> Option<Vec<PlannedDay>> {
    let candidate = strip_code_fence(text);
    if candidate.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Reply is not valid JSON: {}", e);
            return None;
        }
    };

    let array = match value.as_array() {
        Some(array) => array,
        None => {
            tracing::warn!("Reply JSON is not an array");
            return None;
        }
    };

    Some(
        array
            .iter()
            .filter_map(|entry| serde_json::from_value::<PlannedDay>(entry.clone()).ok())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn plan(start: &str, race: &str) -> Plan {
        Plan::new("Marathon", None, date(start), date(race)).unwrap()
    }

    #[test]
    fn test_window_capped_at_28_days() {
        let plan = plan("2025-01-01", "2025-12-31");
        let window = generation_window(&plan, date("2025-06-01"), false).unwrap();
        assert_eq!(window, (date("2025-01-01"), date("2025-01-29")));
    }

    #[test]
    fn test_window_clamped_to_race_date() {
        let plan = plan("2025-01-01", "2025-01-10");
        let window = generation_window(&plan, date("2025-01-01"), false).unwrap();
        assert_eq!(window, (date("2025-01-01"), date("2025-01-10")));
    }

    #[test]
    fn test_adjustment_window_starts_today() {
        let plan = plan("2025-01-01", "2025-12-31");
        let window = generation_window(&plan, date("2025-03-15"), true).unwrap();
        assert_eq!(window, (date("2025-03-15"), date("2025-04-12")));
    }

    #[test]
    fn test_adjustment_after_race_yields_no_window() {
        let plan = plan("2025-01-01", "2025-01-10");
        assert!(generation_window(&plan, date("2025-02-01"), true).is_none());
    }

    #[test]
    fn test_fenced_reply_parses() {
        let text = " ```json\n[{\"date\":\"2025-01-01\",\"plannedActivity\":\"Easy 5k\"}]\n``` ";
        let days = parse_planned_days(text).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, "2025-01-01");
        assert_eq!(days[0].planned_activity, "Easy 5k");
    }

    #[test]
    fn test_bare_fence_parses() {
        let text = "```\n[{\"date\":\"2025-01-01\",\"plannedActivity\":\"Easy 5k\"}]\n```";
        let days = parse_planned_days(text).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn test_unfenced_reply_parses() {
        let text = r#"[{"date":"2025-01-01","plannedActivity":"Easy 5k"}]"#;
        assert_eq!(parse_planned_days(text).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_reply_yields_none() {
        assert!(parse_planned_days("not json").is_none());
        assert!(parse_planned_days("").is_none());
        assert!(parse_planned_days("{\"date\":\"2025-01-01\"}").is_none());
    }

    #[test]
    fn test_non_object_entries_are_dropped() {
        let text = r#"[{"date":"2025-01-01","plannedActivity":"Easy"}, 42, "rest"]"#;
        let days = parse_planned_days(text).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn test_summary_lists_only_completed_days() {
        let mut days = BTreeMap::new();
        let mut done = DayLog::new(date("2025-02-01"));
        done.planned_activity = Some("Easy 5k".into());
        done.apply(&crate::DayPatch {
            date: done.date,
            activities: Some(vec![crate::ActivityEntry {
                actual_distance: 5.0,
                duration: "25:00".into(),
                rpe: 6,
                feeling: "felt good".into(),
            }]),
            ..Default::default()
        });
        days.insert(done.date, done);

        let mut pending = DayLog::new(date("2025-02-02"));
        pending.planned_activity = Some("Tempo".into());
        days.insert(pending.date, pending);

        let summary = performance_summary(&days);
        assert_eq!(summary.lines().count(), 1);
        assert!(summary.contains("2025-02-01"));
        assert!(summary.contains("5.0 km"));
        assert!(summary.contains("RPE 6"));
        assert!(summary.contains("felt good"));
    }

    #[test]
    fn test_adjustment_request_carries_summary() {
        let plan = plan("2025-01-01", "2025-12-31");
        let request = build_request(
            &plan,
            (date("2025-03-01"), date("2025-03-29")),
            Some("2025-02-01: planned \"Easy\", actual 5.0 km in 25:00, RPE 6, notes: ok"),
        );
        let prompt = &request.contents[0].parts[0].text;
        assert!(prompt.contains("logged performance"));
        assert!(prompt.contains("2025-02-01"));
    }

    #[test]
    fn test_plain_request_has_no_summary_section() {
        let plan = plan("2025-01-01", "2025-12-31");
        let request = build_request(&plan, (date("2025-01-01"), date("2025-01-29")), None);
        let prompt = &request.contents[0].parts[0].text;
        assert!(!prompt.contains("logged performance"));
        assert!(request.generation_config.is_some());
    }
}
