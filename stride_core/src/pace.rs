//! Duration parsing and pace derivation.
//!
//! Durations travel through the system as free text; the canonical forms are
//! `MM:SS` and `HH:MM:SS`. Anything else parses to nothing rather than to a
//! guess.

/// Parse a `MM:SS` or `HH:MM:SS` duration into whole seconds
pub fn parse_duration(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let numbers: Vec<u32> = parts
        .iter()
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .ok()?;

    match numbers.as_slice() {
        [minutes, seconds] if *seconds < 60 => Some(minutes * 60 + seconds),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => {
            Some(hours * 3600 + minutes * 60 + seconds)
        }
        _ => None,
    }
}

/// Format whole seconds back into `MM:SS`, or `H:MM:SS` from one hour up
pub fn format_duration(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Derive a pace string like `5:00 /km` from a distance and a duration
///
/// Returns None when the duration doesn't parse or the distance is not
/// positive.
pub fn pace_per_km(distance_km: f64, duration: &str) -> Option<String> {
    if distance_km <= 0.0 {
        return None;
    }
    let total_seconds = parse_duration(duration)?;
    let pace_seconds = (total_seconds as f64 / distance_km).round() as u32;
    Some(format!(
        "{}:{:02} /km",
        pace_seconds / 60,
        pace_seconds % 60
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes_seconds() {
        assert_eq!(parse_duration("25:00"), Some(1500));
        assert_eq!(parse_duration("0:45"), Some(45));
    }

    #[test]
    fn test_parse_hours_minutes_seconds() {
        assert_eq!(parse_duration("1:30:00"), Some(5400));
        assert_eq!(parse_duration("2:05:30"), Some(7530));
    }

    #[test]
    fn test_parse_rejects_free_text() {
        assert_eq!(parse_duration("about an hour"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("25:99"), None);
        assert_eq!(parse_duration("1:75:00"), None);
    }

    #[test]
    fn test_format_roundtrip() {
        assert_eq!(format_duration(1500), "25:00");
        assert_eq!(format_duration(5400), "1:30:00");
        assert_eq!(format_duration(45), "0:45");
    }

    #[test]
    fn test_pace_ten_km_in_fifty_minutes() {
        assert_eq!(pace_per_km(10.0, "50:00").as_deref(), Some("5:00 /km"));
    }

    #[test]
    fn test_pace_with_hours() {
        assert_eq!(pace_per_km(21.1, "1:45:30").as_deref(), Some("5:00 /km"));
    }

    #[test]
    fn test_pace_requires_positive_distance() {
        assert_eq!(pace_per_km(0.0, "50:00"), None);
        assert_eq!(pace_per_km(-3.0, "50:00"), None);
    }

    #[test]
    fn test_pace_requires_parseable_duration() {
        assert_eq!(pace_per_km(10.0, "fast"), None);
    }
}
