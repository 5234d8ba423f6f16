//! Field normalization applied once, at ingestion.
//!
//! Exported data encodes "no value" in many ways (`null`, `NaN`, `None`, `NaT`,
//! blank). Everything downstream relies on absent text being the empty string and
//! absent timestamps being `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NULL_MARKERS: &[&str] = &["nan", "none", "null", "nat", "<na>"];

/// Clean an optional text field: trims, and maps null-like markers to `""`.
pub fn clean_text(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || NULL_MARKERS
            .iter()
            .any(|m| trimmed.eq_ignore_ascii_case(m))
    {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Clean a numeric-ish field that may arrive as a float string (`"443.0"`).
pub fn clean_integer_text(raw: Option<&str>) -> String {
    let text = clean_text(raw);
    match text.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.chars().all(|c| c.is_ascii_digit()) => int.to_string(),
        _ => text,
    }
}

/// Parse a timestamp into naive local time, dropping any offset.
///
/// Accepted: RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff][±HH:MM]`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// and bare `YYYY-MM-DD` (midnight). Anything else is `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let text = clean_text(raw);
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&text, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_markers_become_empty() {
        for raw in ["nan", "NaN", " None ", "null", "NaT", "<NA>", "", "   "] {
            assert_eq!(clean_text(Some(raw)), "", "{raw:?}");
        }
        assert_eq!(clean_text(None), "");
        assert_eq!(clean_text(Some(" alice ")), "alice");
        assert_eq!(clean_text(Some("nano")), "nano");
    }

    #[test]
    fn float_ports_are_trimmed() {
        assert_eq!(clean_integer_text(Some("443.0")), "443");
        assert_eq!(clean_integer_text(Some("443")), "443");
        assert_eq!(clean_integer_text(Some("nan")), "");
        assert_eq!(clean_integer_text(Some("1.5.0")), "1.5.0");
    }

    #[test]
    fn offsets_are_stripped_not_converted() {
        let ts = parse_timestamp(Some("2024-01-01T23:30:00+05:00")).unwrap();
        assert_eq!(ts.to_string(), "2024-01-01 23:30:00");

        let ts = parse_timestamp(Some("2024-01-01 08:15:00-0700")).unwrap();
        assert_eq!(ts.to_string(), "2024-01-01 08:15:00");
    }

    #[test]
    fn naive_and_date_only_forms() {
        let ts = parse_timestamp(Some("2024-02-01 12:00:05.250")).unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-02-01 12:00:05");

        let ts = parse_timestamp(Some("2024-02-01")).unwrap();
        assert_eq!(ts.to_string(), "2024-02-01 00:00:00");
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp(Some("yesterday")), None);
        assert_eq!(parse_timestamp(Some("nan")), None);
        assert_eq!(parse_timestamp(None), None);
    }
}
