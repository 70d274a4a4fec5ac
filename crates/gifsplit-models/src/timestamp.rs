//! Time expression parsing.
//!
//! Requests may express a point in time as a plain number of seconds, a
//! numeric string, or a clock string (`H:MM:SS` or `MM:SS`). Everything is
//! normalized to fractional seconds up front so the rest of the pipeline
//! only deals with `f64`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::segment::PlanError;

/// A user-supplied time expression, either numeric or textual.
///
/// Deserializes transparently from a JSON number or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimeValue {
    Number(f64),
    Text(String),
}

impl From<f64> for TimeValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for TimeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Parse a time expression to total seconds.
///
/// `field` names the value in error messages (e.g. `"startTime"`).
///
/// # Examples
/// ```
/// use gifsplit_models::timestamp::{parse_time, TimeValue};
/// assert_eq!(parse_time(&TimeValue::from("1:30"), "startTime").unwrap(), 90.0);
/// assert_eq!(parse_time(&TimeValue::from(5.0), "startTime").unwrap(), 5.0);
/// ```
pub fn parse_time(value: &TimeValue, field: &str) -> Result<f64, PlanError> {
    match value {
        TimeValue::Number(n) => {
            if n.is_finite() && *n >= 0.0 {
                Ok(*n)
            } else {
                Err(PlanError::invalid_time(field, n.to_string()))
            }
        }
        TimeValue::Text(s) => parse_clock(s, field),
    }
}

/// Parse a textual time expression (`H:MM:SS`, `MM:SS`, or bare seconds).
fn parse_clock(ts: &str, field: &str) -> Result<f64, PlanError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(PlanError::invalid_time(field, ts));
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let parsed: Option<f64> = match parts.len() {
        1 => parts[0].parse::<f64>().ok(),
        2 => {
            let minutes: Option<f64> = parts[0].parse().ok();
            let seconds: Option<f64> = parts[1].parse().ok();
            match (minutes, seconds) {
                (Some(m), Some(s)) => Some(m * 60.0 + s),
                _ => None,
            }
        }
        3 => {
            let hours: Option<f64> = parts[0].parse().ok();
            let minutes: Option<f64> = parts[1].parse().ok();
            let seconds: Option<f64> = parts[2].parse().ok();
            match (hours, minutes, seconds) {
                (Some(h), Some(m), Some(s)) => Some(h * 3600.0 + m * 60.0 + s),
                _ => None,
            }
        }
        _ => None,
    };

    match parsed {
        Some(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(PlanError::invalid_time(field, ts)),
    }
}

/// Format seconds into an `HH:MM:SS` or `HH:MM:SS.mmm` string.
pub fn format_seconds(total_secs: f64) -> String {
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_number() {
        assert_eq!(parse_time(&TimeValue::Number(0.0), "t").unwrap(), 0.0);
        assert_eq!(parse_time(&TimeValue::Number(12.5), "t").unwrap(), 12.5);
    }

    #[test]
    fn test_parse_time_numeric_string() {
        assert_eq!(parse_time(&TimeValue::from("90"), "t").unwrap(), 90.0);
        assert_eq!(parse_time(&TimeValue::from("7.25"), "t").unwrap(), 7.25);
    }

    #[test]
    fn test_parse_time_clock_formats() {
        assert_eq!(parse_time(&TimeValue::from("1:30"), "t").unwrap(), 90.0);
        assert_eq!(parse_time(&TimeValue::from("00:00:05"), "t").unwrap(), 5.0);
        assert_eq!(parse_time(&TimeValue::from("01:30:45"), "t").unwrap(), 5445.0);
        let secs = parse_time(&TimeValue::from("00:00:30.500"), "t").unwrap();
        assert!((secs - 30.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        for bad in ["", "  ", "abc", "1:2:3:4", "-5", "1:xx"] {
            let err = parse_time(&TimeValue::from(bad), "startTime").unwrap_err();
            assert!(
                matches!(err, PlanError::InvalidTimeFormat { ref field, .. } if field == "startTime"),
                "expected InvalidTimeFormat for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_parse_time_rejects_negative_number() {
        assert!(parse_time(&TimeValue::Number(-1.0), "t").is_err());
        assert!(parse_time(&TimeValue::Number(f64::NAN), "t").is_err());
    }

    #[test]
    fn test_time_value_deserializes_from_number_or_string() {
        let n: TimeValue = serde_json::from_str("5").unwrap();
        assert_eq!(n, TimeValue::Number(5.0));
        let s: TimeValue = serde_json::from_str("\"00:00:05\"").unwrap();
        assert_eq!(s, TimeValue::Text("00:00:05".to_string()));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "00:00:00");
        assert_eq!(format_seconds(90.0), "00:01:30");
        assert_eq!(format_seconds(3661.0), "01:01:01");
    }
}
