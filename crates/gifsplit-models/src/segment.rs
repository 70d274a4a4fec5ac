//! Segment planning: validation of explicit time ranges and synthesis of
//! fixed-interval slices.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timestamp::{parse_time, TimeValue};

/// Minimum accepted segment duration in seconds. Anything shorter is either
/// rejected (explicit plans) or dropped (interval remainders).
pub const MIN_SEGMENT_SECS: f64 = 0.1;

/// Segment planning/validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Invalid time format for {field}: '{value}'. Use seconds, MM:SS, or H:MM:SS")]
    InvalidTimeFormat { field: String, value: String },

    #[error("Segment {index}: endTime or duration is required")]
    MissingEndTime { index: usize },

    #[error("Segment {index}: endTime ({end:.3}s) must be after startTime ({start:.3}s)")]
    NonPositiveDuration { index: usize, start: f64, end: f64 },

    #[error("Segment {index}: duration {duration:.3}s is below the {min:.1}s minimum")]
    DurationBelowMinimum { index: usize, duration: f64, min: f64 },

    #[error("Segment {index}: endTime ({end:.3}s) exceeds source duration ({source_duration:.3}s)")]
    ExceedsSourceDuration { index: usize, end: f64, source_duration: f64 },

    #[error("Segment interval must be positive, got {0:.3}s")]
    InvalidInterval(f64),
}

impl PlanError {
    pub fn invalid_time(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidTimeFormat {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A validated, planned time range of the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Output file stem for this segment
    pub name: String,
    /// Start time in seconds (>= 0)
    pub start: f64,
    /// End time in seconds (> start)
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A user-supplied segment entry before validation.
///
/// Field aliases mirror what callers actually send: `start`/`startTime`/
/// `from`, `end`/`endTime`/`to`, and `duration` as an alternative to an
/// explicit end.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawSegment {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "startTime", alias = "from")]
    pub start: Option<TimeValue>,

    #[serde(default, alias = "endTime", alias = "to")]
    pub end: Option<TimeValue>,

    #[serde(default)]
    pub duration: Option<TimeValue>,
}

/// Validate a list of raw segments against the probed source duration.
///
/// Start defaults to 0 when absent. End resolves either directly or as
/// `start + duration`; an entry with neither is rejected. An end past the
/// source duration is an error, never silently clamped.
pub fn normalize_segments(
    raw: &[RawSegment],
    source_duration: f64,
) -> Result<Vec<Segment>, PlanError> {
    let mut segments = Vec::with_capacity(raw.len());

    for (index, entry) in raw.iter().enumerate() {
        let start = match &entry.start {
            Some(v) => parse_time(v, "startTime")?,
            None => 0.0,
        };

        let end = match (&entry.end, &entry.duration) {
            (Some(v), _) => parse_time(v, "endTime")?,
            (None, Some(v)) => start + parse_time(v, "duration")?,
            (None, None) => return Err(PlanError::MissingEndTime { index }),
        };

        if end <= start {
            return Err(PlanError::NonPositiveDuration { index, start, end });
        }
        let duration = end - start;
        if duration < MIN_SEGMENT_SECS {
            return Err(PlanError::DurationBelowMinimum {
                index,
                duration,
                min: MIN_SEGMENT_SECS,
            });
        }
        if end > source_duration {
            return Err(PlanError::ExceedsSourceDuration {
                index,
                end,
                source_duration,
            });
        }

        let name = entry
            .name
            .clone()
            .unwrap_or_else(|| format!("segment_{:03}", index + 1));

        segments.push(Segment { name, start, end });
    }

    Ok(segments)
}

/// Synthesize segments by walking the timeline in fixed steps.
///
/// A trailing remainder shorter than [`MIN_SEGMENT_SECS`] is dropped rather
/// than emitted as a degenerate slice.
pub fn build_from_interval(
    total_duration: f64,
    segment_duration: f64,
) -> Result<Vec<Segment>, PlanError> {
    if segment_duration <= 0.0 || !segment_duration.is_finite() {
        return Err(PlanError::InvalidInterval(segment_duration));
    }

    let mut segments = Vec::new();
    let mut start = 0.0;
    let mut index = 1usize;

    while start < total_duration {
        let end = (start + segment_duration).min(total_duration);
        if end - start < MIN_SEGMENT_SECS {
            break;
        }
        segments.push(Segment {
            name: format!("segment_{:03}", index),
            start,
            end,
        });
        start = end;
        index += 1;
    }

    Ok(segments)
}
