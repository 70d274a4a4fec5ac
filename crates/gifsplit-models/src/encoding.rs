//! Animated-output encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-frame delay bounds in milliseconds. Entries outside are clamped to
/// avoid zero-delay flicker or single-frame-forever outputs.
pub const MIN_DELAY_MS: u64 = 10;
pub const MAX_DELAY_MS: u64 = 2000;

/// How a frame is mapped onto the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Fit within the canvas, letterboxing the remainder
    #[default]
    Contain,
    /// Fill the canvas, cropping the overflow
    Cover,
    /// Stretch to the canvas, ignoring aspect ratio
    Fill,
}

/// Output quality. One knob: selects the palette statistics mode and the
/// dither algorithm together, so the two always move in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    /// Map a 1-100 numeric scale onto the coarse levels.
    pub fn from_numeric(value: u8) -> Self {
        match value {
            67..=u8::MAX => Quality::High,
            34..=66 => Quality::Medium,
            _ => Quality::Low,
        }
    }
}

/// Options for encoding a frame sequence into an animated GIF.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodeOptions {
    /// Target canvas width; defaults to the first frame's width
    #[serde(default)]
    pub width: Option<u32>,
    /// Target canvas height; defaults to the first frame's height
    #[serde(default)]
    pub height: Option<u32>,
    /// Resize policy when a target size is set
    #[serde(default)]
    pub fit: FitPolicy,
    /// Output quality knob
    #[serde(default)]
    pub quality: Quality,
    /// 0 = loop forever, N = loop N times, -1 = play once
    #[serde(default)]
    pub loop_count: i32,
    /// Default per-frame delay in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Optional per-index delay overrides in milliseconds
    #[serde(default)]
    pub delays_ms: Option<Vec<u64>>,
}

fn default_delay_ms() -> u64 {
    100
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fit: FitPolicy::default(),
            quality: Quality::default(),
            loop_count: 0,
            delay_ms: default_delay_ms(),
            delays_ms: None,
        }
    }
}

/// Convert a millisecond delay to GIF centiseconds, clamped and rounded.
///
/// Rounding (not truncation) keeps playback from drifting across many
/// frames.
pub fn delay_to_cs(delay_ms: u64) -> u16 {
    let clamped = delay_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS);
    ((clamped as f64) / 10.0).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_clamping_and_rounding() {
        assert_eq!(delay_to_cs(4), 1); // clamped up to 10ms
        assert_eq!(delay_to_cs(15), 2); // rounds, not truncates
        assert_eq!(delay_to_cs(100), 10);
        assert_eq!(delay_to_cs(60_000), 200); // clamped down to 2000ms
    }

    #[test]
    fn test_quality_numeric_mapping() {
        assert_eq!(Quality::from_numeric(10), Quality::Low);
        assert_eq!(Quality::from_numeric(33), Quality::Low);
        assert_eq!(Quality::from_numeric(34), Quality::Medium);
        assert_eq!(Quality::from_numeric(50), Quality::Medium);
        assert_eq!(Quality::from_numeric(67), Quality::High);
        assert_eq!(Quality::from_numeric(100), Quality::High);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: EncodeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.loop_count, 0);
        assert_eq!(options.delay_ms, 100);
        assert_eq!(options.fit, FitPolicy::Contain);
        assert_eq!(options.quality, Quality::Medium);
    }
}
