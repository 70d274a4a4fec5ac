//! Scene boundaries over a frame sequence.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A contiguous run of visually similar frames.
///
/// Indices are inclusive and refer to positions in the analyzed frame
/// sequence. Scenes produced by the detector are contiguous,
/// non-overlapping, and cover the full analyzed range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// First frame of the scene (0-based, inclusive)
    pub start_frame: usize,
    /// Last frame of the scene (0-based, inclusive)
    pub end_frame: usize,
    /// Total display duration in hundredths of a second, summed from the
    /// constituent frame delays
    pub duration_cs: u32,
}

impl Scene {
    /// Number of frames in the scene.
    pub fn frame_count(&self) -> usize {
        self.end_frame - self.start_frame + 1
    }
}
