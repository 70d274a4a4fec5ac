//! Scene boundary detection over a frame sequence.

use image::DynamicImage;
use tracing::debug;

use gifsplit_models::Scene;

use crate::similarity::Thumb;

/// Detect scene boundaries by scanning adjacent frame pairs.
///
/// A boundary is proposed where `similarity < 1 - threshold`, but only
/// accepted if the prospective scene holds at least `min_scene_frames`
/// frames; shorter runs merge forward. A trailing run below the minimum is
/// folded into the previous scene. When no boundary qualifies the whole
/// input becomes a single scene, so any non-empty sequence yields at least
/// one scene covering the full range.
///
/// `delays_cs` holds each frame's display delay in hundredths of a second
/// and must be the same length as `frames`; scene durations are summed
/// from it.
pub fn detect_scenes(
    frames: &[DynamicImage],
    delays_cs: &[u16],
    threshold: f64,
    min_scene_frames: usize,
) -> Vec<Scene> {
    if frames.is_empty() {
        return Vec::new();
    }
    debug_assert_eq!(frames.len(), delays_cs.len());

    let min_frames = min_scene_frames.max(1);
    let cut_below = 1.0 - threshold;

    let thumbs: Vec<Thumb> = frames.iter().map(Thumb::new).collect();

    let mut scenes: Vec<Scene> = Vec::new();
    let mut scene_start = 0usize;

    for i in 1..frames.len() {
        let sim = thumbs[i - 1].similarity(&thumbs[i]);
        if sim < cut_below {
            let prospective_len = i - scene_start;
            if prospective_len >= min_frames {
                scenes.push(make_scene(scene_start, i - 1, delays_cs));
                scene_start = i;
            } else {
                debug!(
                    boundary = i,
                    frames = prospective_len,
                    "Scene below minimum, merging forward"
                );
            }
        }
    }

    // The remaining tail forms a final scene only if it meets the minimum;
    // otherwise its frames fold into the previous scene.
    let last = frames.len() - 1;
    let tail_len = frames.len() - scene_start;
    if tail_len >= min_frames || scenes.is_empty() {
        scenes.push(make_scene(scene_start, last, delays_cs));
    } else {
        let prev = scenes.last_mut().expect("non-empty checked above");
        prev.duration_cs += sum_delays(prev.end_frame + 1, last, delays_cs);
        prev.end_frame = last;
    }

    scenes
}

fn make_scene(start: usize, end: usize, delays_cs: &[u16]) -> Scene {
    Scene {
        start_frame: start,
        end_frame: end,
        duration_cs: sum_delays(start, end, delays_cs),
    }
}

fn sum_delays(start: usize, end: usize, delays_cs: &[u16]) -> u32 {
    (start..=end)
        .map(|i| delays_cs.get(i).copied().unwrap_or(0) as u32)
        .sum()
}
