//! Cheap perceptual similarity between two frames.
//!
//! Both frames are downscaled to a small fixed greyscale thumbnail and
//! compared by mean absolute pixel difference. This is a perceptual proxy,
//! not exact equality; callers needing bit-exact comparison use the
//! hash-based deduplicator instead.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

/// Thumbnail edge length used for comparison.
const THUMB_SIZE: u32 = 32;

/// Precomputed greyscale thumbnail of a frame.
///
/// Computing the thumbnail once per frame lets a sequence scan compare
/// adjacent pairs without re-decoding.
#[derive(Debug, Clone)]
pub struct Thumb(GrayImage);

impl Thumb {
    pub fn new(frame: &DynamicImage) -> Self {
        let small = frame
            .resize_exact(THUMB_SIZE, THUMB_SIZE, FilterType::Triangle)
            .to_luma8();
        Self(small)
    }

    /// Similarity against another thumbnail, in `[0, 1]` with 1.0 = identical.
    pub fn similarity(&self, other: &Thumb) -> f64 {
        let a = self.0.as_raw();
        let b = other.0.as_raw();
        debug_assert_eq!(a.len(), b.len());

        let total_diff: u64 = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (*x as i64 - *y as i64).unsigned_abs())
            .sum();

        let normalized = total_diff as f64 / (a.len() as f64 * 255.0);
        1.0 - normalized
    }
}

/// Similarity score between two frames, in `[0, 1]` with 1.0 = identical.
pub fn similarity(a: &DynamicImage, b: &DynamicImage) -> f64 {
    Thumb::new(a).similarity(&Thumb::new(b))
}
