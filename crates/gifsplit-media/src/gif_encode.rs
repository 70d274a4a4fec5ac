//! Animated GIF encoding.
//!
//! Turns an ordered frame sequence into GIF bytes. One `quality` knob
//! drives both the palette statistics mode (NeuQuant sample factor) and
//! the dither algorithm: high quality pairs a full-statistics palette with
//! Floyd-Steinberg error diffusion, low quality pairs a coarsely sampled
//! palette with an ordered Bayer dither at a stronger scale.

use std::borrow::Cow;

use color_quant::NeuQuant;
use gif::{Encoder, Frame, Repeat};
use image::imageops::FilterType;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use tracing::debug;

use gifsplit_models::encoding::{delay_to_cs, EncodeOptions, FitPolicy, Quality};

use crate::error::{MediaError, MediaResult};

enum Dither {
    FloydSteinberg,
    Ordered { scale: f32 },
}

/// NeuQuant sample factor: 1 learns from every pixel, larger factors
/// subsample the statistics.
fn sample_factor(quality: Quality) -> i32 {
    match quality {
        Quality::High => 1,
        Quality::Medium => 10,
        Quality::Low => 30,
    }
}

fn dither_for(quality: Quality) -> Dither {
    match quality {
        Quality::High | Quality::Medium => Dither::FloydSteinberg,
        Quality::Low => Dither::Ordered { scale: 48.0 },
    }
}

/// An encoded animation.
#[derive(Debug, Clone)]
pub struct EncodedGif {
    pub bytes: Vec<u8>,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
}

/// Encode an ordered frame sequence into animated GIF bytes.
///
/// A single frame is valid input and produces a one-frame GIF; an empty
/// sequence is an error.
pub fn encode(frames: &[DynamicImage], options: &EncodeOptions) -> MediaResult<EncodedGif> {
    if frames.is_empty() {
        return Err(MediaError::NoFramesProvided);
    }

    let (width, height) = resolve_canvas(frames, options);
    debug!(frames = frames.len(), width, height, "Encoding GIF");

    let fitted: Vec<RgbaImage> = frames
        .iter()
        .map(|f| fit_to_canvas(f, width, height, options.fit))
        .collect();

    // Global palette learned across the whole sequence. The quality knob
    // picks how much of the pixel population feeds the statistics.
    let mut all_pixels = Vec::with_capacity(fitted.len() * (width * height * 4) as usize);
    for img in &fitted {
        all_pixels.extend_from_slice(img.as_raw());
    }
    let quantizer = NeuQuant::new(sample_factor(options.quality), 256, &all_pixels);
    let palette = quantizer.color_map_rgb();
    let dither = dither_for(options.quality);

    let mut bytes = Vec::new();
    {
        let mut encoder = Encoder::new(&mut bytes, width as u16, height as u16, &palette)?;
        match options.loop_count {
            0 => encoder.set_repeat(Repeat::Infinite)?,
            n if n > 0 => encoder.set_repeat(Repeat::Finite(n.min(u16::MAX as i32) as u16))?,
            // -1: no repeat block, play once
            _ => {}
        }

        for (index, img) in fitted.iter().enumerate() {
            let delay_ms = options
                .delays_ms
                .as_ref()
                .and_then(|d| d.get(index))
                .copied()
                .unwrap_or(options.delay_ms);

            let indices = quantize_frame(img, &quantizer, &palette, &dither);

            let mut frame = Frame::default();
            frame.width = width as u16;
            frame.height = height as u16;
            frame.buffer = Cow::Owned(indices);
            frame.delay = delay_to_cs(delay_ms);
            encoder.write_frame(&frame)?;
        }
    }

    Ok(EncodedGif {
        frame_count: fitted.len(),
        bytes,
        width,
        height,
    })
}

/// Resolve the output canvas from the options and the first frame.
fn resolve_canvas(frames: &[DynamicImage], options: &EncodeOptions) -> (u32, u32) {
    let first = &frames[0];
    let (w0, h0) = (first.width().max(1), first.height().max(1));

    match (options.width, options.height) {
        (Some(w), Some(h)) => (w.max(1), h.max(1)),
        (Some(w), None) => {
            let w = w.max(1);
            let h = ((w as f64) * (h0 as f64) / (w0 as f64)).round().max(1.0) as u32;
            (w, h)
        }
        (None, Some(h)) => {
            let h = h.max(1);
            let w = ((h as f64) * (w0 as f64) / (h0 as f64)).round().max(1.0) as u32;
            (w, h)
        }
        (None, None) => (w0, h0),
    }
}

/// Resize a frame onto the canvas under the fit policy.
fn fit_to_canvas(frame: &DynamicImage, width: u32, height: u32, fit: FitPolicy) -> RgbaImage {
    if frame.width() == width && frame.height() == height {
        return frame.to_rgba8();
    }

    match fit {
        FitPolicy::Fill => frame
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgba8(),
        FitPolicy::Cover => frame
            .resize_to_fill(width, height, FilterType::Lanczos3)
            .to_rgba8(),
        FitPolicy::Contain => {
            let scaled = frame.resize(width, height, FilterType::Lanczos3).to_rgba8();
            if scaled.width() == width && scaled.height() == height {
                return scaled;
            }
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
            let x = (width - scaled.width()) / 2;
            let y = (height - scaled.height()) / 2;
            imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
            canvas
        }
    }
}

/// Map a frame's pixels to palette indices with the selected dither.
fn quantize_frame(
    img: &RgbaImage,
    quantizer: &NeuQuant,
    palette: &[u8],
    dither: &Dither,
) -> Vec<u8> {
    match dither {
        Dither::FloydSteinberg => quantize_error_diffusion(img, quantizer, palette),
        Dither::Ordered { scale } => quantize_ordered(img, quantizer, *scale),
    }
}

/// Floyd-Steinberg error diffusion over the RGB channels.
fn quantize_error_diffusion(img: &RgbaImage, quantizer: &NeuQuant, palette: &[u8]) -> Vec<u8> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let mut indices = Vec::with_capacity(width * height);

    // Two rows of per-channel error, one slot of padding each side.
    let row_len = (width + 2) * 3;
    let mut current = vec![0.0f32; row_len];
    let mut next = vec![0.0f32; row_len];

    for y in 0..height {
        for x in 0..width {
            let px = img.get_pixel(x as u32, y as u32).0;
            let base = (x + 1) * 3;

            let mut corrected = [0u8; 4];
            corrected[3] = 255;
            let mut channel_value = [0.0f32; 3];
            for c in 0..3 {
                let value = (px[c] as f32 + current[base + c]).clamp(0.0, 255.0);
                corrected[c] = value as u8;
                channel_value[c] = value;
            }

            let idx = quantizer.index_of(&corrected);
            indices.push(idx as u8);

            for c in 0..3 {
                let err = channel_value[c] - palette[idx * 3 + c] as f32;
                current[base + 3 + c] += err * 7.0 / 16.0;
                next[base - 3 + c] += err * 3.0 / 16.0;
                next[base + c] += err * 5.0 / 16.0;
                next[base + 3 + c] += err * 1.0 / 16.0;
            }
        }

        std::mem::swap(&mut current, &mut next);
        next.iter_mut().for_each(|e| *e = 0.0);
    }

    indices
}

/// 4x4 Bayer threshold matrix.
const BAYER4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Ordered dither: perturb each pixel by the Bayer threshold before the
/// nearest-palette lookup. `scale` controls the perturbation strength.
fn quantize_ordered(img: &RgbaImage, quantizer: &NeuQuant, scale: f32) -> Vec<u8> {
    let mut indices = Vec::with_capacity((img.width() * img.height()) as usize);

    for (x, y, pixel) in img.enumerate_pixels() {
        let threshold = BAYER4[(y % 4) as usize][(x % 4) as usize];
        let offset = ((threshold as f32 + 0.5) / 16.0 - 0.5) * scale;

        let mut perturbed = [0u8; 4];
        perturbed[3] = 255;
        for c in 0..3 {
            perturbed[c] = (pixel.0[c] as f32 + offset).clamp(0.0, 255.0) as u8;
        }

        indices.push(quantizer.index_of(&perturbed) as u8);
    }

    indices
}
