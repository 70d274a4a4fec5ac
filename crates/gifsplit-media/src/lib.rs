#![deny(unreachable_patterns)]
//! Media operations for the gifsplit pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - Segment and frame extraction
//! - Frame similarity scoring and scene detection
//! - Hash-based frame deduplication
//! - Animated GIF encoding with palette/dither selection
//! - Archive bundling of job outputs

pub mod archive;
pub mod command;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod gif_encode;
pub mod probe;
pub mod progress;
pub mod scenes;
pub mod similarity;

pub use archive::{archive_path, bundle};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use dedup::{frame_hash, should_skip, DedupCheck};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_frames, extract_segment, SegmentEncoding};
pub use gif_encode::{encode, EncodedGif};
pub use gifsplit_models::encoding::{EncodeOptions, FitPolicy, Quality};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use scenes::detect_scenes;
pub use similarity::{similarity, Thumb};
