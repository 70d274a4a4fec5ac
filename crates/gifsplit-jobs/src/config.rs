//! Job execution configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the job manager and its workers.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Root directory under which each job gets its own output directory
    pub work_dir: PathBuf,
    /// How long terminal jobs (and their output) are retained before sweeping
    pub retention: Duration,
    /// How often the background sweeper runs
    pub sweep_interval: Duration,
    /// Timeout applied to each FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Sampling rate for scene-detection analysis frames
    pub analyze_fps: f64,
    /// Width analysis frames are scaled to (height follows aspect)
    pub analyze_scale_width: u32,
    /// Default extraction rate for frame splits
    pub default_frame_fps: f64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/gifsplit"),
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            ffmpeg_timeout: Duration::from_secs(1800),
            analyze_fps: 2.0,
            analyze_scale_width: 320,
            default_frame_fps: 10.0,
        }
    }
}

impl JobsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("GIFSPLIT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            retention: Duration::from_secs(
                std::env::var("GIFSPLIT_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("GIFSPLIT_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("GIFSPLIT_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            analyze_fps: std::env::var("GIFSPLIT_ANALYZE_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2.0),
            analyze_scale_width: std::env::var("GIFSPLIT_ANALYZE_SCALE_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(320),
            default_frame_fps: std::env::var("GIFSPLIT_FRAME_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10.0),
        }
    }
}
