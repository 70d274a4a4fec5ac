//! Segment and frame extraction.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::progress::FfmpegProgress;

/// Encoding settings for extracted segments.
#[derive(Debug, Clone)]
pub struct SegmentEncoding {
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for SegmentEncoding {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// Transcode the time range `[start, end]` of `input` into `output`.
///
/// The call returns once the artifact is fully written; callers rely on
/// that for in-order pipelines.
pub async fn extract_segment<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_secs: f64,
    end_secs: f64,
    encoding: &SegmentEncoding,
    cancel: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
    progress_callback: F,
) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    let input = input.as_ref();
    let output = output.as_ref();
    let duration = end_secs - start_secs;

    info!(
        "Extracting segment: {} -> {} (start: {:.2}s, duration: {:.2}s)",
        input.display(),
        output.display(),
        start_secs,
        duration
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .duration(duration)
        .video_codec(&encoding.codec)
        .preset(&encoding.preset)
        .crf(encoding.crf)
        .audio_codec(&encoding.audio_codec)
        .audio_bitrate(&encoding.audio_bitrate);

    let mut runner = FfmpegRunner::new();
    if let Some(rx) = cancel {
        runner = runner.with_cancel(rx);
    }
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(secs);
    }
    runner.run_with_progress(&cmd, progress_callback).await
}

/// Extract still frames from `input` into `out_dir` at `fps` frames per
/// second, optionally scaled to `scale_width` (height follows the aspect
/// ratio). Returns the produced frame paths in playback order.
pub async fn extract_frames(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    fps: f64,
    scale_width: Option<u32>,
    cancel: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
) -> MediaResult<Vec<PathBuf>> {
    let input = input.as_ref();
    let out_dir = out_dir.as_ref();

    tokio::fs::create_dir_all(out_dir).await?;

    let filter = match scale_width {
        Some(w) => format!("fps={},scale={}:-2", fps, w),
        None => format!("fps={}", fps),
    };

    info!(
        "Extracting frames: {} -> {} ({})",
        input.display(),
        out_dir.display(),
        filter
    );

    let pattern = out_dir.join("frame_%05d.png");
    let cmd = FfmpegCommand::new(input, &pattern)
        .video_filter(&filter)
        .no_audio();

    let mut runner = FfmpegRunner::new();
    if let Some(rx) = cancel {
        runner = runner.with_cancel(rx);
    }
    if let Some(secs) = timeout_secs {
        runner = runner.with_timeout(secs);
    }
    runner.run(&cmd).await?;

    list_frames(out_dir).await
}

/// List `frame_*.png` files in a directory, sorted by name.
///
/// FFmpeg numbers the pattern output sequentially, so lexicographic order
/// is playback order.
pub async fn list_frames(dir: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("frame_") && n.ends_with(".png"))
            .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }

    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_frames_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_00003.png", "frame_00001.png", "frame_00002.png", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let frames = list_frames(dir.path()).await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["frame_00001.png", "frame_00002.png", "frame_00003.png"]);
    }

    #[test]
    fn test_default_encoding_is_h264() {
        let enc = SegmentEncoding::default();
        assert_eq!(enc.codec, "libx264");
        assert_eq!(enc.crf, 23);
    }
}
