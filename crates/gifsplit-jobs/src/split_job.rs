//! Segment-split worker.
//!
//! Materializes each planned segment strictly in order; segment N+1 only
//! starts after N's artifact is on disk. Cancellation is checked between
//! segments and threaded into the running FFmpeg process.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use gifsplit_media::{detect_scenes, extract_frames, extract_segment, MediaError, SegmentEncoding, VideoInfo};
use gifsplit_models::{Job, JobItem, Segment};

use crate::error::{JobError, JobResult};
use crate::manager::{JobManager, SegmentSplitRequest, SplitMode};

pub(crate) async fn run(
    manager: Arc<JobManager>,
    job: Job,
    req: SegmentSplitRequest,
    info: VideoInfo,
    plan: Option<Vec<Segment>>,
) {
    let job_id = job.id.clone();
    match execute(&manager, &job, &req, &info, plan).await {
        Ok(()) => {}
        Err(JobError::Media(MediaError::Cancelled)) => manager.mark_cancelled(&job_id).await,
        Err(e) => manager.fail(&job_id, e.to_string()).await,
    }
}

async fn execute(
    manager: &Arc<JobManager>,
    job: &Job,
    req: &SegmentSplitRequest,
    info: &VideoInfo,
    plan: Option<Vec<Segment>>,
) -> JobResult<()> {
    let job_id = &job.id;
    manager.mark_started(job_id).await;

    let cancel_rx = manager.cancel_receiver(job_id).await;

    // Scene plans come from the analysis pass; explicit/interval plans were
    // validated before the job was created.
    let plan = match plan {
        Some(p) => p,
        None => {
            let SplitMode::Scenes {
                threshold,
                min_scene_frames,
            } = &req.mode
            else {
                unreachable!("plan is only deferred for scene mode");
            };
            plan_from_scenes(manager, &req.input, info, *threshold, *min_scene_frames).await?
        }
    };

    if manager.cancel_requested(job_id).await {
        manager.mark_cancelled(job_id).await;
        return Ok(());
    }

    let total = plan.len();
    let encoding = SegmentEncoding::default();
    let timeout = manager.config().ffmpeg_timeout.as_secs();

    for (i, segment) in plan.iter().enumerate() {
        if manager.cancel_requested(job_id).await {
            manager.mark_cancelled(job_id).await;
            return Ok(());
        }

        let name = format!("{}.mp4", segment.name);
        let out = job.output_dir.join(&name);

        let progress_name = segment.name.clone();
        extract_segment(
            &req.input,
            &out,
            segment.start,
            segment.end,
            &encoding,
            cancel_rx.clone(),
            Some(timeout),
            move |p| {
                debug!(segment = %progress_name, out_time_ms = p.out_time_ms, "Segment encode progress");
            },
        )
        .await?;

        let size = tokio::fs::metadata(&out).await?.len();
        manager
            .record_item(job_id, JobItem::segment(name, out, size), i + 1, total)
            .await;
    }

    manager.complete(job_id).await;
    Ok(())
}

/// Plan segments from detected scene boundaries.
///
/// The source is sampled at the configured analysis rate, downscaled, and
/// scanned for similarity drops; boundaries map back to timeline positions
/// through the sampling rate.
async fn plan_from_scenes(
    manager: &Arc<JobManager>,
    input: &Path,
    info: &VideoInfo,
    threshold: f64,
    min_scene_frames: usize,
) -> JobResult<Vec<Segment>> {
    let config = manager.config();
    let analysis_dir = tempfile::tempdir()?;

    let frame_paths = extract_frames(
        input,
        analysis_dir.path(),
        config.analyze_fps,
        Some(config.analyze_scale_width),
        None,
        Some(config.ffmpeg_timeout.as_secs()),
    )
    .await?;

    if frame_paths.is_empty() {
        return Err(MediaError::InvalidVideo("no analysis frames extracted".to_string()).into());
    }

    let delay_cs = (100.0 / config.analyze_fps).round().max(1.0) as u16;
    let mut frames = Vec::with_capacity(frame_paths.len());
    let mut delays = Vec::with_capacity(frame_paths.len());
    for path in &frame_paths {
        match image::open(path) {
            Ok(img) => {
                frames.push(img);
                delays.push(delay_cs);
            }
            Err(e) => {
                // One bad analysis frame should not sink the whole split
                warn!("Skipping unreadable analysis frame {}: {}", path.display(), e);
            }
        }
    }
    if frames.is_empty() {
        return Err(MediaError::InvalidVideo("no decodable analysis frames".to_string()).into());
    }

    let scenes = detect_scenes(&frames, &delays, threshold, min_scene_frames);

    let mut segments = Vec::with_capacity(scenes.len());
    for (i, scene) in scenes.iter().enumerate() {
        let start = scene.start_frame as f64 / config.analyze_fps;
        let end = (((scene.end_frame + 1) as f64) / config.analyze_fps).min(info.duration);
        if end > start {
            segments.push(Segment {
                name: format!("scene_{:03}", i + 1),
                start,
                end,
            });
        }
    }

    debug!(scenes = scenes.len(), segments = segments.len(), "Scene plan built");
    Ok(segments)
}
