//! Frame-split worker.
//!
//! Extracts still frames at a fixed rate, collapses runs of byte-identical
//! frames, and renumbers the kept frames contiguously. A frame that fails
//! to decode is logged and skipped; the job continues.

use std::sync::Arc;

use tracing::{debug, warn};

use gifsplit_media::{extract_frames, should_skip, MediaError};
use gifsplit_models::{Job, JobItem};

use crate::error::{JobError, JobResult};
use crate::manager::{FrameSplitRequest, JobManager};

pub(crate) async fn run(manager: Arc<JobManager>, job: Job, req: FrameSplitRequest, fps: f64) {
    let job_id = job.id.clone();
    match execute(&manager, &job, &req, fps).await {
        Ok(()) => {}
        Err(JobError::Media(MediaError::Cancelled)) => manager.mark_cancelled(&job_id).await,
        Err(e) => manager.fail(&job_id, e.to_string()).await,
    }
}

async fn execute(
    manager: &Arc<JobManager>,
    job: &Job,
    req: &FrameSplitRequest,
    fps: f64,
) -> JobResult<()> {
    let job_id = &job.id;
    manager.mark_started(job_id).await;

    let cancel_rx = manager.cancel_receiver(job_id).await;
    let raw_dir = job.output_dir.join("raw");

    let frame_paths = extract_frames(
        &req.input,
        &raw_dir,
        fps,
        req.scale_width,
        cancel_rx,
        Some(manager.config().ffmpeg_timeout.as_secs()),
    )
    .await?;

    let total = frame_paths.len();
    if total == 0 {
        return Err(MediaError::InvalidVideo("no frames extracted".to_string()).into());
    }

    // Delay each frame holds when played back at the extraction rate
    let delay_cs = (100.0 / fps).round().max(1.0) as u16;

    let mut previous_hash: Option<String> = None;
    let mut kept = 0usize;
    let mut skipped = 0usize;

    for (i, path) in frame_paths.iter().enumerate() {
        if manager.cancel_requested(job_id).await {
            manager.mark_cancelled(job_id).await;
            return Ok(());
        }

        let bytes = tokio::fs::read(path).await?;

        if req.dedup {
            let check = should_skip(&bytes, previous_hash.as_deref());
            previous_hash = Some(check.hash);
            if check.skip {
                skipped += 1;
                debug!(frame = i + 1, "Duplicate frame elided");
                manager
                    .update_progress(job_id, ((i + 1) as f32 / total as f32) * 100.0)
                    .await;
                continue;
            }
        }

        let image = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                // One bad frame should not sink a multi-hundred-frame split
                warn!("Frame {} failed to decode, skipping: {}", path.display(), e);
                manager
                    .update_progress(job_id, ((i + 1) as f32 / total as f32) * 100.0)
                    .await;
                continue;
            }
        };

        kept += 1;
        let name = format!("frame_{:05}.png", kept);
        let dest = job.output_dir.join(&name);
        tokio::fs::rename(path, &dest).await?;

        let item = JobItem::frame(
            name,
            dest,
            bytes.len() as u64,
            image.width(),
            image.height(),
            delay_cs,
        );
        manager.record_item(job_id, item, i + 1, total).await;
    }

    let _ = tokio::fs::remove_dir_all(&raw_dir).await;

    if kept == 0 {
        return Err(MediaError::InvalidVideo("no decodable frames".to_string()).into());
    }

    debug!(kept, skipped, total, "Frame split finished");
    manager.complete(job_id).await;
    Ok(())
}
