//! Encode worker.
//!
//! Loads an ordered frame sequence, encodes it into a GIF on a blocking
//! thread, and registers the artifact. Loading dominates the progress
//! range; the encode itself is a single step.

use std::sync::Arc;

use tracing::warn;

use gifsplit_media::{encode, MediaError};
use gifsplit_models::{Job, JobItem};

use crate::error::{JobError, JobResult};
use crate::manager::{resolve_gif_name, EncodeRequest, JobManager};

/// Share of the progress range spent loading frames.
const LOAD_PROGRESS_SHARE: f32 = 80.0;

pub(crate) async fn run(manager: Arc<JobManager>, job: Job, req: EncodeRequest) {
    let job_id = job.id.clone();
    match execute(&manager, &job, req).await {
        Ok(()) => {}
        Err(JobError::Media(MediaError::Cancelled)) => manager.mark_cancelled(&job_id).await,
        Err(e) => manager.fail(&job_id, e.to_string()).await,
    }
}

async fn execute(manager: &Arc<JobManager>, job: &Job, req: EncodeRequest) -> JobResult<()> {
    let job_id = &job.id;
    manager.mark_started(job_id).await;

    let total = req.frames.len();
    let mut images = Vec::with_capacity(total);

    for (i, path) in req.frames.iter().enumerate() {
        if manager.cancel_requested(job_id).await {
            manager.mark_cancelled(job_id).await;
            return Ok(());
        }

        match image::open(path) {
            Ok(img) => images.push(img),
            Err(e) => {
                // One unreadable frame does not abort the sequence
                warn!("Frame {} failed to load, skipping: {}", path.display(), e);
            }
        }

        manager
            .update_progress(job_id, ((i + 1) as f32 / total as f32) * LOAD_PROGRESS_SHARE)
            .await;
    }

    if images.is_empty() {
        return Err(MediaError::NoFramesProvided.into());
    }

    let options = req.options.clone();
    let encoded = tokio::task::spawn_blocking(move || encode(&images, &options))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

    if manager.cancel_requested(job_id).await {
        manager.mark_cancelled(job_id).await;
        return Ok(());
    }

    let name = resolve_gif_name(req.file_name.as_deref());
    let dest = job.output_dir.join(&name);
    tokio::fs::write(&dest, &encoded.bytes).await?;

    let delay_cs = gifsplit_models::encoding::delay_to_cs(req.options.delay_ms);
    let item = JobItem {
        name,
        path: dest,
        size: encoded.bytes.len() as u64,
        width: Some(encoded.width),
        height: Some(encoded.height),
        delay_cs: Some(delay_cs),
    };
    manager.record_item(job_id, item, 1, 1).await;

    manager.complete(job_id).await;
    Ok(())
}
