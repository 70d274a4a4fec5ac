//! Job lifecycle management.
//!
//! The manager owns the injectable job registry, the per-job progress
//! channels and the cancellation tokens. Spawn calls validate
//! synchronously, create the job record and its output directory, then
//! hand the remaining work to a background task; the record is visible
//! before the id is returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{info, warn};

use gifsplit_media::{archive_path, bundle, probe_video, EncodeOptions, MediaError};
use gifsplit_models::{
    build_from_interval, normalize_segments, Job, JobId, JobItem, JobKind, JobOutput, JobState,
    JobStatus, RawSegment, Segment,
};

use crate::config::JobsConfig;
use crate::error::{JobError, JobResult};
use crate::progress::{ProgressEvent, ProgressHub, ProgressMessage};
use crate::registry::JobRegistry;
use crate::{encode_job, frame_job, split_job};

/// How a segment split plans its time ranges.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitMode {
    /// Explicit time ranges
    Ranges { segments: Vec<RawSegment> },
    /// Fixed-interval slicing
    Interval { seconds: f64 },
    /// Automatic scene-change detection
    Scenes {
        threshold: f64,
        min_scene_frames: usize,
    },
}

/// Request to split a source video into segments.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SegmentSplitRequest {
    pub input: PathBuf,
    #[serde(flatten)]
    pub mode: SplitMode,
}

/// Request to split a source into individual frames.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FrameSplitRequest {
    pub input: PathBuf,
    /// Extraction rate; defaults to the configured rate
    #[serde(default)]
    pub fps: Option<f64>,
    /// Optional downscale width (height follows aspect)
    #[serde(default)]
    pub scale_width: Option<u32>,
    /// Skip frames byte-identical to the previous kept frame
    #[serde(default = "default_true")]
    pub dedup: bool,
}

fn default_true() -> bool {
    true
}

/// Request to encode an ordered frame sequence into a GIF.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EncodeRequest {
    /// Frame files in playback order
    pub frames: Vec<PathBuf>,
    #[serde(default)]
    pub options: EncodeOptions,
    /// Output file name; defaults to `animation.gif`
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Owns job state, progress and cancellation for every split/encode job.
pub struct JobManager {
    registry: Arc<JobRegistry>,
    progress: ProgressHub,
    cancels: RwLock<HashMap<String, watch::Sender<bool>>>,
    config: JobsConfig,
}

impl JobManager {
    /// Create a manager over an injectable registry.
    pub fn new(registry: Arc<JobRegistry>, config: JobsConfig) -> Self {
        Self {
            registry,
            progress: ProgressHub::new(),
            cancels: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    /// Create a job record and its output directory.
    ///
    /// The record, its progress channel and its cancellation token are all
    /// registered before this returns.
    pub async fn create_job(&self, kind: JobKind) -> JobResult<Job> {
        let job = Job::new(kind, PathBuf::new());
        let output_dir = self.config.work_dir.join(job.id.as_str());
        tokio::fs::create_dir_all(&output_dir).await?;

        let job = Job {
            output_dir,
            ..job
        };

        self.progress.register(&job.id).await;
        {
            let mut cancels = self.cancels.write().await;
            let (tx, _) = watch::channel(false);
            cancels.insert(job.id.as_str().to_string(), tx);
        }
        self.registry.insert(job.clone()).await;

        info!(job_id = %job.id, kind = %job.kind, "Job created");
        Ok(job)
    }

    // ---- spawn entry points ------------------------------------------------

    /// Validate and start a segment-split job.
    pub async fn spawn_segment_split(
        self: &Arc<Self>,
        req: SegmentSplitRequest,
    ) -> JobResult<JobId> {
        if !req.input.exists() {
            return Err(MediaError::FileNotFound(req.input.clone()).into());
        }
        let info = probe_video(&req.input).await?;
        if info.duration <= 0.0 {
            return Err(JobError::validation("source has no duration"));
        }

        // Explicit plans are validated in full before the job exists; scene
        // plans are computed by the worker from the analysis pass.
        let plan: Option<Vec<Segment>> = match &req.mode {
            SplitMode::Ranges { segments } => {
                if segments.is_empty() {
                    return Err(JobError::validation("segment list is empty"));
                }
                Some(normalize_segments(segments, info.duration)?)
            }
            SplitMode::Interval { seconds } => {
                let plan = build_from_interval(info.duration, *seconds)?;
                if plan.is_empty() {
                    return Err(JobError::validation(
                        "source is too short for the requested interval",
                    ));
                }
                Some(plan)
            }
            SplitMode::Scenes { threshold, .. } => {
                if !(0.0..=1.0).contains(threshold) {
                    return Err(JobError::validation("threshold must be within 0..=1"));
                }
                None
            }
        };

        let job = self.create_job(JobKind::SegmentSplit).await?;
        let id = job.id.clone();

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            split_job::run(manager, job, req, info, plan).await;
        });

        Ok(id)
    }

    /// Validate and start a frame-split job.
    pub async fn spawn_frame_split(self: &Arc<Self>, req: FrameSplitRequest) -> JobResult<JobId> {
        if !req.input.exists() {
            return Err(MediaError::FileNotFound(req.input.clone()).into());
        }
        let fps = req.fps.unwrap_or(self.config.default_frame_fps);
        if fps <= 0.0 || !fps.is_finite() {
            return Err(JobError::validation("fps must be positive"));
        }

        let job = self.create_job(JobKind::FrameSplit).await?;
        let id = job.id.clone();

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            frame_job::run(manager, job, req, fps).await;
        });

        Ok(id)
    }

    /// Validate and start an encode job.
    pub async fn spawn_encode(self: &Arc<Self>, req: EncodeRequest) -> JobResult<JobId> {
        if req.frames.is_empty() {
            return Err(MediaError::NoFramesProvided.into());
        }

        let job = self.create_job(JobKind::Encode).await?;
        let id = job.id.clone();

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            encode_job::run(manager, job, req).await;
        });

        Ok(id)
    }

    // ---- state transitions (single writer: the job's worker) --------------

    /// Transition to `Processing` and announce the pickup.
    pub async fn mark_started(&self, id: &JobId) {
        let updated = self
            .registry
            .update(id, |j| if j.state.is_terminal() { j } else { j.start() })
            .await;
        if matches!(updated, Some(ref j) if j.state == JobState::Processing) {
            self.progress.publish(id, ProgressMessage::Started).await;
        }
    }

    /// Update progress. No-op once the job is terminal; late events lose.
    pub async fn update_progress(&self, id: &JobId, percent: f32) {
        let Some(job) = self.registry.get(id).await else {
            return;
        };
        if job.state.is_terminal() {
            return;
        }
        let updated = self
            .registry
            .update(id, |j| {
                if j.state.is_terminal() {
                    j
                } else {
                    j.with_progress(percent)
                }
            })
            .await;
        if let Some(j) = updated {
            if !j.state.is_terminal() {
                self.progress
                    .publish(id, ProgressMessage::Progress { percent: j.progress })
                    .await;
            }
        }
    }

    /// Record a durably written artifact and emit its unit-of-work event.
    pub async fn record_item(&self, id: &JobId, item: JobItem, index: usize, total: usize) {
        let name = item.name.clone();
        let percent = (index as f32 / total.max(1) as f32) * 100.0;
        let updated = self
            .registry
            .update(id, |j| {
                if j.state.is_terminal() {
                    j
                } else {
                    j.with_item(item).with_progress(percent)
                }
            })
            .await;
        if let Some(j) = updated {
            if !j.state.is_terminal() {
                self.progress
                    .publish(
                        id,
                        ProgressMessage::ItemCompleted {
                            index,
                            total,
                            name,
                            percent: j.progress,
                        },
                    )
                    .await;
            }
        }
    }

    /// Transition to `Completed`.
    pub async fn complete(&self, id: &JobId) {
        let updated = self
            .registry
            .update(id, |j| if j.state.is_terminal() { j } else { j.complete() })
            .await;
        if matches!(updated, Some(ref j) if j.state == JobState::Completed) {
            self.progress.publish(id, ProgressMessage::Completed).await;
        }
    }

    /// Transition to `Failed`, capturing the cause on the record.
    pub async fn fail(&self, id: &JobId, error: impl Into<String>) {
        let error = error.into();
        warn!(job_id = %id, error = %error, "Job failed");
        let updated = self
            .registry
            .update(id, {
                let error = error.clone();
                move |j| if j.state.is_terminal() { j } else { j.fail(error) }
            })
            .await;
        if matches!(updated, Some(ref j) if j.state == JobState::Failed) {
            self.progress
                .publish(id, ProgressMessage::Failed { error })
                .await;
        }
    }

    /// Transition to `Cancelled`. Called by the worker at a checkpoint.
    pub async fn mark_cancelled(&self, id: &JobId) {
        let updated = self
            .registry
            .update(id, |j| if j.state.is_terminal() { j } else { j.cancel() })
            .await;
        if matches!(updated, Some(ref j) if j.state == JobState::Cancelled) {
            self.progress.publish(id, ProgressMessage::Cancelled).await;
        }
    }

    // ---- cancellation ------------------------------------------------------

    /// Request cooperative cancellation.
    ///
    /// Queued jobs cancel immediately; processing jobs cancel at their next
    /// checkpoint. Returns false for unknown or already-terminal jobs.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let Some(job) = self.registry.get(id).await else {
            return false;
        };
        if job.state.is_terminal() {
            return false;
        }

        {
            let cancels = self.cancels.read().await;
            if let Some(tx) = cancels.get(id.as_str()) {
                // send_replace stores the flag even with no live receivers
                tx.send_replace(true);
            }
        }

        if job.state == JobState::Queued {
            self.mark_cancelled(id).await;
        }
        info!(job_id = %id, "Cancellation requested");
        true
    }

    /// Cancellation receiver to thread into blocking engine calls.
    pub async fn cancel_receiver(&self, id: &JobId) -> Option<watch::Receiver<bool>> {
        let cancels = self.cancels.read().await;
        cancels.get(id.as_str()).map(|tx| tx.subscribe())
    }

    /// Whether cancellation was requested. Workers check between steps.
    pub async fn cancel_requested(&self, id: &JobId) -> bool {
        let cancels = self.cancels.read().await;
        cancels
            .get(id.as_str())
            .map(|tx| *tx.subscribe().borrow())
            .unwrap_or(false)
    }

    // ---- read surface ------------------------------------------------------

    /// Status snapshot; pure read.
    pub async fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.registry.get(id).await.map(|j| JobStatus::from(&j))
    }

    /// Result of a completed job; `None` until `Completed`.
    pub async fn result(&self, id: &JobId) -> Option<JobOutput> {
        let job = self.registry.get(id).await?;
        if job.state == JobState::Completed {
            Some(JobOutput::from(&job))
        } else {
            None
        }
    }

    /// Subscribe to a job's progress events.
    pub async fn subscribe(&self, id: &JobId) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.progress.subscribe(id).await
    }

    // ---- archive -----------------------------------------------------------

    /// Lazily bundle a completed job's artifacts into one archive.
    ///
    /// The archive name is derived from the job id and `prefix`; repeated
    /// requests reuse the existing file.
    pub async fn archive(&self, id: &JobId, prefix: &str) -> JobResult<PathBuf> {
        let job = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| JobError::JobNotFound(id.clone()))?;
        if job.state != JobState::Completed {
            return Err(JobError::JobNotComplete);
        }

        let dest = archive_path(&job.output_dir, prefix, job.id.as_str());
        let files: Vec<(String, PathBuf)> = job
            .items
            .iter()
            .map(|i| (i.name.clone(), i.path.clone()))
            .collect();

        let path = tokio::task::spawn_blocking(move || bundle(&files, &dest))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        Ok(path)
    }

    // ---- sweeping ----------------------------------------------------------

    /// Remove terminal jobs older than `max_age`, along with their output
    /// directories, channels and tokens. Returns the number removed.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let max_age = chrono::Duration::from_std(max_age)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));

        let mut removed = 0usize;
        for job in self.registry.snapshot().await {
            if job.state.is_terminal() && job.age(now) > max_age {
                info!(job_id = %job.id, state = job.state.as_str(), "Sweeping stale job");
                self.registry.remove(&job.id).await;
                self.progress.remove(&job.id).await;
                self.cancels.write().await.remove(job.id.as_str());
                if let Err(e) = tokio::fs::remove_dir_all(&job.output_dir).await {
                    warn!(job_id = %job.id, "Failed to remove output dir: {}", e);
                }
                removed += 1;
            }
        }
        removed
    }

    /// Run the retention sweep on the configured interval.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.sweep_interval);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                let removed = manager.sweep(manager.config.retention).await;
                if removed > 0 {
                    info!(removed, "Retention sweep finished");
                }
            }
        })
    }

    /// Look up an item of a completed job by file name.
    pub async fn find_item(&self, id: &JobId, name: &str) -> JobResult<JobItem> {
        let job = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| JobError::JobNotFound(id.clone()))?;
        job.items
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or_else(|| JobError::ItemNotFound(name.to_string()))
    }
}

/// Resolve a requested output file name to a safe `.gif` leaf name.
pub(crate) fn resolve_gif_name(requested: Option<&str>) -> String {
    let name = requested
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("animation.gif");
    if name.to_ascii_lowercase().ends_with(".gif") {
        name.to_string()
    } else {
        format!("{}.gif", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> Arc<JobManager> {
        let dir = tempfile::tempdir().unwrap();
        let config = JobsConfig {
            work_dir: dir.into_path(),
            ..Default::default()
        };
        Arc::new(JobManager::new(Arc::new(JobRegistry::new()), config))
    }

    #[tokio::test]
    async fn test_create_job_is_visible_and_queued() {
        let manager = test_manager();
        let job = manager.create_job(JobKind::Encode).await.unwrap();

        let status = manager.status(&job.id).await.unwrap();
        assert_eq!(status.state, JobState::Queued);
        assert_eq!(status.item_count, 0);
        assert!(job.output_dir.exists());
    }

    #[tokio::test]
    async fn test_terminal_jobs_ignore_late_updates() {
        let manager = test_manager();
        let job = manager.create_job(JobKind::Encode).await.unwrap();

        manager.mark_started(&job.id).await;
        manager.complete(&job.id).await;
        manager.update_progress(&job.id, 10.0).await;

        let status = manager.status(&job.id).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.progress, 100.0);
    }

    #[tokio::test]
    async fn test_fail_captures_error() {
        let manager = test_manager();
        let job = manager.create_job(JobKind::SegmentSplit).await.unwrap();
        manager.mark_started(&job.id).await;
        manager.fail(&job.id, "ffmpeg exited with status 1").await;

        let status = manager.status(&job.id).await.unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("ffmpeg exited with status 1"));

        // Failed jobs stay failed
        manager.complete(&job.id).await;
        assert_eq!(manager.status(&job.id).await.unwrap().state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_queued_job_is_immediate() {
        let manager = test_manager();
        let job = manager.create_job(JobKind::FrameSplit).await.unwrap();

        assert!(manager.cancel(&job.id).await);
        assert_eq!(manager.status(&job.id).await.unwrap().state, JobState::Cancelled);

        // Terminal jobs cannot be cancelled again
        assert!(!manager.cancel(&job.id).await);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_false() {
        let manager = test_manager();
        assert!(!manager.cancel(&JobId::new()).await);
    }

    #[tokio::test]
    async fn test_result_only_after_completion() {
        let manager = test_manager();
        let job = manager.create_job(JobKind::Encode).await.unwrap();
        manager.mark_started(&job.id).await;
        assert!(manager.result(&job.id).await.is_none());

        manager.complete(&job.id).await;
        let output = manager.result(&job.id).await.unwrap();
        assert_eq!(output.output_dir, job.output_dir);
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_terminal_jobs() {
        let manager = test_manager();
        let done = manager.create_job(JobKind::Encode).await.unwrap();
        manager.mark_started(&done.id).await;
        manager.complete(&done.id).await;

        let running = manager.create_job(JobKind::Encode).await.unwrap();
        manager.mark_started(&running.id).await;

        let removed = manager.sweep(Duration::ZERO).await;
        assert_eq!(removed, 1);
        assert!(manager.status(&done.id).await.is_none());
        assert!(!done.output_dir.exists());
        assert!(manager.status(&running.id).await.is_some());
    }

    #[tokio::test]
    async fn test_spawn_encode_rejects_empty_frames_before_job_creation() {
        let manager = test_manager();
        let err = manager
            .spawn_encode(EncodeRequest {
                frames: vec![],
                options: EncodeOptions::default(),
                file_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Media(MediaError::NoFramesProvided)));
    }

    #[tokio::test]
    async fn test_spawn_frame_split_rejects_bad_fps() {
        let manager = test_manager();
        let input = manager.config.work_dir.join("in.mp4");
        tokio::fs::write(&input, b"stub").await.unwrap();

        let err = manager
            .spawn_frame_split(FrameSplitRequest {
                input,
                fps: Some(0.0),
                scale_width: None,
                dedup: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[tokio::test]
    async fn test_find_item() {
        let manager = test_manager();
        let job = manager.create_job(JobKind::SegmentSplit).await.unwrap();
        manager.mark_started(&job.id).await;
        manager
            .record_item(
                &job.id,
                JobItem::segment("segment_001.mp4", job.output_dir.join("segment_001.mp4"), 10),
                1,
                1,
            )
            .await;

        assert!(manager.find_item(&job.id, "segment_001.mp4").await.is_ok());
        assert!(matches!(
            manager.find_item(&job.id, "nope.mp4").await,
            Err(JobError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_gif_name() {
        assert_eq!(resolve_gif_name(None), "animation.gif");
        assert_eq!(resolve_gif_name(Some("out.gif")), "out.gif");
        assert_eq!(resolve_gif_name(Some("out")), "out.gif");
        assert_eq!(resolve_gif_name(Some("../../etc/passwd")), "passwd.gif");
    }
}
