//! Job records and the job state machine.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of split/encode work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Split a source video into time-range segments
    SegmentSplit,
    /// Split a source into individual frames
    FrameSplit,
    /// Encode an ordered frame sequence into an animated GIF
    Encode,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SegmentSplit => "segment_split",
            JobKind::FrameSplit => "frame_split",
            JobKind::Encode => "encode",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job record exists but the worker has not started
    #[default]
    Queued,
    /// Job is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed; `Job::error` holds the cause
    Failed,
    /// Job was cancelled cooperatively
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Terminal states are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// A single produced artifact (segment file or frame file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobItem {
    /// Artifact file name, unique within the job's output directory
    pub name: String,

    /// Full path to the artifact
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Pixel width, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Pixel height, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Display delay in hundredths of a second (frames only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_cs: Option<u16>,
}

impl JobItem {
    /// Create a segment artifact (no geometry, no delay).
    pub fn segment(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            width: None,
            height: None,
            delay_cs: None,
        }
    }

    /// Create a frame artifact.
    pub fn frame(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        size: u64,
        width: u32,
        height: u32,
        delay_cs: u16,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            width: Some(width),
            height: Some(height),
            delay_cs: Some(delay_cs),
        }
    }
}

/// A unit of asynchronous split or encode work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Kind of work
    pub kind: JobKind,

    /// Job state
    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100), non-decreasing while processing
    #[serde(default)]
    pub progress: f32,

    /// Creation timestamp; used for staleness-based sweeping
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Directory owned by this job where artifacts are written
    pub output_dir: PathBuf,

    /// Ordered produced artifacts
    #[serde(default)]
    pub items: Vec<JobItem>,

    /// Error message (only when failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a new queued job owning `output_dir`.
    pub fn new(kind: JobKind, output_dir: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            state: JobState::Queued,
            progress: 0.0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            output_dir: output_dir.into(),
            items: Vec::new(),
            error: None,
        }
    }

    /// Start processing the job.
    pub fn start(mut self) -> Self {
        self.state = JobState::Processing;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as completed.
    pub fn complete(mut self) -> Self {
        self.state = JobState::Completed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self.progress = 100.0;
        self
    }

    /// Mark the job as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as cancelled.
    pub fn cancel(mut self) -> Self {
        self.state = JobState::Cancelled;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Update progress. Never decreases and never exceeds 100.
    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = progress.clamp(self.progress, 100.0);
        self.updated_at = Utc::now();
        self
    }

    /// Append a produced artifact.
    pub fn with_item(mut self, item: JobItem) -> Self {
        self.items.push(item);
        self.updated_at = Utc::now();
        self
    }

    /// Age of the job since creation.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Read-only status snapshot served to pollers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatus {
    pub state: JobState,
    pub progress: f32,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatus {
    fn from(job: &Job) -> Self {
        Self {
            state: job.state,
            progress: job.progress,
            item_count: job.items.len(),
            error: job.error.clone(),
        }
    }
}

/// Output of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobOutput {
    pub items: Vec<JobItem>,
    pub output_dir: PathBuf,
}

impl From<&Job> for JobOutput {
    fn from(job: &Job) -> Self {
        Self {
            items: job.items.clone(),
            output_dir: job.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new(JobKind::SegmentSplit, "/tmp/out/abc");

        assert_eq!(job.kind, JobKind::SegmentSplit);
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.progress, 0.0);
        assert!(job.items.is_empty());
    }

    #[test]
    fn test_job_state_transitions() {
        let job = Job::new(JobKind::Encode, "/tmp/out/abc");

        let started = job.start();
        assert_eq!(started.state, JobState::Processing);
        assert!(started.started_at.is_some());

        let completed = started.complete();
        assert_eq!(completed.state, JobState::Completed);
        assert_eq!(completed.progress, 100.0);
        assert!(completed.state.is_terminal());
    }

    #[test]
    fn test_job_failure_keeps_error() {
        let job = Job::new(JobKind::FrameSplit, "/tmp/out/abc").start();
        let failed = job.fail("ffmpeg exited with status 1");

        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error.as_deref(), Some("ffmpeg exited with status 1"));
    }

    #[test]
    fn test_progress_never_decreases() {
        let job = Job::new(JobKind::FrameSplit, "/tmp/out/abc")
            .start()
            .with_progress(40.0)
            .with_progress(25.0);

        assert_eq!(job.progress, 40.0);
    }

    #[test]
    fn test_status_snapshot() {
        let job = Job::new(JobKind::SegmentSplit, "/tmp/out/abc")
            .start()
            .with_item(JobItem::segment("segment_001.mp4", "/tmp/out/abc/segment_001.mp4", 1024))
            .with_progress(50.0);

        let status = JobStatus::from(&job);
        assert_eq!(status.state, JobState::Processing);
        assert_eq!(status.item_count, 1);
        assert_eq!(status.progress, 50.0);
    }
}
