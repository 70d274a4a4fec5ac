//! Shared data models for the gifsplit pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job items and the job state machine
//! - Time expression parsing
//! - Segment planning (explicit lists and fixed intervals)
//! - Scene boundaries

pub mod encoding;
pub mod job;
pub mod scene;
pub mod segment;
pub mod timestamp;

// Re-export common types
pub use encoding::{EncodeOptions, FitPolicy, Quality};
pub use job::{Job, JobId, JobItem, JobKind, JobOutput, JobState, JobStatus};
pub use scene::Scene;
pub use segment::{
    build_from_interval, normalize_segments, PlanError, RawSegment, Segment, MIN_SEGMENT_SECS,
};
pub use timestamp::{format_seconds, parse_time, TimeValue};
