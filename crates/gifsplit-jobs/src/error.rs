//! Job execution error types.

use thiserror::Error;

use gifsplit_models::{JobId, PlanError};
use gifsplit_media::MediaError;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    /// Request rejected before any work started; never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Segment plan rejected before any work started.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// External decode/encode engine failure; fatal to the affected job.
    #[error("Encode engine error: {0}")]
    Media(#[from] MediaError),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Job is not complete")]
    JobNotComplete,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for errors detected before a job record exists.
    pub fn is_validation(&self) -> bool {
        matches!(self, JobError::Validation(_) | JobError::Plan(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_errors_are_validation() {
        let err = JobError::from(PlanError::InvalidInterval(0.0));
        assert!(err.is_validation());

        let err = JobError::from(MediaError::NoFramesProvided);
        assert!(!err.is_validation());
    }
}
