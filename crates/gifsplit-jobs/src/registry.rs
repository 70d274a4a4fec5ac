//! In-process job registry.
//!
//! A thread-safe map from job id to job record, owned by the manager and
//! injectable so tests can substitute an isolated instance. Records are
//! updated by whole-record replacement under the write lock; readers never
//! observe a partially mutated job.

use std::collections::HashMap;

use tokio::sync::RwLock;

use gifsplit_models::{Job, JobId};

/// Thread-safe store of job records.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created job.
    pub async fn insert(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.as_str().to_string(), job);
    }

    /// Snapshot a job record.
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(id.as_str()).cloned()
    }

    /// Replace a job record with `f(record)`. Returns the updated record.
    pub async fn update<F>(&self, id: &JobId, f: F) -> Option<Job>
    where
        F: FnOnce(Job) -> Job,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.remove(id.as_str())?;
        let updated = f(job);
        jobs.insert(id.as_str().to_string(), updated.clone());
        Some(updated)
    }

    /// Remove a job record.
    pub async fn remove(&self, id: &JobId) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id.as_str())
    }

    /// Snapshot all job records.
    pub async fn snapshot(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        jobs.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifsplit_models::{JobKind, JobState};

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = JobRegistry::new();
        let job = Job::new(JobKind::Encode, "/tmp/x");
        let id = job.id.clone();

        registry.insert(job).await;
        let fetched = registry.get(&id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.state, JobState::Queued);
    }

    #[tokio::test]
    async fn test_update_replaces_whole_record() {
        let registry = JobRegistry::new();
        let job = Job::new(JobKind::Encode, "/tmp/x");
        let id = job.id.clone();
        registry.insert(job).await;

        let updated = registry.update(&id, |j| j.start()).await.unwrap();
        assert_eq!(updated.state, JobState::Processing);
        assert_eq!(registry.get(&id).await.unwrap().state, JobState::Processing);
    }

    #[tokio::test]
    async fn test_update_unknown_job_is_none() {
        let registry = JobRegistry::new();
        let missing = JobId::new();
        assert!(registry.update(&missing, |j| j).await.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = JobRegistry::new();
        let job = Job::new(JobKind::FrameSplit, "/tmp/x");
        let id = job.id.clone();
        registry.insert(job).await;

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.get(&id).await.is_none());
        assert!(registry.is_empty().await);
    }
}
