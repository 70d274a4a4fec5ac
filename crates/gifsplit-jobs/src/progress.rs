//! Per-job progress channels.
//!
//! Each job gets a broadcast channel; the worker publishes, any number of
//! listeners subscribe without the worker knowing who is listening. Events
//! for a job are published from its single worker in step order, so
//! percentages arrive non-decreasing.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use gifsplit_models::JobId;

/// Buffered events per job before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Message published while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    /// Worker picked the job up
    Started,
    /// Coarse progress without an associated artifact
    Progress { percent: f32 },
    /// One discrete unit of work finished and its artifact is durable
    ItemCompleted {
        index: usize,
        total: usize,
        name: String,
        percent: f32,
    },
    /// Job reached `Completed`
    Completed,
    /// Job reached `Failed`
    Failed { error: String },
    /// Job reached `Cancelled`
    Cancelled,
}

/// A progress event for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub message: ProgressMessage,
}

/// Registry of per-job broadcast channels.
#[derive(Debug, Default)]
pub struct ProgressHub {
    channels: RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the channel for a job. Called once at job creation.
    pub async fn register(&self, job_id: &JobId) {
        let mut channels = self.channels.write().await;
        channels
            .entry(job_id.as_str().to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
    }

    /// Subscribe to a job's events. `None` for unknown jobs.
    pub async fn subscribe(&self, job_id: &JobId) -> Option<broadcast::Receiver<ProgressEvent>> {
        let channels = self.channels.read().await;
        channels.get(job_id.as_str()).map(|tx| tx.subscribe())
    }

    /// Publish an event for a job. Dropped silently when nobody listens.
    pub async fn publish(&self, job_id: &JobId, message: ProgressMessage) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(job_id.as_str()) {
            debug!(job_id = %job_id, ?message, "Publishing progress event");
            let _ = tx.send(ProgressEvent {
                job_id: job_id.clone(),
                message,
            });
        }
    }

    /// Drop a job's channel.
    pub async fn remove(&self, job_id: &JobId) {
        let mut channels = self.channels.write().await;
        channels.remove(job_id.as_str());
    }
}
