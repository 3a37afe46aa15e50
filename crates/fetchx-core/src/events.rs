//! Outbound job notifications.
//!
//! Fire-and-forget over a broadcast channel: a slow or absent listener loses
//! messages, never correctness, since the store always holds the real state.

use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use crate::job::{DoneReason, JobState, PauseReason, ProviderState};
use crate::provider::Provider;

/// Snapshot of job progress (CLI-friendly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    pub downloaded: u64,
    pub target: u64,
    pub providers: BTreeMap<Provider, ProviderState>,
}

impl ProgressStats {
    pub fn from_job(job: &JobState) -> Self {
        Self {
            downloaded: job.total_downloaded,
            target: job.target_count,
            providers: job.providers.clone(),
        }
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.target == 0 {
            return 1.0;
        }
        (self.downloaded as f64 / self.target as f64).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEvent {
    Progress(ProgressStats),
    Paused { reason: PauseReason },
    Running,
    Done { reason: DoneReason },
}

const CHANNEL_CAPACITY: usize = 64;

/// Cloneable sending half; every clone feeds the same subscribers.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<JobEvent>,
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}
