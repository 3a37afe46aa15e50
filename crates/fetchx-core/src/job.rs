//! The persisted record of one bulk-download job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::provider::{MediaType, Provider, ProviderCatalog};

/// Job lifecycle state. There is no error state: fatal conditions pause the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Paused,
    Done,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Done => "done",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job is paused. Every pause carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Explicit pause command.
    UserRequested,
    /// An item failed all transfer attempts under the pause-job failure policy.
    TransferFailed,
    /// A progress checkpoint could not be written.
    StoreUnavailable,
    /// The host process went away while the job was running.
    Interrupted,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PauseReason::UserRequested => "paused by user",
            PauseReason::TransferFailed => "an asset transfer failed after all retries",
            PauseReason::StoreUnavailable => "job state could not be saved",
            PauseReason::Interrupted => "the downloader stopped while the job was running",
        })
    }
}

/// Why a job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// `total_downloaded` reached `target_count`.
    TargetReached,
    /// Every provider is exhausted or cannot serve the media type.
    ProvidersExhausted,
    /// Too many consecutive cycles without a single successful transfer.
    NoProgress,
}

impl DoneReason {
    /// True when the caller got everything requested.
    pub fn target_met(self) -> bool {
        matches!(self, DoneReason::TargetReached)
    }
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DoneReason::TargetReached => "target reached",
            DoneReason::ProvidersExhausted => "all providers exhausted",
            DoneReason::NoProgress => "no more usable content",
        })
    }
}

/// Pagination cursor and counters for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    /// Next page to request (1-based).
    pub page: u32,
    pub per_page: u32,
    /// Items of `page` already consumed; non-zero only when a job halted mid-page.
    #[serde(default)]
    pub offset: u32,
    pub downloaded: u64,
    /// Monotonic: once set, the provider is never queried again in this job.
    pub exhausted: bool,
}

impl ProviderState {
    pub fn new(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            offset: 0,
            downloaded: 0,
            exhausted: false,
        }
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// Move the cursor to the next page once the current one is fully consumed.
    pub fn finish_page(&mut self) {
        self.page = self.page.saturating_add(1);
        self.offset = 0;
    }
}

/// Rejected `start` input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobSpecError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("target count must be at least 1")]
    ZeroTarget,
}

/// Validated caller input for a new job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub query: String,
    pub media_type: MediaType,
    pub target_count: u64,
}

impl JobSpec {
    pub fn new(query: &str, media_type: &str, target_count: u64) -> Result<Self, JobSpecError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(JobSpecError::EmptyQuery);
        }
        if target_count == 0 {
            return Err(JobSpecError::ZeroTarget);
        }
        Ok(Self {
            query: query.to_string(),
            media_type: MediaType::normalize(media_type),
            target_count,
        })
    }
}

/// Full job record; serialized as one blob into the job store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    pub query: String,
    pub media_type: MediaType,
    pub target_count: u64,
    pub total_downloaded: u64,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<DoneReason>,
    /// Rotation cursor into the catalog order.
    pub current_provider_index: usize,
    pub providers: BTreeMap<Provider, ProviderState>,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: i64,
}

impl JobState {
    /// A fresh running job with one cursor per catalog provider.
    pub fn new(spec: JobSpec, catalog: &ProviderCatalog) -> Self {
        let providers = catalog
            .providers()
            .map(|p| (p, ProviderState::new(p.per_page(spec.media_type))))
            .collect();
        Self {
            query: spec.query,
            media_type: spec.media_type,
            target_count: spec.target_count,
            total_downloaded: 0,
            status: JobStatus::Running,
            pause_reason: None,
            done_reason: None,
            current_provider_index: 0,
            providers,
            created_at: unix_timestamp(),
        }
    }

    pub fn target_reached(&self) -> bool {
        self.total_downloaded >= self.target_count
    }

    pub fn remaining(&self) -> u64 {
        self.target_count.saturating_sub(self.total_downloaded)
    }

    /// Count one transferred asset against both the provider and the job.
    pub fn record_success(&mut self, provider: Provider) {
        if let Some(state) = self.providers.get_mut(&provider) {
            state.downloaded += 1;
            self.total_downloaded += 1;
        }
    }

    /// `total_downloaded` equals the sum of per-provider counters.
    pub fn is_consistent(&self) -> bool {
        self.total_downloaded == self.providers.values().map(|p| p.downloaded).sum::<u64>()
    }

    pub fn all_exhausted(&self) -> bool {
        self.providers.values().all(|p| p.exhausted)
    }

    pub fn set_running(&mut self) {
        self.status = JobStatus::Running;
        self.pause_reason = None;
    }

    pub fn pause(&mut self, reason: PauseReason) {
        self.status = JobStatus::Paused;
        self.pause_reason = Some(reason);
    }

    pub fn finish(&mut self, reason: DoneReason) {
        self.status = JobStatus::Done;
        self.pause_reason = None;
        self.done_reason = Some(reason);
    }
}

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(target: u64) -> JobState {
        let spec = JobSpec::new("cats", "images", target).unwrap();
        JobState::new(spec, &ProviderCatalog::default())
    }

    #[test]
    fn spec_validation() {
        assert_eq!(JobSpec::new("   ", "images", 3), Err(JobSpecError::EmptyQuery));
        assert_eq!(JobSpec::new("cats", "images", 0), Err(JobSpecError::ZeroTarget));
        let spec = JobSpec::new("  red cars ", "clips", 3).unwrap();
        assert_eq!(spec.query, "red cars");
        assert_eq!(spec.media_type, MediaType::Images);
    }

    #[test]
    fn new_job_has_catalog_page_sizes() {
        let spec = JobSpec::new("waves", "videos", 10).unwrap();
        let job = JobState::new(spec, &ProviderCatalog::default());
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.providers[&Provider::Pexels].per_page, 30);
        assert_eq!(job.providers[&Provider::Pixabay].per_page, 50);
        assert_eq!(job.providers[&Provider::Unsplash].per_page, 30);
        assert!(job.providers.values().all(|p| p.page == 1 && !p.exhausted));
    }

    #[test]
    fn record_success_keeps_counters_consistent() {
        let mut job = job(3);
        job.record_success(Provider::Pexels);
        job.record_success(Provider::Pixabay);
        job.record_success(Provider::Pixabay);
        assert_eq!(job.total_downloaded, 3);
        assert_eq!(job.providers[&Provider::Pixabay].downloaded, 2);
        assert!(job.is_consistent());
        assert!(job.target_reached());
        assert_eq!(job.remaining(), 0);
    }

    #[test]
    fn status_transitions_carry_reasons() {
        let mut job = job(3);
        job.pause(PauseReason::UserRequested);
        assert_eq!(job.status, JobStatus::Paused);
        assert_eq!(job.pause_reason, Some(PauseReason::UserRequested));
        job.set_running();
        assert_eq!(job.pause_reason, None);
        job.finish(DoneReason::ProvidersExhausted);
        assert_eq!(job.status, JobStatus::Done);
        assert!(!job.done_reason.unwrap().target_met());
    }

    #[test]
    fn serializes_with_provider_names_as_keys() {
        let job = job(2);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["media_type"], "images");
        assert_eq!(json["providers"]["unsplash"]["per_page"], 30);
        let back: JobState = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn finish_page_resets_offset() {
        let mut state = ProviderState::new(80);
        state.offset = 7;
        state.finish_page();
        assert_eq!((state.page, state.offset), (2, 0));
    }
}
