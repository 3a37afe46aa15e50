//! Tests for the job store (in-memory and on-disk).

use crate::job::{JobSpec, JobState, JobStatus, PauseReason};
use crate::provider::{Provider, ProviderCatalog};
use crate::store::{open_memory, JobStore};

fn sample_job() -> JobState {
    let spec = JobSpec::new("mountains", "images", 10).unwrap();
    JobState::new(spec, &ProviderCatalog::default())
}

#[tokio::test]
async fn empty_slot_is_absent() {
    let store = open_memory().await.unwrap();
    assert!(store.load().await.unwrap().is_none());
    assert!(store.updated_at().await.unwrap().is_none());
    assert!(!store.clear().await.unwrap());
}

#[tokio::test]
async fn save_load_roundtrip_and_overwrite() {
    let store = open_memory().await.unwrap();
    let mut job = sample_job();
    store.save(&job).await.unwrap();
    assert_eq!(store.load().await.unwrap().as_ref(), Some(&job));

    job.record_success(Provider::Pexels);
    job.providers.get_mut(&Provider::Unsplash).unwrap().mark_exhausted();
    job.pause(PauseReason::UserRequested);
    store.save(&job).await.unwrap();

    let loaded = store.load().await.unwrap().expect("job stored");
    assert_eq!(loaded.status, JobStatus::Paused);
    assert_eq!(loaded.total_downloaded, 1);
    assert!(loaded.providers[&Provider::Unsplash].exhausted);
    assert!(store.updated_at().await.unwrap().is_some());
}

#[tokio::test]
async fn clear_removes_the_job() {
    let store = open_memory().await.unwrap();
    store.save(&sample_job()).await.unwrap();
    assert!(store.clear().await.unwrap());
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn job_survives_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state dir").join("job.db");
    let job = sample_job();
    {
        let store = JobStore::open_at(&path).await.unwrap();
        store.save(&job).await.unwrap();
        store.pool.close().await;
    }
    let reopened = JobStore::open_at(&path).await.unwrap();
    assert_eq!(reopened.load().await.unwrap(), Some(job));
}
