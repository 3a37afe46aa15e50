use crate::cli::commands::render_status;
use fetchx_core::job::{DoneReason, JobSpec, JobState, PauseReason};
use fetchx_core::provider::{Provider, ProviderCatalog};

fn job(media: &str) -> JobState {
    JobState::new(JobSpec::new("cats", media, 4).unwrap(), &ProviderCatalog::default())
}

#[test]
fn status_shows_progress_and_providers() {
    let mut job = job("images");
    job.record_success(Provider::Pexels);
    job.providers.get_mut(&Provider::Pixabay).unwrap().mark_exhausted();
    let out = render_status(&job, Some(42));
    assert!(out.contains("\"cats\" (images)"));
    assert!(out.contains("1/4 (25.0%), 3 to go"));
    assert!(out.lines().any(|l| l.starts_with("UPDATED") && l.ends_with("42s ago")));
    assert!(out.lines().any(|l| l.starts_with("pixabay") && l.ends_with("exhausted")));
    assert!(out.lines().any(|l| l.starts_with("pexels") && l.ends_with("active")));
}

#[test]
fn status_shows_reasons() {
    let mut job = job("videos");
    job.pause(PauseReason::Interrupted);
    assert!(render_status(&job, None).contains("paused (the downloader stopped while the job was running)"));
    assert!(!render_status(&job, None).contains("UPDATED"));
    assert!(render_status(&job, None)
        .lines()
        .any(|l| l.starts_with("unsplash") && l.ends_with("unsupported")));

    job.finish(DoneReason::ProvidersExhausted);
    assert!(render_status(&job, None).contains("done (all providers exhausted)"));
}
