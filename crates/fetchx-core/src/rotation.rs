//! Provider rotation: round-robin over the catalog's fixed order.
//!
//! Skips providers that are exhausted or cannot serve the job's media type,
//! and marks a provider exhausted as soon as its cursor crosses a hard cap,
//! before any request is made for it.

use crate::job::JobState;
use crate::provider::{CatalogEntry, Provider, ProviderCatalog};

/// Every provider is exhausted or unsupported for this job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no eligible provider")]
pub struct NoEligibleProvider;

#[derive(Debug, Clone, Copy)]
pub struct RotationScheduler<'a> {
    catalog: &'a ProviderCatalog,
}

impl<'a> RotationScheduler<'a> {
    pub fn new(catalog: &'a ProviderCatalog) -> Self {
        Self { catalog }
    }

    /// First eligible provider at or after the job's cursor; the cursor is
    /// moved onto it. Call [`advance`](Self::advance) once it has been served.
    pub fn next(&self, job: &mut JobState) -> Result<Provider, NoEligibleProvider> {
        let n = self.catalog.len();
        if n == 0 {
            return Err(NoEligibleProvider);
        }
        let start = job.current_provider_index % n;
        for offset in 0..n {
            let idx = (start + offset) % n;
            let entry = self.catalog.entries()[idx];
            if self.check_eligible(job, &entry) {
                job.current_provider_index = idx;
                return Ok(entry.provider);
            }
        }
        Err(NoEligibleProvider)
    }

    /// Move the cursor past the current provider.
    pub fn advance(&self, job: &mut JobState) {
        let n = self.catalog.len().max(1);
        job.current_provider_index = (job.current_provider_index + 1) % n;
    }

    /// Number of providers one full rotation pass will visit.
    pub fn eligible_count(&self, job: &mut JobState) -> usize {
        self.catalog
            .entries()
            .iter()
            .filter(|entry| self.check_eligible(job, entry))
            .count()
    }

    /// True if the job's cursor for this provider still points below its caps.
    /// Applies the caps as a side effect: a provider past a cap is marked exhausted.
    fn check_eligible(&self, job: &mut JobState, entry: &CatalogEntry) -> bool {
        if !entry.provider.supports(job.media_type) {
            return false;
        }
        let Some(state) = job.providers.get_mut(&entry.provider) else {
            return false;
        };
        if state.exhausted {
            return false;
        }
        if entry.caps.reached(state.page, state.downloaded) {
            tracing::info!(
                provider = %entry.provider,
                page = state.page,
                downloaded = state.downloaded,
                "provider reached its hard cap; marking exhausted"
            );
            state.mark_exhausted();
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSpec;
    use crate::provider::ProviderCaps;

    fn job(media: &str, catalog: &ProviderCatalog) -> JobState {
        JobState::new(JobSpec::new("cats", media, 10).unwrap(), catalog)
    }

    #[test]
    fn round_robin_in_declared_order() {
        let catalog = ProviderCatalog::default();
        let sched = RotationScheduler::new(&catalog);
        let mut job = job("images", &catalog);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(sched.next(&mut job).unwrap());
            sched.advance(&mut job);
        }
        assert_eq!(
            seen,
            vec![Provider::Pexels, Provider::Unsplash, Provider::Pixabay, Provider::Pexels]
        );
    }

    #[test]
    fn next_is_stable_until_advanced() {
        let catalog = ProviderCatalog::default();
        let sched = RotationScheduler::new(&catalog);
        let mut job = job("images", &catalog);
        job.current_provider_index = 2;
        assert_eq!(sched.next(&mut job).unwrap(), Provider::Pixabay);
        assert_eq!(sched.next(&mut job).unwrap(), Provider::Pixabay);
    }

    #[test]
    fn skips_unsupported_and_exhausted() {
        let catalog = ProviderCatalog::default();
        let sched = RotationScheduler::new(&catalog);
        let mut job = job("videos", &catalog);
        job.current_provider_index = 1;
        // Unsplash has no videos.
        assert_eq!(sched.next(&mut job).unwrap(), Provider::Pixabay);
        assert_eq!(job.current_provider_index, 2);
        assert_eq!(sched.eligible_count(&mut job), 2);

        job.providers.get_mut(&Provider::Pixabay).unwrap().mark_exhausted();
        sched.advance(&mut job);
        assert_eq!(sched.next(&mut job).unwrap(), Provider::Pexels);
        assert_eq!(sched.eligible_count(&mut job), 1);
    }

    #[test]
    fn caps_mark_exhausted_before_any_request() {
        let catalog = ProviderCatalog::default();
        let sched = RotationScheduler::new(&catalog);
        let mut job = job("images", &catalog);
        job.providers.get_mut(&Provider::Unsplash).unwrap().page = 126;
        job.providers.get_mut(&Provider::Pixabay).unwrap().downloaded = 500;
        job.total_downloaded = 500;
        job.current_provider_index = 1;

        assert_eq!(sched.next(&mut job).unwrap(), Provider::Pexels);
        assert!(job.providers[&Provider::Unsplash].exhausted);
        assert!(job.providers[&Provider::Pixabay].exhausted);
    }

    #[test]
    fn no_eligible_provider_when_all_exhausted() {
        let catalog = ProviderCatalog::new([Provider::Pexels, Provider::Unsplash])
            .with_caps(Provider::Pexels, ProviderCaps { max_page: Some(1), max_items: None });
        let sched = RotationScheduler::new(&catalog);
        let mut job = job("videos", &catalog);
        job.providers.get_mut(&Provider::Pexels).unwrap().page = 2;
        assert_eq!(sched.next(&mut job), Err(NoEligibleProvider));
        assert_eq!(sched.eligible_count(&mut job), 0);
        // Unsplash is unsupported for videos, never exhausted by the scheduler.
        assert!(job.providers[&Provider::Pexels].exhausted);
        assert!(!job.providers[&Provider::Unsplash].exhausted);
    }
}
