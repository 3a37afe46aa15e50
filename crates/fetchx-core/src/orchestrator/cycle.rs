//! One rotation cycle and one provider page.

use crate::config::TransferFailurePolicy;
use crate::control::ControlToken;
use crate::events::{JobEvent, ProgressStats};
use crate::job::{JobState, PauseReason};
use crate::metadata::PageRequest;
use crate::paths;
use crate::provider::Provider;
use crate::rotation::RotationScheduler;
use crate::transfer::TransferOutcome;

use super::{Halt, Orchestrator};

impl Orchestrator {
    /// Visit up to `visits` providers, one page each.
    pub(super) async fn run_cycle(
        &self,
        job: &mut JobState,
        sched: &RotationScheduler<'_>,
        visits: usize,
        token: &mut ControlToken,
    ) -> Result<(), Halt> {
        for _ in 0..visits {
            if job.target_reached() {
                break;
            }
            if let Some(halt) = Halt::from_signal(token.current()) {
                return Err(halt);
            }
            let Ok(provider) = sched.next(job) else {
                break;
            };
            // A halt inside the page leaves the cursor on this provider so a
            // resume continues the same page.
            self.serve_page(job, provider, token).await?;
            sched.advance(job);
            self.checkpoint(job, token).await?;
        }
        Ok(())
    }

    /// Fetch the provider's next page and transfer its items in order.
    async fn serve_page(&self, job: &mut JobState, provider: Provider, token: &mut ControlToken) -> Result<(), Halt> {
        let Some(state) = job.providers.get(&provider) else {
            return Ok(());
        };
        let req = PageRequest {
            provider,
            media_type: job.media_type,
            query: job.query.clone(),
            page: state.page,
            per_page: state.per_page,
        };
        let start = state.offset as usize;

        let page = match self.metadata.fetch_page(&req, token).await {
            Ok(page) => page,
            Err(e) => {
                // Retries were cut short; the same page is requested on resume.
                if let Some(halt) = Halt::from_signal(token.current()) {
                    tracing::debug!(%provider, page = req.page, "fetch abandoned: {}", e);
                    return Err(halt);
                }
                tracing::warn!(%provider, page = req.page, "skipping provider this cycle: {}", e);
                return Ok(());
            }
        };
        if page.is_end_of_results() {
            tracing::info!(%provider, page = req.page, "end of results; provider exhausted");
            set_exhausted(job, provider);
            return Ok(());
        }
        tracing::debug!(%provider, page = req.page, items = page.items.len(), resume_at = start, "serving page");

        let caps = self.catalog.caps(provider);
        for (idx, item) in page.items.iter().enumerate().skip(start) {
            if job.target_reached() {
                set_offset(job, provider, idx);
                return Ok(());
            }
            if let Some(halt) = Halt::from_signal(token.current()) {
                set_offset(job, provider, idx);
                return Err(halt);
            }
            if let Some(state) = job.providers.get(&provider) {
                if caps.reached(state.page, state.downloaded) {
                    tracing::info!(%provider, downloaded = state.downloaded, "provider cap reached mid-page");
                    set_offset(job, provider, idx);
                    set_exhausted(job, provider);
                    return Ok(());
                }
            }

            let (Some(id), Some(url)) = (item.id.as_deref(), item.url.as_deref()) else {
                tracing::debug!(%provider, index = idx, "item without id or url; skipped");
                set_offset(job, provider, idx + 1);
                continue;
            };
            let dest = paths::destination(&job.query, provider, id, job.media_type);

            match self.transfers.transfer(url, &dest, token).await {
                Ok(outcome) => {
                    if let TransferOutcome::Completed(Some(path)) = &outcome {
                        tracing::debug!(%provider, id, path = %path.display(), "item transferred");
                    }
                    job.record_success(provider);
                    set_offset(job, provider, idx + 1);
                    self.checkpoint(job, token).await?;
                    self.events.emit(JobEvent::Progress(ProgressStats::from_job(job)));
                }
                Err(e) => {
                    // Retries were cut short; the item is attempted again on resume.
                    if let Some(halt) = Halt::from_signal(token.current()) {
                        tracing::debug!(%provider, id, "transfer abandoned: {}", e);
                        set_offset(job, provider, idx);
                        return Err(halt);
                    }
                    match self.settings.failure_policy {
                        TransferFailurePolicy::SkipItem => {
                            tracing::warn!(%provider, id, "transfer failed, skipping item: {}", e);
                            set_offset(job, provider, idx + 1);
                        }
                        TransferFailurePolicy::PauseJob => {
                            tracing::warn!(%provider, id, "transfer failed, pausing job: {}", e);
                            // The failed item is retried on resume.
                            set_offset(job, provider, idx);
                            return Err(Halt::Pause(PauseReason::TransferFailed));
                        }
                    }
                }
            }
            token.sleep(self.settings.item_delay).await;
        }

        if let Some(state) = job.providers.get_mut(&provider) {
            state.finish_page();
        }
        token.sleep(self.settings.page_delay).await;
        Ok(())
    }
}

fn set_offset(job: &mut JobState, provider: Provider, offset: usize) {
    if let Some(state) = job.providers.get_mut(&provider) {
        state.offset = u32::try_from(offset).unwrap_or(u32::MAX);
    }
}

fn set_exhausted(job: &mut JobState, provider: Provider) {
    if let Some(state) = job.providers.get_mut(&provider) {
        state.mark_exhausted();
    }
}
