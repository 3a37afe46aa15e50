//! The job loop: rotate providers, fetch pages, transfer items, checkpoint.
//!
//! One call to [`Orchestrator::run`] drives a job until it is done, paused or
//! stopped. The loop owns the [`JobState`] while it runs and is the only
//! writer to the store; every halt path goes through one exit routine.

mod cycle;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{FetchxConfig, TransferFailurePolicy};
use crate::control::{ControlToken, Signal};
use crate::events::{EventSink, JobEvent, ProgressStats};
use crate::job::{DoneReason, JobState, PauseReason};
use crate::metadata::{HttpMetadataSource, MetadataClient};
use crate::provider::ProviderCatalog;
use crate::rotation::RotationScheduler;
use crate::store::JobStore;
use crate::transfer::{CurlTransfers, TransferExecutor};

/// Pacing and termination knobs of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub item_delay: Duration,
    pub page_delay: Duration,
    pub cycle_delay: Duration,
    pub max_unproductive_cycles: u32,
    pub failure_policy: TransferFailurePolicy,
}

impl OrchestratorSettings {
    pub fn from_config(cfg: &FetchxConfig) -> Self {
        Self {
            item_delay: Duration::from_millis(cfg.item_delay_ms),
            page_delay: Duration::from_millis(cfg.page_delay_ms),
            cycle_delay: Duration::from_millis(cfg.cycle_delay_ms),
            max_unproductive_cycles: cfg.max_unproductive_cycles.max(1),
            failure_policy: cfg.transfer_failure_policy,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&FetchxConfig::default())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Done(DoneReason),
    Paused(PauseReason),
    /// Stop was requested; nothing was persisted after the request.
    Stopped,
}

/// Why the loop is leaving early. Internal to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Pause(PauseReason),
    Stop,
}

impl Halt {
    fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            Signal::Run => None,
            Signal::Pause => Some(Halt::Pause(PauseReason::UserRequested)),
            Signal::Stop => Some(Halt::Stop),
        }
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    catalog: Arc<ProviderCatalog>,
    metadata: MetadataClient,
    transfers: TransferExecutor,
    store: JobStore,
    events: EventSink,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<ProviderCatalog>,
        metadata: MetadataClient,
        transfers: TransferExecutor,
        store: JobStore,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            metadata,
            transfers,
            store,
            events: EventSink::new(),
            settings,
        }
    }

    /// Production wiring: HTTP metadata backend, curl transfers into `download_dir`
    /// (or the current directory), default provider catalog.
    pub fn from_config(cfg: &FetchxConfig, store: JobStore) -> Result<Self> {
        let source = HttpMetadataSource::new(&cfg.backend_url, cfg.metadata_timeout())
            .with_context(|| format!("metadata backend {}", cfg.backend_url))?;
        let root = match &cfg.download_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("resolve current directory")?,
        };
        let metadata = MetadataClient::new(Arc::new(source), cfg.metadata_retry_policy());
        let transfers = TransferExecutor::new(
            Arc::new(CurlTransfers::new(root)),
            cfg.transfer_timeout(),
            cfg.transfer_retry_policy(),
        );
        Ok(Self::new(
            Arc::new(ProviderCatalog::default()),
            metadata,
            transfers,
            store,
            OrchestratorSettings::from_config(cfg),
        ))
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Drive `job` until it is done, paused or stopped.
    pub async fn run(&self, mut job: JobState, mut token: ControlToken) -> RunExit {
        job.set_running();
        if let Err(halt) = self.checkpoint(&job, &token).await {
            return self.exit_halted(job, halt, &token).await;
        }
        tracing::info!(
            query = %job.query,
            media_type = %job.media_type,
            target = job.target_count,
            downloaded = job.total_downloaded,
            "job running"
        );
        self.events.emit(JobEvent::Running);

        let sched = RotationScheduler::new(&self.catalog);
        let mut unproductive: u32 = 0;
        loop {
            if job.target_reached() {
                return self.exit_done(job, DoneReason::TargetReached, &token).await;
            }
            if let Some(halt) = Halt::from_signal(token.current()) {
                return self.exit_halted(job, halt, &token).await;
            }
            let visits = sched.eligible_count(&mut job);
            if visits == 0 {
                return self.exit_done(job, DoneReason::ProvidersExhausted, &token).await;
            }
            if unproductive >= self.settings.max_unproductive_cycles {
                return self.exit_done(job, DoneReason::NoProgress, &token).await;
            }

            let before = job.total_downloaded;
            if let Err(halt) = self.run_cycle(&mut job, &sched, visits, &mut token).await {
                return self.exit_halted(job, halt, &token).await;
            }
            if let Err(halt) = self.checkpoint(&job, &token).await {
                return self.exit_halted(job, halt, &token).await;
            }

            if job.total_downloaded > before {
                unproductive = 0;
            } else {
                unproductive += 1;
                tracing::debug!(unproductive, "cycle transferred nothing");
            }
            token.sleep(self.settings.cycle_delay).await;
        }
    }

    /// Persist `job` unless a stop has been requested.
    async fn checkpoint(&self, job: &JobState, token: &ControlToken) -> Result<(), Halt> {
        if token.current() == Signal::Stop {
            return Err(Halt::Stop);
        }
        self.store.save(job).await.map_err(|e| {
            tracing::error!("checkpoint failed: {:#}", e);
            Halt::Pause(PauseReason::StoreUnavailable)
        })
    }

    async fn exit_done(&self, mut job: JobState, reason: DoneReason, token: &ControlToken) -> RunExit {
        if token.current() == Signal::Stop {
            return RunExit::Stopped;
        }
        job.finish(reason);
        if let Err(e) = self.store.save(&job).await {
            tracing::error!("could not persist finished job: {:#}", e);
        }
        tracing::info!(
            downloaded = job.total_downloaded,
            target = job.target_count,
            "job done: {}",
            reason
        );
        self.events.emit(JobEvent::Progress(ProgressStats::from_job(&job)));
        self.events.emit(JobEvent::Done { reason });
        RunExit::Done(reason)
    }

    async fn exit_halted(&self, mut job: JobState, halt: Halt, token: &ControlToken) -> RunExit {
        let reason = match halt {
            Halt::Stop => {
                tracing::info!(downloaded = job.total_downloaded, "job stopped");
                return RunExit::Stopped;
            }
            Halt::Pause(reason) => reason,
        };
        if token.current() == Signal::Stop {
            return RunExit::Stopped;
        }
        job.pause(reason);
        if let Err(e) = self.store.save(&job).await {
            tracing::error!("could not persist paused job: {:#}", e);
        }
        tracing::info!(downloaded = job.total_downloaded, "job paused: {}", reason);
        self.events.emit(JobEvent::Paused { reason });
        RunExit::Paused(reason)
    }
}
