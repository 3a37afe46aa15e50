//! Command surface: start, pause, resume, stop, status, acknowledge.
//!
//! At most one job exists, in the store, and at most one loop runs it. The
//! controller serializes commands behind one lock and never writes the store
//! while its own loop is live, except `stop`, which first waits for the loop
//! to exit.

use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};

use crate::control::JobControl;
use crate::events::JobEvent;
use crate::job::{JobSpec, JobSpecError, JobState, JobStatus, PauseReason};
use crate::orchestrator::{Orchestrator, RunExit};
use crate::store::JobStore;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("a job is already {0}; stop it first")]
    JobActive(JobStatus),
    #[error("no active job")]
    NoJob,
    #[error("job is not running")]
    NotRunning,
    #[error("job is not paused")]
    NotPaused,
    #[error("job is not done")]
    NotDone,
    #[error(transparent)]
    InvalidJob(#[from] JobSpecError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Loop launched by this controller.
#[derive(Debug)]
struct ActiveRun {
    control: JobControl,
    exit: watch::Receiver<Option<RunExit>>,
}

impl ActiveRun {
    fn is_live(&self) -> bool {
        self.exit.borrow().is_none() && self.exit.has_changed().is_ok()
    }
}

/// Awaitable end of one launched loop.
#[derive(Debug, Clone)]
pub struct RunHandle {
    exit: watch::Receiver<Option<RunExit>>,
}

impl RunHandle {
    /// Wait for the loop to exit. A loop task that died without reporting
    /// counts as interrupted.
    pub async fn finished(mut self) -> RunExit {
        match self.exit.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or(RunExit::Paused(PauseReason::Interrupted)),
            Err(_) => {
                tracing::error!("job loop ended without reporting");
                RunExit::Paused(PauseReason::Interrupted)
            }
        }
    }
}

#[derive(Debug)]
pub struct JobController {
    orchestrator: Arc<Orchestrator>,
    store: JobStore,
    active: Mutex<Option<ActiveRun>>,
}

impl JobController {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let store = orchestrator.store().clone();
        Self {
            orchestrator,
            store,
            active: Mutex::new(None),
        }
    }

    /// Create, persist and launch a new job. A finished job is replaced.
    pub async fn start(&self, query: &str, media_type: &str, target_count: u64) -> Result<RunHandle, ControlError> {
        let spec = JobSpec::new(query, media_type, target_count)?;
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveRun::is_live) {
            return Err(ControlError::JobActive(JobStatus::Running));
        }
        if let Some(existing) = self.store.load().await? {
            if existing.status != JobStatus::Done {
                return Err(ControlError::JobActive(existing.status));
            }
            tracing::info!(query = %existing.query, "replacing finished job");
        }
        let job = JobState::new(spec, self.orchestrator.catalog());
        self.store.save(&job).await?;
        tracing::info!(query = %job.query, media_type = %job.media_type, target = job.target_count, "job started");
        Ok(self.launch(&mut active, job))
    }

    /// Ask the loop to pause and wait until it has persisted the paused job.
    /// A job left `running` by a dead process is paused directly.
    pub async fn pause(&self) -> Result<JobState, ControlError> {
        let mut active = self.active.lock().await;
        let mut signalled = false;
        if let Some(run) = active.take().filter(ActiveRun::is_live) {
            run.control.request_pause();
            RunHandle { exit: run.exit }.finished().await;
            signalled = true;
        }
        let mut job = self.store.load().await?.ok_or(ControlError::NoJob)?;
        match job.status {
            JobStatus::Paused if signalled => Ok(job),
            JobStatus::Running => {
                job.pause(PauseReason::UserRequested);
                self.store.save(&job).await?;
                Ok(job)
            }
            JobStatus::Paused | JobStatus::Done => Err(ControlError::NotRunning),
        }
    }

    /// Reload the persisted job and relaunch the loop.
    pub async fn resume(&self) -> Result<RunHandle, ControlError> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveRun::is_live) {
            return Err(ControlError::NotPaused);
        }
        let mut job = self.store.load().await?.ok_or(ControlError::NoJob)?;
        // A `running` job with no live loop here was stranded by a dead process.
        if job.status == JobStatus::Done {
            return Err(ControlError::NotPaused);
        }
        job.set_running();
        self.store.save(&job).await?;
        tracing::info!(query = %job.query, downloaded = job.total_downloaded, "job resumed");
        Ok(self.launch(&mut active, job))
    }

    /// Halt the loop (if any) and discard the job. Returns whether anything was stopped.
    pub async fn stop(&self) -> Result<bool, ControlError> {
        let mut active = self.active.lock().await;
        let mut had_loop = false;
        if let Some(run) = active.take().filter(ActiveRun::is_live) {
            run.control.request_stop();
            RunHandle { exit: run.exit }.finished().await;
            had_loop = true;
        }
        let cleared = self.store.clear().await?;
        if had_loop || cleared {
            tracing::info!("job stopped and discarded");
        }
        Ok(had_loop || cleared)
    }

    /// Persisted snapshot; `None` means no job.
    pub async fn status(&self) -> Result<Option<JobState>, ControlError> {
        Ok(self.store.load().await?)
    }

    /// Unix seconds of the last checkpoint, if a job is stored.
    pub async fn last_saved(&self) -> Result<Option<i64>, ControlError> {
        Ok(self.store.updated_at().await?)
    }

    /// Discard a finished job.
    pub async fn acknowledge(&self) -> Result<JobState, ControlError> {
        let _active = self.active.lock().await;
        let job = self.store.load().await?.ok_or(ControlError::NoJob)?;
        if job.status != JobStatus::Done {
            return Err(ControlError::NotDone);
        }
        self.store.clear().await?;
        Ok(job)
    }

    /// Rewrite a job persisted as `running`, with no live loop in this
    /// controller, as paused with reason `interrupted`.
    pub async fn recover_stranded(&self) -> Result<Option<JobState>, ControlError> {
        let active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveRun::is_live) {
            return Ok(None);
        }
        let Some(mut job) = self.store.load().await? else {
            return Ok(None);
        };
        if job.status != JobStatus::Running {
            return Ok(None);
        }
        job.pause(PauseReason::Interrupted);
        self.store.save(&job).await?;
        tracing::warn!(query = %job.query, downloaded = job.total_downloaded, "recovered interrupted job");
        Ok(Some(job))
    }

    /// Wait for the current loop, if any, to exit.
    pub async fn wait(&self) -> Option<RunExit> {
        let handle = {
            let active = self.active.lock().await;
            active.as_ref().map(|run| RunHandle { exit: run.exit.clone() })
        };
        match handle {
            Some(handle) => Some(handle.finished().await),
            None => None,
        }
    }

    /// Subscribe to progress and lifecycle notifications.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.orchestrator.events().subscribe()
    }

    fn launch(&self, active: &mut Option<ActiveRun>, job: JobState) -> RunHandle {
        let control = JobControl::new();
        let token = control.subscribe();
        let (tx, rx) = watch::channel(None);
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let exit = orchestrator.run(job, token).await;
            let _ = tx.send(Some(exit));
        });
        *active = Some(ActiveRun {
            control,
            exit: rx.clone(),
        });
        RunHandle { exit: rx }
    }
}
