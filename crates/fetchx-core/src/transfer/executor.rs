//! One asset transfer with a hard wall-clock timeout and bounded retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{ConflictPolicy, TransferError, TransferEvent, TransferFacility, TransferRequest};
use crate::control::ControlToken;
use crate::retry::{run_with_retry, RetryPolicy};

/// Successful result of [`TransferExecutor::transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The facility reported completion.
    Completed(Option<PathBuf>),
    /// No report arrived before the timeout; counted as done so the job keeps moving.
    /// A transfer that fails after this point is invisible to the counters.
    AssumedComplete,
}

pub struct TransferExecutor {
    facility: Arc<dyn TransferFacility>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TransferExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferExecutor")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TransferExecutor {
    pub fn new(facility: Arc<dyn TransferFacility>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            facility,
            timeout,
            retry,
        }
    }

    /// Transfer `url` to `destination` (relative to the facility root).
    ///
    /// Prompt failures are retried per policy; the error of the last attempt is
    /// returned once the policy gives up or `token` asks the job to halt.
    pub async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        token: &mut ControlToken,
    ) -> Result<TransferOutcome, TransferError> {
        run_with_retry(&self.retry, token, move |attempt| self.attempt(url, destination, attempt)).await
    }

    async fn attempt(&self, url: &str, destination: &Path, attempt: u32) -> Result<TransferOutcome, TransferError> {
        let deadline = Instant::now() + self.timeout;
        let handle = self.facility.start(TransferRequest {
            url: url.to_string(),
            destination: destination.to_path_buf(),
            conflict: ConflictPolicy::Uniquify,
        })?;
        tracing::debug!(transfer_id = handle.id, attempt, dest = %destination.display(), "transfer started");

        match tokio::time::timeout_at(deadline, handle.completion).await {
            Ok(Ok(TransferEvent::Completed { path })) => Ok(TransferOutcome::Completed(path)),
            Ok(Ok(TransferEvent::Interrupted { reason })) => Err(TransferError::Interrupted(reason)),
            Ok(Err(_)) => {
                // Facility dropped the notifier without reporting: same as never reporting.
                tokio::time::sleep_until(deadline).await;
                tracing::warn!(transfer_id = handle.id, dest = %destination.display(), "no completion report; assuming done");
                Ok(TransferOutcome::AssumedComplete)
            }
            Err(_) => {
                tracing::warn!(
                    transfer_id = handle.id,
                    timeout_secs = self.timeout.as_secs_f64(),
                    dest = %destination.display(),
                    "transfer timed out; assuming done"
                );
                Ok(TransferOutcome::AssumedComplete)
            }
        }
    }
}
