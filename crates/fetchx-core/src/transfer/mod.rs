//! Asset transfers.
//!
//! A [`TransferFacility`] starts a transfer and later reports completion or
//! interruption on a one-shot channel, or never reports at all. The
//! [`TransferExecutor`] races that report against a hard timeout and applies
//! the shared retry policy.

mod facility;
mod executor;

use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::retry::{Classify, ErrorKind};

pub use facility::{unique_path, CurlTransfers};
pub use executor::{TransferExecutor, TransferOutcome};

pub type TransferId = u64;

/// What the facility does when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Pick a fresh name (`name (1).ext`, `name (2).ext`, ...).
    #[default]
    Uniquify,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    /// Destination relative to the facility's download root.
    pub destination: PathBuf,
    pub conflict: ConflictPolicy,
}

/// Completion report for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Finished; `path` is where the asset ended up, if the facility knows.
    Completed { path: Option<PathBuf> },
    Interrupted { reason: String },
}

/// A started transfer. `completion` may never resolve.
#[derive(Debug)]
pub struct TransferHandle {
    pub id: TransferId,
    pub completion: oneshot::Receiver<TransferEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The facility refused to start (bad URL, no capacity, ...).
    #[error("transfer rejected: {0}")]
    Rejected(String),
    #[error("transfer interrupted: {0}")]
    Interrupted(String),
}

impl Classify for TransferError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Interrupted
    }
}

/// Host download facility.
pub trait TransferFacility: Send + Sync {
    /// Starts a transfer without waiting for it. A synchronous error is a prompt failure.
    fn start(&self, request: TransferRequest) -> Result<TransferHandle, TransferError>;
}
