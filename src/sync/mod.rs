//! Synchronization of one token: pull the fio statement, push accounts to the
//! vault, push transactions to the ledger and advance the stored watermark.
//!
//! A run aborts on the first failing step. Whatever was delivered before that
//! stays delivered; the next run resumes from the persisted watermark and the
//! downstream services absorb the repeated creates as duplicates.

mod progress;
pub mod projection;
mod workflow;

pub use progress::{SyncProgressTracker, SyncStats};
pub use workflow::{SynchronizationWorkflow, Synchronizer};

use crate::gateway::GatewayError;
use std::time::Duration;

/// Reasons a synchronization run stopped early
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),

	#[error("Synchronization exceeded deadline of {0:?}")]
	DeadlineExceeded(Duration),

	#[error("Synchronization cancelled")]
	Cancelled,
}
