//! Process wide counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Import counters shared by every actor and workflow run.
#[derive(Debug, Default)]
pub struct Metrics {
    tokens_created: AtomicU64,
    tokens_deleted: AtomicU64,
    synchronizations_started: AtomicU64,
    synchronizations_failed: AtomicU64,
    synchronization_millis: AtomicU64,
    accounts_exported: AtomicU64,
    transactions_exported: AtomicU64,
    transfers_exported: AtomicU64,
}

/// Point in time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub tokens_created: u64,
    pub tokens_deleted: u64,
    pub synchronizations_started: u64,
    pub synchronizations_failed: u64,
    pub synchronization_millis: u64,
    pub accounts_exported: u64,
    pub transactions_exported: u64,
    pub transfers_exported: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_created(&self) {
        self.tokens_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_deleted(&self) {
        self.tokens_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn synchronization_started(&self) {
        self.synchronizations_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the end of a run and how long it took.
    pub fn synchronization_finished(&self, elapsed: Duration, failed: bool) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.synchronization_millis
            .fetch_add(millis, Ordering::Relaxed);
        if failed {
            self.synchronizations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn account_exported(&self) {
        self.accounts_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transaction_exported(&self, transfers: usize) {
        self.transactions_exported.fetch_add(1, Ordering::Relaxed);
        self.transfers_exported
            .fetch_add(transfers as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_created: self.tokens_created.load(Ordering::Relaxed),
            tokens_deleted: self.tokens_deleted.load(Ordering::Relaxed),
            synchronizations_started: self.synchronizations_started.load(Ordering::Relaxed),
            synchronizations_failed: self.synchronizations_failed.load(Ordering::Relaxed),
            synchronization_millis: self.synchronization_millis.load(Ordering::Relaxed),
            accounts_exported: self.accounts_exported.load(Ordering::Relaxed),
            transactions_exported: self.transactions_exported.load(Ordering::Relaxed),
            transfers_exported: self.transfers_exported.load(Ordering::Relaxed),
        }
    }
}
