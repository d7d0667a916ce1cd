//! Progress tracking for a synchronization run.
//!
//! The tracker knows every transfer id the run intends to deliver and records
//! which of them the ledger has accepted. From that it derives the watermark
//! that is safe to persist: the highest transfer id such that it and every
//! lower transfer id of the run have been accepted. A transaction that carries
//! a late transfer therefore never lets the watermark skip over an earlier
//! transfer still waiting in a later transaction.

use crate::gateway::{Delivery, Transaction};
use std::collections::HashSet;
use tracing::info;

/// Service for tracking synchronization progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Watermark the run started from
    start_watermark: u64,
    /// Transfer ids of the run in processing order
    pending: Vec<u64>,
    /// Transfer ids confirmed by the ledger
    accepted: HashSet<u64>,
    /// Length of the accepted prefix of `pending`
    accepted_prefix: usize,
    /// Highest watermark written to storage during this run
    persisted: u64,
    accounts_created: usize,
    accounts_existing: usize,
    transactions_created: usize,
    transactions_duplicate: usize,
}

impl SyncProgressTracker {
    /// Create a tracker for the given transactions.
    pub fn new(start_watermark: u64, transactions: &[Transaction]) -> Self {
        let mut pending: Vec<u64> = transactions
            .iter()
            .flat_map(|transaction| transaction.transfers.iter().map(|t| t.sequence))
            .collect();
        pending.sort_unstable();

        Self {
            start_watermark,
            pending,
            accepted: HashSet::new(),
            accepted_prefix: 0,
            persisted: start_watermark,
            accounts_created: 0,
            accounts_existing: 0,
            transactions_created: 0,
            transactions_duplicate: 0,
        }
    }

    pub fn record_account(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Created => self.accounts_created += 1,
            Delivery::Duplicate => self.accounts_existing += 1,
        }
    }

    /// Record a transaction the ledger accepted
    pub fn record_transaction(&mut self, transaction: &Transaction, delivery: Delivery) {
        match delivery {
            Delivery::Created => self.transactions_created += 1,
            Delivery::Duplicate => self.transactions_duplicate += 1,
        }

        self.accepted
            .extend(transaction.transfers.iter().map(|t| t.sequence));
        while self
            .pending
            .get(self.accepted_prefix)
            .is_some_and(|sequence| self.accepted.contains(sequence))
        {
            self.accepted_prefix += 1;
        }
    }

    /// Watermark fully covered by accepted transactions, never below the start.
    pub fn durable_watermark(&self) -> u64 {
        match self.accepted_prefix {
            0 => self.start_watermark,
            n => self.pending[n - 1].max(self.start_watermark),
        }
    }

    /// Watermark that should be written now, if it moved past the last write.
    pub fn next_persist(&self) -> Option<u64> {
        let candidate = self.durable_watermark();
        (candidate > self.persisted).then_some(candidate)
    }

    pub fn record_persisted(&mut self, watermark: u64) {
        self.persisted = self.persisted.max(watermark);
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            start_watermark: self.start_watermark,
            persisted_watermark: self.persisted,
            transfers_total: self.pending.len(),
            transfers_accepted: self.accepted_prefix,
            accounts_created: self.accounts_created,
            accounts_existing: self.accounts_existing,
            transactions_created: self.transactions_created,
            transactions_duplicate: self.transactions_duplicate,
        }
    }

    pub fn log_progress(&self, token_id: &str) {
        info!("{} ~ {}", token_id, self.get_stats().summary());
    }
}

/// Statistics about one synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub start_watermark: u64,
    pub persisted_watermark: u64,
    pub transfers_total: usize,
    pub transfers_accepted: usize,
    pub accounts_created: usize,
    pub accounts_existing: usize,
    pub transactions_created: usize,
    pub transactions_duplicate: usize,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "Sync from {} to {}: {}/{} transfers, {} new accounts, {} new transactions{}",
            self.start_watermark,
            self.persisted_watermark,
            self.transfers_accepted,
            self.transfers_total,
            self.accounts_created,
            self.transactions_created,
            if self.transactions_duplicate == 0 {
                String::new()
            } else {
                format!(" ({} already known)", self.transactions_duplicate)
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AccountRef, Transfer};

    fn transaction(id: &str, sequences: &[u64]) -> Transaction {
        let account = AccountRef {
            tenant: "demo".to_string(),
            name: "A".to_string(),
        };
        Transaction {
            id: id.to_string(),
            transfers: sequences
                .iter()
                .map(|&sequence| Transfer {
                    sequence,
                    id: sequence.to_string(),
                    credit: account.clone(),
                    debit: account.clone(),
                    value_date: String::new(),
                    amount: "1".to_string(),
                    currency: "CZK".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_contiguous_transactions_advance_to_max() {
        let transactions = vec![transaction("A", &[10, 12]), transaction("B", &[13])];
        let mut tracker = SyncProgressTracker::new(5, &transactions);
        assert_eq!(tracker.next_persist(), None);

        tracker.record_transaction(&transactions[0], Delivery::Created);
        assert_eq!(tracker.next_persist(), Some(12));
        tracker.record_persisted(12);
        assert_eq!(tracker.next_persist(), None);

        tracker.record_transaction(&transactions[1], Delivery::Duplicate);
        assert_eq!(tracker.next_persist(), Some(13));

        let stats = tracker.get_stats();
        assert_eq!(stats.transactions_created, 1);
        assert_eq!(stats.transactions_duplicate, 1);
        assert_eq!(stats.transfers_accepted, 3);
    }

    #[test]
    fn test_watermark_waits_for_interleaved_transfer() {
        let transactions = vec![transaction("A", &[3, 5]), transaction("B", &[4])];
        let mut tracker = SyncProgressTracker::new(0, &transactions);

        tracker.record_transaction(&transactions[0], Delivery::Created);
        assert_eq!(tracker.durable_watermark(), 3);

        tracker.record_transaction(&transactions[1], Delivery::Created);
        assert_eq!(tracker.durable_watermark(), 5);
    }

    #[test]
    fn test_watermark_never_drops_below_start() {
        let transactions = vec![transaction("A", &[2])];
        let mut tracker = SyncProgressTracker::new(9, &transactions);
        tracker.record_transaction(&transactions[0], Delivery::Duplicate);

        assert_eq!(tracker.durable_watermark(), 9);
        assert_eq!(tracker.next_persist(), None);
    }

    #[test]
    fn test_summary() {
        let stats = SyncStats {
            start_watermark: 0,
            persisted_watermark: 12,
            transfers_total: 2,
            transfers_accepted: 2,
            accounts_created: 1,
            transactions_created: 1,
            ..Default::default()
        };
        assert_eq!(
            stats.summary(),
            "Sync from 0 to 12: 2/2 transfers, 1 new accounts, 1 new transactions"
        );
    }
}
