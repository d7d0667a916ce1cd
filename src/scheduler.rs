//! Periodic import: every tick, ask each stored token to synchronize.

use crate::actor::{Coordinates, Message, MessageRouter};
use crate::token::{StorageError, Token, TokenRepository};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Local coordinate the scheduler sends from.
pub const SCHEDULER_NAME: &str = "token_import_cron";

/// Tokens younger than this are left alone for one more round.
pub const MIN_TOKEN_AGE: Duration = Duration::from_secs(6);

/// Picks the tokens due for synchronization.
///
/// Tokens are visited in id order. Tokens created within [`MIN_TOKEN_AGE`]
/// of `now` are skipped, and when several ids share a secret only the first
/// one is kept.
pub fn select_due(mut tokens: Vec<Token>, now: DateTime<Utc>) -> Vec<Token> {
    tokens.sort_by(|a, b| a.id.cmp(&b.id));

    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|token| {
            let age = now.signed_duration_since(token.created_at);
            age.to_std().map(|age| age >= MIN_TOKEN_AGE).unwrap_or(false)
        })
        .filter(|token| seen.insert(token.value.clone()))
        .collect()
}

pub struct ImportScheduler {
    repository: Arc<dyn TokenRepository>,
    router: Arc<MessageRouter>,
    rate: Duration,
}

impl ImportScheduler {
    pub fn new(repository: Arc<dyn TokenRepository>, router: Arc<MessageRouter>, rate: Duration) -> Self {
        Self {
            repository,
            router,
            rate,
        }
    }

    /// Runs one scheduling round and returns the number of tokens poked.
    pub async fn import_round(&self) -> Result<usize, StorageError> {
        let tokens = self.repository.list().await?;
        let stored = tokens.len();
        let due = select_due(tokens, Utc::now());
        debug!("Scheduling {} of {} stored tokens", due.len(), stored);

        let sender = Coordinates::new(SCHEDULER_NAME, self.router.region());
        for token in &due {
            self.router
                .tell(&token.id, Message::SynchronizeToken, sender.clone())
                .await;
        }
        Ok(due.len())
    }

    /// Ticks every `rate` until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Import scheduler running every {:?}", self.rate);
        let mut interval = tokio::time::interval(self.rate);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.import_round().await {
                        warn!("Scheduled import failed: {}", e);
                    }
                }
            }
        }
        info!("Import scheduler stopped");
    }
}
