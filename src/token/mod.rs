//! Banking credentials and their synchronization watermark.

mod repository;

pub use repository::{FileTokenRepository, InMemoryTokenRepository, TokenRepository};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use std::fmt;

/// A stored fio API token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Externally assigned identity, also the name of the owning actor.
    pub id: String,
    /// The secret credential handed to the fio gateway.
    pub value: String,
    pub created_at: DateTime<Utc>,
    /// Highest transfer id durably forwarded downstream.
    pub last_synced_id: u64,
}

impl Token {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            created_at: Utc::now().trunc_subsecs(0),
            last_synced_id: 0,
        }
    }

    /// Serializes the token into its three line storage record.
    pub fn serialize(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.value,
            self.last_synced_id
        )
    }

    /// Parses a storage record written by [`Token::serialize`].
    pub fn deserialize(id: &str, data: &str) -> Result<Self, StorageError> {
        let mut lines = data.lines();
        let (Some(created_at), Some(value), Some(last_synced_id)) =
            (lines.next(), lines.next(), lines.next())
        else {
            return Err(StorageError::Malformed(format!(
                "token {} record has fewer than 3 lines",
                id
            )));
        };

        let created_at = DateTime::parse_from_rfc3339(created_at)
            .map_err(|e| StorageError::Malformed(format!("token {} created at: {}", id, e)))?
            .with_timezone(&Utc);
        let last_synced_id = last_synced_id
            .trim()
            .parse::<u64>()
            .map_err(|e| StorageError::Malformed(format!("token {} last synced id: {}", id, e)))?;

        Ok(Self {
            id: id.to_string(),
            value: value.to_string(),
            created_at,
            last_synced_id,
        })
    }
}

// The value is a live banking credential and must stay out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("value", &"***")
            .field("created_at", &self.created_at)
            .field("last_synced_id", &self.last_synced_id)
            .finish()
    }
}

/// Errors raised by token storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Token not found: {0}")]
    NotFound(String),

    #[error("Token already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid token id: {0}")]
    InvalidId(String),

    #[error("Invalid token value: {0}")]
    InvalidValue(&'static str),

    #[error("Malformed token record: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
