use super::{StorageError, Token};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Repository for token persistence
#[async_trait::async_trait]
pub trait TokenRepository: Send + Sync {
	/// Loads a token, `None` when no record exists.
	async fn load(&self, id: &str) -> Result<Option<Token>, StorageError>;

	/// Persists a brand-new token. Fails with `AlreadyExists` when a record is present.
	async fn create(&self, id: &str, value: &str) -> Result<Token, StorageError>;

	async fn delete(&self, id: &str) -> Result<(), StorageError>;

	/// Moves the stored watermark forward to `candidate`.
	///
	/// Returns `false` when the stored watermark is already at or past
	/// `candidate`. Fails with `NotFound` when the token no longer exists, so a
	/// late synchronization never recreates a deleted record.
	async fn advance_watermark(&self, id: &str, candidate: u64) -> Result<bool, StorageError>;

	/// Loads every stored token. Unreadable records are skipped.
	async fn list(&self) -> Result<Vec<Token>, StorageError>;
}

/// Token values live on one line of the record.
fn check_value(value: &str) -> Result<(), StorageError> {
	if value.is_empty() {
		return Err(StorageError::InvalidValue("empty value"));
	}
	if value.chars().any(char::is_control) {
		return Err(StorageError::InvalidValue("value contains control characters"));
	}
	Ok(())
}

fn check_id(id: &str) -> Result<(), StorageError> {
	let valid = !id.is_empty()
		&& !id.starts_with('.')
		&& id
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
	if valid {
		Ok(())
	} else {
		Err(StorageError::InvalidId(id.to_string()))
	}
}

/// File-based implementation of TokenRepository
///
/// One plain text record per token under `{root}/token/{id}`.
pub struct FileTokenRepository {
	token_dir: PathBuf,
	// create, delete and watermark writes are read-modify-write sequences
	write_lock: Mutex<()>,
}

impl FileTokenRepository {
	/// Opens the repository rooted at `root`, creating the directory tree if needed.
	pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
		let token_dir = root.as_ref().join("token");
		tokio::fs::create_dir_all(&token_dir).await?;
		debug!("Token storage at {:?}", token_dir);

		Ok(Self {
			token_dir,
			write_lock: Mutex::new(()),
		})
	}

	fn record_path(&self, id: &str) -> Result<PathBuf, StorageError> {
		check_id(id)?;
		Ok(self.token_dir.join(id))
	}

	async fn read(&self, id: &str) -> Result<Option<Token>, StorageError> {
		let path = self.record_path(id)?;
		match tokio::fs::read_to_string(&path).await {
			Ok(data) => Token::deserialize(id, &data).map(Some),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Replaces the record through a temporary sibling and a rename.
	async fn replace(&self, token: &Token) -> Result<(), StorageError> {
		let path = self.record_path(&token.id)?;
		let staging = self.token_dir.join(format!(".{}.tmp", token.id));

		tokio::fs::write(&staging, token.serialize()).await?;
		if let Err(e) = tokio::fs::rename(&staging, &path).await {
			let _ = tokio::fs::remove_file(&staging).await;
			return Err(e.into());
		}
		Ok(())
	}
}

async fn write_synced(path: &Path, token: &Token) -> Result<(), StorageError> {
	let mut file = tokio::fs::File::create(path).await?;
	file.write_all(token.serialize().as_bytes()).await?;
	file.sync_all().await?;
	Ok(())
}

#[async_trait::async_trait]
impl TokenRepository for FileTokenRepository {
	async fn load(&self, id: &str) -> Result<Option<Token>, StorageError> {
		self.read(id).await
	}

	async fn create(&self, id: &str, value: &str) -> Result<Token, StorageError> {
		let path = self.record_path(id)?;
		check_value(value)?;
		let token = Token::new(id, value);

		let _guard = self.write_lock.lock().await;
		if tokio::fs::try_exists(&path).await? {
			return Err(StorageError::AlreadyExists(id.to_string()));
		}

		// the record only appears once it is complete
		let staging = self.token_dir.join(format!(".{}.new", id));
		if let Err(e) = write_synced(&staging, &token).await {
			let _ = tokio::fs::remove_file(&staging).await;
			return Err(e);
		}
		let linked = tokio::fs::hard_link(&staging, &path).await;
		let _ = tokio::fs::remove_file(&staging).await;

		match linked {
			Ok(()) => Ok(token),
			Err(e) if e.kind() == ErrorKind::AlreadyExists => {
				Err(StorageError::AlreadyExists(id.to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn delete(&self, id: &str) -> Result<(), StorageError> {
		let path = self.record_path(id)?;

		let _guard = self.write_lock.lock().await;
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
			Err(e) => Err(e.into()),
		}
	}

	async fn advance_watermark(&self, id: &str, candidate: u64) -> Result<bool, StorageError> {
		let _guard = self.write_lock.lock().await;

		let Some(mut token) = self.read(id).await? else {
			return Err(StorageError::NotFound(id.to_string()));
		};
		if candidate <= token.last_synced_id {
			return Ok(false);
		}

		token.last_synced_id = candidate;
		self.replace(&token).await?;
		Ok(true)
	}

	async fn list(&self) -> Result<Vec<Token>, StorageError> {
		let mut entries = tokio::fs::read_dir(&self.token_dir).await?;
		let mut tokens = Vec::new();

		while let Some(entry) = entries.next_entry().await? {
			let Ok(id) = entry.file_name().into_string() else {
				continue;
			};
			if id.starts_with('.') {
				continue;
			}

			match self.read(&id).await {
				Ok(Some(token)) => tokens.push(token),
				Ok(None) => {}
				Err(e) => warn!("Skipping unreadable token {}: {}", id, e),
			}
		}

		Ok(tokens)
	}
}

/// In-memory implementation of TokenRepository
#[derive(Default)]
pub struct InMemoryTokenRepository {
	tokens: Mutex<HashMap<String, Token>>,
}

impl InMemoryTokenRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl TokenRepository for InMemoryTokenRepository {
	async fn load(&self, id: &str) -> Result<Option<Token>, StorageError> {
		Ok(self.tokens.lock().await.get(id).cloned())
	}

	async fn create(&self, id: &str, value: &str) -> Result<Token, StorageError> {
		check_id(id)?;
		check_value(value)?;
		let mut tokens = self.tokens.lock().await;
		if tokens.contains_key(id) {
			return Err(StorageError::AlreadyExists(id.to_string()));
		}

		let token = Token::new(id, value);
		tokens.insert(id.to_string(), token.clone());
		Ok(token)
	}

	async fn delete(&self, id: &str) -> Result<(), StorageError> {
		match self.tokens.lock().await.remove(id) {
			Some(_) => Ok(()),
			None => Err(StorageError::NotFound(id.to_string())),
		}
	}

	async fn advance_watermark(&self, id: &str, candidate: u64) -> Result<bool, StorageError> {
		let mut tokens = self.tokens.lock().await;
		let token = tokens
			.get_mut(id)
			.ok_or_else(|| StorageError::NotFound(id.to_string()))?;

		if candidate <= token.last_synced_id {
			return Ok(false);
		}
		token.last_synced_id = candidate;
		Ok(true)
	}

	async fn list(&self) -> Result<Vec<Token>, StorageError> {
		Ok(self.tokens.lock().await.values().cloned().collect())
	}
}
