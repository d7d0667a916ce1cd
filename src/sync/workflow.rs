use super::WorkflowError;
use super::progress::{SyncProgressTracker, SyncStats};
use super::projection;
use crate::gateway::{FioClient, LedgerClient, VaultClient};
use crate::metrics::Metrics;
use crate::token::{StorageError, Token, TokenRepository};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Entry point the token actor uses to run one synchronization.
#[async_trait::async_trait]
pub trait Synchronizer: Send + Sync {
	/// Runs a synchronization of `token` until it finishes, fails or `cancel` fires.
	async fn synchronize(
		&self,
		token: Token,
		cancel: CancellationToken,
	) -> Result<SyncStats, WorkflowError>;
}

/// Imports fio statements into vault and ledger.
pub struct SynchronizationWorkflow {
	tenant: String,
	fio: FioClient,
	vault: VaultClient,
	ledger: LedgerClient,
	repository: Arc<dyn TokenRepository>,
	metrics: Arc<Metrics>,
	deadline: Duration,
}

impl SynchronizationWorkflow {
	pub fn new(
		tenant: impl Into<String>,
		fio: FioClient,
		vault: VaultClient,
		ledger: LedgerClient,
		repository: Arc<dyn TokenRepository>,
		metrics: Arc<Metrics>,
		deadline: Duration,
	) -> Self {
		Self {
			tenant: tenant.into(),
			fio,
			vault,
			ledger,
			repository,
			metrics,
			deadline,
		}
	}

	async fn run(
		&self,
		token: &Token,
		cancel: &CancellationToken,
	) -> Result<SyncStats, WorkflowError> {
		self.fio.set_last_synced(token, cancel).await?;
		let mut envelope = self.fio.fetch_envelope(token, cancel).await?;
		projection::sort_lines(&mut envelope.lines);

		let accounts = projection::accounts(&envelope);
		let transactions = projection::transactions(&envelope, &self.tenant, Utc::now());
		debug!(
			"{} ~ statement of {} yields {} accounts and {} transactions",
			token.id,
			envelope.info.account_id,
			accounts.len(),
			transactions.len()
		);

		let mut progress = SyncProgressTracker::new(token.last_synced_id, &transactions);

		for account in &accounts {
			let delivery = self
				.vault
				.create_account(&self.tenant, account, cancel)
				.await?;
			progress.record_account(delivery);
			self.metrics.account_exported();
		}

		for transaction in &transactions {
			let delivery = self
				.ledger
				.create_transaction(&self.tenant, transaction, cancel)
				.await?;
			progress.record_transaction(transaction, delivery);
			self.metrics
				.transaction_exported(transaction.transfers.len());

			if let Some(watermark) = progress.next_persist() {
				self.persist_watermark(token, watermark, &mut progress).await;
			}
		}

		progress.log_progress(&token.id);
		Ok(progress.get_stats())
	}

	/// Writes the watermark; failures are logged and the run carries on.
	async fn persist_watermark(
		&self,
		token: &Token,
		watermark: u64,
		progress: &mut SyncProgressTracker,
	) {
		match self.repository.advance_watermark(&token.id, watermark).await {
			Ok(true) => {
				debug!("{} ~ watermark advanced to {}", token.id, watermark);
				progress.record_persisted(watermark);
			}
			Ok(false) => progress.record_persisted(watermark),
			Err(StorageError::NotFound(_)) => {
				warn!(
					"{} ~ token deleted while synchronizing, watermark {} dropped",
					token.id, watermark
				);
			}
			Err(e) => {
				warn!(
					"{} ~ unable to persist watermark {}: {}",
					token.id, watermark, e
				);
			}
		}
	}
}

#[async_trait::async_trait]
impl Synchronizer for SynchronizationWorkflow {
	async fn synchronize(
		&self,
		token: Token,
		cancel: CancellationToken,
	) -> Result<SyncStats, WorkflowError> {
		info!("{} ~ synchronization started", token.id);
		self.metrics.synchronization_started();
		let started = Instant::now();

		let result = match tokio::time::timeout(self.deadline, self.run(&token, &cancel)).await {
			Ok(result) => result,
			Err(_) => Err(WorkflowError::DeadlineExceeded(self.deadline)),
		};
		let result = result.map_err(|e| match e {
			WorkflowError::Gateway(ref gateway) if gateway.is_cancelled() => WorkflowError::Cancelled,
			other => other,
		});

		self.metrics
			.synchronization_finished(started.elapsed(), result.is_err());
		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gateway::GatewayError;
	use crate::http::{HttpError, ResilientClient, RetryPolicy};
	use crate::token::InMemoryTokenRepository;
	use reqwest::StatusCode;
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const TENANT: &str = "demo";
	const OWNER: &str = "CZ7820100000002900000001";
	const SECRET: &str = "secret-1";

	/// Repository whose watermark writes always fail.
	struct ReadOnlyWatermarks(InMemoryTokenRepository);

	#[async_trait::async_trait]
	impl TokenRepository for ReadOnlyWatermarks {
		async fn load(&self, id: &str) -> Result<Option<Token>, StorageError> {
			self.0.load(id).await
		}

		async fn create(&self, id: &str, value: &str) -> Result<Token, StorageError> {
			self.0.create(id, value).await
		}

		async fn delete(&self, id: &str) -> Result<(), StorageError> {
			self.0.delete(id).await
		}

		async fn advance_watermark(&self, _id: &str, _candidate: u64) -> Result<bool, StorageError> {
			Err(StorageError::Io(std::io::Error::other("disk full")))
		}

		async fn list(&self) -> Result<Vec<Token>, StorageError> {
			self.0.list().await
		}
	}

	fn workflow(server: &MockServer, repository: Arc<dyn TokenRepository>) -> SynchronizationWorkflow {
		let http_client = ResilientClient::new(RetryPolicy {
			min_wait: Duration::from_millis(1),
			max_wait: Duration::from_millis(5),
			max_retries: 2,
		})
		.unwrap();

		SynchronizationWorkflow::new(
			TENANT,
			FioClient::new(http_client.clone(), server.uri()),
			VaultClient::new(http_client.clone(), server.uri()),
			LedgerClient::new(http_client, server.uri()),
			repository,
			Arc::new(Metrics::new()),
			Duration::from_secs(10),
		)
	}

	/// Stores a token whose watermark sits at `watermark`.
	async fn stored_token(repository: &InMemoryTokenRepository, watermark: u64) -> Token {
		repository.create("T1", SECRET).await.unwrap();
		if watermark > 0 {
			repository.advance_watermark("T1", watermark).await.unwrap();
		}
		repository.load("T1").await.unwrap().unwrap()
	}

	/// Statement with one bank fee line per `(transfer id, instruction id)`.
	fn statement(lines: &[(u64, u64)]) -> serde_json::Value {
		let lines: Vec<_> = lines
			.iter()
			.map(|(transfer, instruction)| {
				json!({
					"column0": {"value": "2024-03-01+0100", "name": "Datum", "id": 0},
					"column1": {"value": -1.5, "name": "Objem", "id": 1},
					"column14": {"value": "CZK", "name": "Měna", "id": 14},
					"column17": {"value": instruction, "name": "ID pokynu", "id": 17},
					"column22": {"value": transfer, "name": "ID pohybu", "id": 22}
				})
			})
			.collect();

		json!({
			"accountStatement": {
				"info": {
					"accountId": "2900000001",
					"bankId": "2010",
					"currency": "CZK",
					"iban": OWNER,
					"bic": "FIOBCZPPXXX"
				},
				"transactionList": { "transaction": lines }
			}
		})
	}

	async fn mount_fio(server: &MockServer, cursor_path: &str, lines: &[(u64, u64)]) {
		Mock::given(method("GET"))
			.and(path(cursor_path))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(server)
			.await;
		Mock::given(method("GET"))
			.and(path(format!("/ib_api/rest/last/{}/transactions.json", SECRET)))
			.respond_with(ResponseTemplate::new(200).set_body_json(statement(lines)))
			.expect(1)
			.mount(server)
			.await;
	}

	async fn mount_vault(server: &MockServer, status: u16, calls: u64) {
		Mock::given(method("POST"))
			.and(path(format!("/account/{}", TENANT)))
			.respond_with(ResponseTemplate::new(status))
			.expect(calls)
			.mount(server)
			.await;
	}

	async fn mount_ledger(server: &MockServer, instruction: u64, status: u16, calls: u64) {
		Mock::given(method("POST"))
			.and(path(format!("/transaction/{}", TENANT)))
			.and(body_partial_json(json!({ "id": format!("{}{}", OWNER, instruction) })))
			.respond_with(ResponseTemplate::new(status))
			.expect(calls)
			.mount(server)
			.await;
	}

	fn resume_path(watermark: u64) -> String {
		format!("/ib_api/rest/set-last-id/{}/{}/", SECRET, watermark)
	}

	async fn watermark(repository: &InMemoryTokenRepository) -> u64 {
		repository.load("T1").await.unwrap().unwrap().last_synced_id
	}

	#[tokio::test]
	async fn test_resumes_after_stored_watermark() {
		let server = MockServer::start().await;
		let repository = Arc::new(InMemoryTokenRepository::new());
		let token = stored_token(&repository, 5).await;

		Mock::given(method("GET"))
			.and(path(format!("/ib_api/rest/set-last-date/{}/2012-07-27/", SECRET)))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;
		mount_fio(&server, &resume_path(5), &[(6, 601), (11, 602)]).await;
		mount_vault(&server, 200, 2).await;
		mount_ledger(&server, 601, 201, 1).await;
		mount_ledger(&server, 602, 201, 1).await;

		let stats = workflow(&server, repository.clone())
			.synchronize(token, CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(stats.start_watermark, 5);
		assert_eq!(stats.persisted_watermark, 11);
		assert_eq!(stats.transactions_created, 2);
		assert_eq!(watermark(&repository).await, 11);
		server.verify().await;
	}

	#[tokio::test]
	async fn test_fio_refusals_stop_before_vault() {
		for (status, cooldown) in [(409u16, true), (413u16, false)] {
			let server = MockServer::start().await;
			let repository = Arc::new(InMemoryTokenRepository::new());
			let token = stored_token(&repository, 0).await;

			Mock::given(method("GET"))
				.and(path(format!("/ib_api/rest/set-last-date/{}/2012-07-27/", SECRET)))
				.respond_with(ResponseTemplate::new(200))
				.expect(1)
				.mount(&server)
				.await;
			Mock::given(method("GET"))
				.and(path(format!("/ib_api/rest/last/{}/transactions.json", SECRET)))
				.respond_with(ResponseTemplate::new(status))
				.expect(1)
				.mount(&server)
				.await;
			mount_vault(&server, 200, 0).await;

			let result = workflow(&server, repository.clone())
				.synchronize(token, CancellationToken::new())
				.await;

			match result {
				Err(WorkflowError::Gateway(GatewayError::Cooldown)) => assert!(cooldown),
				Err(WorkflowError::Gateway(GatewayError::TooManyStatements)) => assert!(!cooldown),
				other => panic!("status {} gave {:?}", status, other),
			}
			assert_eq!(watermark(&repository).await, 0);
			server.verify().await;
		}
	}

	#[tokio::test]
	async fn test_vault_failure_stops_before_ledger() {
		let server = MockServer::start().await;
		let repository = Arc::new(InMemoryTokenRepository::new());
		let token = stored_token(&repository, 5).await;

		mount_fio(&server, &resume_path(5), &[(6, 601)]).await;
		mount_vault(&server, 403, 1).await;
		mount_ledger(&server, 601, 201, 0).await;

		let result = workflow(&server, repository.clone())
			.synchronize(token, CancellationToken::new())
			.await;

		assert!(matches!(
			result,
			Err(WorkflowError::Gateway(GatewayError::UnexpectedStatus { status, .. }))
				if status == StatusCode::FORBIDDEN
		));
		assert_eq!(watermark(&repository).await, 5);
		server.verify().await;
	}

	#[tokio::test]
	async fn test_ledger_duplicate_counts_as_delivered() {
		let server = MockServer::start().await;
		let repository = Arc::new(InMemoryTokenRepository::new());
		let token = stored_token(&repository, 5).await;

		mount_fio(&server, &resume_path(5), &[(6, 601), (11, 602)]).await;
		mount_vault(&server, 409, 2).await;
		mount_ledger(&server, 601, 409, 1).await;
		mount_ledger(&server, 602, 201, 1).await;

		let stats = workflow(&server, repository.clone())
			.synchronize(token, CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(stats.accounts_existing, 2);
		assert_eq!(stats.transactions_duplicate, 1);
		assert_eq!(stats.transactions_created, 1);
		assert_eq!(watermark(&repository).await, 11);
		server.verify().await;
	}

	#[tokio::test]
	async fn test_ledger_rejection_keeps_accepted_prefix() {
		let server = MockServer::start().await;
		let repository = Arc::new(InMemoryTokenRepository::new());
		let token = stored_token(&repository, 5).await;

		mount_fio(&server, &resume_path(5), &[(6, 601), (11, 602), (13, 603), (14, 604)]).await;
		mount_vault(&server, 200, 2).await;
		mount_ledger(&server, 601, 201, 1).await;
		mount_ledger(&server, 602, 201, 1).await;
		mount_ledger(&server, 603, 400, 1).await;
		mount_ledger(&server, 604, 201, 0).await;

		let result = workflow(&server, repository.clone())
			.synchronize(token, CancellationToken::new())
			.await;

		assert!(matches!(
			result,
			Err(WorkflowError::Gateway(GatewayError::Rejected { status, .. }))
				if status == StatusCode::BAD_REQUEST
		));
		assert_eq!(watermark(&repository).await, 11);
		server.verify().await;
	}

	#[tokio::test]
	async fn test_ledger_timeout_gives_up_after_retries() {
		let server = MockServer::start().await;
		let repository = Arc::new(InMemoryTokenRepository::new());
		let token = stored_token(&repository, 5).await;

		mount_fio(&server, &resume_path(5), &[(6, 601), (11, 602), (13, 603)]).await;
		mount_vault(&server, 200, 2).await;
		mount_ledger(&server, 601, 201, 1).await;
		mount_ledger(&server, 602, 201, 1).await;
		mount_ledger(&server, 603, 504, 3).await;

		let result = workflow(&server, repository.clone())
			.synchronize(token, CancellationToken::new())
			.await;

		assert!(matches!(
			result,
			Err(WorkflowError::Gateway(GatewayError::Http(HttpError::GaveUp { attempts: 3 })))
		));
		assert_eq!(watermark(&repository).await, 11);
		server.verify().await;
	}

	#[tokio::test]
	async fn test_watermark_write_failure_does_not_stop_run() {
		let server = MockServer::start().await;
		let inner = InMemoryTokenRepository::new();
		let token = stored_token(&inner, 5).await;
		let repository = Arc::new(ReadOnlyWatermarks(inner));

		mount_fio(&server, &resume_path(5), &[(6, 601), (11, 602)]).await;
		mount_vault(&server, 200, 2).await;
		mount_ledger(&server, 601, 201, 1).await;
		mount_ledger(&server, 602, 201, 1).await;

		let stats = workflow(&server, repository.clone())
			.synchronize(token, CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(stats.transfers_accepted, 2);
		assert_eq!(stats.persisted_watermark, 5);
		assert_eq!(watermark(&repository.0).await, 5);
		server.verify().await;
	}
}
