use super::{Envelope, GatewayError, error_body, join};
use crate::http::ResilientClient;
use crate::token::Token;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resume date used for tokens that were never synchronized.
pub const FIO_EPOCH: &str = "2012-07-27";

/// Fio bank statement API client
#[derive(Clone)]
pub struct FioClient {
	http_client: ResilientClient,
	gateway: String,
}

impl FioClient {
	pub fn new(http_client: ResilientClient, gateway: impl Into<String>) -> Self {
		Self {
			http_client,
			gateway: gateway.into(),
		}
	}

	/// Moves the fio side cursor to the token's watermark.
	///
	/// A zero watermark rewinds to [`FIO_EPOCH`], anything else resumes after
	/// the given transfer id.
	pub async fn set_last_synced(
		&self,
		token: &Token,
		cancel: &CancellationToken,
	) -> Result<(), GatewayError> {
		let path = if token.last_synced_id == 0 {
			format!("/ib_api/rest/set-last-date/{}/{}/", token.value, FIO_EPOCH)
		} else {
			format!(
				"/ib_api/rest/set-last-id/{}/{}/",
				token.value, token.last_synced_id
			)
		};

		let response = self
			.http_client
			.get(&join(&self.gateway, &path), cancel)
			.await?;
		let status = response.status();
		if status != StatusCode::OK {
			return Err(GatewayError::UnexpectedStatus {
				operation: "fio set last synced",
				status,
				body: error_body(response).await,
			});
		}

		debug!(
			"Token {} resumes from {}",
			token.id, token.last_synced_id
		);
		Ok(())
	}

	/// Downloads every movement after the fio side cursor.
	pub async fn fetch_envelope(
		&self,
		token: &Token,
		cancel: &CancellationToken,
	) -> Result<Envelope, GatewayError> {
		let path = format!("/ib_api/rest/last/{}/transactions.json", token.value);

		let response = self
			.http_client
			.get(&join(&self.gateway, &path), cancel)
			.await?;

		match response.status() {
			StatusCode::OK => {}
			StatusCode::CONFLICT => return Err(GatewayError::Cooldown),
			StatusCode::PAYLOAD_TOO_LARGE => return Err(GatewayError::TooManyStatements),
			status => {
				return Err(GatewayError::UnexpectedStatus {
					operation: "fio get transactions",
					status,
					body: error_body(response).await,
				});
			}
		}

		let bytes = response
			.bytes()
			.await
			.map_err(|e| GatewayError::Decode(e.without_url().to_string()))?;
		serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
	}
}
