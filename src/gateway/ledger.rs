use super::{Delivery, GatewayError, Transaction, error_body, join};
use crate::http::ResilientClient;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Ledger transaction client
#[derive(Clone)]
pub struct LedgerClient {
	http_client: ResilientClient,
	gateway: String,
}

impl LedgerClient {
	pub fn new(http_client: ResilientClient, gateway: impl Into<String>) -> Self {
		Self {
			http_client,
			gateway: gateway.into(),
		}
	}

	/// Records `transaction` for `tenant`.
	///
	/// # Returns
	/// `Delivery::Duplicate` when the ledger already knows the transaction.
	/// A 400 answer is logged and reported as `GatewayError::Rejected`. A 504
	/// is retried by the client and ends as `HttpError::GaveUp` once the
	/// retries run out.
	pub async fn create_transaction(
		&self,
		tenant: &str,
		transaction: &Transaction,
		cancel: &CancellationToken,
	) -> Result<Delivery, GatewayError> {
		let url = join(&self.gateway, &format!("/transaction/{}", tenant));
		let response = self.http_client.post_json(&url, transaction, cancel).await?;

		match response.status() {
			StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(Delivery::Created),
			StatusCode::CONFLICT => Ok(Delivery::Duplicate),
			StatusCode::BAD_REQUEST => {
				error!(
					"Ledger refused transaction {}: {}",
					transaction.id,
					error_body(response).await
				);
				Err(GatewayError::Rejected {
					operation: "ledger create transaction",
					status: StatusCode::BAD_REQUEST,
				})
			}
			status => Err(GatewayError::UnexpectedStatus {
				operation: "ledger create transaction",
				status,
				body: error_body(response).await,
			}),
		}
	}
}
