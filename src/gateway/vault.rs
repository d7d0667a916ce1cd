use super::{Account, Delivery, GatewayError, error_body, join};
use crate::http::ResilientClient;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

/// Vault account registry client
#[derive(Clone)]
pub struct VaultClient {
	http_client: ResilientClient,
	gateway: String,
}

impl VaultClient {
	pub fn new(http_client: ResilientClient, gateway: impl Into<String>) -> Self {
		Self {
			http_client,
			gateway: gateway.into(),
		}
	}

	/// Creates `account` for `tenant`. An existing account counts as success.
	pub async fn create_account(
		&self,
		tenant: &str,
		account: &Account,
		cancel: &CancellationToken,
	) -> Result<Delivery, GatewayError> {
		let url = join(&self.gateway, &format!("/account/{}", tenant));
		let response = self.http_client.post_json(&url, account, cancel).await?;

		match response.status() {
			StatusCode::OK => Ok(Delivery::Created),
			StatusCode::CONFLICT => Ok(Delivery::Duplicate),
			status => Err(GatewayError::UnexpectedStatus {
				operation: "vault create account",
				status,
				body: error_body(response).await,
			}),
		}
	}
}
