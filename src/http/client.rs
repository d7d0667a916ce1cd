//! HTTP client shared by every gateway façade.
//!
//! Each request runs inside a retry loop bounded by a [`RetryPolicy`] and a
//! caller supplied [`CancellationToken`]. Cancellation interrupts both an
//! in-flight request and a pending backoff sleep.

use super::HttpError;
use super::retry::{
	RetryPolicy, Schedule, is_permanent_transport_error, is_retryable_status, retry_after,
};
use super::tls;
use backoff::future::retry_notify;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-attempt time limits of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
	/// Time allowed to establish a connection, TLS handshake included.
	pub connect: Duration,
	/// Time allowed for a single attempt, body included.
	pub request: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			connect: Duration::from_secs(30),
			request: Duration::from_secs(120),
		}
	}
}

/// Retrying HTTP client.
#[derive(Clone)]
pub struct ResilientClient {
	/// The underlying HTTP client.
	http_client: Client,
	policy: RetryPolicy,
}

impl ResilientClient {
	/// Create a new client with default timeouts.
	pub fn new(policy: RetryPolicy) -> Result<Self, HttpError> {
		Self::with_timeouts(policy, Timeouts::default())
	}

	/// Create a new client using the pinned TLS configuration.
	///
	/// # Arguments
	/// * `policy` - Bounds of the retry loop.
	/// * `timeouts` - Limits applied to every attempt.
	///
	/// # Returns
	/// A new `ResilientClient`, or an `HttpError` if TLS setup fails.
	pub fn with_timeouts(policy: RetryPolicy, timeouts: Timeouts) -> Result<Self, HttpError> {
		let http_client = Client::builder()
			.use_preconfigured_tls(tls::client_config()?)
			.connect_timeout(timeouts.connect)
			.timeout(timeouts.request)
			.build()?;

		Ok(Self {
			http_client,
			policy,
		})
	}

	pub fn policy(&self) -> RetryPolicy {
		self.policy
	}

	/// Performs a GET request.
	pub async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Response, HttpError> {
		self.execute(Method::GET, url, None, cancel).await
	}

	/// Performs a POST request with a JSON body.
	pub async fn post_json<T: Serialize + ?Sized>(
		&self,
		url: &str,
		body: &T,
		cancel: &CancellationToken,
	) -> Result<Response, HttpError> {
		let body = serde_json::to_vec(body)?;
		self.execute(Method::POST, url, Some(body), cancel).await
	}

	/// Runs the retry loop for one logical request.
	///
	/// # Returns
	/// The first response that is not retried. When retries run out, the last
	/// transport error, or `HttpError::GaveUp` if the last attempt produced a
	/// retryable status. `HttpError::Cancelled` as soon as `cancel` fires.
	async fn execute(
		&self,
		method: Method,
		url: &str,
		body: Option<Vec<u8>>,
		cancel: &CancellationToken,
	) -> Result<Response, HttpError> {
		let url = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
		// fio URLs embed the token, so only the host is ever logged
		let host = url.host_str().unwrap_or_default().to_string();
		let total_attempts = self.policy.max_retries.saturating_add(1);
		let mut attempt = 0u32;

		let operation = || {
			attempt += 1;
			let current = attempt;

			let mut request = self
				.http_client
				.request(method.clone(), url.clone())
				.header(ACCEPT, HeaderValue::from_static("application/json"));
			if let Some(body) = &body {
				request = request
					.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
					.body(body.clone());
			}

			async move {
				let response = match request.send().await {
					Ok(response) => response,
					Err(e) => {
						let permanent = is_permanent_transport_error(&e) || current >= total_attempts;
						let err = HttpError::Transport(e.without_url());
						return Err(if permanent {
							backoff::Error::permanent(err)
						} else {
							backoff::Error::transient(err)
						});
					}
				};

				let status = response.status();
				if !is_retryable_status(status) {
					return Ok(response);
				}

				let wait = retry_after(status, response.headers());
				// drain so the connection goes back to the pool
				let _ = response.bytes().await;

				if current >= total_attempts {
					return Err(backoff::Error::permanent(HttpError::GaveUp {
						attempts: current,
					}));
				}

				let err = HttpError::Status(status);
				Err(match wait {
					Some(wait) => backoff::Error::retry_after(err, wait),
					None => backoff::Error::transient(err),
				})
			}
		};

		let notify = |err: HttpError, wait: Duration| {
			warn!(
				method = %method,
				host = %host,
				wait_ms = wait.as_millis() as u64,
				"Request failed, retrying: {}",
				err
			);
		};

		tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				debug!(method = %method, host = %host, "Request cancelled");
				Err(HttpError::Cancelled)
			}
			result = retry_notify(Schedule::new(self.policy), operation, notify) => result,
		}
	}
}
