//! Resilient HTTP plumbing used to reach the fio, vault and ledger gateways.

mod client;
pub mod retry;
pub mod tls;

pub use client::{ResilientClient, Timeouts};
pub use retry::RetryPolicy;

use reqwest::StatusCode;

/// Errors surfaced by the resilient client.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
	#[error("Transport error: {0}")]
	Transport(#[from] reqwest::Error),

	#[error("Unexpected HTTP status {0}")]
	Status(StatusCode),

	#[error("Giving up after {attempts} attempts")]
	GaveUp { attempts: u32 },

	#[error("Request cancelled")]
	Cancelled,

	#[error("Invalid URL: {0}")]
	InvalidUrl(String),

	#[error("JSON encode error: {0}")]
	Encode(#[from] serde_json::Error),

	#[error("TLS configuration error: {0}")]
	Tls(#[from] rustls::Error),
}
