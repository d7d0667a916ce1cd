//! Façades over the three HTTP gateways the import talks to.
//!
//! * [`FioClient`] pulls account statements from the bank.
//! * [`VaultClient`] registers accounts.
//! * [`LedgerClient`] records transactions.

mod fio;
mod ledger;
pub mod types;
mod vault;

pub use fio::{FIO_EPOCH, FioClient};
pub use ledger::LedgerClient;
pub use types::*;
pub use vault::VaultClient;

use crate::http::HttpError;
use reqwest::StatusCode;

/// Outcome of an idempotent create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	Created,
	/// The record was already there, typically from an earlier interrupted run.
	Duplicate,
}

/// Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	#[error("HTTP error: {0}")]
	Http(#[from] HttpError),

	#[error("Fio token used before mandatory delay of 30 seconds")]
	Cooldown,

	#[error("Fio statement holds more than 50k movements")]
	TooManyStatements,

	#[error("{operation} rejected with status {status}")]
	Rejected {
		operation: &'static str,
		status: StatusCode,
	},

	#[error("{operation} failed with unexpected status {status}: {body}")]
	UnexpectedStatus {
		operation: &'static str,
		status: StatusCode,
		body: String,
	},

	#[error("Decode error: {0}")]
	Decode(String),
}

impl GatewayError {
	/// Whether the failure was caused by cancellation of the surrounding run.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, GatewayError::Http(HttpError::Cancelled))
	}
}

/// Joins a gateway base URL and a path, tolerating a trailing slash on the base.
pub(crate) fn join(base: &str, path: &str) -> String {
	format!("{}{}", base.trim_end_matches('/'), path)
}

/// Reads the body of a failed response for diagnostics, bounded in size.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
	const LIMIT: usize = 512;
	let mut body = response.text().await.unwrap_or_default();
	if body.len() > LIMIT {
		let mut cut = LIMIT;
		while !body.is_char_boundary(cut) {
			cut -= 1;
		}
		body.truncate(cut);
	}
	body
}
