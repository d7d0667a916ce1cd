//! Retry policy of the resilient client.
//!
//! Which failures are worth another attempt, and how long to wait before it.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::error::Error as StdError;
use std::time::Duration;

/// Bounds of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Wait before the first retry, doubled for every further one.
	pub min_wait: Duration,
	/// Upper bound of any computed wait.
	pub max_wait: Duration,
	/// Retries on top of the initial attempt.
	pub max_retries: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			min_wait: Duration::from_secs(1),
			max_wait: Duration::from_secs(30),
			max_retries: 10,
		}
	}
}

/// Wait before retry number `attempt` (zero based).
///
/// An explicit `retry_after` is honored as is. Otherwise the wait is
/// `min * 2^attempt`, capped at `max`; arithmetic overflow also yields `max`.
pub fn backoff_delay(
	min: Duration,
	max: Duration,
	attempt: u32,
	retry_after: Option<Duration>,
) -> Duration {
	if let Some(wait) = retry_after {
		return wait;
	}

	2u32.checked_pow(attempt)
		.and_then(|factor| min.checked_mul(factor))
		.map_or(max, |wait| wait.min(max))
}

/// `Retry-After` in whole seconds, only considered on 429 and 503.
pub fn retry_after(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
	if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
		return None;
	}

	headers
		.get(RETRY_AFTER)?
		.to_str()
		.ok()?
		.trim()
		.parse::<u64>()
		.ok()
		.map(Duration::from_secs)
}

/// Whether a response with `status` should be retried.
pub fn is_retryable_status(status: StatusCode) -> bool {
	status == StatusCode::TOO_MANY_REQUESTS
		|| (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

/// Whether a transport failure can never succeed on retry.
///
/// Redirect loops, unsupported URL schemes and certificates issued by an
/// unknown authority are permanent. Every other transport error is retried.
pub fn is_permanent_transport_error(err: &reqwest::Error) -> bool {
	err.is_redirect() || err.is_builder() || has_unknown_issuer(err)
}

fn is_unknown_issuer(err: &(dyn StdError + 'static)) -> bool {
	matches!(
		err.downcast_ref::<rustls::Error>(),
		Some(rustls::Error::InvalidCertificate(
			rustls::CertificateError::UnknownIssuer
		))
	)
}

fn has_unknown_issuer(err: &reqwest::Error) -> bool {
	let mut cause = err.source();
	while let Some(current) = cause {
		if is_unknown_issuer(current) {
			return true;
		}
		// hyper hands TLS failures over as io::Error with the rustls error inside
		if let Some(inner) = current
			.downcast_ref::<std::io::Error>()
			.and_then(|io| io.get_ref())
		{
			if is_unknown_issuer(inner) {
				return true;
			}
		}
		cause = current.source();
	}
	false
}

/// Exponential schedule driven by [`backoff_delay`].
#[derive(Debug, Clone)]
pub struct Schedule {
	policy: RetryPolicy,
	attempt: u32,
}

impl Schedule {
	pub fn new(policy: RetryPolicy) -> Self {
		Self { policy, attempt: 0 }
	}
}

impl backoff::backoff::Backoff for Schedule {
	fn reset(&mut self) {
		self.attempt = 0;
	}

	fn next_backoff(&mut self) -> Option<Duration> {
		let wait = backoff_delay(
			self.policy.min_wait,
			self.policy.max_wait,
			self.attempt,
			None,
		);
		self.attempt = self.attempt.saturating_add(1);
		Some(wait)
	}
}
