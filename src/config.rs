//! Runtime configuration read from `FIO_BCO_*` environment variables.

use crate::http::{RetryPolicy, Timeouts};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Tenant the imported accounts and transactions belong to.
    pub tenant: String,
    /// Root of the storage tree, already scoped to the tenant.
    pub storage: PathBuf,
    pub fio_gateway: String,
    pub vault_gateway: String,
    pub ledger_gateway: String,
    /// Host of the message broker linking regions.
    pub lake_hostname: String,
    /// Period of the scheduled import.
    pub sync_rate: Duration,
    /// Upper bound of one synchronization run.
    pub sync_deadline: Duration,
    pub log_level: String,
    pub retry: RetryPolicy,
    pub timeouts: Timeouts,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let duration = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|value| parse_duration(&value))
                .unwrap_or(default)
        };

        let tenant = string("FIO_BCO_TENANT", "");
        let storage = PathBuf::from(string("FIO_BCO_STORAGE", "/data"))
            .join(format!("t_{}", tenant))
            .join("import")
            .join("fio");

        Self {
            storage,
            fio_gateway: string("FIO_BCO_FIO_GATEWAY", "https://www.fio.cz"),
            vault_gateway: string("FIO_BCO_VAULT_GATEWAY", "https://127.0.0.1:4400"),
            ledger_gateway: string("FIO_BCO_LEDGER_GATEWAY", "https://127.0.0.1:4401"),
            lake_hostname: string("FIO_BCO_LAKE_HOSTNAME", "127.0.0.1"),
            sync_rate: duration("FIO_BCO_SYNC_RATE", Duration::from_secs(22)),
            sync_deadline: duration("FIO_BCO_SYNC_DEADLINE", Duration::from_secs(300)),
            log_level: string("FIO_BCO_LOG_LEVEL", "INFO"),
            retry: RetryPolicy {
                max_retries: lookup("FIO_BCO_HTTP_RETRY_MAX")
                    .and_then(|value| value.trim().parse().ok())
                    .unwrap_or(RetryPolicy::default().max_retries),
                ..RetryPolicy::default()
            },
            timeouts: Timeouts {
                connect: duration("FIO_BCO_HTTP_DIAL_TIMEOUT", Timeouts::default().connect),
                request: duration("FIO_BCO_HTTP_REQUEST_TIMEOUT", Timeouts::default().request),
            },
            tenant,
        }
    }

    /// Name of this process' actor region.
    pub fn region(&self) -> String {
        format!("FioImport/{}", self.tenant)
    }
}

/// Parses `22s`, `500ms`, `2m` or bare seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let (digits, unit) = match input.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => input.split_at(split),
        None => (input, "s"),
    };
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.checked_mul(60)?),
        _ => return None,
    };
    (!duration.is_zero()).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.storage, PathBuf::from("/data/t_/import/fio"));
        assert_eq!(config.fio_gateway, "https://www.fio.cz");
        assert_eq!(config.vault_gateway, "https://127.0.0.1:4400");
        assert_eq!(config.ledger_gateway, "https://127.0.0.1:4401");
        assert_eq!(config.sync_rate, Duration::from_secs(22));
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("FIO_BCO_TENANT", "demo"),
            ("FIO_BCO_STORAGE", "/tmp/store"),
            ("FIO_BCO_SYNC_RATE", "1m"),
            ("FIO_BCO_HTTP_RETRY_MAX", "3"),
            ("FIO_BCO_LOG_LEVEL", "DEBUG"),
            ("FIO_BCO_HTTP_DIAL_TIMEOUT", "5s"),
            ("FIO_BCO_HTTP_REQUEST_TIMEOUT", "2m"),
        ]);
        assert_eq!(config.tenant, "demo");
        assert_eq!(config.region(), "FioImport/demo");
        assert_eq!(config.storage, PathBuf::from("/tmp/store/t_demo/import/fio"));
        assert_eq!(config.sync_rate, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.timeouts.connect, Duration::from_secs(5));
        assert_eq!(config.timeouts.request, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("FIO_BCO_SYNC_RATE", "soon"),
            ("FIO_BCO_HTTP_RETRY_MAX", "-1"),
            ("FIO_BCO_HTTP_DIAL_TIMEOUT", "0s"),
        ]);
        assert_eq!(config.sync_rate, Duration::from_secs(22));
        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.timeouts.connect, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("22s"), Some(Duration::from_secs(22)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("15"), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration("0s"), None);
        assert_eq!(parse_duration("1h"), None);
        assert_eq!(parse_duration(""), None);
    }
}
