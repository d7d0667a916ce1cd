//! Imports Fio bank statements into the vault and ledger services.
//!
//! Each API token is owned by a [`actor`] that serialises create, delete and
//! synchronize commands. A synchronization pulls new movements from fio,
//! registers the counterparty accounts and posts grouped transactions, moving
//! the token's watermark forward as transfers are accepted.

pub mod actor;
pub mod config;
pub mod gateway;
pub mod http;
pub mod iban;
pub mod metrics;
pub mod scheduler;
pub mod sync;
pub mod token;
pub mod wire;
