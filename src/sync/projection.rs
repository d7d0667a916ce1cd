//! Projection of a fio statement onto vault accounts and ledger transactions.
//!
//! Everything here is pure: the same envelope and clock always yield the same
//! accounts and transactions, in the same order.

use crate::gateway::{
    Account, AccountFormat, AccountInfo, AccountRef, Envelope, StatementLine, Transaction,
    Transfer,
};
use crate::iban::normalize_account_number;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

/// Orders statement lines by ascending transfer id, keeping ties in place.
///
/// Lines without a transfer id sink to the end.
pub fn sort_lines(lines: &mut [StatementLine]) {
    lines.sort_by_key(|line| line.transfer_id().unwrap_or(u64::MAX));
}

fn non_empty(node: &Option<crate::gateway::Node<String>>) -> Option<&str> {
    node.as_ref()
        .map(|node| node.value.trim())
        .filter(|value| !value.is_empty())
}

/// Resolves the counterparty account of one line.
///
/// Lines without an `account to` are bank fees, taxes or card operations and
/// are booked against the statement owner's BIC.
pub fn counterparty(line: &StatementLine, info: &AccountInfo) -> (String, AccountFormat) {
    let Some(number) = non_empty(&line.account_to) else {
        return (info.bic.clone(), AccountFormat::FioTechnical);
    };

    let normalized = if let Some(bic) = non_empty(&line.bic) {
        normalize_account_number(number, bic, "")
    } else if let Some(bank_code) = non_empty(&line.bank_code) {
        normalize_account_number(number, "", bank_code)
    } else {
        normalize_account_number(number, "", &info.bank_id)
    };

    let format = if normalized.is_iban {
        AccountFormat::Iban
    } else {
        AccountFormat::FioUnknown
    };
    (normalized.name, format)
}

fn currency<'a>(line: &'a StatementLine, info: &'a AccountInfo) -> &'a str {
    non_empty(&line.currency).unwrap_or(&info.currency)
}

/// Accounts touched by the statement, deduplicated by name.
///
/// Order follows first appearance; the statement owner's IBAN is always part
/// of the set.
pub fn accounts(envelope: &Envelope) -> Vec<Account> {
    let info = &envelope.info;
    let mut accounts: Vec<Account> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for line in &envelope.lines {
        let (name, format) = counterparty(line, info);
        if seen.contains_key(&name) {
            continue;
        }
        seen.insert(name.clone(), accounts.len());
        accounts.push(Account {
            name,
            format,
            currency: currency(line, info).to_string(),
            is_balance_check: false,
        });
    }

    let owner = Account {
        name: info.iban.clone(),
        format: AccountFormat::Iban,
        currency: info.currency.clone(),
        is_balance_check: false,
    };
    match seen.get(&info.iban) {
        Some(&index) => accounts[index] = owner,
        None => accounts.push(owner),
    }

    accounts
}

/// Renders a fio value date (`2021-01-05+0100`) as a UTC timestamp.
///
/// Missing or unparsable dates fall back to `now`.
pub fn value_date(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let parsed = raw.and_then(|raw| {
        let (date, offset) = (raw.get(..10)?, raw.get(10..)?);
        DateTime::parse_from_str(&format!("{}T00:00:00{}", date, offset), "%Y-%m-%dT%H:%M:%S%z")
            .ok()
    });

    parsed
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or(now)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Groups the lines into ledger transactions.
///
/// `lines` must already be sorted by [`sort_lines`]. Lines sharing an upstream
/// transaction id end up in one transaction regardless of position;
/// transactions are ordered by their first transfer. Lines lacking a transfer
/// id, a transaction id or an amount are skipped.
pub fn transactions(envelope: &Envelope, tenant: &str, now: DateTime<Utc>) -> Vec<Transaction> {
    let info = &envelope.info;
    let mut transactions: Vec<Transaction> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in &envelope.lines {
        let (Some(sequence), Some(upstream), Some(amount)) = (
            line.transfer_id(),
            line.transaction_id.as_ref().map(|node| node.value),
            line.amount.as_ref().map(|node| node.value),
        ) else {
            continue;
        };

        let owner = AccountRef {
            tenant: tenant.to_string(),
            name: info.iban.clone(),
        };
        let other = AccountRef {
            tenant: tenant.to_string(),
            name: counterparty(line, info).0,
        };
        let (credit, debit) = if amount > 0.0 {
            (owner, other)
        } else {
            (other, owner)
        };

        let transfer = Transfer {
            sequence,
            id: sequence.to_string(),
            credit,
            debit,
            value_date: value_date(line.value_date.as_ref().map(|n| n.value.as_str()), now),
            amount: amount.abs().to_string(),
            currency: currency(line, info).to_string(),
        };

        let id = format!("{}{}", info.iban, upstream);
        match index.get(&id) {
            Some(&position) => transactions[position].transfers.push(transfer),
            None => {
                index.insert(id.clone(), transactions.len());
                transactions.push(Transaction {
                    id,
                    transfers: vec![transfer],
                });
            }
        }
    }

    transactions
}
