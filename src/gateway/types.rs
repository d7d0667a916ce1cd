//! Types exchanged with the fio, vault and ledger gateways

use serde::{Deserialize, Serialize};

/// A single column of a fio statement line.
///
/// Fio wraps every value as `{"value": .., "name": .., "id": ..}` and sends
/// `null` for columns that do not apply to the line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node<T> {
    pub value: T,
}

/// One line of a fio account statement.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StatementLine {
    /// Value date, `YYYY-MM-DD+HHMM`.
    #[serde(rename = "column0", default)]
    pub value_date: Option<Node<String>>,
    /// Signed amount, positive when the statement owner is credited.
    #[serde(rename = "column1", default)]
    pub amount: Option<Node<f64>>,
    /// Counterparty account number, absent for fees, taxes and card operations.
    #[serde(rename = "column2", default)]
    pub account_to: Option<Node<String>>,
    /// Counterparty clearing code.
    #[serde(rename = "column3", default)]
    pub bank_code: Option<Node<String>>,
    #[serde(rename = "column14", default)]
    pub currency: Option<Node<String>>,
    /// Upstream instruction id shared by the transfers of one transaction.
    #[serde(rename = "column17", default)]
    pub transaction_id: Option<Node<u64>>,
    /// Movement id, strictly increasing per account.
    #[serde(rename = "column22", default)]
    pub transfer_id: Option<Node<u64>>,
    /// Counterparty BIC.
    #[serde(rename = "column26", default)]
    pub bic: Option<Node<String>>,
}

impl StatementLine {
    pub fn transfer_id(&self) -> Option<u64> {
        self.transfer_id.as_ref().map(|node| node.value)
    }
}

/// Identity of the account the statement belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_id: String,
    pub bank_id: String,
    pub currency: String,
    pub iban: String,
    pub bic: String,
}

/// A decoded fio statement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    pub info: AccountInfo,
    pub lines: Vec<StatementLine>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "accountStatement")]
    account_statement: RawStatement,
}

#[derive(Deserialize)]
struct RawStatement {
    info: RawInfo,
    #[serde(rename = "transactionList", default)]
    transaction_list: Option<RawTransactionList>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    bank_id: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    iban: Option<String>,
    #[serde(default)]
    bic: Option<String>,
}

#[derive(Deserialize)]
struct RawTransactionList {
    #[serde(default)]
    transaction: Option<Vec<StatementLine>>,
}

fn required(value: Option<String>, name: &str) -> Result<String, String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("missing attribute \"{}\"", name)),
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let statement = raw.account_statement;
        let info = AccountInfo {
            account_id: required(statement.info.account_id, "accountId")?,
            bank_id: required(statement.info.bank_id, "bankId")?,
            currency: required(statement.info.currency, "currency")?,
            iban: required(statement.info.iban, "iban")?,
            bic: required(statement.info.bic, "bic")?,
        };
        let lines = statement
            .transaction_list
            .and_then(|list| list.transaction)
            .unwrap_or_default();

        Ok(Self { info, lines })
    }
}

/// How an account name should be interpreted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountFormat {
    /// A validated IBAN.
    Iban,
    /// A bank internal account, named after the bank BIC.
    FioTechnical,
    /// A number that could not be normalized.
    FioUnknown,
}

/// Account creation request for the vault gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub format: AccountFormat,
    pub currency: String,
    pub is_balance_check: bool,
}

/// Reference to an account owned by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRef {
    pub tenant: String,
    pub name: String,
}

/// One movement inside a ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Numeric transfer id, the watermark unit. Not sent downstream.
    #[serde(skip)]
    pub sequence: u64,
    pub id: String,
    pub credit: AccountRef,
    pub debit: AccountRef,
    pub value_date: String,
    pub amount: String,
    pub currency: String,
}

/// Transaction creation request for the ledger gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: String,
    pub transfers: Vec<Transfer>,
}

impl Transaction {
    /// Highest transfer id carried by this transaction.
    pub fn max_sequence(&self) -> Option<u64> {
        self.transfers.iter().map(|transfer| transfer.sequence).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info() -> serde_json::Value {
        json!({
            "accountId": "2900000001",
            "bankId": "2010",
            "currency": "CZK",
            "iban": "CZ7820100000002900000001",
            "bic": "FIOBCZPPXXX",
            "openingBalance": 100.0
        })
    }

    #[test]
    fn test_decode_envelope() {
        let payload = json!({
            "accountStatement": {
                "info": info(),
                "transactionList": {
                    "transaction": [{
                        "column0": { "value": "2021-01-05+0100", "name": "Datum", "id": 0 },
                        "column1": { "value": -150.5, "name": "Objem", "id": 1 },
                        "column2": { "value": "19-2000145399", "name": "Protiúčet", "id": 2 },
                        "column3": { "value": "0800", "name": "Kód banky", "id": 3 },
                        "column14": { "value": "CZK", "name": "Měna", "id": 14 },
                        "column17": { "value": 777, "name": "ID pokynu", "id": 17 },
                        "column22": { "value": 10, "name": "ID pohybu", "id": 22 },
                        "column26": null
                    }]
                }
            }
        });

        let envelope: Envelope = serde_json::from_value(payload).expect("valid envelope");
        assert_eq!(envelope.info.bic, "FIOBCZPPXXX");
        assert_eq!(envelope.lines.len(), 1);

        let line = &envelope.lines[0];
        assert_eq!(line.transfer_id(), Some(10));
        assert_eq!(line.amount.as_ref().map(|n| n.value), Some(-150.5));
        assert_eq!(line.bic, None);
    }

    #[test]
    fn test_decode_envelope_without_transactions() {
        let payload = json!({
            "accountStatement": { "info": info(), "transactionList": null }
        });
        let envelope: Envelope = serde_json::from_value(payload).expect("valid envelope");
        assert!(envelope.lines.is_empty());
    }

    #[test]
    fn test_decode_envelope_requires_info() {
        let mut partial = info();
        partial["iban"] = json!("");
        let payload = json!({ "accountStatement": { "info": partial } });

        let err = serde_json::from_value::<Envelope>(payload).unwrap_err();
        assert!(err.to_string().contains("iban"));
    }

    #[test]
    fn test_transaction_wire_shape() {
        let transaction = Transaction {
            id: "CZ01777".to_string(),
            transfers: vec![Transfer {
                sequence: 10,
                id: "10".to_string(),
                credit: AccountRef {
                    tenant: "demo".to_string(),
                    name: "A".to_string(),
                },
                debit: AccountRef {
                    tenant: "demo".to_string(),
                    name: "B".to_string(),
                },
                value_date: "2021-01-04T23:00:00Z".to_string(),
                amount: "150.5".to_string(),
                currency: "CZK".to_string(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&transaction).unwrap(),
            json!({
                "id": "CZ01777",
                "transfers": [{
                    "id": "10",
                    "credit": { "tenant": "demo", "name": "A" },
                    "debit": { "tenant": "demo", "name": "B" },
                    "valueDate": "2021-01-04T23:00:00Z",
                    "amount": "150.5",
                    "currency": "CZK"
                }]
            })
        );
    }

    #[test]
    fn test_account_wire_shape() {
        let account = Account {
            name: "FIOBCZPPXXX".to_string(),
            format: AccountFormat::FioTechnical,
            currency: "CZK".to_string(),
            is_balance_check: false,
        };
        assert_eq!(
            serde_json::to_value(&account).unwrap(),
            json!({
                "name": "FIOBCZPPXXX",
                "format": "FIO_TECHNICAL",
                "currency": "CZK",
                "isBalanceCheck": false
            })
        );
    }
}
