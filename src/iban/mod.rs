//! Account number normalization.
//!
//! Counterparty accounts arrive from the bank in whatever shape the statement
//! carries: a domestic `number` plus either a clearing code or a BIC, or
//! occasionally an IBAN already. Only Czech accounts are converted; anything
//! else is passed through untouched and flagged as not being an IBAN.

pub mod czech;

/// Result of normalizing one account number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAccount {
	/// The IBAN when normalization succeeded, otherwise the raw input.
	pub name: String,
	/// Whether `name` is a valid IBAN.
	pub is_iban: bool,
}

impl NormalizedAccount {
	fn iban(name: String) -> Self {
		Self {
			name,
			is_iban: true,
		}
	}

	fn passthrough(raw: &str) -> Self {
		Self {
			name: raw.to_string(),
			is_iban: false,
		}
	}
}

/// Maps the BIC of a Czech bank to its domestic clearing code.
///
/// Both the 8 character form and the 11 character `XXX` branch form are
/// accepted.
pub fn bank_code_for_bic(bic: &str) -> Option<&'static str> {
	let institution = match bic.len() {
		8 => bic,
		11 if bic.ends_with("XXX") => &bic[..8],
		_ => return None,
	};

	let code = match institution {
		"FIOBCZPP" => "2010",
		"KOMBCZPP" => "0100",
		"CEKOCZPP" => "0300",
		"AGBACZPP" => "0600",
		"CNBACZPP" => "0710",
		"GIBACZPX" => "0800",
		"BOTKCZPP" => "2020",
		"CITFCZPP" => "2060",
		"MPUBCZPP" => "2070",
		"ARTTCZPP" => "2220",
		"POBNCZPP" => "2240",
		"CTASCZ22" => "2250",
		"ZUNOCZPP" => "2310",
		"CITICZPX" => "2600",
		"BACXCZPP" => "2700",
		"AIRACZPP" => "3030",
		"INGBCZPP" => "3500",
		"SOLACZPP" => "4000",
		"CMZRCZP1" => "4300",
		"RZBCCZPP" => "5500",
		"JTBPCZPP" => "5800",
		"PMBPCZPP" => "6000",
		"EQBKCZPP" => "6100",
		"COBACZPX" => "6200",
		"BREXCZPP" => "6210",
		"GEBACZPP" => "6300",
		"SUBACZPP" => "6700",
		"VBOECZ2X" => "6800",
		"DEUTCZPX" => "7910",
		"SPWTCZ21" => "7940",
		"GENOCZ21" => "8030",
		"OBKLCZ2X" => "8040",
		"CZEECZPP" => "8090",
		"MIDLCZPP" => "8150",
		_ => return None,
	};
	Some(code)
}

/// Computes an IBAN from a domestic account number and either a BIC or a
/// clearing code. The BIC wins when both are given.
pub fn calculate(number: &str, bic: &str, bank_code: &str) -> Option<String> {
	if bic.is_empty() {
		return czech::calculate(number, bank_code);
	}
	czech::calculate(number, bank_code_for_bic(bic)?)
}

/// Normalizes a raw counterparty account number.
///
/// # Arguments
/// * `raw` - The account number as found in the statement.
/// * `bic` - The counterparty BIC, or empty.
/// * `bank_code` - The counterparty clearing code, or empty.
///
/// # Returns
/// The IBAN when `raw` already is one or can be computed, otherwise `raw`
/// unchanged with `is_iban` unset.
pub fn normalize_account_number(raw: &str, bic: &str, bank_code: &str) -> NormalizedAccount {
	if czech::validate(raw) {
		return NormalizedAccount::iban(raw.to_string());
	}

	match calculate(raw, bic, bank_code) {
		Some(iban) => NormalizedAccount::iban(iban),
		None => NormalizedAccount::passthrough(raw),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bic_table() {
		assert_eq!(bank_code_for_bic("FIOBCZPP"), Some("2010"));
		assert_eq!(bank_code_for_bic("FIOBCZPPXXX"), Some("2010"));
		assert_eq!(bank_code_for_bic("GIBACZPXXXX"), Some("0800"));
		assert_eq!(bank_code_for_bic("FIOBCZPPABC"), None);
		assert_eq!(bank_code_for_bic("CSCHUS6S"), None);
		assert_eq!(bank_code_for_bic(""), None);
	}

	#[test]
	fn test_normalize_from_bank_code() {
		let normalized = normalize_account_number("19-2000145399", "", "0800");
		assert_eq!(
			normalized,
			NormalizedAccount::iban("CZ6508000000192000145399".to_string())
		);
	}

	#[test]
	fn test_normalize_from_bic_ignores_bank_code() {
		let normalized = normalize_account_number("19-2000145399", "GIBACZPX", "2010");
		assert_eq!(normalized.name, "CZ6508000000192000145399");
		assert!(normalized.is_iban);
	}

	#[test]
	fn test_normalize_keeps_valid_iban() {
		let normalized = normalize_account_number("CZ6508000000192000145399", "", "2010");
		assert_eq!(normalized.name, "CZ6508000000192000145399");
		assert!(normalized.is_iban);
	}

	#[test]
	fn test_normalize_passthrough() {
		let normalized = normalize_account_number("123456", "", "9999");
		assert_eq!(normalized, NormalizedAccount::passthrough("123456"));

		// clearing code outside the IBAN allow-list
		let normalized = normalize_account_number("123456", "ZUNOCZPP", "");
		assert!(!normalized.is_iban);

		let normalized = normalize_account_number("DE89370400440532013000", "", "");
		assert_eq!(normalized.name, "DE89370400440532013000");
		assert!(!normalized.is_iban);
	}
}
