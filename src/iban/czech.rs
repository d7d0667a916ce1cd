//! Czech IBAN arithmetic.
//!
//! A domestic account maps onto `CZkk BBBB AAAA AAAA AAAA AAAA` where `BBBB`
//! is the clearing code, `A..` are the account digits left-padded to sixteen
//! and `kk` is the ISO 7064 MOD 97-10 check pair.

/// Country code as it prefixes every Czech IBAN.
const COUNTRY_CODE: &str = "CZ";

/// `C`, `Z` and the placeholder check pair `00`, already expanded to digits.
const COUNTRY_DIGITS: &str = "123500";

const ACCOUNT_WIDTH: usize = 16;
const BANK_CODE_WIDTH: usize = 4;
const IBAN_LENGTH: usize = 24;

/// Clearing codes of domestic banks that take part in IBAN payments.
const BANK_CODES: &[&str] = &[
    "0100", "0300", "0600", "0710", "0730", "0800", "2010", "2020", "2030", "2060", "2070",
    "2100", "2200", "2220", "2240", "2250", "2260", "2275", "2600", "2700", "3030", "3050",
    "3060", "3500", "4000", "4300", "5500", "5800", "6000", "6100", "6200", "6210", "6300",
    "6700", "6800", "7910", "7940", "7950", "7960", "7970", "7980", "7990", "8030", "8040",
    "8060", "8090", "8150", "8200", "8215", "8220", "8225", "8230", "8240", "8250", "8260",
    "8265", "8270", "8280", "8290", "8291", "8292", "8293", "8294", "8295", "8296", "8297",
    "8298",
];

/// Whether `code` is a domestic clearing code that can appear inside an IBAN.
pub fn is_supported_bank_code(code: &str) -> bool {
    BANK_CODES.contains(&code)
}

/// Remainder of `input` read as one big number, modulo 97.
///
/// Digits contribute themselves, letters contribute their two-digit
/// ISO 13616 code (`A` = 10 .. `Z` = 35). Returns `None` on any other
/// character.
pub fn mod97(input: &str) -> Option<u32> {
    input.bytes().try_fold(0u32, |remainder, byte| match byte {
        b'0'..=b'9' => Some((remainder * 10 + u32::from(byte - b'0')) % 97),
        b'A'..=b'Z' => Some((remainder * 100 + u32::from(byte - b'A') + 10) % 97),
        _ => None,
    })
}

/// Checks a candidate against the Czech IBAN layout and its check digits.
pub fn validate(candidate: &str) -> bool {
    if candidate.len() != IBAN_LENGTH || !candidate.is_ascii() {
        return false;
    }
    if &candidate[0..2] != COUNTRY_CODE {
        return false;
    }
    if !candidate[2..].bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if !is_supported_bank_code(&candidate[4..8]) {
        return false;
    }

    let rearranged = format!("{}{}", &candidate[4..], &candidate[0..4]);
    mod97(&rearranged) == Some(1)
}

/// Computes the Czech IBAN of a domestic account.
///
/// # Arguments
/// * `number` - The domestic account number, hyphens and spaces allowed.
/// * `bank_code` - The four digit clearing code, leading zeros optional.
///
/// # Returns
/// The 24 character IBAN, or `None` when the input cannot be represented.
pub fn calculate(number: &str, bank_code: &str) -> Option<String> {
    let canonical: String = number.chars().filter(|c| *c != '-' && *c != ' ').collect();
    if canonical.is_empty()
        || canonical.len() > ACCOUNT_WIDTH
        || !canonical.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    if bank_code.is_empty()
        || bank_code.len() > BANK_CODE_WIDTH
        || !bank_code.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let account = format!("{:0>width$}", canonical, width = ACCOUNT_WIDTH);
    let bank = format!("{:0>width$}", bank_code, width = BANK_CODE_WIDTH);
    if !is_supported_bank_code(&bank) {
        return None;
    }

    let remainder = mod97(&format!("{}{}{}", bank, account, COUNTRY_DIGITS))?;
    let checksum = 98 - remainder;
    if checksum == 99 {
        return None;
    }

    Some(format!("{}{:02}{}{}", COUNTRY_CODE, checksum, bank, account))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_vector() {
        let iban = calculate("0000123456", "0800").expect("supported bank code");

        assert!(iban.starts_with("CZ"));
        assert_eq!(iban.len(), 24);

        let check_digits: u32 = iban[2..4].parse().expect("numeric check digits");
        let remainder = mod97(&format!("0800{}123500", "0000000000123456")).expect("digits");
        assert_eq!(remainder, 98 - check_digits);
        assert_eq!(&iban[4..], "08000000000000123456");
    }

    #[test]
    fn test_calculate_known_account() {
        // Example account published by the Czech national bank.
        assert_eq!(
            calculate("19-2000145399", "0800").as_deref(),
            Some("CZ6508000000192000145399")
        );
    }

    #[test]
    fn test_calculate_pads_short_bank_code() {
        assert_eq!(calculate("123456", "100"), calculate("123456", "0100"));
    }

    #[test]
    fn test_calculate_rejects_unsupported_input() {
        assert_eq!(calculate("0000123456", "9999"), None);
        assert_eq!(calculate("0000123456", ""), None);
        assert_eq!(calculate("12345678901234567", "0800"), None);
        assert_eq!(calculate("12AB", "0800"), None);
        assert_eq!(calculate("", "0800"), None);
    }

    #[test]
    fn test_validate() {
        assert!(validate("CZ6508000000192000145399"));
        assert!(!validate("CZ6608000000192000145399"));
        assert!(!validate("SK6508000000192000145399"));
        assert!(!validate("CZ650800000019200014539"));

        let computed = calculate("2900000001", "2010").expect("fio is supported");
        assert!(validate(&computed));
    }

    #[test]
    fn test_mod97_letters() {
        assert_eq!(mod97("CZ00"), mod97("123500"));
        assert_eq!(mod97("12-3"), None);
    }
}
