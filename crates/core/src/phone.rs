//! Deterministic phone-number normalization for the default calling region.
//!
//! Numbers are canonicalized to E.164 (`+1NNNNNNNNNN`) before they are used
//! as CRM match keys or call destinations. Normalizing an already-normalized
//! number is a no-op, so the canonical form can be round-tripped safely.

use thiserror::Error;

/// Placeholder last name used when a caller only gives a single name.
pub const LAST_NAME_PLACEHOLDER: &str = "LNU";

const NANP_NATIONAL_DIGITS: usize = 10;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("could not parse `{0}` as a phone number")]
    Unparseable(String),
    #[error("`{0}` is not a valid phone number for the default region")]
    Invalid(String),
}

/// A phone number in canonical E.164 form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    /// Parse free-form input against the default region (NANP) and
    /// canonicalize it. Accepts national ten-digit input, `1`-prefixed
    /// eleven-digit input, and already-canonical `+1` input.
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Unparseable(raw.to_owned()));
        }

        let explicit_country = trimmed.starts_with('+');
        let mut digits = String::with_capacity(trimmed.len());
        for character in trimmed.chars() {
            match character {
                '0'..='9' => digits.push(character),
                '+' | ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneError::Unparseable(raw.to_owned())),
            }
        }

        let national = match digits.len() {
            NANP_NATIONAL_DIGITS if !explicit_country => digits,
            11 if digits.starts_with('1') => digits[1..].to_owned(),
            _ => return Err(PhoneError::Unparseable(raw.to_owned())),
        };

        Ok(Self(format!("+1{national}")))
    }

    /// Like [`NormalizedPhone::parse`], but additionally enforces NANP
    /// validity rules (area code and exchange must not start with 0 or 1).
    pub fn parse_valid(raw: &str) -> Result<Self, PhoneError> {
        let normalized = Self::parse(raw)?;
        if !normalized.is_valid() {
            return Err(PhoneError::Invalid(raw.to_owned()));
        }
        Ok(normalized)
    }

    pub fn is_valid(&self) -> bool {
        let national = &self.0[2..];
        let mut chars = national.chars();
        let area_leads = chars.next();
        let exchange_leads = national.chars().nth(3);
        matches!(area_leads, Some('2'..='9')) && matches!(exchange_leads, Some('2'..='9'))
    }

    pub fn as_e164(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedPhone {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Split a free-form full name at the first space. A single token gets the
/// fixed placeholder last name so downstream CRM writes stay well-formed.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(' ') {
        Some((first, rest)) => (first.to_owned(), rest.trim().to_owned()),
        None => (trimmed.to_owned(), LAST_NAME_PLACEHOLDER.to_owned()),
    }
}

/// Normalize a spoken/typed last name for matching: trimmed and title-cased,
/// with every alphabetic run capitalized (`o'brien` -> `O'Brien`,
/// `smith-jones` -> `Smith-Jones`).
pub fn normalize_last_name(last_name: &str) -> String {
    let trimmed = last_name.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    let mut at_run_start = true;
    for character in trimmed.chars() {
        if character.is_alphabetic() {
            if at_run_start {
                normalized.extend(character.to_uppercase());
            } else {
                normalized.extend(character.to_lowercase());
            }
            at_run_start = false;
        } else {
            normalized.push(character);
            at_run_start = true;
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::{normalize_last_name, split_full_name, NormalizedPhone, PhoneError};

    #[test]
    fn national_formats_normalize_to_e164() {
        for raw in ["555-123-4567", "(555) 123-4567", "5551234567", "1 555 123 4567"] {
            let normalized = NormalizedPhone::parse(raw).expect("should parse");
            assert_eq!(normalized.as_e164(), "+15551234567", "input: {raw}");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let first_pass = NormalizedPhone::parse("206.555.0123").expect("should parse");
        let second_pass = NormalizedPhone::parse(first_pass.as_e164()).expect("should re-parse");
        assert_eq!(first_pass, second_pass);
        assert_eq!(second_pass.as_e164(), "+12065550123");
    }

    #[test]
    fn garbage_and_short_input_is_unparseable() {
        assert!(matches!(NormalizedPhone::parse("call me"), Err(PhoneError::Unparseable(_))));
        assert!(matches!(NormalizedPhone::parse("12345"), Err(PhoneError::Unparseable(_))));
        assert!(matches!(NormalizedPhone::parse(""), Err(PhoneError::Unparseable(_))));
    }

    #[test]
    fn validity_rejects_zero_and_one_leading_area_or_exchange() {
        assert!(matches!(
            NormalizedPhone::parse_valid("055-123-4567"),
            Err(PhoneError::Invalid(_))
        ));
        assert!(matches!(
            NormalizedPhone::parse_valid("555-023-4567"),
            Err(PhoneError::Invalid(_))
        ));
        assert!(NormalizedPhone::parse_valid("206-555-0123").is_ok());
    }

    #[test]
    fn full_name_splits_at_first_space_only() {
        assert_eq!(
            split_full_name("Ada Mae Lovelace"),
            ("Ada".to_owned(), "Mae Lovelace".to_owned())
        );
        assert_eq!(split_full_name("Prince"), ("Prince".to_owned(), "LNU".to_owned()));
    }

    #[test]
    fn last_name_normalization_title_cases_each_alphabetic_run() {
        assert_eq!(normalize_last_name("o'brien"), "O'Brien");
        assert_eq!(normalize_last_name("smith-jones"), "Smith-Jones");
        assert_eq!(normalize_last_name("VAN DER BERG"), "Van Der Berg");
        assert_eq!(normalize_last_name("  smith "), "Smith");
        assert_eq!(normalize_last_name(""), "");
    }
}
