use serde::{Deserialize, Serialize};

/// Shortest and longest digit count an E.164 number may have (country code included).
const MIN_E164_DIGITS: usize = 8;
const MAX_E164_DIGITS: usize = 15;

/// Longest national number we accept without a trunk prefix before assuming
/// the caller typed the country code without `+`.
const MAX_NATIONAL_DIGITS: usize = 10;

/// A guest phone number in the three forms staff search by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Exactly what the guest typed (trimmed).
    pub raw: String,
    /// National significant number for the default country; full international
    /// digits for foreign numbers.
    pub local: String,
    /// `+<country><number>`.
    pub e164: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    Empty,
    InvalidCharacter(char),
    TooShort(usize),
    TooLong(usize),
}

impl std::fmt::Display for PhoneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhoneError::Empty => write!(f, "phone number is empty"),
            PhoneError::InvalidCharacter(c) => write!(f, "invalid character in phone number: {c:?}"),
            PhoneError::TooShort(n) => write!(f, "phone number too short: {n} digits"),
            PhoneError::TooLong(n) => write!(f, "phone number too long: {n} digits"),
        }
    }
}

impl std::error::Error for PhoneError {}

/// Normalize a raw phone number. `country_code` is the calling code (digits
/// only, e.g. `"91"`) assumed for numbers typed without an international prefix.
pub fn normalize(raw: &str, country_code: &str) -> Result<PhoneNumber, PhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    for (i, c) in trimmed.char_indices() {
        let ok = c.is_ascii_digit()
            || matches!(c, ' ' | '-' | '(' | ')' | '.')
            || (c == '+' && i == 0);
        if !ok {
            return Err(PhoneError::InvalidCharacter(c));
        }
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(PhoneError::Empty);
    }

    let international = if trimmed.starts_with('+') {
        Some(digits.as_str())
    } else if let Some(rest) = digits.strip_prefix("00") {
        Some(rest)
    } else if digits.len() > MAX_NATIONAL_DIGITS && digits.starts_with(country_code) {
        Some(digits.as_str())
    } else {
        None
    };

    let (full, local) = match international {
        Some(full) => {
            let local = match full.strip_prefix(country_code) {
                Some(national) if !national.is_empty() => national.to_string(),
                _ => full.to_string(),
            };
            (full.to_string(), local)
        }
        None => {
            let national = digits.strip_prefix('0').unwrap_or(&digits);
            (format!("{country_code}{national}"), national.to_string())
        }
    };

    if full.len() < MIN_E164_DIGITS {
        return Err(PhoneError::TooShort(full.len()));
    }
    if full.len() > MAX_E164_DIGITS {
        return Err(PhoneError::TooLong(full.len()));
    }

    Ok(PhoneNumber {
        raw: trimmed.to_string(),
        local,
        e164: format!("+{full}"),
    })
}
