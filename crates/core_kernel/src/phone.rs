//! Subscriber phone numbers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Number of digits in a subscriber number (without country code)
pub const PHONE_DIGITS: usize = 10;

/// A validated ten-digit mobile number
///
/// Whitespace, dashes and a leading `+91` / `0` trunk prefix are accepted
/// on input and stripped; the stored form is always exactly ten ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let digits: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let digits = digits
            .strip_prefix("+91")
            .or_else(|| {
                if digits.len() == PHONE_DIGITS + 1 {
                    digits.strip_prefix('0')
                } else {
                    None
                }
            })
            .unwrap_or(&digits);

        if digits.len() != PHONE_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::validation(format!(
                "phone number must be {} digits",
                PHONE_DIGITS
            )));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masks all but the last four digits, for logs
    pub fn masked(&self) -> String {
        format!("******{}", &self.0[PHONE_DIGITS - 4..])
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> String {
        phone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ten_digits() {
        assert_eq!(PhoneNumber::parse("9876543210").unwrap().as_str(), "9876543210");
    }

    #[test]
    fn test_strips_country_code_and_separators() {
        assert_eq!(PhoneNumber::parse("+91 98765-43210").unwrap().as_str(), "9876543210");
        assert_eq!(PhoneNumber::parse("09876543210").unwrap().as_str(), "9876543210");
    }

    #[test]
    fn test_rejects_short_and_alpha() {
        assert!(PhoneNumber::parse("98765").is_err());
        assert!(PhoneNumber::parse("98765abcde").is_err());
        assert!(PhoneNumber::parse("").is_err());
    }

    #[test]
    fn test_masked() {
        assert_eq!(PhoneNumber::parse("9876543210").unwrap().masked(), "******3210");
    }
}
