//! Mobile-money phone numbers and carrier resolution.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Country calling code prepended to every normalized number.
pub const COUNTRY_CODE: &str = "255";

/// National network prefixes and the carrier that owns them.
const CARRIER_PREFIXES: &[(&str, Carrier)] = &[
    ("074", Carrier::Mpesa),
    ("075", Carrier::Mpesa),
    ("076", Carrier::Mpesa),
    ("065", Carrier::Yas),
    ("067", Carrier::Yas),
    ("068", Carrier::AirtelMoney),
    ("069", Carrier::AirtelMoney),
    ("071", Carrier::AirtelMoney),
];

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains no digits at all.
    #[error("phone number must contain digits")]
    Empty,
}

/// A phone number in canonical international form (`255XXXXXXXXX`).
///
/// ## Normalization
///
/// - Every non-digit character is stripped
/// - A leading national `0` is replaced by the country code
/// - A number without the country code gets it prepended
/// - A number already carrying the country code is left unchanged
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize raw user input into canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::Empty`] if the input contains no digits.
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        let canonical = if let Some(national) = digits.strip_prefix('0') {
            format!("{COUNTRY_CODE}{national}")
        } else if digits.starts_with(COUNTRY_CODE) {
            digits
        } else {
            format!("{COUNTRY_CODE}{digits}")
        };

        Ok(Self(canonical))
    }

    /// The canonical digits, as submitted to the payment endpoint.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number in national form, with a leading `0` instead of the country code.
    #[must_use]
    pub fn national(&self) -> String {
        let subscriber = self.0.strip_prefix(COUNTRY_CODE).unwrap_or(&self.0);
        format!("0{subscriber}")
    }

    /// Resolve the mobile-money carrier from the number's network prefix.
    ///
    /// Returns `None` when the prefix is not in the carrier table.
    #[must_use]
    pub fn carrier(&self) -> Option<Carrier> {
        let national = self.national();
        let prefix = national.get(..3)?;
        Carrier::from_prefix(prefix)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mobile-money provider, serialized as the API's `payment_method` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Carrier {
    #[serde(rename = "m-pesa")]
    Mpesa,
    #[serde(rename = "yas")]
    Yas,
    #[serde(rename = "airtel-money")]
    AirtelMoney,
}

impl Carrier {
    /// Look up the carrier for a three-digit national prefix such as `"074"`.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        CARRIER_PREFIXES
            .iter()
            .find(|(known, _)| *known == prefix)
            .map(|(_, carrier)| *carrier)
    }

    /// Human-readable provider name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Mpesa => "M-Pesa",
            Self::Yas => "Yas",
            Self::AirtelMoney => "Airtel Money",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_zero_replaced_by_country_code() {
        let phone = PhoneNumber::parse("0712345678").unwrap();
        assert_eq!(phone.as_str(), "255712345678");
    }

    #[test]
    fn test_bare_subscriber_number_gets_country_code() {
        let phone = PhoneNumber::parse("712345678").unwrap();
        assert_eq!(phone.as_str(), "255712345678");
    }

    #[test]
    fn test_canonical_number_unchanged() {
        let phone = PhoneNumber::parse("255712345678").unwrap();
        assert_eq!(phone.as_str(), "255712345678");
    }

    #[test]
    fn test_formatting_characters_stripped() {
        let phone = PhoneNumber::parse("+255 (71) 234-5678").unwrap();
        assert_eq!(phone.as_str(), "255712345678");
    }

    #[test]
    fn test_no_digits_is_error() {
        assert_eq!(PhoneNumber::parse("call me"), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse(""), Err(PhoneError::Empty));
    }

    #[test]
    fn test_national_form() {
        let phone = PhoneNumber::parse("255754000111").unwrap();
        assert_eq!(phone.national(), "0754000111");
    }

    #[test]
    fn test_mpesa_prefixes_share_carrier() {
        assert_eq!(Carrier::from_prefix("074"), Some(Carrier::Mpesa));
        assert_eq!(Carrier::from_prefix("075"), Carrier::from_prefix("074"));
        assert_eq!(Carrier::from_prefix("076"), Carrier::from_prefix("074"));
    }

    #[test]
    fn test_unmapped_prefix_has_no_carrier() {
        assert_eq!(Carrier::from_prefix("099"), None);
        assert_eq!(PhoneNumber::parse("0991234567").unwrap().carrier(), None);
    }

    #[test]
    fn test_carrier_resolved_from_any_input_form() {
        for raw in ["0681234567", "681234567", "255681234567"] {
            let phone = PhoneNumber::parse(raw).unwrap();
            assert_eq!(phone.carrier(), Some(Carrier::AirtelMoney), "input {raw}");
        }
    }

    #[test]
    fn test_too_short_number_has_no_carrier() {
        assert_eq!(PhoneNumber::parse("7").unwrap().carrier(), None);
    }

    #[test]
    fn test_carrier_wire_names() {
        assert_eq!(serde_json::to_string(&Carrier::Mpesa).unwrap(), "\"m-pesa\"");
        assert_eq!(
            serde_json::to_string(&Carrier::AirtelMoney).unwrap(),
            "\"airtel-money\""
        );
    }
}
