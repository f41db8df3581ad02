//! Type-safe price representation using decimal arithmetic.
//!
//! The commerce API exchanges every amount as a decimal string (`"1000.00"`),
//! so prices are carried as [`Decimal`] end to end and never pass through
//! floating point.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., shillings, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in the store's default currency.
    #[must_use]
    pub fn tsh(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::default())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    TZS,
    KES,
    UGX,
    USD,
}

impl CurrencyCode {
    /// Display symbol used on receipts and cart summaries.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::TZS => "TSh",
            Self::KES => "KSh",
            Self::UGX => "USh",
            Self::USD => "$",
        }
    }
}
