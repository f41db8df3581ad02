//! Status enums for orders and payments.
//!
//! The commerce API reports statuses as `SCREAMING_SNAKE_CASE` strings. Any
//! value this client does not know yet deserializes to `Unknown` instead of
//! failing the whole response, since the server is authoritative and may add
//! states.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Processing,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Order payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    #[serde(alias = "PARTIAL")]
    PartiallyPaid,
    Paid,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Status of a single mobile-money payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        })
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::PartiallyPaid => "partially paid",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        })
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_wire_names() {
        let status: PaymentStatus = serde_json::from_str("\"PARTIALLY_PAID\"").unwrap();
        assert_eq!(status, PaymentStatus::PartiallyPaid);

        let status: PaymentStatus = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(status, PaymentStatus::PartiallyPaid);

        assert_eq!(
            serde_json::to_string(&PaymentStatus::Paid).unwrap(),
            "\"PAID\""
        );
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let status: OrderStatus = serde_json::from_str("\"ON_HOLD\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
    }
}
