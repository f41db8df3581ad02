//! Unified error handling with Sentry integration.
//!
//! Every public operation of the client returns `Result<T, ClientError>`.
//! Drivers (the CLI, a UI shell) call [`ClientError::requires_sign_in`] to
//! decide whether to route to sign-in and [`ClientError::report`] to log and
//! capture the failure.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;
use duka_core::PhoneError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No usable session is present.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The refresh attempt failed; the local session has been cleared.
    #[error("Session expired, please sign in again")]
    SessionExpired(#[source] ApiError),

    /// The cached profile carries no customer ID.
    #[error("Customer profile is missing, please sign in again")]
    ProfileMissing,

    /// The phone number does not match any known mobile-money prefix.
    #[error("No mobile-money carrier serves {0}")]
    UnknownCarrier(String),

    /// The phone number contains no digits.
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(#[from] PhoneError),

    /// An order cannot be created from an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Payment amounts must be positive.
    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),

    /// The mobile-money provider declined the payment.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Any other remote failure, cause preserved.
    #[error("Remote error: {0}")]
    Remote(#[from] ApiError),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Whether the caller should route the user to sign-in.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::SessionExpired(_) | Self::ProfileMissing
        )
    }

    /// Whether this failure indicates a fault worth capturing to Sentry.
    ///
    /// Session routing and input errors are expected and only logged.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        match self {
            Self::Storage(_) => true,
            Self::Remote(err) => !matches!(err, ApiError::NotFound(_) | ApiError::RateLimited(_)),
            _ => false,
        }
    }

    /// Log the error and capture faults to Sentry.
    pub fn report(&self) {
        if self.is_fault() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront operation failed"
            );
        } else {
            tracing::info!(error = %self, "Storefront operation rejected");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from a customer ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout and forced sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::UnknownCarrier("255991234567".to_string());
        assert_eq!(err.to_string(), "No mobile-money carrier serves 255991234567");

        let err = ClientError::Remote(ApiError::RateLimited(5));
        assert_eq!(
            err.to_string(),
            "Remote error: Rate limited, retry after 5 seconds"
        );
    }

    #[test]
    fn test_sign_in_routing() {
        assert!(ClientError::NotAuthenticated.requires_sign_in());
        assert!(ClientError::ProfileMissing.requires_sign_in());
        assert!(
            ClientError::SessionExpired(ApiError::Status {
                status: 401,
                body: String::new()
            })
            .requires_sign_in()
        );
        assert!(!ClientError::EmptyCart.requires_sign_in());
        assert!(!ClientError::Remote(ApiError::TokenNotValid("x".to_string())).requires_sign_in());
    }

    #[test]
    fn test_only_faults_are_captured() {
        assert!(
            ClientError::Remote(ApiError::Status {
                status: 500,
                body: String::new()
            })
            .is_fault()
        );
        assert!(ClientError::Storage(StorageError::Poisoned).is_fault());
        assert!(!ClientError::Remote(ApiError::NotFound("orders/1/".to_string())).is_fault());
        assert!(!ClientError::PaymentDeclined("insufficient funds".to_string()).is_fault());
        assert!(!ClientError::NotAuthenticated.is_fault());
    }
}
