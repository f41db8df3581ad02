//! Commerce API client.
//!
//! # Architecture
//!
//! - JSON over HTTPS via `reqwest`, bearer-token authentication
//! - The backend is source of truth for orders and balances - NO local recomputation
//! - In-memory caching via `moka` for catalog responses only
//!
//! # Seams
//!
//! Remote operations are grouped into three traits so the session pipeline
//! and checkout workflow can be driven by an in-memory fake in tests:
//!
//! - [`TokenRefresher`] - mint a new access token from a refresh token
//! - [`AccountApi`] - register, login, logout, profile
//! - [`OrderApi`] - list, create and fetch orders; submit payments
//!
//! [`CommerceClient`] implements all three against the real backend.

mod cache;
mod client;
pub mod types;

pub use client::CommerceClient;
pub use types::*;

use async_trait::async_trait;
use duka_core::OrderId;
use thiserror::Error;

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the base URL.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    /// The access token was rejected as expired or invalid.
    #[error("Access token not valid: {0}")]
    TokenNotValid(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// A success response that lacked something the client needs.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    /// Whether this failure is the backend's "token not valid" signal.
    ///
    /// This is the only failure the session pipeline recovers from.
    #[must_use]
    pub const fn is_token_not_valid(&self) -> bool {
        matches!(self, Self::TokenNotValid(_))
    }
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Call `POST token/refresh/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the refresh token is rejected or the call fails.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError>;
}

/// Account endpoints.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Call `POST register/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on validation or transport failure.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// Call `POST login/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on invalid credentials or transport failure.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// Call `POST logout/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend rejects the logout.
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;

    /// Call `GET customers/me`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the token is rejected or the call fails.
    async fn profile(&self, access_token: &str) -> Result<ProfileResponse, ApiError>;
}

/// Order and payment endpoints. All calls require a bearer token.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Call `GET orders/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the token is rejected or the call fails.
    async fn list_orders(&self, access_token: &str) -> Result<Vec<Order>, ApiError>;

    /// Call `POST orders/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the token is rejected or the order is invalid.
    async fn create_order(
        &self,
        access_token: &str,
        request: &CreateOrderRequest,
    ) -> Result<Order, ApiError>;

    /// Call `GET orders/{id}/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown orders.
    async fn get_order(&self, access_token: &str, id: OrderId) -> Result<Order, ApiError>;

    /// Call `POST payments/`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the payment is rejected or the call fails.
    async fn submit_payment(
        &self,
        access_token: &str,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ApiError>;
}
