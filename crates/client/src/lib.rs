//! Duka storefront client runtime.
//!
//! The transactional core a storefront UI drives:
//!
//! - [`session`] - Credential Store, hydrated from durable storage
//! - [`pipeline`] - authenticated requests with a single refresh-and-retry
//! - [`cart`] - pure cart reducer plus a persisting driver
//! - [`checkout`] - order creation and partial mobile-money payments
//! - [`Storefront`] - facade wiring the above to the [`api::CommerceClient`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod storage;

pub use account::{AccountService, RegistrationOutcome};
pub use api::{ApiError, CommerceClient};
pub use cart::{CartAction, CartItem, CartState, CartStore, CartTotals};
pub use checkout::{OrderWorkflow, PaymentReceipt};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use pipeline::AuthPipeline;
pub use session::{Credential, CredentialStore, ProfileSnapshot};
pub use state::Storefront;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
