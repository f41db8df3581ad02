//! Duka Core - Shared domain types.
//!
//! This crate provides the types shared by the client runtime and the CLI:
//! - `client` - Credential store, request pipeline, cart store and checkout workflow
//! - `cli` - Command-line storefront built on the client runtime
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage,
//! no HTTP clients. Anything here can be unit tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, statuses and mobile-money phone numbers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
