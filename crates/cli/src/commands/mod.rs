//! CLI command implementations.
//!
//! Commands print their results to stdout; diagnostics go through `tracing`
//! to stderr.

use duka_client::{CommerceClient, Storefront};

pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;

/// The storefront as wired by the binary.
pub type App = Storefront<CommerceClient>;
