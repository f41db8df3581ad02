//! Persisting driver for the cart reducer.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{CartAction, CartItem, CartState, CartTotals, reduce};
use crate::error::add_breadcrumb;
use crate::storage::{Storage, StorageError, storage_keys};

/// Lifecycle phase of a [`CartStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartPhase {
    /// Startup load has not run; the cart reads as empty.
    Hydrating,
    /// The cart reflects durable storage.
    Ready,
}

/// Drives [`reduce`] and persists every state it commits.
///
/// A transition only becomes visible once its snapshot has been written.
/// If the write fails the previous state stays current and the error is
/// returned, so memory and storage never disagree.
pub struct CartStore {
    storage: Arc<dyn Storage>,
    state: CartState,
    phase: CartPhase,
    delivery_fee: Decimal,
}

impl CartStore {
    /// Create a store in the hydrating phase.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, delivery_fee: Decimal) -> Self {
        Self {
            storage,
            state: CartState::default(),
            phase: CartPhase::Hydrating,
            delivery_fee,
        }
    }

    /// Load the persisted cart, replacing whatever is in memory.
    ///
    /// Unreadable or malformed snapshots are treated as an empty cart.
    pub fn hydrate(&mut self) -> &CartState {
        let items = match self.storage.get(storage_keys::CART) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CartItem>>(&raw) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed cart snapshot");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read cart snapshot, starting empty");
                Vec::new()
            }
        };

        self.state = reduce(&self.state, CartAction::LoadCart(items));
        self.phase = CartPhase::Ready;
        debug!(items = self.state.items().len(), "Cart hydrated");
        &self.state
    }

    /// Apply `action`, persist the result, then commit it.
    ///
    /// A store still hydrating is hydrated first so the action applies to
    /// the persisted cart rather than overwriting it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the new snapshot cannot be written.
    pub fn dispatch(&mut self, action: CartAction) -> Result<&CartState, StorageError> {
        if self.phase == CartPhase::Hydrating {
            self.hydrate();
        }

        let label = action_label(&action);
        let next = reduce(&self.state, action);
        if next == self.state {
            debug!(action = label, "Cart unchanged");
            return Ok(&self.state);
        }

        self.persist(&next)?;
        self.state = next;

        let count = self.state.items().len().to_string();
        add_breadcrumb("cart", label, Some(&[("items", count.as_str())]));
        debug!(action = label, items = self.state.items().len(), "Cart updated");
        Ok(&self.state)
    }

    /// Empty the cart. Used once checkout is confirmed complete.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the empty snapshot cannot be written.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.dispatch(CartAction::LoadCart(Vec::new())).map(|_| ())
    }

    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> CartPhase {
        self.phase
    }

    #[must_use]
    pub const fn delivery_fee(&self) -> Decimal {
        self.delivery_fee
    }

    /// Totals of the current cart, computed on every call.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.state.totals(self.delivery_fee)
    }

    fn persist(&self, state: &CartState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state).map_err(|source| StorageError::Encode {
            key: storage_keys::CART.to_string(),
            source,
        })?;
        self.storage.set(storage_keys::CART, &json)
    }
}

const fn action_label(action: &CartAction) -> &'static str {
    match action {
        CartAction::AddToCart(_) => "add_to_cart",
        CartAction::UpdateQuantity { .. } => "update_quantity",
        CartAction::RemoveFromCart(_) => "remove_from_cart",
        CartAction::LoadCart(_) => "load_cart",
    }
}
