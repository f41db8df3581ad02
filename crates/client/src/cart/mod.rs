//! Cart state machine.
//!
//! [`reduce`] is a pure transition function over [`CartState`]; the
//! [`CartStore`] driver applies it and persists every resulting state.
//!
//! # Invariants
//!
//! - Item IDs are unique within a cart
//! - Every quantity is at least 1
//! - The subtotal is representable as a `Decimal`; a line or quantity that
//!   would overflow it is refused
//! - Totals are derived on read, never stored

mod store;

pub use store::{CartPhase, CartStore};

use duka_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub image_url: String,
    pub quantity: u32,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub vendor_name: String,
}

impl CartItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::MAX)
    }

    fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Cart transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Append an item, or merge its quantity into an existing line.
    AddToCart(CartItem),
    /// Set a line's quantity, clamped to at least 1.
    UpdateQuantity { id: ProductId, quantity: u32 },
    /// Drop a line. Missing IDs are a no-op.
    RemoveFromCart(ProductId),
    /// Replace the whole cart.
    LoadCart(Vec<CartItem>),
}

/// Cart contents in display order.
///
/// Deserialization goes through [`CartState::from_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<CartItem>", from = "Vec<CartItem>")]
pub struct CartState {
    items: Vec<CartItem>,
}

impl CartState {
    /// Build a cart from arbitrary items, merging duplicate IDs and
    /// clamping quantities. Items that would overflow the subtotal are
    /// dropped.
    #[must_use]
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut state = Self::default();
        for item in items {
            state.merge(item);
        }
        state
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by product ID.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count, item| count.saturating_add(item.quantity))
    }

    /// `Σ unit_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        checked_subtotal(&self.items).unwrap_or(Decimal::MAX)
    }

    /// `flat_fee` for a non-empty cart, zero otherwise.
    #[must_use]
    pub fn delivery_fee(&self, flat_fee: Decimal) -> Decimal {
        if self.items.is_empty() {
            Decimal::ZERO
        } else {
            flat_fee
        }
    }

    /// `subtotal + delivery_fee`.
    #[must_use]
    pub fn total(&self, flat_fee: Decimal) -> Decimal {
        self.subtotal().saturating_add(self.delivery_fee(flat_fee))
    }

    /// Computed totals for display.
    #[must_use]
    pub fn totals(&self, flat_fee: Decimal) -> CartTotals {
        CartTotals {
            subtotal: self.subtotal(),
            delivery_fee: self.delivery_fee(flat_fee),
            total: self.total(flat_fee),
        }
    }

    fn merge(&mut self, mut item: CartItem) {
        item.quantity = item.quantity.max(1);
        let mut items = self.items.clone();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => items.push(item),
        }
        self.accept(items);
    }

    /// Replace the items unless that would overflow the subtotal.
    fn accept(&mut self, items: Vec<CartItem>) {
        if checked_subtotal(&items).is_some() {
            self.items = items;
        } else {
            warn!("Refusing cart change that overflows the subtotal");
        }
    }
}

impl From<Vec<CartItem>> for CartState {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<CartState> for Vec<CartItem> {
    fn from(state: CartState) -> Self {
        state.items
    }
}

fn checked_subtotal(items: &[CartItem]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |sum, item| {
        item.checked_line_total().and_then(|line| sum.checked_add(line))
    })
}

/// Cart totals derived from a [`CartState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

/// Apply `action` to `state`. Pure.
#[must_use]
pub fn reduce(state: &CartState, action: CartAction) -> CartState {
    match action {
        CartAction::AddToCart(item) => {
            let mut next = state.clone();
            next.merge(item);
            next
        }
        CartAction::UpdateQuantity { id, quantity } => {
            let mut items = state.items.clone();
            if let Some(item) = items.iter_mut().find(|item| item.id == id) {
                item.quantity = quantity.max(1);
            }
            let mut next = state.clone();
            next.accept(items);
            next
        }
        CartAction::RemoveFromCart(id) => {
            let mut next = state.clone();
            next.items.retain(|item| item.id != id);
            next
        }
        CartAction::LoadCart(items) => CartState::from_items(items),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn item(id: i64, price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Decimal::from(price),
            image_url: String::new(),
            quantity,
            sku: format!("SKU-{id}"),
            vendor_name: "Kariakoo Traders".to_string(),
        }
    }

    fn assert_invariants(state: &CartState) {
        let ids: HashSet<_> = state.items().iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), state.items().len(), "duplicate ids in {state:?}");
        assert!(state.items().iter().all(|i| i.quantity >= 1));
    }

    #[test]
    fn test_add_merges_same_id() {
        let state = reduce(&CartState::default(), CartAction::AddToCart(item(1, 1000, 1)));
        let state = reduce(&state, CartAction::AddToCart(item(1, 1000, 2)));

        assert_eq!(state.items().len(), 1);
        assert_eq!(state.get(ProductId::new(1)).unwrap().quantity, 3);
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut state = CartState::default();
        for id in [3, 1, 2] {
            state = reduce(&state, CartAction::AddToCart(item(id, 100, 1)));
        }
        let ids: Vec<i64> = state.items().iter().map(|i| i.id.as_i64()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_update_quantity_clamps_to_one() {
        let state = CartState::from_items(vec![item(1, 1000, 4)]);
        let state = reduce(
            &state,
            CartAction::UpdateQuantity {
                id: ProductId::new(1),
                quantity: 0,
            },
        );
        assert_eq!(state.get(ProductId::new(1)).unwrap().quantity, 1);
    }

    #[test]
    fn test_update_quantity_for_missing_id_is_noop() {
        let state = CartState::from_items(vec![item(1, 1000, 4)]);
        let next = reduce(
            &state,
            CartAction::UpdateQuantity {
                id: ProductId::new(9),
                quantity: 2,
            },
        );
        assert_eq!(next, state);
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let state = CartState::from_items(vec![item(1, 1000, 2), item(2, 500, 1)]);
        let next = reduce(&state, CartAction::RemoveFromCart(ProductId::new(42)));
        assert_eq!(next, state);
    }

    #[test]
    fn test_load_sanitizes_items() {
        let state = reduce(
            &CartState::from_items(vec![item(5, 1, 1)]),
            CartAction::LoadCart(vec![item(1, 1000, 0), item(1, 1000, 2), item(2, 500, 1)]),
        );
        assert_invariants(&state);
        assert_eq!(state.items().len(), 2);
        assert_eq!(state.get(ProductId::new(1)).unwrap().quantity, 3);
        assert!(state.get(ProductId::new(5)).is_none());
    }

    #[test]
    fn test_load_empty_clears() {
        let state = CartState::from_items(vec![item(1, 1000, 2)]);
        let state = reduce(&state, CartAction::LoadCart(Vec::new()));
        assert!(state.is_empty());
    }

    #[test]
    fn test_totals() {
        let fee: Decimal = "5.99".parse().unwrap();
        let state = CartState::from_items(vec![item(1, 1000, 2), item(2, 500, 1)]);

        assert_eq!(state.subtotal(), Decimal::from(2500));
        assert_eq!(state.delivery_fee(fee), fee);
        assert_eq!(state.total(fee), "2505.99".parse::<Decimal>().unwrap());
        assert_eq!(state.item_count(), 3);

        let empty = CartState::default();
        assert_eq!(empty.totals(fee).total, Decimal::ZERO);
    }

    #[test]
    fn test_invariants_hold_over_action_sequences() {
        // Deterministic pseudo-random walk over the three mutating actions
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        let mut state = CartState::default();
        for _ in 0..2_000 {
            let id = i64::try_from(next() % 6).unwrap();
            let quantity = u32::try_from(next() % 4).unwrap();
            let action = match next() % 3 {
                0 => CartAction::AddToCart(item(id, 250, quantity)),
                1 => CartAction::UpdateQuantity {
                    id: ProductId::new(id),
                    quantity,
                },
                _ => CartAction::RemoveFromCart(ProductId::new(id)),
            };
            state = reduce(&state, action);
            assert_invariants(&state);
        }
    }

    #[test]
    fn test_wire_format() {
        let state = CartState::from_items(vec![item(1, 1000, 2)]);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json[0]["price"], "1000");
        assert_eq!(json[0]["imageUrl"], "");
        assert_eq!(json[0]["vendorName"], "Kariakoo Traders");

        let back: CartState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_overflowing_snapshot_lines_are_dropped() {
        let raw = r#"[
            {"id": 1, "name": "Kanga", "price": "79228162514264337593543950335", "quantity": 2},
            {"id": 2, "name": "Kikoi", "price": "1500", "quantity": 1}
        ]"#;
        let state: CartState = serde_json::from_str(raw).unwrap();

        assert_eq!(state.items().len(), 1);
        assert!(state.get(ProductId::new(1)).is_none());
        assert_eq!(state.subtotal(), Decimal::from(1500));
        assert_eq!(state.totals(Decimal::from(5)).total, Decimal::from(1505));
    }

    #[test]
    fn test_quantity_that_overflows_subtotal_is_refused() {
        let price: Decimal = "100000000000000000000".parse().unwrap();
        let mut big = item(1, 1, 1);
        big.unit_price = price;
        let state = CartState::from_items(vec![big.clone()]);

        let mut more = big;
        more.quantity = u32::MAX;
        let after_add = reduce(&state, CartAction::AddToCart(more));
        assert_eq!(after_add, state);

        let after_update = reduce(
            &state,
            CartAction::UpdateQuantity {
                id: ProductId::new(1),
                quantity: u32::MAX,
            },
        );
        assert_eq!(after_update, state);
        assert_eq!(after_update.subtotal(), price);
    }
}
