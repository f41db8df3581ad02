//! The `Storefront` facade wiring the stores, services and API together.

use std::sync::Arc;

use duka_core::OrderId;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::account::AccountService;
use crate::api::{AccountApi, CommerceClient, Order, OrderApi, TokenRefresher};
use crate::cart::{CartAction, CartState, CartStore, CartTotals};
use crate::checkout::{OrderWorkflow, PaymentReceipt};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::pipeline::AuthPipeline;
use crate::session::CredentialStore;
use crate::storage::{FileStorage, Storage, storage_keys};

/// Client runtime shared by a driving layer.
///
/// Cheaply cloneable via `Arc`. Each instance owns its own Credential
/// Store and Cart Store; nothing is process-global.
pub struct Storefront<A> {
    inner: Arc<StorefrontInner<A>>,
}

impl<A> Clone for Storefront<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StorefrontInner<A> {
    api: A,
    storage: Arc<dyn Storage>,
    credentials: Arc<CredentialStore>,
    cart: Mutex<CartStore>,
    accounts: AccountService<A>,
    orders: OrderWorkflow<A>,
}

impl Storefront<CommerceClient> {
    /// Build a storefront against the configured API and storage directory.
    ///
    /// Call [`init`](Self::init) before use.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage
    /// directory cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let api = CommerceClient::new(config)?;
        let storage = FileStorage::open(&config.storage_dir)?;
        Ok(Self::new(api, Arc::new(storage), config.delivery_fee))
    }
}

impl<A> Storefront<A>
where
    A: AccountApi + OrderApi + TokenRefresher + Clone,
{
    /// Create a storefront. Both stores start unhydrated.
    pub fn new(api: A, storage: Arc<dyn Storage>, delivery_fee: Decimal) -> Self {
        let credentials = Arc::new(CredentialStore::new(Arc::clone(&storage)));
        let pipeline = Arc::new(AuthPipeline::new(api.clone(), Arc::clone(&credentials)));

        Self {
            inner: Arc::new(StorefrontInner {
                accounts: AccountService::new(api.clone(), Arc::clone(&pipeline)),
                orders: OrderWorkflow::new(api.clone(), pipeline),
                cart: Mutex::new(CartStore::new(Arc::clone(&storage), delivery_fee)),
                storage,
                credentials,
                api,
            }),
        }
    }

    /// Hydrate the session and the cart from storage.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the session cannot be read.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<()> {
        self.inner.credentials.init().await?;
        let items = self.inner.cart.lock().await.hydrate().items().len();
        info!(
            signed_in = self.inner.credentials.tokens().await.is_some(),
            cart_items = items,
            "Storefront ready"
        );
        Ok(())
    }

    /// The underlying API client.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    #[must_use]
    pub fn accounts(&self) -> &AccountService<A> {
        &self.inner.accounts
    }

    #[must_use]
    pub fn orders(&self) -> &OrderWorkflow<A> {
        &self.inner.orders
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Apply a cart action and persist it. Actions apply in call order.
    ///
    /// A change to the cart detaches it from any order created from it, so
    /// paying that order no longer clears the cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the new cart cannot be persisted;
    /// the cart is unchanged in that case.
    pub async fn dispatch(&self, action: CartAction) -> Result<CartState> {
        let mut cart = self.inner.cart.lock().await;
        let before = cart.state().clone();
        let after = cart.dispatch(action)?.clone();
        if after != before {
            self.forget_pending_order();
        }
        Ok(after)
    }

    /// Snapshot of the current cart.
    pub async fn cart(&self) -> CartState {
        self.inner.cart.lock().await.state().clone()
    }

    /// Totals of the current cart.
    pub async fn cart_totals(&self) -> CartTotals {
        self.inner.cart.lock().await.totals()
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create an order from the current cart. The cart is kept.
    ///
    /// The order is remembered as the cart's pending order unless the cart
    /// changed while it was being created.
    ///
    /// # Errors
    ///
    /// See [`OrderWorkflow::create_order`].
    pub async fn checkout(&self, shipping_address: &str) -> Result<Order> {
        let snapshot = self.cart().await;
        let order = self
            .inner
            .orders
            .create_order(&snapshot, shipping_address)
            .await?;

        let cart = self.inner.cart.lock().await;
        if *cart.state() == snapshot {
            if let Err(e) = self
                .inner
                .storage
                .set(storage_keys::PENDING_ORDER, &order.id.to_string())
            {
                warn!(order_id = %order.id, error = %e, "Failed to remember pending order");
            }
        } else {
            debug!(order_id = %order.id, "Cart changed during checkout, order not pending");
        }
        Ok(order)
    }

    /// The order created from the current cart and not yet settled, if any.
    pub async fn pending_order(&self) -> Option<OrderId> {
        let _cart = self.inner.cart.lock().await;
        self.read_pending_order()
    }

    /// Pay towards an order. See [`OrderWorkflow::submit_payment`].
    ///
    /// # Errors
    ///
    /// See [`OrderWorkflow::submit_payment`].
    pub async fn pay(
        &self,
        order: &mut Order,
        phone: &str,
        amount: Decimal,
    ) -> Result<PaymentReceipt> {
        self.inner.orders.submit_payment(order, phone, amount).await
    }

    /// Clear the cart unconditionally, dropping any pending order.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the empty cart cannot be persisted.
    pub async fn complete_checkout(&self) -> Result<()> {
        let mut cart = self.inner.cart.lock().await;
        cart.clear()?;
        self.forget_pending_order();
        info!("Checkout complete, cart cleared");
        Ok(())
    }

    /// Clear the cart if `order` is the order created from it.
    ///
    /// Call once `order` is confirmed settled. Returns whether the cart was
    /// cleared; settling any other order leaves the cart alone.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the empty cart cannot be persisted.
    #[instrument(skip(self))]
    pub async fn complete_checkout_for(&self, order: OrderId) -> Result<bool> {
        let mut cart = self.inner.cart.lock().await;
        if self.read_pending_order() != Some(order) {
            debug!("Settled order was not created from this cart, keeping it");
            return Ok(false);
        }

        cart.clear()?;
        self.forget_pending_order();
        info!("Checkout complete, cart cleared");
        Ok(true)
    }

    // Callers hold the cart lock, which also guards the pending order key.

    fn read_pending_order(&self) -> Option<OrderId> {
        match self.inner.storage.get(storage_keys::PENDING_ORDER) {
            Ok(Some(raw)) => raw.parse().ok().or_else(|| {
                warn!(raw = %raw, "Ignoring unreadable pending order");
                None
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read pending order");
                None
            }
        }
    }

    fn forget_pending_order(&self) {
        if let Err(e) = self.inner.storage.remove(storage_keys::PENDING_ORDER) {
            warn!(error = %e, "Failed to drop pending order");
        }
    }
}
