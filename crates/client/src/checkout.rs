//! Order/Payment Workflow.
//!
//! Creates an order from a cart snapshot and drives one or more mobile-money
//! payments against it. Order balances are only ever taken from the
//! backend's reconciled response; a failed call leaves the order untouched.

use std::sync::Arc;

use duka_core::{OrderId, PaymentStatus, PhoneNumber, TransactionStatus};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::api::{
    CreateOrderRequest, Order, OrderApi, OrderItemRequest, PaymentRequest, TokenRefresher,
};
use crate::cart::CartState;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::pipeline::AuthPipeline;

/// Summary of a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub order_id: OrderId,
    pub transaction_id: Option<String>,
    pub transaction_status: TransactionStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    pub amount_remaining: Decimal,
    pub message: Option<String>,
}

impl PaymentReceipt {
    /// Whether this payment left nothing outstanding.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.amount_remaining <= Decimal::ZERO
    }
}

/// Order creation and payment against the commerce API.
pub struct OrderWorkflow<A> {
    api: A,
    pipeline: Arc<AuthPipeline<A>>,
}

impl<A> OrderWorkflow<A>
where
    A: OrderApi + TokenRefresher,
{
    pub const fn new(api: A, pipeline: Arc<AuthPipeline<A>>) -> Self {
        Self { api, pipeline }
    }

    /// Create an order for the signed-in customer from a cart snapshot.
    ///
    /// The cart is not cleared; call
    /// [`Storefront::complete_checkout`](crate::Storefront::complete_checkout)
    /// once checkout is confirmed.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` without a session
    /// - `ClientError::ProfileMissing` if the cached profile has no customer ID
    /// - `ClientError::EmptyCart` for an empty cart
    /// - pipeline errors from the remote call
    #[instrument(skip(self, cart), fields(items = cart.items().len()))]
    pub async fn create_order(&self, cart: &CartState, shipping_address: &str) -> Result<Order> {
        let credentials = self.pipeline.credentials();
        let credential = credentials
            .get()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let customer = credential
            .profile
            .as_ref()
            .and_then(|profile| profile.customer_id())
            .ok_or(ClientError::ProfileMissing)?;

        if cart.is_empty() {
            return Err(ClientError::EmptyCart);
        }

        let request = CreateOrderRequest {
            customer,
            items: cart
                .items()
                .iter()
                .map(|item| OrderItemRequest {
                    product: item.id,
                    quantity: item.quantity,
                })
                .collect(),
            amount: cart.subtotal(),
            shipping_address: shipping_address.to_string(),
        };

        let api = &self.api;
        let request = &request;
        let order = self
            .pipeline
            .with_auth_retry(|token| async move { api.create_order(&token, request).await })
            .await?;

        info!(order_id = %order.id, amount = %order.amount, "Order created");
        add_breadcrumb(
            "checkout",
            "Order created",
            Some(&[("order_id", order.id.to_string().as_str())]),
        );
        Ok(order)
    }

    /// Submit a mobile-money payment against `order`.
    ///
    /// The phone number is normalized and its carrier resolved before any
    /// remote call. On confirmed success the order's balances are replaced
    /// by the backend's figures; on any failure `order` is left untouched.
    /// Partially paid orders accept further payments.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidPaymentAmount` for a non-positive amount
    /// - `ClientError::InvalidPhoneNumber` / `ClientError::UnknownCarrier`
    /// - `ClientError::PaymentDeclined` if the provider reports failure
    /// - pipeline errors from the remote call
    #[instrument(skip(self, order, phone), fields(order_id = %order.id))]
    pub async fn submit_payment(
        &self,
        order: &mut Order,
        phone: &str,
        amount: Decimal,
    ) -> Result<PaymentReceipt> {
        if amount <= Decimal::ZERO {
            return Err(ClientError::InvalidPaymentAmount(amount.to_string()));
        }

        let phone = PhoneNumber::parse(phone)?;
        let carrier = phone
            .carrier()
            .ok_or_else(|| ClientError::UnknownCarrier(phone.to_string()))?;

        let request = PaymentRequest {
            order: order.id,
            phone_number: phone.as_str().to_string(),
            amount,
            payment_method: carrier,
        };

        let api = &self.api;
        let request = &request;
        let response = self
            .pipeline
            .with_auth_retry(|token| async move { api.submit_payment(&token, request).await })
            .await?;

        if !response.provider.success {
            let message = response
                .provider
                .message
                .unwrap_or_else(|| "provider reported failure".to_string());
            warn!(order_id = %order.id, %carrier, %message, "Payment declined");
            return Err(ClientError::PaymentDeclined(message));
        }

        order.apply_balance(&response.order);

        info!(
            order_id = %order.id,
            %carrier,
            payment_status = %order.payment_status,
            amount_remaining = %order.amount_remaining,
            "Payment accepted"
        );
        add_breadcrumb(
            "checkout",
            "Payment accepted",
            Some(&[
                ("order_id", order.id.to_string().as_str()),
                ("carrier", carrier.display_name()),
            ]),
        );

        Ok(PaymentReceipt {
            order_id: order.id,
            transaction_id: response
                .provider
                .transaction_id
                .or(response.payment.transaction_id),
            transaction_status: response.payment.status,
            payment_status: order.payment_status,
            amount_paid: order.amount_paid,
            amount_remaining: order.amount_remaining,
            message: response.provider.message,
        })
    }

    /// The signed-in customer's orders.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's errors.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        let api = &self.api;
        self.pipeline
            .with_auth_retry(|token| async move { api.list_orders(&token).await })
            .await
    }

    /// A single order with its current balances.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Remote(ApiError::NotFound)` for unknown orders,
    /// otherwise the pipeline's errors.
    #[instrument(skip(self))]
    pub async fn order_detail(&self, id: OrderId) -> Result<Order> {
        let api = &self.api;
        self.pipeline
            .with_auth_retry(|token| async move { api.get_order(&token, id).await })
            .await
    }
}
