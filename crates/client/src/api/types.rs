//! Request and response types for the commerce API.
//!
//! Wire structs mirror the backend's JSON field names. Domain types that the
//! rest of the client works with (`Order`, `Product`) are normalized here so
//! nothing downstream has to care about optional or renamed wire fields.

use chrono::{DateTime, Utc};
use duka_core::{
    Carrier, CustomerId, OrderId, OrderLineId, OrderStatus, PaymentStatus, ProductId,
    TransactionStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::session::ProfileSnapshot;

// =============================================================================
// Error Body
// =============================================================================

/// Machine-readable code the backend uses for an expired or invalid access token.
pub const TOKEN_NOT_VALID_CODE: &str = "token_not_valid";

/// Structured error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code, if any.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable detail.
    #[serde(default)]
    pub detail: Option<String>,
    /// Alternate human-readable message field.
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Whether this body signals an invalid access token.
    #[must_use]
    pub fn is_token_not_valid(&self) -> bool {
        self.code.as_deref() == Some(TOKEN_NOT_VALID_CODE)
    }
}

// =============================================================================
// Auth Types
// =============================================================================

/// Access/refresh token pair.
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Login form.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account details submitted at registration.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
}

/// Registration form.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub user: NewAccount,
    pub password: String,
    pub password2: String,
}

/// User record embedded in login and registration responses.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAccount {
    #[serde(default)]
    pub id: Option<CustomerId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, alias = "phonenumber")]
    pub telephone: Option<String>,
    #[serde(default, alias = "address")]
    pub location: Option<String>,
    #[serde(default)]
    pub tokens: Option<TokenPair>,
}

impl UserAccount {
    /// Project the account onto the profile snapshot cached with the session.
    #[must_use]
    pub fn to_profile(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            telephone: self.telephone.clone(),
            location: self.location.clone(),
        }
    }
}

/// Response from `POST login/`.
///
/// Tokens arrive either at the top level (`access`, `refresh`) or nested in
/// `user.tokens`; [`AuthResponse::tokens`] accepts both.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "data")]
    pub user: Option<UserAccount>,
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

impl AuthResponse {
    /// The token pair carried by this response, wherever the backend put it.
    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        if let (Some(access), Some(refresh)) = (&self.access, &self.refresh) {
            return Some(TokenPair {
                access: access.clone(),
                refresh: refresh.clone(),
            });
        }
        self.user.as_ref().and_then(|user| user.tokens.clone())
    }

    /// The profile carried by this response, if any.
    #[must_use]
    pub fn profile(&self) -> Option<ProfileSnapshot> {
        self.user.as_ref().map(UserAccount::to_profile)
    }
}

/// Body of `POST token/refresh/`.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response of `POST token/refresh/`.
#[derive(Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
}

/// Response of `GET customers/me`.
///
/// The backend nests account fields under `user`; some deployments return
/// them flat, so both shapes are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    Nested { user: UserAccount },
    Flat(UserAccount),
}

impl ProfileResponse {
    /// Project onto the cached profile snapshot.
    #[must_use]
    pub fn to_profile(&self) -> ProfileSnapshot {
        match self {
            Self::Nested { user } | Self::Flat(user) => user.to_profile(),
        }
    }
}

// =============================================================================
// Catalog Types
// =============================================================================

/// A paginated list response; the client consumes `results`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub vendor_name: String,
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub sku: String,
    #[serde(default)]
    pub image_url: String,
}

impl Product {
    /// Build the cart line for `quantity` units of this product.
    #[must_use]
    pub fn to_cart_item(&self, quantity: u32) -> CartItem {
        CartItem {
            id: self.id,
            name: self.name.clone(),
            unit_price: self.price,
            image_url: self.image_url.clone(),
            quantity,
            sku: self.sku.clone(),
            vendor_name: self.vendor_name.clone(),
        }
    }

    /// Whether the product is out of stock according to the catalog.
    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.stock.is_some_and(|stock| stock <= 0)
    }
}

/// SKUs are strings in some catalog versions and integers in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sku {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Sku>::deserialize(deserializer)? {
        Some(Sku::Text(s)) => s,
        Some(Sku::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

// =============================================================================
// Order Types
// =============================================================================

/// One line of an order creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemRequest {
    pub product: ProductId,
    pub quantity: u32,
}

/// Body of `POST orders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    pub customer: CustomerId,
    pub items: Vec<OrderItemRequest>,
    pub amount: Decimal,
    pub shipping_address: String,
}

/// A line of a server-side order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(default)]
    pub id: Option<OrderLineId>,
    pub product: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_price: Option<Decimal>,
    pub quantity: u32,
}

/// Order as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OrderRecord {
    id: OrderId,
    #[serde(default)]
    customer: Option<CustomerId>,
    #[serde(default)]
    items: Vec<OrderLine>,
    amount: Decimal,
    #[serde(default)]
    shipping_address: String,
    #[serde(default)]
    status: OrderStatus,
    #[serde(default)]
    payment_status: PaymentStatus,
    #[serde(default)]
    amount_paid: Decimal,
    #[serde(default, alias = "remaining_balance")]
    amount_remaining: Option<Decimal>,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// A server-side order with its payment balances.
///
/// `amount == amount_paid + amount_remaining` holds for every order built
/// from a server response; balances are only ever replaced wholesale from
/// the server, never recomputed from a payment amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OrderRecord")]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "customer")]
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderLine>,
    pub amount: Decimal,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    pub amount_remaining: Decimal,
    pub tracking_number: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<OrderRecord> for Order {
    fn from(record: OrderRecord) -> Self {
        // Older order endpoints omit the remaining balance; derive it from
        // the two server-provided figures rather than guessing.
        let amount_remaining = record
            .amount_remaining
            .unwrap_or(record.amount - record.amount_paid);

        Self {
            id: record.id,
            customer_id: record.customer,
            items: record.items,
            amount: record.amount,
            shipping_address: record.shipping_address,
            status: record.status,
            payment_status: record.payment_status,
            amount_paid: record.amount_paid,
            amount_remaining,
            tracking_number: record.tracking_number,
            created_at: record.created_at,
        }
    }
}

impl Order {
    /// Whether the order has no outstanding balance.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.amount_remaining <= Decimal::ZERO
    }

    /// Replace the local balances with the server's reconciled figures.
    pub fn apply_balance(&mut self, balance: &OrderBalance) {
        self.status = balance.status;
        self.payment_status = balance.payment_status;
        self.amount_paid = balance.amount_paid;
        self.amount_remaining = balance.remaining_balance;
    }
}

/// The order list endpoint is paginated on some deployments and a bare
/// array on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OrderList {
    Page(Page<Order>),
    Plain(Vec<Order>),
}

impl From<OrderList> for Vec<Order> {
    fn from(list: OrderList) -> Self {
        match list {
            OrderList::Page(page) => page.results,
            OrderList::Plain(orders) => orders,
        }
    }
}

// =============================================================================
// Payment Types
// =============================================================================

/// Body of `POST payments/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub order: OrderId,
    pub phone_number: String,
    pub amount: Decimal,
    pub payment_method: Carrier,
}

/// The payment record created by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status: TransactionStatus,
}

/// Reconciled order balances returned with a payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBalance {
    #[serde(default)]
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    #[serde(alias = "amount_remaining")]
    pub remaining_balance: Decimal,
}

impl OrderBalance {
    /// Alias matching the `Order` field name.
    #[must_use]
    pub const fn amount_remaining(&self) -> Decimal {
        self.remaining_balance
    }
}

/// Outcome reported by the mobile-money provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse {
    pub success: bool,
    #[serde(default, rename = "transactionId", alias = "transaction_id")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `POST payments/`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentResponse {
    pub payment: PaymentRecord,
    pub order: OrderBalance,
    #[serde(rename = "azampay_response", alias = "provider_response")]
    pub provider: ProviderResponse,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_order_derives_missing_remaining_balance() {
        let order: Order = serde_json::from_value(json!({
            "id": 3,
            "customer": 9,
            "items": [{"id": 1, "product": 1, "quantity": 2}],
            "amount": "2500.00",
            "shipping_address": "Sinza, Dar es Salaam",
            "status": "PROCESSING",
            "payment_status": "PENDING",
            "amount_paid": "1000.00",
            "tracking_number": null
        }))
        .unwrap();

        assert_eq!(order.amount_remaining, Decimal::from(1500));
        assert_eq!(order.amount, order.amount_paid + order.amount_remaining);
        assert_eq!(order.customer_id, Some(CustomerId::new(9)));
    }

    #[test]
    fn test_order_prefers_server_remaining_balance() {
        let order: Order = serde_json::from_value(json!({
            "id": 3,
            "amount": "2500",
            "amount_paid": "0",
            "amount_remaining": "2500"
        }))
        .unwrap();
        assert_eq!(order.amount_remaining, Decimal::from(2500));
        assert!(!order.is_settled());
    }

    #[test]
    fn test_order_list_accepts_page_and_array() {
        let page: OrderList = serde_json::from_value(json!({
            "count": 1, "next": null, "previous": null,
            "results": [{"id": 1, "amount": "10"}]
        }))
        .unwrap();
        assert_eq!(Vec::<Order>::from(page).len(), 1);

        let plain: OrderList = serde_json::from_value(json!([{"id": 1, "amount": "10"}])).unwrap();
        assert_eq!(Vec::<Order>::from(plain).len(), 1);
    }

    #[test]
    fn test_auth_response_tokens_top_level_or_nested() {
        let top: AuthResponse = serde_json::from_value(json!({
            "access": "a", "refresh": "r", "user": {"id": 4, "username": "neema"}
        }))
        .unwrap();
        assert_eq!(top.tokens().unwrap().access, "a");

        let nested: AuthResponse = serde_json::from_value(json!({
            "user": {"id": 4, "username": "neema", "tokens": {"access": "a2", "refresh": "r2"}}
        }))
        .unwrap();
        let tokens = nested.tokens().unwrap();
        assert_eq!(tokens.access, "a2");
        assert_eq!(tokens.refresh, "r2");
        assert_eq!(nested.profile().unwrap().id, Some(CustomerId::new(4)));
    }

    #[test]
    fn test_product_sku_number_or_string() {
        let product: Product = serde_json::from_value(json!({
            "id": 1, "name": "Kanga", "slug": "kanga", "price": "1000.00", "sku": 1234
        }))
        .unwrap();
        assert_eq!(product.sku, "1234");

        let item = product.to_cart_item(2);
        assert_eq!(item.quantity, 2);
        assert_eq!(item.unit_price, Decimal::from(1000));
    }

    #[test]
    fn test_payment_request_wire_format() {
        let request = PaymentRequest {
            order: OrderId::new(3),
            phone_number: "255741000111".to_string(),
            amount: Decimal::from(1500),
            payment_method: Carrier::Mpesa,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "order": 3,
                "phone_number": "255741000111",
                "amount": "1500",
                "payment_method": "m-pesa"
            })
        );
    }

    #[test]
    fn test_error_body_token_code() {
        let body: ErrorBody = serde_json::from_value(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        }))
        .unwrap();
        assert!(body.is_token_not_valid());
        assert!(!ErrorBody::default().is_token_not_valid());
    }
}
