//! In-memory commerce backend for driving the `Storefront` in tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duka_client::api::{
    AccountApi, ApiError, AuthResponse, CreateOrderRequest, LoginRequest, Order, OrderApi,
    OrderBalance, OrderLine, PaymentRecord, PaymentRequest, PaymentResponse, ProfileResponse,
    ProviderResponse, RegisterRequest, TokenRefresher, UserAccount,
};
use duka_client::{MemoryStorage, Storefront};
use duka_core::{CustomerId, OrderId, OrderStatus, PaymentStatus, TransactionStatus};
use rust_decimal::Decimal;
use serde_json::json;

pub const USERNAME: &str = "amani";
pub const PASSWORD: &str = "siri-kali";
pub const CUSTOMER_ID: i64 = 7;

/// Recorded state of the fake backend.
#[derive(Debug, Default)]
pub struct BackendState {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_fails: bool,
    pub logout_fails: bool,
    pub decline_payments: bool,
    pub omit_login_profile: bool,
    pub profile_fails: bool,
    pub issued: u32,
    pub orders: HashMap<OrderId, Order>,
    pub create_requests: Vec<CreateOrderRequest>,
    pub payment_requests: Vec<PaymentRequest>,
    pub refresh_calls: usize,
    pub logout_calls: usize,
}

/// Fake implementing the three API traits over shared state.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state();
            state.access_token = "access-0".to_string();
            state.refresh_token = "refresh-0".to_string();
        }
        backend
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    /// Invalidate the current access token, as if it expired.
    pub fn expire_access_token(&self) {
        let mut state = self.state();
        state.issued += 1;
        state.access_token = format!("access-{}", state.issued);
    }

    fn authorize(&self, token: &str) -> Result<(), ApiError> {
        if self.state().access_token == token {
            Ok(())
        } else {
            Err(ApiError::TokenNotValid(
                "Given token not valid for any token type".to_string(),
            ))
        }
    }

    fn auth_response(&self) -> AuthResponse {
        let state = self.state();
        if state.omit_login_profile {
            return serde_json::from_value(json!({
                "status": "success",
                "access": state.access_token,
                "refresh": state.refresh_token,
                "user": {"username": USERNAME}
            }))
            .unwrap();
        }
        serde_json::from_value(json!({
            "status": "success",
            "access": state.access_token,
            "refresh": state.refresh_token,
            "user": {
                "id": CUSTOMER_ID,
                "username": USERNAME,
                "email": "amani@example.co.tz",
                "first_name": "Amani"
            }
        }))
        .unwrap()
    }
}

#[async_trait]
impl TokenRefresher for FakeBackend {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let mut state = self.state();
        state.refresh_calls += 1;
        if state.refresh_fails || refresh_token != state.refresh_token {
            return Err(ApiError::Status {
                status: 401,
                body: r#"{"detail":"Token is blacklisted","code":"token_not_valid"}"#.to_string(),
            });
        }
        Ok(state.access_token.clone())
    }
}

#[async_trait]
impl AccountApi for FakeBackend {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        if request.password != request.password2 {
            return Err(ApiError::Status {
                status: 400,
                body: r#"{"password":["Password fields didn't match."]}"#.to_string(),
            });
        }
        Ok(serde_json::from_value(json!({
            "status": "success",
            "message": "Account created",
            "data": {"id": CUSTOMER_ID, "username": request.user.username}
        }))
        .unwrap())
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        if request.username != USERNAME || request.password != PASSWORD {
            return Err(ApiError::Status {
                status: 401,
                body: r#"{"detail":"No active account found with the given credentials"}"#
                    .to_string(),
            });
        }
        Ok(self.auth_response())
    }

    async fn logout(&self, _access_token: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.logout_calls += 1;
        if state.logout_fails {
            return Err(ApiError::Status {
                status: 502,
                body: "Bad Gateway".to_string(),
            });
        }
        Ok(())
    }

    async fn profile(&self, access_token: &str) -> Result<ProfileResponse, ApiError> {
        self.authorize(access_token)?;
        if self.state().profile_fails {
            return Err(ApiError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        Ok(ProfileResponse::Flat(UserAccount {
            id: Some(CustomerId::new(CUSTOMER_ID)),
            username: Some(USERNAME.to_string()),
            email: Some("amani@example.co.tz".to_string()),
            first_name: Some("Amani".to_string()),
            last_name: Some("Mushi".to_string()),
            telephone: Some("0741000111".to_string()),
            location: Some("Arusha".to_string()),
            tokens: None,
        }))
    }
}

#[async_trait]
impl OrderApi for FakeBackend {
    async fn list_orders(&self, access_token: &str) -> Result<Vec<Order>, ApiError> {
        self.authorize(access_token)?;
        let mut orders: Vec<Order> = self.state().orders.values().cloned().collect();
        orders.sort_by_key(|order| order.id);
        Ok(orders)
    }

    async fn create_order(
        &self,
        access_token: &str,
        request: &CreateOrderRequest,
    ) -> Result<Order, ApiError> {
        self.authorize(access_token)?;
        let mut state = self.state();
        state.create_requests.push(request.clone());

        let id = OrderId::new(i64::try_from(state.orders.len()).unwrap() + 1);
        let order = Order {
            id,
            customer_id: Some(request.customer),
            items: request
                .items
                .iter()
                .map(|item| OrderLine {
                    id: None,
                    product: item.product,
                    product_name: None,
                    product_price: None,
                    quantity: item.quantity,
                })
                .collect(),
            amount: request.amount,
            shipping_address: request.shipping_address.clone(),
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Pending,
            amount_paid: Decimal::ZERO,
            amount_remaining: request.amount,
            tracking_number: None,
            created_at: None,
        };
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, access_token: &str, id: OrderId) -> Result<Order, ApiError> {
        self.authorize(access_token)?;
        self.state()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/api/orders/{id}/")))
    }

    async fn submit_payment(
        &self,
        access_token: &str,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ApiError> {
        self.authorize(access_token)?;
        let mut state = self.state();
        state.payment_requests.push(request.clone());
        let transaction = format!("TX-{}", state.payment_requests.len());

        if state.decline_payments {
            let order = state
                .orders
                .get(&request.order)
                .ok_or_else(|| ApiError::NotFound(format!("/api/orders/{}/", request.order)))?;
            return Ok(PaymentResponse {
                payment: PaymentRecord {
                    id: None,
                    amount: request.amount,
                    transaction_id: None,
                    status: TransactionStatus::Failed,
                },
                order: OrderBalance {
                    status: order.status,
                    payment_status: order.payment_status,
                    amount_paid: order.amount_paid,
                    remaining_balance: order.amount_remaining,
                },
                provider: ProviderResponse {
                    success: false,
                    transaction_id: None,
                    message: Some("Insufficient balance".to_string()),
                },
            });
        }

        let order = state
            .orders
            .get_mut(&request.order)
            .ok_or_else(|| ApiError::NotFound(format!("/api/orders/{}/", request.order)))?;
        order.amount_paid += request.amount;
        order.amount_remaining = (order.amount - order.amount_paid).max(Decimal::ZERO);
        if order.amount_remaining.is_zero() {
            order.payment_status = PaymentStatus::Paid;
            order.status = OrderStatus::Completed;
        } else {
            order.payment_status = PaymentStatus::PartiallyPaid;
        }

        Ok(PaymentResponse {
            payment: PaymentRecord {
                id: Some(transaction.clone()),
                amount: request.amount,
                transaction_id: Some(transaction.clone()),
                status: TransactionStatus::Completed,
            },
            order: OrderBalance {
                status: order.status,
                payment_status: order.payment_status,
                amount_paid: order.amount_paid,
                remaining_balance: order.amount_remaining,
            },
            provider: ProviderResponse {
                success: true,
                transaction_id: Some(transaction),
                message: Some("Payment request sent".to_string()),
            },
        })
    }
}

pub fn delivery_fee() -> Decimal {
    "5.99".parse().unwrap()
}

/// A storefront over `backend` and fresh in-memory storage, initialized.
pub async fn storefront(backend: &FakeBackend) -> Storefront<FakeBackend> {
    let storefront = Storefront::new(
        backend.clone(),
        Arc::new(MemoryStorage::new()),
        delivery_fee(),
    );
    storefront.init().await.unwrap();
    storefront
}

/// As [`storefront`], signed in as the test customer.
pub async fn signed_in(backend: &FakeBackend) -> Storefront<FakeBackend> {
    let storefront = storefront(backend).await;
    storefront
        .accounts()
        .login(USERNAME, PASSWORD)
        .await
        .unwrap();
    storefront
}
