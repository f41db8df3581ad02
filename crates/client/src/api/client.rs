//! `reqwest` implementation of the commerce API.

use std::sync::Arc;

use async_trait::async_trait;
use duka_core::OrderId;
use moka::future::Cache;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::cache::{CacheKey, CacheValue};
use super::types::{
    AuthResponse, CreateOrderRequest, ErrorBody, LoginRequest, Order, OrderList, Page,
    PaymentRequest, PaymentResponse, Product, ProfileResponse, RefreshRequest, RefreshResponse,
    RegisterRequest,
};
use super::{AccountApi, ApiError, OrderApi, TokenRefresher};
use crate::config::ClientConfig;

/// Header carrying a per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum number of body characters kept in errors and logs.
const MAX_BODY_CHARS: usize = 200;

/// Client for the commerce API.
///
/// Cheap to clone; clones share the HTTP connection pool and the catalog
/// cache. Products are cached for the configured TTL, orders never are.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("duka-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: config.api_base_url.clone(),
                cache,
            }),
        })
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.inner.client.get(self.endpoint(path)?))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.inner.client.post(self.endpoint(path)?))
    }

    // =========================================================================
    // Request Execution
    // =========================================================================

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.dispatch(request).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            warn!(
                error = %e,
                body = %truncate(&text),
                "Failed to parse commerce API response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request whose response body is irrelevant.
    async fn send_discarding_body(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.dispatch(request).await.map(|_| ())
    }

    /// Attach the request ID, send, and map failure statuses.
    async fn dispatch(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let path = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let error = classify_failure(status, &body, &path);

        if error.is_token_not_valid() {
            debug!(%request_id, %path, "Access token rejected");
        } else {
            warn!(
                %request_id,
                %path,
                status = %status,
                body = %truncate(&body),
                "Commerce API returned non-success status"
            );
        }

        Err(error)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List catalog products (the `results` of the first page).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let page: Page<Product> = self.send(self.get("products/")?).await?;

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(page.results.clone()))
            .await;

        Ok(page.results)
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no product has this slug.
    #[instrument(skip(self))]
    pub async fn get_product(&self, slug: &str) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(slug.to_string());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let mut url = self.endpoint("products/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::UnexpectedResponse("base URL cannot hold paths".to_string()))?
            .pop_if_empty()
            .push(slug)
            .push("");

        let product: Product = self.send(self.inner.client.get(url)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }
}

#[async_trait]
impl TokenRefresher for CommerceClient {
    #[instrument(skip_all)]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let request = self.post("token/refresh/")?.json(&RefreshRequest {
            refresh: refresh_token,
        });
        let response: RefreshResponse = self.send(request).await?;
        Ok(response.access)
    }
}

#[async_trait]
impl AccountApi for CommerceClient {
    #[instrument(skip_all, fields(username = %request.user.username))]
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.send(self.post("register/")?.json(request)).await
    }

    #[instrument(skip_all, fields(username = %request.username))]
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.send(self.post("login/")?.json(request)).await
    }

    #[instrument(skip_all)]
    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.send_discarding_body(self.post("logout/")?.bearer_auth(access_token))
            .await
    }

    #[instrument(skip_all)]
    async fn profile(&self, access_token: &str) -> Result<ProfileResponse, ApiError> {
        self.send(self.get("customers/me")?.bearer_auth(access_token))
            .await
    }
}

#[async_trait]
impl OrderApi for CommerceClient {
    #[instrument(skip_all)]
    async fn list_orders(&self, access_token: &str) -> Result<Vec<Order>, ApiError> {
        let orders: OrderList = self
            .send(self.get("orders/")?.bearer_auth(access_token))
            .await?;
        Ok(orders.into())
    }

    #[instrument(skip_all, fields(items = request.items.len(), amount = %request.amount))]
    async fn create_order(
        &self,
        access_token: &str,
        request: &CreateOrderRequest,
    ) -> Result<Order, ApiError> {
        self.send(self.post("orders/")?.bearer_auth(access_token).json(request))
            .await
    }

    #[instrument(skip(self, access_token))]
    async fn get_order(&self, access_token: &str, id: OrderId) -> Result<Order, ApiError> {
        self.send(self.get(&format!("orders/{id}/"))?.bearer_auth(access_token))
            .await
    }

    #[instrument(skip_all, fields(order = %request.order, amount = %request.amount))]
    async fn submit_payment(
        &self,
        access_token: &str,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ApiError> {
        self.send(self.post("payments/")?.bearer_auth(access_token).json(request))
            .await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a non-success response onto an `ApiError`.
///
/// The "token not valid" code is recognized from the body regardless of
/// status, since the backend pairs it with either 401 or 403.
fn classify_failure(status: StatusCode, body: &str, path: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    if parsed.is_token_not_valid() {
        let detail = parsed
            .detail
            .or(parsed.message)
            .unwrap_or_else(|| "token_not_valid".to_string());
        return ApiError::TokenNotValid(detail);
    }

    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound(path.to_string());
    }

    ApiError::Status {
        status: status.as_u16(),
        body: truncate(body),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_BODY_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_client() -> CommerceClient {
        let config = ClientConfig::from_lookup(|key| match key {
            "DUKA_API_URL" => Some("http://localhost:8000/api".to_string()),
            _ => None,
        })
        .unwrap();
        CommerceClient::new(&config).unwrap()
    }

    #[test]
    fn test_token_not_valid_detected_from_body() {
        let body = r#"{"detail":"Given token not valid for any token type","code":"token_not_valid"}"#;
        let err = classify_failure(StatusCode::UNAUTHORIZED, body, "/api/orders/");
        assert!(err.is_token_not_valid());
        assert!(err.to_string().contains("Given token not valid"));
    }

    #[test]
    fn test_plain_unauthorized_is_not_token_invalid() {
        let body = r#"{"detail":"Authentication credentials were not provided."}"#;
        let err = classify_failure(StatusCode::UNAUTHORIZED, body, "/api/orders/");
        assert!(matches!(err, ApiError::Status { status: 401, .. }));
    }

    #[test]
    fn test_server_error_keeps_truncated_body() {
        let body = "x".repeat(500);
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, &body, "/api/payments/");
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_BODY_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_keeps_path() {
        let err = classify_failure(StatusCode::NOT_FOUND, "<html>", "/api/orders/99/");
        assert!(matches!(err, ApiError::NotFound(ref path) if path == "/api/orders/99/"));
    }

    #[test]
    fn test_endpoints_join_onto_base_path() {
        let client = test_client();
        assert_eq!(
            client.endpoint("token/refresh/").unwrap().as_str(),
            "http://localhost:8000/api/token/refresh/"
        );
        assert_eq!(
            client.endpoint("customers/me").unwrap().as_str(),
            "http://localhost:8000/api/customers/me"
        );
    }
}
