//! Authenticated Request Pipeline.
//!
//! Runs a remote operation with the current access token and recovers from
//! exactly one failure: the backend rejecting that token. Recovery is one
//! refresh call followed by one retry. Everything else propagates unchanged.

use std::future::Future;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, TokenRefresher};
use crate::error::{ClientError, clear_sentry_user};
use crate::session::CredentialStore;

/// Wraps remote calls with token attachment and single refresh-and-retry.
pub struct AuthPipeline<R> {
    refresher: R,
    credentials: Arc<CredentialStore>,
}

impl<R: TokenRefresher> AuthPipeline<R> {
    /// Create a pipeline over a shared Credential Store.
    pub const fn new(refresher: R, credentials: Arc<CredentialStore>) -> Self {
        Self {
            refresher,
            credentials,
        }
    }

    /// The Credential Store this pipeline reads from.
    #[must_use]
    pub const fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Run `op` with a valid access token.
    ///
    /// `op` receives the access token and may be called at most twice.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` if either token is missing; `op` is not called.
    /// - `ClientError::SessionExpired` if the refresh call fails; the session is
    ///   cleared unless another one replaced it in the meantime.
    /// - `ClientError::Remote` for any other failure of `op`, including a
    ///   failure of the retry itself.
    #[instrument(skip_all)]
    pub async fn with_auth_retry<T, F, Fut>(&self, op: F) -> Result<T, ClientError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let Some(tokens) = self.credentials.tokens().await else {
            return Err(ClientError::NotAuthenticated);
        };

        let err = match op(tokens.access.expose_secret().to_string()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_token_not_valid() => err,
            Err(err) => return Err(ClientError::Remote(err)),
        };

        debug!(reason = %err, "Access token rejected, refreshing");

        let access = match self
            .refresher
            .refresh_access_token(tokens.refresh.expose_secret())
            .await
        {
            Ok(access) => access,
            Err(refresh_err) => {
                warn!(error = %refresh_err, "Token refresh failed, signing out");
                match self.credentials.clear_if_current(&tokens.refresh).await {
                    Ok(true) => clear_sentry_user(),
                    Ok(false) => debug!("Session replaced during refresh, keeping it"),
                    Err(e) => {
                        clear_sentry_user();
                        warn!(error = %e, "Failed to clear session after refresh failure");
                    }
                }
                return Err(ClientError::SessionExpired(refresh_err));
            }
        };

        // A failed write still leaves the in-memory token stale; the retry
        // below uses the fresh one directly.
        match self
            .credentials
            .set_access_token(&tokens.refresh, SecretString::from(access.clone()))
            .await
        {
            Ok(true) => info!("Access token refreshed"),
            Ok(false) => debug!("Session replaced during refresh, fresh token not stored"),
            Err(e) => warn!(error = %e, "Failed to persist refreshed access token"),
        }

        op(access).await.map_err(ClientError::Remote)
    }
}
