//! Sign-in, registration and sign-out.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{info, instrument, warn};

use crate::api::{
    AccountApi, ApiError, AuthResponse, LoginRequest, RegisterRequest, TokenRefresher,
};
use crate::error::{ClientError, Result, clear_sentry_user, set_sentry_user};
use crate::pipeline::AuthPipeline;
use crate::session::{Credential, CredentialStore, ProfileSnapshot};

/// Result of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The backend issued tokens; the session is established.
    SignedIn(Option<ProfileSnapshot>),
    /// The account exists but the caller must log in.
    PendingLogin { message: Option<String> },
}

/// Account operations over the shared Credential Store.
pub struct AccountService<A> {
    api: A,
    pipeline: Arc<AuthPipeline<A>>,
}

impl<A> AccountService<A>
where
    A: AccountApi + TokenRefresher,
{
    pub const fn new(api: A, pipeline: Arc<AuthPipeline<A>>) -> Self {
        Self { api, pipeline }
    }

    fn credentials(&self) -> &Arc<CredentialStore> {
        self.pipeline.credentials()
    }

    /// Log in and establish a session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Remote` if the backend rejects the credentials
    /// or omits the tokens, and `ClientError::Storage` if the session cannot
    /// be persisted.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<ProfileSnapshot>> {
        let response = self
            .api
            .login(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        let profile = self.start_session(&response).await?;
        info!(customer_id = ?profile.as_ref().and_then(ProfileSnapshot::customer_id), "Signed in");
        Ok(profile)
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Remote` if the backend rejects the form, and
    /// `ClientError::Storage` if an issued session cannot be persisted.
    #[instrument(skip_all, fields(username = %form.user.username))]
    pub async fn register(&self, form: &RegisterRequest) -> Result<RegistrationOutcome> {
        let response = self.api.register(form).await?;

        if response.tokens().is_none() {
            info!("Account created, login required");
            return Ok(RegistrationOutcome::PendingLogin {
                message: response.message,
            });
        }

        let profile = self.start_session(&response).await?;
        info!("Account created and signed in");
        Ok(RegistrationOutcome::SignedIn(profile))
    }

    /// Sign out.
    ///
    /// The remote logout is best-effort; the local session is cleared
    /// whatever it returns.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the local session cannot be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        if let Some(tokens) = self.credentials().tokens().await {
            if let Err(e) = self.api.logout(tokens.access.expose_secret()).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        clear_sentry_user();
        self.credentials().clear().await?;
        info!("Signed out");
        Ok(())
    }

    /// Re-fetch the profile and replace the cached copy.
    ///
    /// Only the profile is rewritten; the tokens in storage are not touched.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's errors, `ClientError::NotAuthenticated` if the
    /// session ended or was replaced during the fetch, or
    /// `ClientError::Storage` if the profile cannot be persisted.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<ProfileSnapshot> {
        let tokens = self
            .credentials()
            .tokens()
            .await
            .ok_or(ClientError::NotAuthenticated)?;

        let api = &self.api;
        let response = self
            .pipeline
            .with_auth_retry(|token| async move { api.profile(&token).await })
            .await?;
        let profile = response.to_profile();

        // A refresh during the call only replaces the access token, so the
        // refresh token still names this session.
        if !self
            .credentials()
            .set_profile(&tokens.refresh, profile.clone())
            .await?
        {
            return Err(ClientError::NotAuthenticated);
        }

        Ok(profile)
    }

    /// The cached profile, if signed in.
    pub async fn current_profile(&self) -> Option<ProfileSnapshot> {
        self.credentials().profile().await
    }

    /// Whether a session is present.
    pub async fn is_signed_in(&self) -> bool {
        self.credentials().tokens().await.is_some()
    }

    async fn start_session(&self, response: &AuthResponse) -> Result<Option<ProfileSnapshot>> {
        let tokens = response.tokens().ok_or_else(|| {
            ApiError::UnexpectedResponse("authentication response carried no tokens".to_string())
        })?;

        let mut profile = response.profile();
        if profile.as_ref().and_then(ProfileSnapshot::customer_id).is_none() {
            match self.api.profile(&tokens.access).await {
                Ok(fetched) => profile = Some(fetched.to_profile()),
                Err(e) => warn!(error = %e, "Could not fetch profile after sign-in"),
            }
        }

        self.credentials()
            .set_session(Credential::new(
                tokens.access,
                tokens.refresh,
                profile.clone(),
            ))
            .await?;

        if let Some(id) = profile.as_ref().and_then(ProfileSnapshot::customer_id) {
            set_sentry_user(&id, profile.as_ref().and_then(|p| p.email.as_deref()));
        }

        Ok(profile)
    }
}
