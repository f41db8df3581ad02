//! Credential Store: the single source of truth for the current session.
//!
//! The store owns the access token, the refresh token and the cached
//! customer profile. All three are set and cleared together. The partial
//! updates ([`CredentialStore::set_access_token`] after a token refresh,
//! [`CredentialStore::set_profile`] after a profile fetch) and
//! [`CredentialStore::clear_if_current`] name the session they belong to by
//! its refresh token, and are dropped if another session replaced it while
//! the remote call was in flight.
//!
//! Nothing else in the client keeps its own copy of the tokens. The request
//! pipeline reads them from here on every call and asks the store to persist
//! a refreshed access token.
//!
//! Storage writes are synchronous and happen under the write lock, so a
//! slow [`Storage`] stalls every reader of the session.

use std::sync::Arc;

use duka_core::CustomerId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::storage::{Storage, StorageError, storage_keys};

/// Customer profile cached alongside the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
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
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ProfileSnapshot {
    /// The customer ID orders are created for.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        self.id
    }

    /// Best human-readable name for greetings.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("customer")
    }
}

/// An authenticated session.
#[derive(Clone)]
pub struct Credential {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub profile: Option<ProfileSnapshot>,
}

impl Credential {
    /// Build a credential from raw token strings.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        profile: Option<ProfileSnapshot>,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            profile,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("profile", &self.profile)
            .finish()
    }
}

/// The token pair of the current session.
#[derive(Clone)]
pub struct SessionTokens {
    pub access: SecretString,
    pub refresh: SecretString,
}

/// Process-wide session state backed by durable storage.
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Create an anonymous store. Call [`init`](Self::init) to hydrate.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    /// Hydrate the session from durable storage.
    ///
    /// A half-present session (one token without the other) is treated as
    /// anonymous and wiped. An unreadable profile is dropped with a warning;
    /// the tokens alone still make a valid session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage cannot be read, or a half-present
    /// session cannot be wiped.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), StorageError> {
        let access = self.storage.get(storage_keys::ACCESS_TOKEN)?;
        let refresh = self.storage.get(storage_keys::REFRESH_TOKEN)?;

        let credential = match (access, refresh) {
            (Some(access), Some(refresh)) => {
                let profile = self.read_profile()?;
                Some(Credential::new(access, refresh, profile))
            }
            (None, None) => None,
            _ => {
                warn!("Discarding half-present session from storage");
                self.remove_all()?;
                None
            }
        };

        debug!(signed_in = credential.is_some(), "Credential store hydrated");
        *self.current.write().await = credential;
        Ok(())
    }

    /// The current session; `None` means anonymous.
    pub async fn get(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    /// The current token pair, if signed in.
    pub async fn tokens(&self) -> Option<SessionTokens> {
        self.current.read().await.as_ref().map(|c| SessionTokens {
            access: c.access_token.clone(),
            refresh: c.refresh_token.clone(),
        })
    }

    /// The cached profile, if signed in and known.
    pub async fn profile(&self) -> Option<ProfileSnapshot> {
        self.current
            .read()
            .await
            .as_ref()
            .and_then(|c| c.profile.clone())
    }

    /// Replace only the access token, after a refresh made with
    /// `refreshed_with`.
    ///
    /// Ignored when anonymous, or when the current session no longer holds
    /// `refreshed_with`: a refresh racing a sign-out or a sign-in as someone
    /// else must not resurrect or mix sessions. Returns whether the token
    /// was applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be persisted; the
    /// in-memory session is left unchanged in that case.
    pub async fn set_access_token(
        &self,
        refreshed_with: &SecretString,
        token: SecretString,
    ) -> Result<bool, StorageError> {
        let mut current = self.current.write().await;
        let Some(credential) = current
            .as_mut()
            .filter(|c| same_secret(&c.refresh_token, refreshed_with))
        else {
            debug!("Ignoring access token for a session that is no longer current");
            return Ok(false);
        };

        self.storage
            .set(storage_keys::ACCESS_TOKEN, token.expose_secret())?;
        credential.access_token = token;
        Ok(true)
    }

    /// Replace only the cached profile of the session holding `refresh`.
    ///
    /// Only the profile key is written, so a crash part-way leaves the
    /// session intact. Ignored, returning `false`, if that session is no
    /// longer current.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be persisted; the
    /// in-memory session is left unchanged in that case.
    pub async fn set_profile(
        &self,
        refresh: &SecretString,
        profile: ProfileSnapshot,
    ) -> Result<bool, StorageError> {
        let mut current = self.current.write().await;
        let Some(credential) = current
            .as_mut()
            .filter(|c| same_secret(&c.refresh_token, refresh))
        else {
            debug!("Ignoring profile for a session that is no longer current");
            return Ok(false);
        };

        self.storage.set(storage_keys::PROFILE, &encode_profile(&profile)?)?;
        credential.profile = Some(profile);
        Ok(true)
    }

    /// Replace the whole session, after login or registration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be persisted; the
    /// in-memory session is left unchanged in that case.
    pub async fn set_session(&self, credential: Credential) -> Result<(), StorageError> {
        let mut current = self.current.write().await;

        // The access token goes last: a crash mid-way leaves a refresh token
        // without an access token, which `init` discards.
        self.storage.remove(storage_keys::ACCESS_TOKEN)?;
        self.storage.set(
            storage_keys::REFRESH_TOKEN,
            credential.refresh_token.expose_secret(),
        )?;
        match &credential.profile {
            Some(profile) => self
                .storage
                .set(storage_keys::PROFILE, &encode_profile(profile)?)?,
            None => self.storage.remove(storage_keys::PROFILE)?,
        }
        self.storage.set(
            storage_keys::ACCESS_TOKEN,
            credential.access_token.expose_secret(),
        )?;

        *current = Some(credential);
        Ok(())
    }

    /// Tear down the session. Idempotent.
    ///
    /// Memory is cleared first, so callers observe "anonymous" even if a
    /// storage removal fails.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` hit; every key is still attempted.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut current = self.current.write().await;
        *current = None;
        self.remove_all()
    }

    /// Tear down the session only if it still holds `refresh`.
    ///
    /// Returns whether anything was cleared. A session established since
    /// `refresh` was read is left alone.
    ///
    /// # Errors
    ///
    /// As [`clear`](Self::clear).
    pub async fn clear_if_current(&self, refresh: &SecretString) -> Result<bool, StorageError> {
        let mut current = self.current.write().await;
        if !current
            .as_ref()
            .is_some_and(|c| same_secret(&c.refresh_token, refresh))
        {
            debug!("Not clearing a session that replaced the expired one");
            return Ok(false);
        }
        *current = None;
        self.remove_all()?;
        Ok(true)
    }

    fn remove_all(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in [
            storage_keys::ACCESS_TOKEN,
            storage_keys::REFRESH_TOKEN,
            storage_keys::PROFILE,
        ] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn read_profile(&self) -> Result<Option<ProfileSnapshot>, StorageError> {
        let Some(raw) = self.storage.get(storage_keys::PROFILE)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached profile");
                Ok(None)
            }
        }
    }
}

fn same_secret(a: &SecretString, b: &SecretString) -> bool {
    a.expose_secret() == b.expose_secret()
}

fn encode_profile(profile: &ProfileSnapshot) -> Result<String, StorageError> {
    serde_json::to_string(profile).map_err(|source| StorageError::Encode {
        key: storage_keys::PROFILE.to_string(),
        source,
    })
}
