// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth manager: owns the login flow and keeps the access token usable.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::auth::pkce::{self, PkceContext};
use crate::auth::{oauth, Credential};
use crate::client::{http_client, join_url, normalize_base};
use crate::error::AuthError;
use crate::store::{epoch_secs, CredentialStore};

/// In-flight authorization code + PKCE flow. At most one exists.
struct PendingLogin {
    issuer: String,
    pkce: PkceContext,
}

/// Settings for [`AuthManager`].
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    /// A token is refreshed once it is within this margin of expiry.
    pub safety_margin: Duration,
    /// Timeout for token endpoint calls.
    pub timeout: Duration,
}

/// Performs the PKCE exchange and refreshes access tokens before expiry.
///
/// The credential itself lives in the [`CredentialStore`]; this type is the
/// only writer of that slice.
pub struct AuthManager {
    settings: AuthSettings,
    store: Arc<CredentialStore>,
    pending: Mutex<Option<PendingLogin>>,
    /// Serializes refreshes so concurrent callers do not spend the refresh token twice.
    refresh_lock: tokio::sync::Mutex<()>,
    http: reqwest::Client,
}

impl AuthManager {
    pub fn new(settings: AuthSettings, store: Arc<CredentialStore>) -> Self {
        let http = http_client(settings.timeout);
        Self {
            settings,
            store,
            pending: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            http,
        }
    }

    /// Issuer the current credential was obtained from.
    pub fn issuer(&self) -> Option<String> {
        self.store.read(|s| s.issuer.clone())
    }

    /// Current credential, if any (may be stale).
    pub fn credential(&self) -> Option<Credential> {
        self.store.read(|s| s.credential.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.read(|s| s.credential.is_some())
    }

    /// Whether a login started by [`build_authorization_url`](Self::build_authorization_url)
    /// is waiting for its code.
    pub fn has_pending_login(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Start a login: generate a fresh PKCE pair and return the authorization URL.
    ///
    /// Any earlier unconsumed verifier is discarded.
    pub fn build_authorization_url(&self, issuer: &str) -> Result<String, AuthError> {
        let issuer = pkce::parse_issuer(issuer)?;
        let issuer = normalize_base(issuer.as_str());
        let ctx = PkceContext::generate();
        let url = pkce::build_auth_url(
            &issuer,
            &self.settings.client_id,
            &self.settings.redirect_uri,
            &ctx,
        )?;

        let previous = self.pending.lock().replace(PendingLogin { issuer: issuer.clone(), pkce: ctx });
        if previous.is_some() {
            tracing::debug!("discarding unconsumed authorization flow");
        }
        tracing::info!(issuer = %issuer, "authorization flow started");
        Ok(url)
    }

    /// Complete a login from an intercepted redirect URL.
    ///
    /// A redirect whose `state` differs from the pending login is rejected
    /// without consuming the pending verifier.
    pub async fn exchange_callback(&self, redirect_url: &str) -> Result<Credential, AuthError> {
        let callback = pkce::parse_callback(redirect_url).ok_or(AuthError::MissingCode)?;
        {
            let pending = self.pending.lock();
            let pending = pending.as_ref().ok_or(AuthError::NoPendingVerifier)?;
            if callback.state.as_deref() != Some(pending.pkce.state.as_str()) {
                return Err(AuthError::StateMismatch);
            }
        }
        self.exchange_code(&callback.code).await
    }

    /// Exchange an authorization code for a credential.
    ///
    /// The pending verifier is consumed whether or not the exchange succeeds.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, AuthError> {
        let pending = self.pending.lock().take().ok_or(AuthError::NoPendingVerifier)?;
        let token_url = join_url(&pending.issuer, "auth/token");

        let token = oauth::exchange_code(
            &self.http,
            &token_url,
            &self.settings.client_id,
            code,
            &pending.pkce.code_verifier,
            &self.settings.redirect_uri,
        )
        .await
        .inspect_err(|e| tracing::warn!(err = %e, "authorization code exchange failed"))?;

        let credential = Credential::from_token(token, None, epoch_secs());
        let issuer = pending.issuer;
        self.store.update(|s| {
            if s.issuer.as_deref() != Some(issuer.as_str()) {
                // Connection hints from another issuer are meaningless now.
                s.gateway_session = None;
                s.addon = None;
                s.last_resolved = None;
                s.tunnel = None;
            }
            s.issuer = Some(issuer.clone());
            s.credential = Some(credential.clone());
        });
        tracing::info!(issuer = %issuer, "login completed");
        Ok(credential)
    }

    /// Refresh the access token.
    ///
    /// Failure leaves the stored credential untouched. When the server omits
    /// a refresh token in its response, the current one is kept.
    pub async fn refresh(&self) -> Result<Credential, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Credential, AuthError> {
        let (issuer, refresh_token) = self.store.read(|s| {
            (s.issuer.clone(), s.credential.as_ref().and_then(|c| c.refresh_token.clone()))
        });
        let (Some(issuer), Some(refresh_token)) = (issuer, refresh_token) else {
            return Err(AuthError::NotAuthenticated);
        };

        let token_url = join_url(&issuer, "auth/token");
        let token =
            oauth::refresh_token(&self.http, &token_url, &self.settings.client_id, &refresh_token)
                .await
                .inspect_err(|e| tracing::warn!(err = %e, "token refresh failed"))?;

        let credential = Credential::from_token(token, Some(refresh_token), epoch_secs());
        self.store.update(|s| s.credential = Some(credential.clone()));
        tracing::debug!(expires_at = ?credential.expires_at, "access token refreshed");
        Ok(credential)
    }

    /// Return a usable access token, refreshing at most once if it is near expiry.
    pub async fn valid_token(&self) -> Option<String> {
        let current = self.credential()?;
        if current.is_fresh(epoch_secs(), self.settings.safety_margin) {
            return Some(current.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while this one waited for the lock.
        if let Some(latest) = self.credential() {
            if latest.access_token != current.access_token
                && latest.is_fresh(epoch_secs(), self.settings.safety_margin)
            {
                return Some(latest.access_token);
            }
        }
        match self.refresh_locked().await {
            Ok(credential) => Some(credential.access_token),
            Err(e) => {
                tracing::debug!(err = %e, "no valid access token");
                None
            }
        }
    }

    /// Seed a credential obtained elsewhere (e.g. a long-lived access token).
    pub fn install(&self, issuer: &str, credential: Credential) -> Result<(), AuthError> {
        let issuer = normalize_base(pkce::parse_issuer(issuer)?.as_str());
        self.store.update(|s| {
            s.issuer = Some(issuer);
            s.credential = Some(credential);
        });
        Ok(())
    }

    /// Drop the credential and any pending login.
    pub fn logout(&self) {
        self.pending.lock().take();
        self.store.update(|s| s.credential = None);
        tracing::info!("logged out");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
