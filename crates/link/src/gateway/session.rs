// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway session manager: create, validate, and refresh proxy sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::auth::AuthManager;
use crate::client::{http_client, join_url};
use crate::gateway::{AddonInfo, AddonListing, GatewaySession, SessionError, SessionResponse};
use crate::store::{epoch_secs, CredentialStore, PersistedSession};

/// Settings for [`GatewaySessionManager`].
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// How long a session is trusted before it is re-validated.
    pub refresh_interval: Duration,
    /// Timeout for session create/validate/list calls.
    pub timeout: Duration,
}

struct CachedSession {
    session: GatewaySession,
    last_refresh: Instant,
}

/// Hides the ephemeral nature of gateway sessions from callers.
///
/// All cache access goes through one async mutex, so concurrent callers
/// never race to create redundant sessions.
pub struct GatewaySessionManager {
    settings: GatewaySettings,
    auth: Arc<AuthManager>,
    store: Arc<CredentialStore>,
    cache: Mutex<Option<CachedSession>>,
    http: reqwest::Client,
}

impl GatewaySessionManager {
    pub fn new(settings: GatewaySettings, auth: Arc<AuthManager>, store: Arc<CredentialStore>) -> Self {
        let http = http_client(settings.timeout);
        let restored = store.read(|s| s.gateway_session.clone()).and_then(restore);
        Self { settings, auth, store, cache: Mutex::new(restored), http }
    }

    /// Return a usable session token for `addon`, or `None` if the gateway
    /// strategy is currently unavailable.
    pub async fn valid_session(&self, addon: &str) -> Option<String> {
        let mut cache = self.cache.lock().await;
        self.acquire(&mut cache, addon).await
    }

    /// Drop the cached session and obtain a new one.
    ///
    /// Used after a previously valid session was answered with 401.
    pub async fn force_refresh(&self, addon: &str) -> Option<String> {
        let mut cache = self.cache.lock().await;
        *cache = None;
        self.acquire(&mut cache, addon).await
    }

    /// Drop any cached session state.
    pub async fn clear(&self) {
        let mut cache = self.cache.lock().await;
        *cache = None;
        self.store.update(|s| s.gateway_session = None);
    }

    /// Query the administrative add-on listing. Requires an administrator token.
    pub async fn list_addons(&self) -> Result<Vec<AddonInfo>, SessionError> {
        let issuer = self.auth.issuer().ok_or(SessionError::NoIssuer)?;
        let token = self.auth.valid_token().await.ok_or(SessionError::NoCredential)?;
        let resp =
            self.http.get(join_url(&issuer, "gateway/addons")).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(SessionError::Rejected(resp.status().as_u16()));
        }
        let listing: AddonListing = resp.json().await?;
        Ok(listing.addons)
    }

    async fn acquire(&self, cache: &mut Option<CachedSession>, addon: &str) -> Option<String> {
        match self.acquire_inner(cache, addon).await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!(addon, err = %e, "gateway session unavailable");
                None
            }
        }
    }

    async fn acquire_inner(
        &self,
        cache: &mut Option<CachedSession>,
        addon: &str,
    ) -> Result<String, SessionError> {
        if let Some(cached) = cache.as_mut().filter(|c| c.session.addon == addon) {
            if cached.last_refresh.elapsed() < self.settings.refresh_interval {
                return Ok(cached.session.session_token.clone());
            }
            match self.validate(&cached.session.session_token).await {
                Ok(()) => {
                    cached.last_refresh = Instant::now();
                    let refreshed_at = epoch_secs();
                    self.store.update(|s| {
                        if let Some(p) = s.gateway_session.as_mut() {
                            p.refreshed_at = refreshed_at;
                        }
                    });
                    return Ok(cached.session.session_token.clone());
                }
                Err(e) => {
                    tracing::debug!(addon, err = %e, "gateway session no longer valid");
                }
            }
        }

        *cache = None;
        let session = self.create(addon).await?;
        let token = session.session_token.clone();
        self.store.update(|s| {
            s.gateway_session = Some(PersistedSession {
                session_token: session.session_token.clone(),
                addon: session.addon.clone(),
                created_at: session.created_at,
                refreshed_at: session.created_at,
            });
        });
        tracing::info!(addon, "gateway session created");
        *cache = Some(CachedSession { session, last_refresh: Instant::now() });
        Ok(token)
    }

    async fn create(&self, addon: &str) -> Result<GatewaySession, SessionError> {
        let issuer = self.auth.issuer().ok_or(SessionError::NoIssuer)?;
        let token = self.auth.valid_token().await.ok_or(SessionError::NoCredential)?;
        let resp = self
            .http
            .post(join_url(&issuer, "gateway/session"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "addon": addon }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SessionError::Rejected(resp.status().as_u16()));
        }
        let body: SessionResponse = resp.json().await?;
        Ok(GatewaySession {
            session_token: body.session,
            created_at: epoch_secs(),
            addon: addon.to_owned(),
        })
    }

    async fn validate(&self, session: &str) -> Result<(), SessionError> {
        let issuer = self.auth.issuer().ok_or(SessionError::NoIssuer)?;
        let mut req = self
            .http
            .post(join_url(&issuer, "gateway/validate_session"))
            .json(&serde_json::json!({ "session": session }));
        if let Some(token) = self.auth.valid_token().await {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(SessionError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Rebuild a cache entry from persisted state, ageing it by wall-clock time.
fn restore(persisted: PersistedSession) -> Option<CachedSession> {
    let age = Duration::from_secs(epoch_secs().saturating_sub(persisted.refreshed_at));
    let last_refresh = Instant::now().checked_sub(age)?;
    Some(CachedSession {
        session: GatewaySession {
            session_token: persisted.session_token,
            created_at: persisted.created_at,
            addon: persisted.addon,
        },
        last_refresh,
    })
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
