// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthManager;
use crate::client::{http_client, normalize_base, Attach};
use crate::error::{DiscoveryClass, DiscoveryError};
use crate::gateway::{AddonInfo, GatewaySessionManager};
use crate::resolver::probe::{fetch_remote_config, probe_health, RemoteConfig};
use crate::resolver::strategy::{self, CandidateEndpoint};
use crate::resolver::{AuthMode, DiscoveryResult, ResolvedConnection};
use crate::store::{epoch_secs, CredentialStore, LastResolved, TunnelHint, TunnelSource};

/// Settings for [`EndpointResolver`].
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub direct_port: u16,
    pub direct_schemes: Vec<String>,
    /// Known add-on identifier. When set, no other identifier is tried.
    pub addon: Option<String>,
    pub well_known_addons: Vec<String>,
    pub addon_match: String,
    pub gateway_proxy_path: String,
    /// Timeout of each health probe and remote config fetch.
    pub probe_timeout: Duration,
}

/// What a successful pass found. Applied to shared state only on publish.
struct Found {
    candidate: CandidateEndpoint,
    addon: Option<String>,
    remote: Option<RemoteConfig>,
}

/// Finds a working path to the backend and caches it.
///
/// Resolution passes are serialized by `resolve_lock`. A caller that waited
/// for the lock while another pass completed reuses that pass's outcome
/// instead of probing again. Only a completed pass touches `current` or the
/// store; a cancelled pass leaves both as they were. So does a pass that
/// was running when [`EndpointResolver::invalidate_all`] was called.
pub struct EndpointResolver {
    settings: ResolverSettings,
    auth: Arc<AuthManager>,
    gateway: Arc<GatewaySessionManager>,
    store: Arc<CredentialStore>,
    http: reqwest::Client,
    current: RwLock<Option<Arc<ResolvedConnection>>>,
    last_error: Mutex<Option<DiscoveryError>>,
    /// Completed passes, successful or not.
    passes: AtomicU64,
    /// Last generation handed to a published connection.
    generation: AtomicU64,
    /// Bumped by `invalidate_all`, under the `current` write lock.
    epoch: AtomicU64,
    resolve_lock: tokio::sync::Mutex<()>,
}

impl EndpointResolver {
    pub fn new(
        settings: ResolverSettings,
        auth: Arc<AuthManager>,
        gateway: Arc<GatewaySessionManager>,
        store: Arc<CredentialStore>,
    ) -> Self {
        let http = http_client(settings.probe_timeout);
        Self {
            settings,
            auth,
            gateway,
            store,
            http,
            current: RwLock::new(None),
            last_error: Mutex::new(None),
            passes: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            resolve_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The cached connection, if one is published.
    pub fn current(&self) -> Option<Arc<ResolvedConnection>> {
        self.current.read().clone()
    }

    /// The cached connection, resolving one if none is published.
    pub async fn connection(&self) -> DiscoveryResult {
        match self.current() {
            Some(conn) => DiscoveryResult::Success(conn),
            None => self.pass(&CancellationToken::new(), true).await,
        }
    }

    /// Run a resolution pass even if a connection is cached.
    pub async fn resolve(&self) -> DiscoveryResult {
        self.resolve_with(&CancellationToken::new()).await
    }

    /// Run a resolution pass, abandoning it when `cancel` fires.
    pub async fn resolve_with(&self, cancel: &CancellationToken) -> DiscoveryResult {
        self.pass(cancel, false).await
    }

    async fn pass(&self, cancel: &CancellationToken, reuse_current: bool) -> DiscoveryResult {
        let seen = self.passes.load(Ordering::SeqCst);
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(),
            guard = self.resolve_lock.lock() => guard,
        };
        let epoch = self.epoch.load(Ordering::SeqCst);

        if reuse_current {
            if let Some(conn) = self.current() {
                return DiscoveryResult::Success(conn);
            }
        }
        if self.passes.load(Ordering::SeqCst) != seen {
            if let Some(conn) = self.current() {
                return DiscoveryResult::Success(conn);
            }
            if let Some(err) = self.last_error.lock().clone() {
                return DiscoveryResult::Error(err);
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("resolution cancelled");
                return cancelled();
            }
            outcome = self.run_pass() => outcome,
        };
        self.passes.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(found) => match self.publish(found, epoch) {
                Some(conn) => DiscoveryResult::Success(conn),
                None => {
                    tracing::debug!("connection state reset during resolution, result dropped");
                    DiscoveryResult::Error(DiscoveryError::new(
                        DiscoveryClass::Cancelled,
                        "connection state was reset during resolution",
                    ))
                }
            },
            Err(err) if self.epoch.load(Ordering::SeqCst) != epoch => {
                DiscoveryResult::Error(err)
            }
            Err(err) => {
                tracing::warn!(class = err.classification.as_str(), "{}", err.message);
                *self.last_error.lock() = Some(err.clone());
                DiscoveryResult::Error(err)
            }
        }
    }

    /// Drop `conn` if it is still the cached connection.
    ///
    /// Returns `false` when a newer connection has replaced it since.
    pub fn invalidate(&self, conn: &ResolvedConnection) -> bool {
        let mut current = self.current.write();
        let matches = current.as_ref().is_some_and(|c| c.generation == conn.generation);
        if matches {
            *current = None;
            tracing::debug!(kind = %conn.kind, generation = conn.generation, "connection invalidated");
        }
        matches
    }

    /// Drop the cached connection and outcome of the last pass.
    ///
    /// A pass already running when this is called publishes nothing.
    pub fn invalidate_all(&self) {
        let mut current = self.current.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *current = None;
        *self.last_error.lock() = None;
    }

    /// Record a user-supplied tunnel URL. It takes precedence over any
    /// remotely reported one.
    pub fn set_manual_tunnel(&self, url: &str) -> anyhow::Result<()> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            anyhow::bail!("tunnel URL must be an http(s) address: {url}");
        }
        let hint = TunnelHint {
            url: normalize_base(parsed.as_str()),
            provider: None,
            source: TunnelSource::Manual,
        };
        tracing::info!(url = %hint.url, "manual tunnel URL set");
        self.store.update(|s| s.tunnel = Some(hint));
        Ok(())
    }

    /// Forget a manual tunnel URL. Remotely reported URLs are kept.
    pub fn clear_manual_tunnel(&self) {
        self.store.update(|s| {
            if s.tunnel.as_ref().is_some_and(|t| t.source == TunnelSource::Manual) {
                s.tunnel = None;
            }
        });
    }

    pub fn tunnel_hint(&self) -> Option<TunnelHint> {
        self.store.read(|s| s.tunnel.clone())
    }

    async fn run_pass(&self) -> Result<Found, DiscoveryError> {
        let issuer = self.auth.issuer();
        let token = self.auth.valid_token().await;
        let token_mode = if token.is_some() { AuthMode::Bearer } else { AuthMode::Anonymous };
        let bearer = Attach::bearer(token.clone());
        let mut attempts: Vec<String> = Vec::new();

        // 1. Gateway proxy: needs an issuer and a token to open a session.
        match (&issuer, &token) {
            (Some(issuer), Some(_)) => {
                if let Some(found) = self.gateway_strategy(issuer, &token, &mut attempts).await {
                    return Ok(found);
                }
            }
            (None, _) => attempts.push("gateway_proxied: no issuer".to_owned()),
            (Some(_), None) => attempts.push("gateway_proxied: not authenticated".to_owned()),
        }

        // 2. Direct to the issuer's host on the backend port.
        if let Some(ref issuer) = issuer {
            let candidates = strategy::direct_candidates(
                issuer,
                self.settings.direct_port,
                &self.settings.direct_schemes,
                &token_mode,
            )
            .unwrap_or_default();
            for candidate in candidates {
                if self.probe(&candidate, &bearer, &mut attempts).await {
                    let remote = self.remote_config(&candidate, &bearer).await;
                    return Ok(Found { candidate, addon: None, remote });
                }
            }
        }

        // 3. Tunnel, when a URL is known.
        let hint = self.tunnel_hint();
        if let Some(ref hint) = hint {
            let candidate = strategy::tunnel_candidate(&hint.url, &token_mode);
            if self.probe(&candidate, &bearer, &mut attempts).await {
                return Ok(Found { candidate, addon: None, remote: None });
            }
        }

        let classification = if hint.is_some() {
            DiscoveryClass::AllStrategiesUnreachable
        } else if token.is_none() {
            DiscoveryClass::NoCredential
        } else {
            DiscoveryClass::ManualEntryRequired
        };
        let message = if attempts.is_empty() {
            "no candidates to probe".to_owned()
        } else {
            attempts.join("; ")
        };
        Err(DiscoveryError::new(classification, message))
    }

    async fn probe(
        &self,
        candidate: &CandidateEndpoint,
        attach: &Attach,
        attempts: &mut Vec<String>,
    ) -> bool {
        match probe_health(&self.http, &candidate.base_url, attach).await {
            Ok(health) => {
                tracing::debug!(kind = %candidate.kind, url = %candidate.base_url, version = %health.version, "probe succeeded");
                true
            }
            Err(e) => {
                tracing::debug!(kind = %candidate.kind, url = %candidate.base_url, err = %e, "probe failed");
                attempts.push(format!("{}: {e}", candidate.base_url));
                false
            }
        }
    }

    async fn remote_config(&self, candidate: &CandidateEndpoint, attach: &Attach) -> Option<RemoteConfig> {
        match fetch_remote_config(&self.http, &candidate.base_url, attach).await {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::debug!(url = %candidate.base_url, err = %e, "remote config unavailable");
                None
            }
        }
    }

    /// Try add-on identifiers through the gateway proxy.
    ///
    /// A configured identifier is the only one tried. Otherwise a stored
    /// identifier is tried first, and the administrative listing is queried
    /// only when there is none or it fails.
    async fn gateway_strategy(
        &self,
        issuer: &str,
        token: &Option<String>,
        attempts: &mut Vec<String>,
    ) -> Option<Found> {
        let configured = self.settings.addon.as_deref();
        let stored = self.store.read(|s| s.addon.clone());

        if configured.is_none() {
            if let Some(ref addon) = stored {
                if let Some(found) = self.try_addon(issuer, addon, token, attempts).await {
                    return Some(found);
                }
            }
        }

        let listed = if configured.is_some() { Vec::new() } else { self.listed_addons().await };
        let candidates = strategy::addon_candidates(
            configured,
            stored.as_deref(),
            &listed,
            &self.settings.addon_match,
            &self.settings.well_known_addons,
        );
        for addon in candidates {
            if configured.is_none() && stored.as_deref() == Some(addon.as_str()) {
                continue;
            }
            if let Some(found) = self.try_addon(issuer, &addon, token, attempts).await {
                return Some(found);
            }
        }
        None
    }

    async fn try_addon(
        &self,
        issuer: &str,
        addon: &str,
        token: &Option<String>,
        attempts: &mut Vec<String>,
    ) -> Option<Found> {
        let candidate = strategy::gateway_candidate(issuer, &self.settings.gateway_proxy_path, addon);
        let Some(session) = self.gateway.valid_session(addon).await else {
            attempts.push(format!("{}: no gateway session", candidate.base_url));
            return None;
        };
        let attach = Attach::Gateway { session, bearer: token.clone() };
        if !self.probe(&candidate, &attach, attempts).await {
            return None;
        }
        let remote = self.remote_config(&candidate, &attach).await;
        Some(Found { candidate, addon: Some(addon.to_owned()), remote })
    }

    async fn listed_addons(&self) -> Vec<AddonInfo> {
        match self.gateway.list_addons().await {
            Ok(addons) => addons,
            Err(e) => {
                tracing::debug!(err = %e, "add-on listing unavailable");
                Vec::new()
            }
        }
    }

    /// Publish `found` unless `invalidate_all` ran since `epoch` was read.
    fn publish(&self, found: Found, epoch: u64) -> Option<Arc<ResolvedConnection>> {
        let mut current = self.current.write();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Found { candidate, addon, remote } = found;
        let conn = Arc::new(ResolvedConnection {
            base_url: candidate.base_url,
            auth_mode: candidate.auth_mode,
            kind: candidate.kind,
            resolved_at: epoch_secs(),
            generation,
        });

        self.store.update(|s| {
            s.last_resolved = Some(LastResolved {
                kind: conn.kind,
                base_url: conn.base_url.clone(),
                resolved_at: conn.resolved_at,
            });
            if addon.is_some() {
                s.addon = addon;
            }
            if let Some(remote) = remote {
                apply_remote_config(&mut s.tunnel, remote);
            }
        });
        *self.last_error.lock() = None;
        *current = Some(Arc::clone(&conn));
        tracing::info!(kind = %conn.kind, url = %conn.base_url, generation, "connection resolved");
        Some(conn)
    }
}

/// Merge remotely reported tunnel settings into the stored hint.
///
/// A manual hint is never replaced. A disabled tunnel clears a remote hint.
pub(crate) fn apply_remote_config(tunnel: &mut Option<TunnelHint>, remote: RemoteConfig) {
    if tunnel.as_ref().is_some_and(|t| t.source == TunnelSource::Manual) {
        return;
    }
    let enabled = remote.tunnel_enabled;
    let provider = remote.tunnel_provider;
    *tunnel = remote.tunnel_url.filter(|u| enabled && !u.is_empty()).map(|url| TunnelHint {
        url: normalize_base(&url),
        provider,
        source: TunnelSource::Remote,
    });
}

fn cancelled() -> DiscoveryResult {
    DiscoveryResult::Error(DiscoveryError::new(DiscoveryClass::Cancelled, "resolution cancelled"))
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
