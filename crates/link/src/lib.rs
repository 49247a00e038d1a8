// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod store;
pub mod supervisor;

use std::sync::Arc;

use crate::auth::manager::AuthSettings;
use crate::auth::AuthManager;
use crate::config::ConnectConfig;
use crate::gateway::{GatewaySessionManager, GatewaySettings};
use crate::resolver::{EndpointResolver, ResolverSettings};
use crate::store::CredentialStore;
use crate::supervisor::{ConnectionSupervisor, SupervisorSettings};

/// All connection components, wired to one credential store.
pub struct Connector {
    pub store: Arc<CredentialStore>,
    pub auth: Arc<AuthManager>,
    pub gateway: Arc<GatewaySessionManager>,
    pub resolver: Arc<EndpointResolver>,
    pub supervisor: ConnectionSupervisor,
}

impl Connector {
    pub fn new(config: &ConnectConfig, store: Arc<CredentialStore>) -> anyhow::Result<Self> {
        let auth = Arc::new(AuthManager::new(
            AuthSettings {
                client_id: config.client_id.clone(),
                redirect_uri: config.redirect_uri.clone(),
                safety_margin: config.token_margin(),
                timeout: config.probe_timeout(),
            },
            Arc::clone(&store),
        ));
        let gateway = Arc::new(GatewaySessionManager::new(
            GatewaySettings {
                refresh_interval: config.session_refresh_interval(),
                timeout: config.probe_timeout(),
            },
            Arc::clone(&auth),
            Arc::clone(&store),
        ));
        let resolver = Arc::new(EndpointResolver::new(
            ResolverSettings {
                direct_port: config.direct_port,
                direct_schemes: config.direct_schemes.clone(),
                addon: config.addon.clone(),
                well_known_addons: config.addon_candidates.clone(),
                addon_match: config.addon_match.clone(),
                gateway_proxy_path: config.gateway_proxy_path.clone(),
                probe_timeout: config.probe_timeout(),
            },
            Arc::clone(&auth),
            Arc::clone(&gateway),
            Arc::clone(&store),
        ));
        if let Some(ref url) = config.tunnel_url {
            resolver.set_manual_tunnel(url)?;
        }
        let supervisor = ConnectionSupervisor::new(
            SupervisorSettings {
                request_timeout: config.request_timeout(),
                backoff: config.backoff(),
                max_backoff: config.max_backoff(),
            },
            Arc::clone(&resolver),
            Arc::clone(&auth),
            Arc::clone(&gateway),
        );
        Ok(Self { store, auth, gateway, resolver, supervisor })
    }

    /// Connector over the state file in the configured state directory.
    pub fn open(config: &ConnectConfig) -> anyhow::Result<Self> {
        let path = config.state_path();
        tracing::debug!(path = %path.display(), "opening state");
        Self::new(config, Arc::new(CredentialStore::file(path)))
    }

    /// Forget the credential, gateway session and cached connection.
    pub async fn logout(&self) {
        self.auth.logout();
        self.gateway.clear().await;
        self.resolver.invalidate_all();
        self.store.update(|s| s.last_resolved = None);
    }
}
