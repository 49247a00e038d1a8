// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised API calls over the resolved connection.
//!
//! Every request goes through [`ConnectionSupervisor::execute`], which keeps
//! the connection warm reactively: nothing is polled, and a connection is
//! reused until a request over it fails with a connection-class failure.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::client::{ApiRequest, ApiResponse, Attach, BackendClient};
use crate::error::{FailureClass, SupervisorError};
use crate::gateway::GatewaySessionManager;
use crate::resolver::{AuthMode, EndpointResolver, ResolvedConnection};

/// Settings for [`ConnectionSupervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Timeout of requests over a resolved connection.
    pub request_timeout: Duration,
    /// Delay before the first re-resolution after a failure.
    pub backoff: Duration,
    pub max_backoff: Duration,
}

/// A connection-class failure of one attempt.
#[derive(Debug)]
struct Lost {
    message: String,
    unauthorized: bool,
}

impl Lost {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), unauthorized: false }
    }
}

pub struct ConnectionSupervisor {
    settings: SupervisorSettings,
    resolver: Arc<EndpointResolver>,
    auth: Arc<AuthManager>,
    gateway: Arc<GatewaySessionManager>,
    client: BackendClient,
    /// Re-resolutions since the last successful request.
    losses: AtomicU32,
}

impl ConnectionSupervisor {
    pub fn new(
        settings: SupervisorSettings,
        resolver: Arc<EndpointResolver>,
        auth: Arc<AuthManager>,
        gateway: Arc<GatewaySessionManager>,
    ) -> Self {
        let client = BackendClient::new(settings.request_timeout);
        Self { settings, resolver, auth, gateway, client, losses: AtomicU32::new(0) }
    }

    /// Issue `request`, recovering from at most one lost connection.
    ///
    /// Application-class responses (4xx other than 401/403) are returned as
    /// `Ok` so the caller sees them unchanged.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, SupervisorError> {
        let conn = self.resolver.connection().await.into_result()?;
        let mut lost = match self.attempt(&conn, request).await {
            Ok(resp) => return Ok(self.succeeded(resp)),
            Err(lost) => lost,
        };

        if lost.unauthorized && self.renew(&conn.auth_mode).await {
            tracing::debug!(kind = %conn.kind, "credential renewed, retrying");
            lost = match self.attempt(&conn, request).await {
                Ok(resp) => return Ok(self.succeeded(resp)),
                Err(lost) => lost,
            };
        }

        tracing::warn!(kind = %conn.kind, url = %conn.base_url, err = %lost.message, "connection failure, re-resolving");
        self.resolver.invalidate(&conn);
        let delay = self.next_backoff();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let conn = self.resolver.connection().await.into_result()?;
        match self.attempt(&conn, request).await {
            Ok(resp) => Ok(self.succeeded(resp)),
            Err(lost) => {
                self.resolver.invalidate(&conn);
                tracing::error!(kind = %conn.kind, err = %lost.message, "connection lost");
                Err(SupervisorError::ConnectionLost { message: lost.message })
            }
        }
    }

    /// Delay before the next re-resolution, then count this loss.
    fn next_backoff(&self) -> Duration {
        let n = self.losses.fetch_add(1, Ordering::SeqCst).min(16);
        self.settings.backoff.saturating_mul(1 << n).min(self.settings.max_backoff)
    }

    fn succeeded(&self, resp: ApiResponse) -> ApiResponse {
        self.losses.store(0, Ordering::SeqCst);
        resp
    }

    /// Refresh the credential an auth mode relies on. `true` if a new one was obtained.
    async fn renew(&self, mode: &AuthMode) -> bool {
        match mode {
            AuthMode::GatewaySession { addon } => self.gateway.force_refresh(addon).await.is_some(),
            AuthMode::Bearer => match self.auth.refresh().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(err = %e, "token refresh failed");
                    false
                }
            },
            AuthMode::Anonymous => false,
        }
    }

    async fn attach(&self, mode: &AuthMode) -> Result<Attach, Lost> {
        match mode {
            AuthMode::Anonymous => Ok(Attach::None),
            AuthMode::Bearer => Ok(Attach::bearer(self.auth.valid_token().await)),
            AuthMode::GatewaySession { addon } => match self.gateway.valid_session(addon).await {
                Some(session) => {
                    Ok(Attach::Gateway { session, bearer: self.auth.valid_token().await })
                }
                None => Err(Lost::new("gateway session unavailable")),
            },
        }
    }

    async fn attempt(
        &self,
        conn: &ResolvedConnection,
        request: &ApiRequest,
    ) -> Result<ApiResponse, Lost> {
        let attach = self.attach(&conn.auth_mode).await?;
        let resp = self
            .client
            .send(&conn.base_url, &attach, request)
            .await
            .map_err(|e| Lost::new(e.to_string()))?;
        match FailureClass::from_status(resp.status) {
            Some(FailureClass::Connection) => Err(Lost {
                message: format!("{} {} returned HTTP {}", request.method, request.path, resp.status),
                unauthorized: resp.status == 401,
            }),
            _ => Ok(resp),
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
