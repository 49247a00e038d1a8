// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback mock of a home network: issuer with gateway proxy, the backend
//! on its direct port, and a tunnel endpoint.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;

use relaylink::auth::Credential;
use relaylink::config::ConnectConfig;
use relaylink::store::CredentialStore;
use relaylink::Connector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    /// 200 with an HTML login page instead of the health payload.
    LoginPage,
    Unavailable,
}

fn health_response(health: Health) -> Response {
    match health {
        Health::Healthy => {
            Json(serde_json::json!({ "status": "healthy", "version": "0.1.1" })).into_response()
        }
        Health::LoginPage => {
            Html("<!DOCTYPE html><html><body><form>Log in</form></body></html>").into_response()
        }
        Health::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

pub struct HomeState {
    /// Health probes in arrival order: `gateway`, `direct` or `tunnel`.
    pub probes: Mutex<Vec<&'static str>>,
    pub session_creates: AtomicU32,
    pub refreshes: AtomicU32,
    pub reject_sessions: AtomicBool,
    pub gateway_health: Mutex<Health>,
    /// The only add-on the proxy serves; any identifier when `None`.
    pub gateway_addon: Mutex<Option<String>>,
    /// Delay before the proxied health endpoint answers.
    pub gateway_delay_ms: AtomicU64,
    /// Body of the administrative add-on listing; 404 when `None`.
    pub addons: Mutex<Option<serde_json::Value>>,
    pub listings: AtomicU32,
    pub direct_health: Mutex<Health>,
    pub tunnel_health: Mutex<Health>,
    /// Body of `GET api/config/remote`, direct or through the proxy.
    pub remote_config: Mutex<Option<serde_json::Value>>,
    /// Bearer token the direct backend accepts for `api/printers`.
    pub accepted_token: Mutex<String>,
    /// Gateway sessions the proxy answers with 401.
    pub revoked_sessions: Mutex<Vec<String>>,
}

impl Default for HomeState {
    fn default() -> Self {
        Self {
            probes: Mutex::new(Vec::new()),
            session_creates: AtomicU32::new(0),
            refreshes: AtomicU32::new(0),
            reject_sessions: AtomicBool::new(false),
            gateway_health: Mutex::new(Health::Unavailable),
            gateway_addon: Mutex::new(None),
            gateway_delay_ms: AtomicU64::new(0),
            addons: Mutex::new(None),
            listings: AtomicU32::new(0),
            direct_health: Mutex::new(Health::Unavailable),
            tunnel_health: Mutex::new(Health::Unavailable),
            remote_config: Mutex::new(None),
            accepted_token: Mutex::new("tok".into()),
            revoked_sessions: Mutex::new(Vec::new()),
        }
    }
}

impl HomeState {
    pub fn probe_log(&self) -> Vec<&'static str> {
        self.probes.lock().clone()
    }

    pub fn creates(&self) -> u32 {
        self.session_creates.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> u32 {
        self.listings.load(Ordering::SeqCst)
    }

    fn serves_addon(&self, addon: &str) -> bool {
        self.gateway_addon.lock().as_deref().is_none_or(|a| a == addon)
    }
}

pub struct Home {
    pub issuer: SocketAddr,
    pub direct: SocketAddr,
    pub tunnel: SocketAddr,
    pub state: Arc<HomeState>,
}

impl Home {
    pub fn issuer_url(&self) -> String {
        format!("http://{}", self.issuer)
    }

    pub fn tunnel_url(&self) -> String {
        format!("http://{}/", self.tunnel)
    }

    pub fn direct_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.direct.port())
    }
}

type Shared = State<Arc<HomeState>>;

async fn token(State(home): Shared, Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("grant_type").map(String::as_str) != Some("refresh_token") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let n = home.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
    Json(serde_json::json!({
        "access_token": format!("refreshed-{n}"),
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn create_session(State(home): Shared, headers: HeaderMap) -> Response {
    if headers.get("authorization").is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if home.reject_sessions.load(Ordering::SeqCst) {
        return StatusCode::BAD_GATEWAY.into_response();
    }
    let n = home.session_creates.fetch_add(1, Ordering::SeqCst) + 1;
    Json(serde_json::json!({ "session": format!("session-{n}") })).into_response()
}

async fn validate_session() -> StatusCode {
    StatusCode::OK
}

async fn list_addons(State(home): Shared, headers: HeaderMap) -> Response {
    home.listings.fetch_add(1, Ordering::SeqCst);
    if headers.get("authorization").is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match home.addons.lock().clone() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn proxied_health(State(home): Shared, Path(addon): Path<String>) -> Response {
    home.probes.lock().push("gateway");
    let delay = home.gateway_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !home.serves_addon(&addon) {
        return StatusCode::NOT_FOUND.into_response();
    }
    health_response(*home.gateway_health.lock())
}

async fn proxied_remote_config(State(home): Shared, Path(addon): Path<String>) -> Response {
    if !home.serves_addon(&addon) {
        return StatusCode::NOT_FOUND.into_response();
    }
    remote_config_response(&home)
}

async fn proxied_printers(State(home): Shared, headers: HeaderMap) -> Response {
    let session = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|c| c.strip_prefix("ingress_session="))
        .map(str::to_owned);
    match session {
        Some(s) if !home.revoked_sessions.lock().contains(&s) => {
            Json(serde_json::json!({ "printers": ["gateway-printer"] })).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn direct_health(State(home): Shared) -> Response {
    home.probes.lock().push("direct");
    health_response(*home.direct_health.lock())
}

fn remote_config_response(home: &HomeState) -> Response {
    match home.remote_config.lock().clone() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn direct_remote_config(State(home): Shared) -> Response {
    remote_config_response(&home)
}

async fn direct_printers(State(home): Shared, headers: HeaderMap) -> Response {
    let expected = format!("Bearer {}", home.accepted_token.lock());
    let presented = headers.get("authorization").and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        Json(serde_json::json!({ "printers": ["direct-printer"] })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn tunnel_health(State(home): Shared) -> Response {
    home.probes.lock().push("tunnel");
    health_response(*home.tunnel_health.lock())
}

async fn serve(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

pub async fn home() -> anyhow::Result<Home> {
    let state = Arc::new(HomeState::default());

    let issuer = Router::new()
        .route("/auth/token", post(token))
        .route("/gateway/session", post(create_session))
        .route("/gateway/validate_session", post(validate_session))
        .route("/gateway/addons", get(list_addons))
        .route("/gateway/proxy/{addon}/api/health", get(proxied_health))
        .route("/gateway/proxy/{addon}/api/config/remote", get(proxied_remote_config))
        .route("/gateway/proxy/{addon}/api/printers", get(proxied_printers))
        .with_state(Arc::clone(&state));
    let direct = Router::new()
        .route("/api/health", get(direct_health))
        .route("/api/config/remote", get(direct_remote_config))
        .route("/api/printers", get(direct_printers))
        .with_state(Arc::clone(&state));
    let tunnel = Router::new().route("/api/health", get(tunnel_health)).with_state(Arc::clone(&state));

    Ok(Home {
        issuer: serve(issuer).await?,
        direct: serve(direct).await?,
        tunnel: serve(tunnel).await?,
        state,
    })
}

/// Configuration pointing at `home`, with fast timeouts and no backoff.
pub fn config(home: &Home, state_dir: PathBuf) -> ConnectConfig {
    ConnectConfig {
        issuer: Some(home.issuer_url()),
        client_id: "https://relayprint.app/".into(),
        redirect_uri: "https://relayprint.app/auth/callback".into(),
        direct_port: home.direct.port(),
        direct_schemes: vec!["http".into()],
        addon: None,
        addon_candidates: vec!["relayprint".into(), "local_relayprint".into()],
        addon_match: "relayprint".into(),
        gateway_proxy_path: "/gateway/proxy".into(),
        tunnel_url: None,
        probe_timeout_ms: 2000,
        request_timeout_ms: 2000,
        token_margin_secs: 60,
        session_refresh_secs: 50,
        backoff_ms: 0,
        max_backoff_ms: 0,
        state_dir: Some(state_dir),
    }
}

/// Build a connector over an in-memory store, logged in with `token` if given.
pub fn connect(config: &ConnectConfig, token: Option<&str>) -> anyhow::Result<Connector> {
    let connector = Connector::new(config, Arc::new(CredentialStore::memory()))?;
    if let (Some(token), Some(issuer)) = (token, config.issuer.as_deref()) {
        connector.auth.install(issuer, credential(token))?;
    }
    Ok(connector)
}

pub fn credential(token: &str) -> Credential {
    Credential {
        access_token: token.into(),
        refresh_token: Some("refresh-original".into()),
        expires_at: None,
        token_kind: "Bearer".into(),
    }
}
