// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP plumbing shared by probes, auth calls, and supervised requests.

use std::sync::Once;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

/// Cookie the gateway's reverse proxy reads the session from.
pub const SESSION_COOKIE: &str = "ingress_session";

/// Install the ring crypto provider for rustls (once per process).
pub fn ensure_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build a reqwest client with a fixed per-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    ensure_crypto_provider();
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_default()
}

/// Ensure a base URL ends with exactly one `/`.
pub fn normalize_base(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// Join a base URL and a relative path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", normalize_base(base), path.trim_start_matches('/'))
}

/// Credential material attached to an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attach {
    None,
    Bearer(String),
    /// Gateway session cookie, plus the bearer token when one is available.
    Gateway { session: String, bearer: Option<String> },
}

impl Attach {
    pub fn bearer(token: Option<String>) -> Self {
        match token {
            Some(t) => Self::Bearer(t),
            None => Self::None,
        }
    }

    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => req,
            Self::Bearer(token) => req.bearer_auth(token),
            Self::Gateway { session, bearer } => {
                let req = req.header(reqwest::header::COOKIE, format!("{SESSION_COOKIE}={session}"));
                match bearer {
                    Some(token) => req.bearer_auth(token),
                    None => req,
                }
            }
        }
    }
}

/// Transport-level failure (no HTTP response was received).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    /// DNS failure, refused connection, TLS handshake failure.
    Unreachable,
    Other,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportKind::Timeout
        } else if e.is_connect() {
            TransportKind::Unreachable
        } else {
            TransportKind::Other
        };
        Self { kind, message: e.to_string() }
    }
}

/// A request relative to the resolved base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: Method::POST, path: path.into(), body: Some(body) }
    }
}

/// A completed HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client for a resolved backend.
pub struct BackendClient {
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(timeout: Duration) -> Self {
        Self { client: http_client(timeout) }
    }

    /// Issue `request` against `base_url` and collect the full response.
    pub async fn send(
        &self,
        base_url: &str,
        attach: &Attach,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let url = join_url(base_url, &request.path);
        let mut req = self.client.request(request.method.clone(), url);
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        let resp = attach.apply(req).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
