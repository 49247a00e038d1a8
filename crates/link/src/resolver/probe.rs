// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health probe and remote configuration fetch.

use serde::{Deserialize, Serialize};

use crate::client::{join_url, Attach, TransportError, TransportKind};

pub const HEALTH_PATH: &str = "api/health";
pub const REMOTE_CONFIG_PATH: &str = "api/config/remote";

/// Body of a healthy `GET api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPayload {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Why a candidate did not prove to be the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("timed out")]
    Timeout,
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("HTTP {0}")]
    Status(u16),
    /// 2xx that is not the health payload, e.g. a login page.
    #[error("not the backend: {0}")]
    NotBackend(String),
}

impl From<TransportError> for ProbeFailure {
    fn from(e: TransportError) -> Self {
        match e.kind {
            TransportKind::Timeout => Self::Timeout,
            TransportKind::Unreachable | TransportKind::Other => Self::Unreachable(e.message),
        }
    }
}

/// Probe `{base}api/health`. Success requires 2xx and a parseable payload.
pub async fn probe_health(
    client: &reqwest::Client,
    base_url: &str,
    attach: &Attach,
) -> Result<HealthPayload, ProbeFailure> {
    let req = client.get(join_url(base_url, HEALTH_PATH));
    let resp = attach.apply(req).send().await.map_err(TransportError::from)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ProbeFailure::Status(status.as_u16()));
    }
    let bytes = resp.bytes().await.map_err(TransportError::from)?;
    parse_health(&bytes)
}

/// Interpret a 2xx health body.
pub fn parse_health(body: &[u8]) -> Result<HealthPayload, ProbeFailure> {
    serde_json::from_slice(body).map_err(|e| ProbeFailure::NotBackend(e.to_string()))
}

/// Tunnel settings reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub tunnel_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_provider: Option<String>,
}

/// Fetch `{base}api/config/remote`.
pub async fn fetch_remote_config(
    client: &reqwest::Client,
    base_url: &str,
    attach: &Attach,
) -> anyhow::Result<RemoteConfig> {
    let req = client.get(join_url(base_url, REMOTE_CONFIG_PATH));
    let resp = attach.apply(req).send().await?.error_for_status()?;
    Ok(resp.json().await?)
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
