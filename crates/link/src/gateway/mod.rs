// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reverse-proxy gateway sessions.
//!
//! The gateway issues short-lived session tokens (observed TTL ~60s) that let
//! a client traverse its proxy path to the backend. Session failures never
//! reach the user: they only mark the gateway strategy as unavailable.

pub mod session;

use serde::{Deserialize, Serialize};

pub use session::{GatewaySessionManager, GatewaySettings};

/// A gateway session bound to one add-on identifier.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub session_token: String,
    /// Epoch seconds.
    pub created_at: u64,
    pub addon: String,
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("created_at", &self.created_at)
            .field("addon", &self.addon)
            .finish_non_exhaustive()
    }
}

/// An entry of the gateway's administrative add-on listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Why a session could not be obtained. Internal to this module's callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no issuer configured")]
    NoIssuer,
    #[error("no valid access token")]
    NoCredential,
    #[error("gateway rejected request ({0})")]
    Rejected(u16),
    #[error("gateway unreachable: {0}")]
    Transport(String),
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session: String,
}

#[derive(Debug, Deserialize)]
struct AddonListing {
    #[serde(default)]
    addons: Vec<AddonInfo>,
}
