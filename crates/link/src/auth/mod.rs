// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization-code + PKCE login and access-token refresh.

pub mod manager;
pub mod oauth;
pub mod pkce;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::oauth::TokenResponse;

pub use manager::AuthManager;

/// An access token and what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds. `None` means the token does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default = "default_token_kind")]
    pub token_kind: String,
}

fn default_token_kind() -> String {
    "Bearer".to_owned()
}

impl Credential {
    /// Build a credential from a token endpoint response received at `now`.
    ///
    /// `previous_refresh` is kept when the server does not issue a new refresh token.
    pub fn from_token(token: TokenResponse, previous_refresh: Option<String>, now: u64) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(previous_refresh),
            expires_at: (token.expires_in > 0).then(|| now + token.expires_in),
            token_kind: token.token_type.unwrap_or_else(default_token_kind),
        }
    }

    /// Whether the token may be used at `now` without a refresh attempt.
    pub fn is_fresh(&self, now: u64, margin: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(exp) => now.saturating_add(margin.as_secs()) < exp,
        }
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
