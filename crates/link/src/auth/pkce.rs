// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth authorization code + PKCE (RFC 7636) helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::client::join_url;
use crate::error::AuthError;

/// Verifier, challenge, and state for one login attempt. Never persisted.
#[derive(Clone)]
pub struct PkceContext {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl PkceContext {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = compute_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge, state: generate_state() }
    }
}

impl std::fmt::Debug for PkceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceContext")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Generate a PKCE code verifier (43-128 char URL-safe random string).
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state parameter.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build `{issuer}/auth/authorize?...` for the given PKCE context.
pub fn build_auth_url(
    issuer: &str,
    client_id: &str,
    redirect_uri: &str,
    pkce: &PkceContext,
) -> Result<String, AuthError> {
    let base = parse_issuer(issuer)?;
    let mut url = Url::parse(&join_url(base.as_str(), "auth/authorize"))
        .map_err(|e| AuthError::InvalidIssuer(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("code_challenge", &pkce.code_challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", &pkce.state);
    Ok(url.into())
}

/// Parse and sanity-check an issuer address (must be http(s) with a host).
pub fn parse_issuer(issuer: &str) -> Result<Url, AuthError> {
    let url = Url::parse(issuer.trim()).map_err(|e| AuthError::InvalidIssuer(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AuthError::InvalidIssuer(issuer.to_owned()));
    }
    Ok(url)
}

/// `code` and `state` carried by an intercepted redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub code: String,
    pub state: Option<String>,
}

/// Extract the authorization code from a redirect URL.
///
/// Returns `None` when the URL does not carry a `code` parameter.
pub fn parse_callback(redirect_url: &str) -> Option<Callback> {
    let url = Url::parse(redirect_url).ok()?;
    let mut code = None;
    let mut state = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            _ => {}
        }
    }
    Some(Callback { code: code?, state })
}

#[cfg(test)]
#[path = "pkce_tests.rs"]
mod tests;
