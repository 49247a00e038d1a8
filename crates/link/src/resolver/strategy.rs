// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate construction for each connection strategy.

use reqwest::Url;

use crate::client::normalize_base;
use crate::gateway::AddonInfo;
use crate::resolver::{AuthMode, StrategyKind};

/// One URL a strategy will probe, with the credential it must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEndpoint {
    pub kind: StrategyKind,
    /// Always ends with `/`.
    pub base_url: String,
    pub auth_mode: AuthMode,
}

impl CandidateEndpoint {
    pub fn priority(&self) -> u8 {
        self.kind.priority()
    }
}

/// `{issuer}{proxy_path}/{addon}/`.
pub fn gateway_candidate(issuer: &str, proxy_path: &str, addon: &str) -> CandidateEndpoint {
    let root = issuer.trim_end_matches('/');
    let path = proxy_path.trim_matches('/');
    let base_url = if path.is_empty() {
        format!("{root}/{addon}/")
    } else {
        format!("{root}/{path}/{addon}/")
    };
    CandidateEndpoint {
        kind: StrategyKind::GatewayProxied,
        base_url,
        auth_mode: AuthMode::GatewaySession { addon: addon.to_owned() },
    }
}

/// `scheme://host:port/` for every scheme, keeping the issuer's host.
///
/// Returns `None` when the issuer has no host.
pub fn direct_candidates(
    issuer: &str,
    port: u16,
    schemes: &[String],
    auth_mode: &AuthMode,
) -> Option<Vec<CandidateEndpoint>> {
    let url = Url::parse(issuer).ok()?;
    let host = url.host_str()?;
    Some(
        schemes
            .iter()
            .map(|scheme| CandidateEndpoint {
                kind: StrategyKind::Direct,
                base_url: format!("{scheme}://{host}:{port}/"),
                auth_mode: auth_mode.clone(),
            })
            .collect(),
    )
}

pub fn tunnel_candidate(url: &str, auth_mode: &AuthMode) -> CandidateEndpoint {
    CandidateEndpoint {
        kind: StrategyKind::Tunnel,
        base_url: normalize_base(url),
        auth_mode: auth_mode.clone(),
    }
}

/// Order of add-on identifiers to try for the gateway strategy.
///
/// A configured identifier is the only candidate. Otherwise the last
/// identifier that worked comes first, then listed add-ons whose slug
/// contains `pattern`, then the well-known identifiers. Duplicates are
/// dropped, keeping the first occurrence.
pub fn addon_candidates(
    configured: Option<&str>,
    stored: Option<&str>,
    listed: &[AddonInfo],
    pattern: &str,
    well_known: &[String],
) -> Vec<String> {
    if let Some(addon) = configured {
        return vec![addon.to_owned()];
    }
    let listed = listed
        .iter()
        .filter(|a| !pattern.is_empty() && a.slug.contains(pattern))
        .map(|a| a.slug.as_str());
    let mut out: Vec<String> = Vec::new();
    for slug in stored.into_iter().chain(listed).chain(well_known.iter().map(String::as_str)) {
        if !slug.is_empty() && !out.iter().any(|s| s == slug) {
            out.push(slug.to_owned());
        }
    }
    out
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
