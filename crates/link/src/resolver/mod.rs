// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint resolution: find a working path to the backend.
//!
//! Strategies are tried in priority order (gateway proxy, direct, tunnel),
//! one at a time, stopping at the first candidate whose health endpoint
//! answers with the expected payload.

pub mod endpoint;
pub mod probe;
pub mod strategy;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

pub use endpoint::{EndpointResolver, ResolverSettings};
pub use strategy::CandidateEndpoint;

/// Connection strategy, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    GatewayProxied,
    Direct,
    Tunnel,
}

impl StrategyKind {
    /// Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::GatewayProxied => 0,
            Self::Direct => 1,
            Self::Tunnel => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatewayProxied => "gateway_proxied",
            Self::Direct => "direct",
            Self::Tunnel => "tunnel",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which credential a request over the connection must carry.
///
/// This is a reference, not the credential: the token or session is fetched
/// from its owner at request time so renewals never require re-resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    /// Access token as a bearer header.
    Bearer,
    /// Gateway session cookie for `addon`, plus the bearer token.
    GatewaySession { addon: String },
    /// Nothing attached.
    Anonymous,
}

/// A validated path to the backend. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConnection {
    /// Always ends with `/`.
    pub base_url: String,
    pub auth_mode: AuthMode,
    pub kind: StrategyKind,
    /// Epoch seconds.
    pub resolved_at: u64,
    /// Increases with every published connection.
    pub generation: u64,
}

/// Outcome of a resolution attempt. Never partially populated.
#[derive(Debug, Clone)]
pub enum DiscoveryResult {
    Success(Arc<ResolvedConnection>),
    Error(DiscoveryError),
}

impl DiscoveryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<Arc<ResolvedConnection>, DiscoveryError> {
        match self {
            Self::Success(conn) => Ok(conn),
            Self::Error(e) => Err(e),
        }
    }
}
