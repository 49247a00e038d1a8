// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Failures of the authorization-code exchange and token refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no authorization flow in progress")]
    NoPendingVerifier,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("authorization server rejected the request ({status}): {body}")]
    ServerRejected { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("callback state does not match the pending login")]
    StateMismatch,
    #[error("redirect carries no authorization code")]
    MissingCode,
    #[error("invalid issuer address: {0}")]
    InvalidIssuer(String),
}

impl AuthError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPendingVerifier => "NO_PENDING_VERIFIER",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::ServerRejected { .. } => "SERVER_REJECTED",
            Self::NetworkError(_) => "NETWORK_ERROR",
            Self::StateMismatch => "STATE_MISMATCH",
            Self::MissingCode => "MISSING_CODE",
            Self::InvalidIssuer(_) => "INVALID_ISSUER",
        }
    }

    /// Whether the user has to log in again to recover.
    pub fn requires_login(&self) -> bool {
        !matches!(self, Self::NetworkError(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError(e.to_string())
    }
}

/// Why a resolution pass produced no connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryClass {
    #[error("no credential")]
    NoCredential,
    #[error("all strategies unreachable")]
    AllStrategiesUnreachable,
    #[error("manual entry required")]
    ManualEntryRequired,
    #[error("cancelled")]
    Cancelled,
}

impl DiscoveryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "NO_CREDENTIAL",
            Self::AllStrategiesUnreachable => "ALL_STRATEGIES_UNREACHABLE",
            Self::ManualEntryRequired => "MANUAL_ENTRY_REQUIRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Actionable guidance shown to the user.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::NoCredential => "Log in to your Home Assistant instance to continue.",
            Self::AllStrategiesUnreachable => {
                "The printer server could not be reached. Join the same network as the \
                 server, or check that its tunnel is running."
            }
            Self::ManualEntryRequired => {
                "The printer server is not reachable from this network. Enable remote \
                 access on the server or enter its tunnel URL manually."
            }
            Self::Cancelled => "Connection attempt was cancelled.",
        }
    }
}

/// Terminal outcome of a resolution pass that found no usable strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{classification}: {message}")]
pub struct DiscoveryError {
    pub classification: DiscoveryClass,
    pub message: String,
}

impl DiscoveryError {
    pub fn new(classification: DiscoveryClass, message: impl Into<String>) -> Self {
        Self { classification, message: message.into() }
    }
}

/// Per-request failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Reachability or session validity: triggers re-resolution.
    Connection,
    /// Request content: passed through to the caller.
    Application,
}

impl FailureClass {
    /// Classify a completed HTTP response by status code.
    ///
    /// Returns `None` for statuses that are not failures.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::Connection),
            500..=599 => Some(Self::Connection),
            400..=499 => Some(Self::Application),
            _ => None,
        }
    }
}

/// Errors surfaced by the connection supervisor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("{0}")]
    Discovery(DiscoveryError),
    #[error("connection lost: {message}")]
    ConnectionLost { message: String },
}

impl SupervisorError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery(e) => e.classification.as_str(),
            Self::ConnectionLost { .. } => "CONNECTION_LOST",
        }
    }
}

impl From<DiscoveryError> for SupervisorError {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
