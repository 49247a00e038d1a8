// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable client-side state: credentials, gateway session, connection hints.
//!
//! [`CredentialStore`] keeps the whole state in memory behind a lock and writes
//! it through a [`StoreBackend`] after every update. Each component owns its
//! own slice of [`PersistedState`] and never touches the others.

pub mod persist;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::resolver::StrategyKind;

pub use persist::{FileBackend, MemoryBackend};

/// Everything the client remembers between runs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_session: Option<PersistedSession>,
    /// Gateway add-on identifier that last produced a healthy backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_resolved: Option<LastResolved>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelHint>,
}

/// Last gateway session and when it was last known valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub session_token: String,
    pub addon: String,
    /// Epoch seconds.
    pub created_at: u64,
    /// Epoch seconds of the last successful create or validate.
    pub refreshed_at: u64,
}

/// Strategy and URL of the last successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastResolved {
    pub kind: StrategyKind,
    pub base_url: String,
    /// Epoch seconds.
    pub resolved_at: u64,
}

/// Where a tunnel URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelSource {
    /// Reported by the backend's remote configuration endpoint.
    Remote,
    /// Entered by the user.
    Manual,
}

/// Public tunnel URL exposing the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelHint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub source: TunnelSource,
}

/// Storage medium for [`PersistedState`].
pub trait StoreBackend: Send + Sync {
    /// Load state. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> anyhow::Result<Option<PersistedState>>;
    fn save(&self, state: &PersistedState) -> anyhow::Result<()>;
}

/// Write-through cache over a [`StoreBackend`].
pub struct CredentialStore {
    backend: Box<dyn StoreBackend>,
    state: Mutex<PersistedState>,
}

impl CredentialStore {
    /// Open a store, loading whatever the backend already holds.
    ///
    /// Unreadable state is logged and replaced with an empty state.
    pub fn open(backend: Box<dyn StoreBackend>) -> Self {
        let state = match backend.load() {
            Ok(Some(state)) => state,
            Ok(None) => PersistedState::default(),
            Err(e) => {
                tracing::warn!(err = %e, "failed to load persisted state, starting empty");
                PersistedState::default()
            }
        };
        Self { backend, state: Mutex::new(state) }
    }

    /// Store backed by a JSON file.
    pub fn file(path: PathBuf) -> Self {
        Self::open(Box::new(FileBackend::new(path)))
    }

    /// Store that lives only as long as the process.
    pub fn memory() -> Self {
        Self::open(Box::new(MemoryBackend::default()))
    }

    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().clone()
    }

    /// Read a projection of the state without cloning all of it.
    pub fn read<T>(&self, f: impl FnOnce(&PersistedState) -> T) -> T {
        f(&self.state.lock())
    }

    /// Mutate the state and write it through.
    ///
    /// Write failures are logged; the in-memory state stays updated.
    pub fn update(&self, f: impl FnOnce(&mut PersistedState)) {
        let mut state = self.state.lock();
        f(&mut state);
        if let Err(e) = self.backend.save(&state) {
            tracing::warn!(err = %e, "failed to persist state");
        }
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.update(|s| *s = PersistedState::default());
    }
}

/// Current epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
