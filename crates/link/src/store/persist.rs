// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store backends: JSON file with atomic writes, and in-memory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::store::{PersistedState, StoreBackend};

/// JSON file backend.
pub struct FileBackend {
    path: PathBuf,
    seq: AtomicU32,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path, seq: AtomicU32::new(0) }
    }
}

impl StoreBackend for FileBackend {
    fn load(&self) -> anyhow::Result<Option<PersistedState>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: PersistedState = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    /// Write tmp + rename.
    ///
    /// The temp name carries PID and a counter so concurrent saves never share
    /// a temp file.
    fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(state)?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Backend that keeps the last saved state in memory.
#[derive(Default)]
pub struct MemoryBackend {
    saved: Mutex<Option<PersistedState>>,
}

impl MemoryBackend {
    pub fn with_state(state: PersistedState) -> Self {
        Self { saved: Mutex::new(Some(state)) }
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> anyhow::Result<Option<PersistedState>> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
        *self.saved.lock() = Some(state.clone());
        Ok(())
    }
}
