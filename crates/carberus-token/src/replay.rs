//! Anti-replay high-water marks.
//!
//! A counter is accepted only if it is strictly greater than the last one
//! accepted in its scope. Rejections never modify the state.
//!
//! By default the state lives in memory and restarts from zero with the
//! process, which reopens the window for previously seen payloads. When a
//! state file is configured the marks are reloaded at startup, and every
//! accepted counter leaves a [`StateWrite`] for the owner to commit. The
//! guard itself never touches the disk after loading, so the owner decides
//! where the blocking write runs.

use crate::TokenRejection;
use carberus_core::constants::DEVICE_ID_LEN;
use carberus_core::{Error, EventCategory, ReplayScope, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

type DeviceId = [u8; DEVICE_ID_LEN];

/// On-disk form of the replay state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ReplayStateFile {
    global: u32,
    #[serde(default)]
    devices: BTreeMap<String, u32>,
}

/// Tracks the last accepted counter, globally or per key fob.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    scope: ReplayScope,
    global: u32,
    devices: HashMap<DeviceId, u32>,
    state_path: Option<PathBuf>,
    dirty: bool,
}

/// Serialized replay state waiting to be written to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateWrite {
    path: PathBuf,
    contents: String,
}

impl StateWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the state file atomically through a sibling temporary file.
    ///
    /// Blocking; run it off the async workers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written or renamed.
    pub fn commit(self) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, self.contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ReplayGuard {
    /// In-memory guard starting from "nothing seen".
    pub fn new(scope: ReplayScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Guard persisted at `path`, loading any previous state.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReplayState` if the file exists but cannot be parsed,
    /// and `Error::Io` if it cannot be read.
    pub fn with_state_file(scope: ReplayScope, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut guard = Self::new(scope);

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let state: ReplayStateFile = serde_json::from_str(&contents)
                .map_err(|e| Error::ReplayState(format!("{}: {e}", path.display())))?;

            guard.global = state.global;
            for (device, counter) in state.devices {
                let id = decode_device_id(&device)
                    .ok_or_else(|| Error::ReplayState(format!("invalid device id {device}")))?;
                guard.devices.insert(id, counter);
            }

            info!(
                category = EventCategory::Security.as_str(),
                path = %path.display(),
                global = guard.global,
                devices = guard.devices.len(),
                "Replay state restored"
            );
        }

        guard.state_path = Some(path);
        Ok(guard)
    }

    pub fn scope(&self) -> ReplayScope {
        self.scope
    }

    /// Last accepted counter applying to `device_id`.
    pub fn last_seen(&self, device_id: &DeviceId) -> u32 {
        match self.scope {
            ReplayScope::Global => self.global,
            ReplayScope::PerDevice => self.devices.get(device_id).copied().unwrap_or(0),
        }
    }

    /// Accept `counter` if it is fresh, advancing the mark.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRejection::Replay`] if `counter` is not above the last
    /// accepted value; the state is left untouched.
    pub fn check_and_advance(
        &mut self,
        device_id: &DeviceId,
        counter: u32,
    ) -> std::result::Result<(), TokenRejection> {
        let last_seen = self.last_seen(device_id);
        if counter <= last_seen {
            return Err(TokenRejection::Replay { counter, last_seen });
        }

        match self.scope {
            ReplayScope::Global => self.global = counter,
            ReplayScope::PerDevice => {
                self.devices.insert(*device_id, counter);
            }
        }
        self.dirty = self.state_path.is_some();
        Ok(())
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// The state write owed since the last call, if a file is configured
    /// and a counter was accepted in between.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReplayState` if the state cannot be serialized.
    pub fn take_pending_write(&mut self) -> Result<Option<StateWrite>> {
        if !std::mem::take(&mut self.dirty) {
            return Ok(None);
        }
        self.state_write()
    }

    /// Write the current state now, if a file is configured.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::ReplayState` on write failure.
    pub fn persist(&mut self) -> Result<()> {
        self.dirty = false;
        match self.state_write()? {
            Some(write) => write.commit(),
            None => Ok(()),
        }
    }

    fn state_write(&self) -> Result<Option<StateWrite>> {
        let Some(path) = &self.state_path else {
            return Ok(None);
        };

        let state = ReplayStateFile {
            global: self.global,
            devices: self
                .devices
                .iter()
                .map(|(id, counter)| (hex::encode(id), *counter))
                .collect(),
        };
        let contents = serde_json::to_string_pretty(&state)
            .map_err(|e| Error::ReplayState(e.to_string()))?;

        Ok(Some(StateWrite {
            path: path.clone(),
            contents,
        }))
    }
}

fn decode_device_id(hex_id: &str) -> Option<DeviceId> {
    hex::decode(hex_id).ok()?.try_into().ok()
}
