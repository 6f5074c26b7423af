//! File-backed persistence.
//!
//! Parties, spies and last-known channels live in one TOML state file.
//! Writes go to a temporary file first and are moved into place with an
//! atomic rename, so a crash mid-write never corrupts the previous state.

use anyhow::Context;
use async_trait::async_trait;
use party_system::{ChannelKind, PartySnapshot, PersistenceProvider, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs as tokio_fs;
use tokio::sync::Mutex;
use tracing::debug;

/// On-disk layout of the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    parties: Vec<PartySnapshot>,
    #[serde(default)]
    last_channels: HashMap<PlayerId, ChannelKind>,
    #[serde(default)]
    spies: Vec<PlayerId>,
}

pub struct TomlStateStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles against the one file.
    lock: Mutex<()>,
}

impl TomlStateStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read_state(&self) -> anyhow::Result<StateFile> {
        match tokio_fs::read_to_string(&self.path).await {
            Ok(raw) => toml::from_str(&raw)
                .with_context(|| format!("failed to parse state file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateFile::default()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to read state file {}", self.path.display())
            }),
        }
    }

    async fn write_state(&self, state: &StateFile) -> anyhow::Result<()> {
        let raw = toml::to_string_pretty(state).context("failed to serialize state")?;
        let temp_path = self.path.with_extension("tmp");

        tokio_fs::write(&temp_path, raw.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", temp_path.display()))?;

        // Atomic rename
        tokio_fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    temp_path.display(),
                    self.path.display()
                )
            })?;

        debug!(path = %self.path.display(), "state file written");
        Ok(())
    }
}

#[async_trait]
impl PersistenceProvider for TomlStateStorage {
    async fn load_parties(&self) -> anyhow::Result<Vec<PartySnapshot>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_state().await?.parties)
    }

    async fn save_parties(&self, parties: &[PartySnapshot]) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_state().await?;
        state.parties = parties.to_vec();
        self.write_state(&state).await
    }

    async fn load_last_channel(&self, player: PlayerId) -> anyhow::Result<Option<ChannelKind>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_state().await?.last_channels.get(&player).copied())
    }

    async fn save_last_channel(
        &self,
        player: PlayerId,
        channel: ChannelKind,
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_state().await?;
        state.last_channels.insert(player, channel);
        self.write_state(&state).await
    }

    async fn load_spies(&self) -> anyhow::Result<Vec<PlayerId>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_state().await?.spies)
    }

    async fn save_spies(&self, spies: &[PlayerId]) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read_state().await?;
        state.spies = spies.to_vec();
        self.write_state(&state).await
    }
}
