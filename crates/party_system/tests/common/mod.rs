//! Stub host collaborators for integration tests.
//!
//! One `TestHost` plays every provider role: it tracks players, capabilities
//! and mutes, records every line the core sends, and keeps persisted state
//! in memory.

#![allow(dead_code)]

use async_trait::async_trait;
use party_system::{
    Capability, ChannelKind, ChatSink, HostServices, MuteProvider, PartySnapshot,
    PartySystem, PermissionProvider, PersistenceProvider, PlayerId, PresenceProvider,
    StaticTemplates, SystemConfig,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct PlayerRecord {
    name: String,
    online: bool,
    capabilities: HashSet<Capability>,
    muted: bool,
}

#[derive(Default)]
struct PersistedState {
    parties: Vec<PartySnapshot>,
    last_channels: HashMap<PlayerId, ChannelKind>,
    spies: Vec<PlayerId>,
}

#[derive(Default)]
pub struct TestHost {
    players: Mutex<HashMap<PlayerId, PlayerRecord>>,
    messages: Mutex<Vec<(PlayerId, String)>>,
    persisted: Mutex<PersistedState>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers an online player holding the given capabilities.
    pub fn add_player(self: &Arc<Self>, name: &str, capabilities: &[Capability]) -> PlayerId {
        let id = PlayerId::new();
        self.players.lock().unwrap().insert(
            id,
            PlayerRecord {
                name: name.to_string(),
                online: true,
                capabilities: capabilities.iter().copied().collect(),
                muted: false,
            },
        );
        id
    }

    /// A player with the full regular capability set.
    pub fn add_user(self: &Arc<Self>, name: &str) -> PlayerId {
        self.add_player(name, &[Capability::User, Capability::Leader, Capability::Nsfw])
    }

    /// A player that additionally holds the admin capability.
    pub fn add_admin(self: &Arc<Self>, name: &str) -> PlayerId {
        self.add_player(
            name,
            &[
                Capability::User,
                Capability::Leader,
                Capability::Admin,
                Capability::Nsfw,
            ],
        )
    }

    pub fn set_online(&self, player: PlayerId, online: bool) {
        if let Some(record) = self.players.lock().unwrap().get_mut(&player) {
            record.online = online;
        }
    }

    pub fn set_muted(&self, player: PlayerId, muted: bool) {
        if let Some(record) = self.players.lock().unwrap().get_mut(&player) {
            record.muted = muted;
        }
    }

    pub fn revoke_capability(&self, player: PlayerId, capability: Capability) {
        if let Some(record) = self.players.lock().unwrap().get_mut(&player) {
            record.capabilities.remove(&capability);
        }
    }

    pub fn messages_for(&self, player: PlayerId) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn received(&self, player: PlayerId, needle: &str) -> bool {
        self.messages_for(player).iter().any(|m| m.contains(needle))
    }

    pub fn count_received(&self, player: PlayerId, needle: &str) -> usize {
        self.messages_for(player)
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    pub fn clear_messages(&self) {
        self.messages.lock().unwrap().clear();
    }

    pub fn persisted_channel(&self, player: PlayerId) -> Option<ChannelKind> {
        self.persisted
            .lock()
            .unwrap()
            .last_channels
            .get(&player)
            .copied()
    }

    pub fn seed_parties(&self, parties: Vec<PartySnapshot>) {
        self.persisted.lock().unwrap().parties = parties;
    }

    pub fn services(self: &Arc<Self>) -> HostServices {
        HostServices {
            presence: self.clone(),
            permissions: self.clone(),
            mutes: self.clone(),
            templates: Arc::new(StaticTemplates::default()),
            sink: self.clone(),
        }
    }
}

#[async_trait]
impl PresenceProvider for TestHost {
    async fn is_online(&self, player: PlayerId) -> bool {
        self.players
            .lock()
            .unwrap()
            .get(&player)
            .map(|r| r.online)
            .unwrap_or(false)
    }

    async fn online_players(&self) -> Vec<PlayerId> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.online)
            .map(|(p, _)| *p)
            .collect()
    }

    async fn display_name(&self, player: PlayerId) -> Option<String> {
        self.players
            .lock()
            .unwrap()
            .get(&player)
            .map(|r| r.name.clone())
    }

    async fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| r.online && r.name.eq_ignore_ascii_case(name))
            .map(|(p, _)| *p)
    }

    async fn is_known(&self, player: PlayerId) -> bool {
        self.players.lock().unwrap().contains_key(&player)
    }
}

#[async_trait]
impl PermissionProvider for TestHost {
    async fn has_capability(&self, player: PlayerId, capability: Capability) -> bool {
        self.players
            .lock()
            .unwrap()
            .get(&player)
            .map(|r| r.capabilities.contains(&capability))
            .unwrap_or(false)
    }
}

#[async_trait]
impl MuteProvider for TestHost {
    async fn is_muted(&self, player: PlayerId) -> bool {
        self.players
            .lock()
            .unwrap()
            .get(&player)
            .map(|r| r.muted)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChatSink for TestHost {
    async fn send(&self, player: PlayerId, text: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((player, text.to_string()));
    }
}

#[async_trait]
impl PersistenceProvider for TestHost {
    async fn load_parties(&self) -> anyhow::Result<Vec<PartySnapshot>> {
        Ok(self.persisted.lock().unwrap().parties.clone())
    }

    async fn save_parties(&self, parties: &[PartySnapshot]) -> anyhow::Result<()> {
        self.persisted.lock().unwrap().parties = parties.to_vec();
        Ok(())
    }

    async fn load_last_channel(&self, player: PlayerId) -> anyhow::Result<Option<ChannelKind>> {
        Ok(self
            .persisted
            .lock()
            .unwrap()
            .last_channels
            .get(&player)
            .copied())
    }

    async fn save_last_channel(
        &self,
        player: PlayerId,
        channel: ChannelKind,
    ) -> anyhow::Result<()> {
        self.persisted
            .lock()
            .unwrap()
            .last_channels
            .insert(player, channel);
        Ok(())
    }

    async fn load_spies(&self) -> anyhow::Result<Vec<PlayerId>> {
        Ok(self.persisted.lock().unwrap().spies.clone())
    }

    async fn save_spies(&self, spies: &[PlayerId]) -> anyhow::Result<()> {
        self.persisted.lock().unwrap().spies = spies.to_vec();
        Ok(())
    }
}

/// A fully wired system over a fresh `TestHost`.
pub fn system(host: &Arc<TestHost>) -> PartySystem {
    system_with(host, SystemConfig::default())
}

pub fn system_with(host: &Arc<TestHost>, config: SystemConfig) -> PartySystem {
    PartySystem::new(host.services(), host.clone(), config)
}
