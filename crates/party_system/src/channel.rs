//! Per-player channel state.
//!
//! One structured record per connected player instead of loose flags: the
//! active channel is an `Option<ActiveChannel>`, so the at-most-one-channel
//! invariant holds by construction. Records live in a `DashMap`, which keeps
//! a single player's toggle sequentially consistent with that player's next
//! routed message.

use crate::providers::PersistenceProvider;
use crate::types::{ActiveChannel, ChannelKind, PartyId, PlayerId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Transient chat state for one connected player.
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    /// The channel the player is actively talking in, if any.
    pub active: Option<ActiveChannel>,
    /// The player has hidden global chat.
    pub global_chat_hidden: bool,
    /// The player is listening to the NSFW channel.
    pub nsfw_listening: bool,
    /// One-shot flag: the player's next message skips the toggled channel
    /// and goes down the global path.
    pub ignore_next_message: bool,
    /// An outstanding party invitation, if any.
    pub pending_invite: Option<PartyId>,
}

pub struct ChannelManager {
    states: DashMap<PlayerId, ChannelState>,
    persistence: Arc<dyn PersistenceProvider>,
}

impl ChannelManager {
    pub fn new(persistence: Arc<dyn PersistenceProvider>) -> Self {
        Self {
            states: DashMap::new(),
            persistence,
        }
    }

    /// Copy of the player's current state; a default record if none exists.
    pub fn state(&self, player: PlayerId) -> ChannelState {
        self.states
            .get(&player)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn with_state<R>(&self, player: PlayerId, f: impl FnOnce(&mut ChannelState) -> R) -> R {
        let mut entry = self.states.entry(player).or_default();
        f(&mut entry)
    }

    pub fn active_channel(&self, player: PlayerId) -> Option<ActiveChannel> {
        self.states.get(&player).and_then(|s| s.active)
    }

    pub fn is_active(&self, player: PlayerId, channel: ActiveChannel) -> bool {
        self.active_channel(player) == Some(channel)
    }

    /// Toggles party chat. Returns `true` when the channel is now active.
    pub fn toggle_party(&self, player: PlayerId) -> bool {
        self.toggle(player, ActiveChannel::Party)
    }

    /// Toggles admin chat. Returns `true` when the channel is now active.
    pub fn toggle_admin(&self, player: PlayerId) -> bool {
        self.toggle(player, ActiveChannel::Admin)
    }

    /// Toggles NSFW chat. Talking in the channel requires listening to it,
    /// so toggling it on enables listening as well. Returns `(active,
    /// listening_was_enabled)`.
    pub fn toggle_nsfw(&self, player: PlayerId) -> (bool, bool) {
        self.with_state(player, |s| {
            if s.active == Some(ActiveChannel::Nsfw) {
                s.active = None;
                (false, false)
            } else {
                s.active = Some(ActiveChannel::Nsfw);
                let enabled_listening = !s.nsfw_listening;
                s.nsfw_listening = true;
                (true, enabled_listening)
            }
        })
    }

    fn toggle(&self, player: PlayerId, channel: ActiveChannel) -> bool {
        self.with_state(player, |s| {
            if s.active == Some(channel) {
                s.active = None;
                false
            } else {
                s.active = Some(channel);
                true
            }
        })
    }

    /// Toggles NSFW listening. Dropping out of the audience also stops the
    /// player talking in the channel. Returns `true` when now listening.
    pub fn toggle_nsfw_listening(&self, player: PlayerId) -> bool {
        self.with_state(player, |s| {
            if s.nsfw_listening {
                s.nsfw_listening = false;
                if s.active == Some(ActiveChannel::Nsfw) {
                    s.active = None;
                }
                false
            } else {
                s.nsfw_listening = true;
                true
            }
        })
    }

    /// Revokes NSFW listening without a player request, e.g. when the
    /// capability was lost. Clears an active NSFW selection with it.
    pub fn revoke_nsfw_listening(&self, player: PlayerId) {
        self.with_state(player, |s| {
            s.nsfw_listening = false;
            if s.active == Some(ActiveChannel::Nsfw) {
                s.active = None;
            }
        });
        debug!(%player, "nsfw listening revoked");
    }

    pub fn is_nsfw_listening(&self, player: PlayerId) -> bool {
        self.states.get(&player).map(|s| s.nsfw_listening).unwrap_or(false)
    }

    /// Toggles the global-chat-hidden flag. Returns `true` when now hidden.
    pub fn toggle_global_hidden(&self, player: PlayerId) -> bool {
        self.with_state(player, |s| {
            s.global_chat_hidden = !s.global_chat_hidden;
            s.global_chat_hidden
        })
    }

    pub fn is_global_hidden(&self, player: PlayerId) -> bool {
        self.states
            .get(&player)
            .map(|s| s.global_chat_hidden)
            .unwrap_or(false)
    }

    /// Arms the one-shot escape hatch: the player's next message is routed
    /// down the global path regardless of the toggled channel.
    pub fn set_ignore_next(&self, player: PlayerId) {
        self.with_state(player, |s| s.ignore_next_message = true);
    }

    /// Consumes the one-shot flag. Returns `true` if it was set.
    pub fn consume_ignore(&self, player: PlayerId) -> bool {
        self.with_state(player, |s| std::mem::take(&mut s.ignore_next_message))
    }

    /// Clears a stale party-channel selection, e.g. after the player's party
    /// disbanded underneath them.
    pub fn clear_party_channel(&self, player: PlayerId) {
        if let Some(mut s) = self.states.get_mut(&player) {
            if s.active == Some(ActiveChannel::Party) {
                s.active = None;
            }
        }
    }

    pub fn set_pending_invite(&self, player: PlayerId, party: PartyId) {
        self.with_state(player, |s| s.pending_invite = Some(party));
    }

    pub fn take_pending_invite(&self, player: PlayerId) -> Option<PartyId> {
        self.with_state(player, |s| s.pending_invite.take())
    }

    /// Creates the player's record on connect, restoring the persisted
    /// last-known channel when one exists.
    pub async fn player_connected(&self, player: PlayerId) {
        let restored = match self.persistence.load_last_channel(player).await {
            Ok(kind) => kind,
            Err(e) => {
                warn!(%player, "failed to restore last channel: {e:#}");
                None
            }
        };

        let mut state = ChannelState::default();
        if let Some(kind) = restored {
            state.active = kind.into();
            if state.active == Some(ActiveChannel::Nsfw) {
                state.nsfw_listening = true;
            }
        }
        self.states.insert(player, state);
    }

    /// Persists the last-known channel and drops the record on disconnect.
    pub async fn player_disconnected(&self, player: PlayerId) {
        if let Some((_, state)) = self.states.remove(&player) {
            let kind = ChannelKind::from(state.active);
            if let Err(e) = self.persistence.save_last_channel(player, kind).await {
                warn!(%player, "failed to persist last channel: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PersistenceProvider;
    use crate::types::PartySnapshot;
    use async_trait::async_trait;

    struct NullPersistence;

    #[async_trait]
    impl PersistenceProvider for NullPersistence {
        async fn load_parties(&self) -> anyhow::Result<Vec<PartySnapshot>> {
            Ok(Vec::new())
        }

        async fn save_parties(&self, _parties: &[PartySnapshot]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn load_last_channel(
            &self,
            _player: PlayerId,
        ) -> anyhow::Result<Option<ChannelKind>> {
            Ok(Some(ChannelKind::Party))
        }

        async fn save_last_channel(
            &self,
            _player: PlayerId,
            _channel: ChannelKind,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn load_spies(&self) -> anyhow::Result<Vec<PlayerId>> {
            Ok(Vec::new())
        }

        async fn save_spies(&self, _spies: &[PlayerId]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn manager() -> ChannelManager {
        ChannelManager::new(Arc::new(NullPersistence))
    }

    #[test]
    fn at_most_one_channel_is_active() {
        let channels = manager();
        let p = PlayerId::new();

        assert!(channels.toggle_party(p));
        assert!(channels.toggle_admin(p));
        assert_eq!(channels.active_channel(p), Some(ActiveChannel::Admin));

        let (on, _) = channels.toggle_nsfw(p);
        assert!(on);
        assert_eq!(channels.active_channel(p), Some(ActiveChannel::Nsfw));

        let (on, _) = channels.toggle_nsfw(p);
        assert!(!on);
        assert_eq!(channels.active_channel(p), None);
    }

    #[test]
    fn nsfw_chat_requires_listening() {
        let channels = manager();
        let p = PlayerId::new();

        let (on, listening_enabled) = channels.toggle_nsfw(p);
        assert!(on && listening_enabled);
        assert!(channels.is_nsfw_listening(p));

        // Dropping listening revokes the active channel with it.
        assert!(!channels.toggle_nsfw_listening(p));
        assert_eq!(channels.active_channel(p), None);
        assert!(!channels.is_nsfw_listening(p));
    }

    #[test]
    fn ignore_flag_is_one_shot() {
        let channels = manager();
        let p = PlayerId::new();

        channels.set_ignore_next(p);
        assert!(channels.consume_ignore(p));
        assert!(!channels.consume_ignore(p));
    }

    #[test]
    fn global_hidden_is_independent_of_the_active_channel() {
        let channels = manager();
        let p = PlayerId::new();

        assert!(channels.toggle_global_hidden(p));
        assert!(channels.toggle_party(p));
        assert!(channels.is_global_hidden(p));
        assert_eq!(channels.active_channel(p), Some(ActiveChannel::Party));
    }

    #[tokio::test]
    async fn connect_restores_the_persisted_channel() {
        let channels = manager();
        let p = PlayerId::new();

        channels.player_connected(p).await;
        assert_eq!(channels.active_channel(p), Some(ActiveChannel::Party));

        channels.player_disconnected(p).await;
        assert_eq!(channels.active_channel(p), None);
    }
}
