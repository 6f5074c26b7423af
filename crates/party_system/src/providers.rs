//! Host collaborator contracts.
//!
//! The core never talks to the server directly. Presence, permissions,
//! muting, persistence, message templates and outbound delivery all go
//! through the traits defined here, so the same core runs against the real
//! host, the console harness, and the test stubs.

use crate::types::{Capability, ChannelKind, PartySnapshot, PlayerId};
use async_trait::async_trait;
use std::sync::Arc;

/// Who is connected right now, and who has ever been seen.
#[async_trait]
pub trait PresenceProvider: Send + Sync {
    /// Whether the player is currently connected.
    async fn is_online(&self, player: PlayerId) -> bool;

    /// All currently connected players.
    async fn online_players(&self) -> Vec<PlayerId>;

    /// The player's display name, if the host knows one.
    async fn display_name(&self, player: PlayerId) -> Option<String>;

    /// Resolves an online player by name.
    async fn find_by_name(&self, name: &str) -> Option<PlayerId>;

    /// Whether the player has a prior presence record. Membership operations
    /// on players the server has never seen are refused.
    async fn is_known(&self, player: PlayerId) -> bool;
}

/// Capability checks, delegated to the host's permission system.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn has_capability(&self, player: PlayerId, capability: Capability) -> bool;
}

/// Mute lookups from an optional third-party moderation integration.
#[async_trait]
pub trait MuteProvider: Send + Sync {
    async fn is_muted(&self, player: PlayerId) -> bool;
}

/// Default mute provider for hosts without a moderation integration:
/// nobody is ever muted.
#[derive(Debug, Default)]
pub struct NoMuteIntegration;

#[async_trait]
impl MuteProvider for NoMuteIntegration {
    async fn is_muted(&self, _player: PlayerId) -> bool {
        false
    }
}

/// Durable state, owned by the host. Never called on the routing path.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    async fn load_parties(&self) -> anyhow::Result<Vec<PartySnapshot>>;

    async fn save_parties(&self, parties: &[PartySnapshot]) -> anyhow::Result<()>;

    async fn load_last_channel(&self, player: PlayerId) -> anyhow::Result<Option<ChannelKind>>;

    async fn save_last_channel(&self, player: PlayerId, channel: ChannelKind)
        -> anyhow::Result<()>;

    async fn load_spies(&self) -> anyhow::Result<Vec<PlayerId>>;

    async fn save_spies(&self, spies: &[PlayerId]) -> anyhow::Result<()>;
}

/// Per-channel message templates.
///
/// Templates contain the placeholders `{DISPLAYNAME}`, `{PARTYNAME}` and
/// `{MESSAGE}`, substituted verbatim with no further escaping.
pub trait TemplateProvider: Send + Sync {
    fn party_chat(&self) -> String;
    fn admin_chat(&self) -> String;
    fn nsfw_chat(&self) -> String;
}

/// Fixed templates, useful as a default and in tests.
#[derive(Debug, Clone)]
pub struct StaticTemplates {
    pub party: String,
    pub admin: String,
    pub nsfw: String,
}

impl Default for StaticTemplates {
    fn default() -> Self {
        Self {
            party: "[{PARTYNAME}] {DISPLAYNAME}: {MESSAGE}".to_string(),
            admin: "[Admin] {DISPLAYNAME}: {MESSAGE}".to_string(),
            nsfw: "[NSFW] {DISPLAYNAME}: {MESSAGE}".to_string(),
        }
    }
}

impl TemplateProvider for StaticTemplates {
    fn party_chat(&self) -> String {
        self.party.clone()
    }

    fn admin_chat(&self) -> String {
        self.admin.clone()
    }

    fn nsfw_chat(&self) -> String {
        self.nsfw.clone()
    }
}

/// Outbound delivery of a single line to a single player.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, player: PlayerId, text: &str);
}

/// Bundle of the host services the core needs at every call site.
#[derive(Clone)]
pub struct HostServices {
    pub presence: Arc<dyn PresenceProvider>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub mutes: Arc<dyn MuteProvider>,
    pub templates: Arc<dyn TemplateProvider>,
    pub sink: Arc<dyn ChatSink>,
}

impl HostServices {
    /// The display name the host knows for the player, or the raw ID when
    /// the host has none.
    pub async fn name_of(&self, player: PlayerId) -> String {
        self.presence
            .display_name(player)
            .await
            .unwrap_or_else(|| player.to_string())
    }
}

/// Substitutes the template placeholders.
pub(crate) fn render_template(
    template: &str,
    display_name: &str,
    party_name: &str,
    message: &str,
) -> String {
    template
        .replace("{DISPLAYNAME}", display_name)
        .replace("{PARTYNAME}", party_name)
        .replace("{MESSAGE}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_substitute_verbatim() {
        let rendered = render_template(
            "[{PARTYNAME}] {DISPLAYNAME}: {MESSAGE}",
            "Steve",
            "Alpha",
            "hi there",
        );
        assert_eq!(rendered, "[Alpha] Steve: hi there");
    }

    #[tokio::test]
    async fn absent_mute_integration_never_mutes() {
        let mutes = NoMuteIntegration;
        assert!(!mutes.is_muted(PlayerId::new()).await);
    }
}
