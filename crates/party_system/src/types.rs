//! # Core Type Definitions
//!
//! Fundamental types for party membership and chat channel routing. Wrapper
//! types keep player and party identifiers from being confused with each
//! other, and all persisted types carry serde derives so snapshots can move
//! through the persistence provider unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a player.
///
/// A wrapper around UUID that provides type safety and ensures player IDs
/// cannot be confused with party IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a party.
///
/// Parties are addressed by this opaque ID internally; display-name and tag
/// uniqueness is the registry's concern, so renaming a party never requires a
/// roster rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    /// Creates a new random party ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for PartyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ranks and channels
// ============================================================================

/// A player's rank within a party. Every roster entry has exactly one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRank {
    Leader,
    Member,
}

/// The chat channel a player is actively talking in.
///
/// A player's selection is held as `Option<ActiveChannel>`, so at most one
/// channel can ever be active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveChannel {
    Party,
    Admin,
    Nsfw,
}

/// Persisted form of a channel selection, including the unselected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    None,
    Party,
    Admin,
    Nsfw,
}

impl From<Option<ActiveChannel>> for ChannelKind {
    fn from(active: Option<ActiveChannel>) -> Self {
        match active {
            None => ChannelKind::None,
            Some(ActiveChannel::Party) => ChannelKind::Party,
            Some(ActiveChannel::Admin) => ChannelKind::Admin,
            Some(ActiveChannel::Nsfw) => ChannelKind::Nsfw,
        }
    }
}

impl From<ChannelKind> for Option<ActiveChannel> {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::None => None,
            ChannelKind::Party => Some(ActiveChannel::Party),
            ChannelKind::Admin => Some(ActiveChannel::Admin),
            ChannelKind::Nsfw => Some(ActiveChannel::Nsfw),
        }
    }
}

/// Permission capabilities checked through the host's permission provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// May use the party and chat toggles at all.
    User,
    /// May create parties, invite, kick and promote.
    Leader,
    /// May use admin chat, spy on parties and administrate them.
    Admin,
    /// May listen and talk in the NSFW channel.
    Nsfw,
}

// ============================================================================
// Removal reasons
// ============================================================================

/// Why a player was removed from a party.
///
/// Each reason carries two message templates: one for the removed player and
/// one for the admin/spy audience. Leader kicks additionally name the kicker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReason {
    /// Left of their own accord.
    Left,
    /// Kicked by a leader of the party.
    KickedByLeader,
    /// Kicked by a server admin.
    KickedByAdmin,
    /// Moved to another party.
    MovedParty,
    /// The party is disbanding.
    Disbanded,
    /// Any other reason.
    Other,
}

impl RemoveReason {
    /// The notice shown to the removed player.
    pub fn player_notice(&self, kicker: Option<&str>) -> String {
        match self {
            RemoveReason::Left => "You left the party.".to_string(),
            RemoveReason::KickedByLeader => format!(
                "You were kicked from the party by {}.",
                kicker.unwrap_or("a leader")
            ),
            RemoveReason::KickedByAdmin => {
                "You were kicked from the party by an admin.".to_string()
            }
            RemoveReason::MovedParty => "You were moved to a different party.".to_string(),
            RemoveReason::Disbanded => {
                "You were removed from the party as it is disbanding.".to_string()
            }
            RemoveReason::Other => "You were removed from the party.".to_string(),
        }
    }

    /// The notice mirrored to the spy audience, or `None` when the spies do
    /// not care (a disband emits its own single notice instead).
    pub fn spy_notice(&self, player: &str, party: &str, kicker: Option<&str>) -> Option<String> {
        match self {
            RemoveReason::Left => Some(format!("{player} left the party {party}")),
            RemoveReason::KickedByLeader => Some(format!(
                "{player} was kicked from the party {party} by {}",
                kicker.unwrap_or("a leader")
            )),
            RemoveReason::KickedByAdmin => {
                Some(format!("{player} was kicked from the party {party} by an admin"))
            }
            RemoveReason::MovedParty => Some(format!("{player} was moved to a different party")),
            RemoveReason::Disbanded => None,
            RemoveReason::Other => Some(format!("{player} was removed from the party {party}")),
        }
    }
}

// ============================================================================
// Snapshots and configuration
// ============================================================================

/// Point-in-time copy of a party, as handed to the persistence provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySnapshot {
    /// Display name of the party.
    pub name: String,
    /// Short unique tag used in spy and log prefixes.
    pub tag: String,
    /// Roster with per-player rank.
    pub members: HashMap<PlayerId, PartyRank>,
}

impl PartySnapshot {
    /// Whether the snapshot contains at least one leader.
    pub fn has_leader(&self) -> bool {
        self.members.values().any(|r| *r == PartyRank::Leader)
    }
}

/// Bounds on party name length, applied by the registry.
#[derive(Debug, Clone, Copy)]
pub struct NameLimits {
    pub min: usize,
    pub max: usize,
}

impl Default for NameLimits {
    fn default() -> Self {
        Self { min: 4, max: 15 }
    }
}

/// Tunables for the whole subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConfig {
    /// Party name length bounds.
    pub name_limits: NameLimits,
    /// Whether the banned-word filter also censors global chat.
    pub censor_global_chat: bool,
}
