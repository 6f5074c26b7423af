//! # Party System
//!
//! Party membership and chat channel routing for a live multiplayer server:
//!
//! - Named, ranked parties (leader/member) with cascading disband logic
//! - Per-player channel state (party, admin, NSFW, global visibility)
//! - A precedence-ordered chat router with mute and banned-word gates
//! - Spy mirroring of party traffic to privileged observers
//!
//! The host server is consumed exclusively through the provider traits in
//! [`providers`]: presence, permissions, mutes, persistence, templates and
//! outbound delivery. [`PartySystem`] wires the pieces together.

use std::sync::Arc;
use tracing::info;

pub mod channel;
pub mod error;
pub mod filter;
pub mod party;
pub mod providers;
pub mod registry;
pub mod router;
pub mod spy;
pub mod store;
pub mod types;

pub use channel::{ChannelManager, ChannelState};
pub use error::{PartyError, PartyResult};
pub use filter::WordFilter;
pub use party::Party;
pub use providers::{
    ChatSink, HostServices, MuteProvider, NoMuteIntegration, PermissionProvider,
    PersistenceProvider, PresenceProvider, StaticTemplates, TemplateProvider,
};
pub use router::{ChatRouter, RouteOutcome, RouteRejection};
pub use spy::SpyBroadcaster;
pub use store::PartyStore;
pub use types::{
    ActiveChannel, Capability, ChannelKind, NameLimits, PartyId, PartyRank, PartySnapshot,
    PlayerId, RemoveReason, SystemConfig,
};

/// The assembled subsystem: store, channel state, spies, filter and router,
/// sharing one set of host services.
pub struct PartySystem {
    store: Arc<PartyStore>,
    channels: Arc<ChannelManager>,
    spies: Arc<SpyBroadcaster>,
    filter: Arc<WordFilter>,
    router: ChatRouter,
    persistence: Arc<dyn PersistenceProvider>,
}

impl PartySystem {
    pub fn new(
        services: HostServices,
        persistence: Arc<dyn PersistenceProvider>,
        config: SystemConfig,
    ) -> Self {
        let channels = Arc::new(ChannelManager::new(persistence.clone()));
        let spies = Arc::new(SpyBroadcaster::new(services.clone()));
        let store = Arc::new(PartyStore::new(
            services.clone(),
            channels.clone(),
            spies.clone(),
            config.name_limits,
        ));
        let filter = Arc::new(WordFilter::new());
        let router = ChatRouter::new(
            store.clone(),
            channels.clone(),
            spies.clone(),
            filter.clone(),
            services,
            config.censor_global_chat,
        );

        Self {
            store,
            channels,
            spies,
            filter,
            router,
            persistence,
        }
    }

    pub fn store(&self) -> &Arc<PartyStore> {
        &self.store
    }

    pub fn channels(&self) -> &Arc<ChannelManager> {
        &self.channels
    }

    pub fn spies(&self) -> &Arc<SpyBroadcaster> {
        &self.spies
    }

    pub fn filter(&self) -> &Arc<WordFilter> {
        &self.filter
    }

    pub fn router(&self) -> &ChatRouter {
        &self.router
    }

    /// Restores parties and the spy set from the persistence provider.
    pub async fn load(&self) -> anyhow::Result<()> {
        let snapshots = self.persistence.load_parties().await?;
        let restored = self.store.restore(snapshots).await;

        let spies = self.persistence.load_spies().await?;
        let spy_count = spies.len();
        self.spies.load(spies).await;

        info!(parties = restored, spies = spy_count, "party system loaded");
        Ok(())
    }

    /// Writes parties and the spy set back through the persistence provider.
    pub async fn save(&self) -> anyhow::Result<()> {
        let snapshots = self.store.snapshot().await;
        self.persistence.save_parties(&snapshots).await?;

        let spies = self.spies.spies().await;
        self.persistence.save_spies(&spies).await?;
        Ok(())
    }

    /// Player lifecycle: call on connect. Restores the last-known channel.
    pub async fn player_connected(&self, player: PlayerId) {
        self.channels.player_connected(player).await;
    }

    /// Player lifecycle: call on disconnect. Persists the last-known
    /// channel and drops the transient state.
    pub async fn player_disconnected(&self, player: PlayerId) {
        self.channels.player_disconnected(player).await;
    }
}
