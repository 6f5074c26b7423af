//! Mirroring of party and admin traffic to privileged observers.
//!
//! Spies are players who opted into receiving a tag-prefixed copy of every
//! party's traffic. Membership is persisted by the host; actually receiving
//! a mirror requires the admin capability at delivery time. A spy that has
//! lost the capability is unregistered as a side effect of the notify call.
//! Spies never receive mirrors of their own party's traffic.

use crate::providers::HostServices;
use crate::types::{Capability, PlayerId};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct SpyBroadcaster {
    spies: RwLock<HashSet<PlayerId>>,
    services: HostServices,
}

impl SpyBroadcaster {
    pub fn new(services: HostServices) -> Self {
        Self {
            spies: RwLock::new(HashSet::new()),
            services,
        }
    }

    /// Replaces the registered spy set, e.g. from persisted state.
    pub async fn load(&self, spies: impl IntoIterator<Item = PlayerId>) {
        let mut set = self.spies.write().await;
        set.clear();
        set.extend(spies);
    }

    pub async fn register(&self, player: PlayerId) -> bool {
        self.spies.write().await.insert(player)
    }

    pub async fn unregister(&self, player: PlayerId) -> bool {
        self.spies.write().await.remove(&player)
    }

    /// Flips the player's spy registration. Returns `true` when now a spy.
    pub async fn toggle(&self, player: PlayerId) -> bool {
        let mut set = self.spies.write().await;
        if set.remove(&player) {
            false
        } else {
            set.insert(player);
            true
        }
    }

    pub async fn is_spy(&self, player: PlayerId) -> bool {
        self.spies.read().await.contains(&player)
    }

    pub async fn spies(&self) -> Vec<PlayerId> {
        self.spies.read().await.iter().copied().collect()
    }

    /// Delivers a tag-prefixed notice to every eligible spy.
    ///
    /// `exclude` is the roster of the party the traffic belongs to; a spy
    /// inside that roster already sees the traffic first-hand. The message
    /// is always logged server-side, even with no spy audience at all.
    pub async fn notify(&self, tag: &str, exclude: &[PlayerId], text: &str) {
        let line = format!("[{tag}] {text}");
        info!("{line}");

        let spies: Vec<PlayerId> = self.spies.read().await.iter().copied().collect();
        let mut revoked = Vec::new();

        for spy in spies {
            if exclude.contains(&spy) {
                continue;
            }
            if !self.services.presence.is_online(spy).await {
                continue;
            }
            if !self
                .services
                .permissions
                .has_capability(spy, Capability::Admin)
                .await
            {
                revoked.push(spy);
                continue;
            }
            self.services.sink.send(spy, &line).await;
        }

        if !revoked.is_empty() {
            let mut set = self.spies.write().await;
            for spy in revoked {
                set.remove(&spy);
                warn!(%spy, "spy lost the admin capability and was unregistered");
            }
        }
    }
}
