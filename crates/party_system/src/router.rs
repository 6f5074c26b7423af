//! Chat routing.
//!
//! Every chat post from a player runs through one fixed precedence ladder:
//! the one-shot ignore flag, then admin chat, then NSFW chat, then party
//! chat, then the global-hidden gate, then the public path with optional
//! censorship. Exactly one destination wins. The router delivers party,
//! admin and NSFW traffic itself through the chat sink; for the public path
//! it returns the pruned recipient set so the host can deliver natively.

use crate::channel::ChannelManager;
use crate::filter::WordFilter;
use crate::providers::{render_template, HostServices};
use crate::spy::SpyBroadcaster;
use crate::store::PartyStore;
use crate::types::{ActiveChannel, Capability, PartyId, PlayerId};
use std::sync::Arc;
use tracing::{debug, info};

/// Why a message was dropped instead of delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRejection {
    /// The sender is muted and tried to talk in a moderated channel.
    Muted,
    /// The sender has hidden global chat and tried to talk in it.
    GlobalChatHidden,
    /// The message contains a banned word and censorship is enabled.
    Filtered,
}

/// Where a message went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Delivered to the sender's party (and mirrored to spies).
    Party {
        party: PartyId,
        recipients: Vec<PlayerId>,
    },
    /// Delivered to every holder of the admin capability.
    Admin { recipients: Vec<PlayerId> },
    /// Delivered to the NSFW listeners.
    Nsfw { recipients: Vec<PlayerId> },
    /// The host should deliver to these recipients on the public channel.
    Global { recipients: Vec<PlayerId> },
    /// Dropped; the sender got a single explanatory notice.
    Rejected(RouteRejection),
}

pub struct ChatRouter {
    store: Arc<PartyStore>,
    channels: Arc<ChannelManager>,
    spies: Arc<SpyBroadcaster>,
    filter: Arc<WordFilter>,
    services: HostServices,
    censor_global_chat: bool,
}

impl ChatRouter {
    pub fn new(
        store: Arc<PartyStore>,
        channels: Arc<ChannelManager>,
        spies: Arc<SpyBroadcaster>,
        filter: Arc<WordFilter>,
        services: HostServices,
        censor_global_chat: bool,
    ) -> Self {
        Self {
            store,
            channels,
            spies,
            filter,
            services,
            censor_global_chat,
        }
    }

    /// Routes one chat post. `default_recipients` is the public recipient
    /// set the host computed for the message.
    pub async fn route_chat(
        &self,
        sender: PlayerId,
        message: &str,
        default_recipients: &[PlayerId],
    ) -> RouteOutcome {
        // One-shot escape hatch: the message skips the toggled channel and
        // takes the global path, gates included.
        if self.channels.consume_ignore(sender) {
            debug!(%sender, "ignore flag consumed, message takes the global path");
            return self.route_global(sender, message, default_recipients).await;
        }

        match self.channels.active_channel(sender) {
            Some(ActiveChannel::Admin) => self.send_admin(sender, message).await,
            Some(ActiveChannel::Nsfw) => {
                if self.reject_if_muted(sender).await {
                    return RouteOutcome::Rejected(RouteRejection::Muted);
                }
                self.send_nsfw(sender, message).await
            }
            Some(ActiveChannel::Party) => {
                if self.reject_if_muted(sender).await {
                    return RouteOutcome::Rejected(RouteRejection::Muted);
                }
                match self.store.party_of(sender).await {
                    Some(party) => match self.send_party(sender, party, message).await {
                        Some(outcome) => outcome,
                        // The party vanished between the lookups; state was
                        // cleared, the message still goes somewhere.
                        None => self.route_global(sender, message, default_recipients).await,
                    },
                    None => {
                        // Stale toggle with no membership behind it.
                        self.channels.clear_party_channel(sender);
                        self.route_global(sender, message, default_recipients).await
                    }
                }
            }
            None => self.route_global(sender, message, default_recipients).await,
        }
    }

    /// Sends a message straight to the sender's party, as `/p <message>`
    /// does, regardless of the toggled channel.
    pub async fn post_to_party(&self, sender: PlayerId, message: &str) -> Option<RouteOutcome> {
        let party = self.store.party_of(sender).await?;
        if self.reject_if_muted(sender).await {
            return Some(RouteOutcome::Rejected(RouteRejection::Muted));
        }
        self.send_party(sender, party, message).await
    }

    /// Sends a message straight to the admin channel, as `/a <message>`
    /// does.
    pub async fn post_to_admin(&self, sender: PlayerId, message: &str) -> RouteOutcome {
        self.send_admin(sender, message).await
    }

    /// Sends a message straight to the NSFW channel, as `/nsfw <message>`
    /// does.
    pub async fn post_to_nsfw(&self, sender: PlayerId, message: &str) -> RouteOutcome {
        if self.reject_if_muted(sender).await {
            return RouteOutcome::Rejected(RouteRejection::Muted);
        }
        self.send_nsfw(sender, message).await
    }

    // ========================================================================
    // Channel delivery
    // ========================================================================

    async fn send_admin(&self, sender: PlayerId, message: &str) -> RouteOutcome {
        let display_name = self.services.name_of(sender).await;
        let line = render_template(
            &self.services.templates.admin_chat(),
            &display_name,
            "",
            message,
        );

        let mut recipients = Vec::new();
        for player in self.services.presence.online_players().await {
            if self
                .services
                .permissions
                .has_capability(player, Capability::Admin)
                .await
            {
                self.services.sink.send(player, &line).await;
                recipients.push(player);
            }
        }

        info!("{line}");
        RouteOutcome::Admin { recipients }
    }

    async fn send_nsfw(&self, sender: PlayerId, message: &str) -> RouteOutcome {
        let display_name = self.services.name_of(sender).await;
        let line = render_template(
            &self.services.templates.nsfw_chat(),
            &display_name,
            "",
            message,
        );

        let mut recipients = Vec::new();
        for player in self.services.presence.online_players().await {
            if !self.channels.is_nsfw_listening(player) {
                continue;
            }
            if !self
                .services
                .permissions
                .has_capability(player, Capability::Nsfw)
                .await
            {
                // Listening without the capability: silently drop them from
                // the audience.
                self.channels.revoke_nsfw_listening(player);
                continue;
            }
            self.services.sink.send(player, &line).await;
            recipients.push(player);
        }

        info!("{line}");
        RouteOutcome::Nsfw { recipients }
    }

    /// Party delivery. Returns `None` when the party no longer exists, in
    /// which case the sender's stale channel state has been cleared.
    async fn send_party(
        &self,
        sender: PlayerId,
        party: PartyId,
        message: &str,
    ) -> Option<RouteOutcome> {
        let snapshot = match self.store.snapshot_of(party).await {
            Some(s) => s,
            None => {
                self.channels.clear_party_channel(sender);
                return None;
            }
        };

        let display_name = self.services.name_of(sender).await;
        let line = render_template(
            &self.services.templates.party_chat(),
            &display_name,
            &snapshot.name,
            message,
        );

        let roster: Vec<PlayerId> = snapshot.members.keys().copied().collect();
        let mut recipients = Vec::new();
        for member in &roster {
            if !self.services.presence.is_online(*member).await {
                continue;
            }
            if !self
                .services
                .permissions
                .has_capability(*member, Capability::User)
                .await
            {
                continue;
            }
            self.services.sink.send(*member, &line).await;
            recipients.push(*member);
        }

        self.spies
            .notify(&snapshot.tag, &roster, &format!("{display_name}: {message}"))
            .await;

        Some(RouteOutcome::Party { party, recipients })
    }

    // ========================================================================
    // Global path
    // ========================================================================

    async fn route_global(
        &self,
        sender: PlayerId,
        message: &str,
        default_recipients: &[PlayerId],
    ) -> RouteOutcome {
        if self.channels.is_global_hidden(sender) {
            self.services
                .sink
                .send(sender, "Message cancelled. Type /chat to enable the global chat.")
                .await;
            return RouteOutcome::Rejected(RouteRejection::GlobalChatHidden);
        }

        if self.censor_global_chat && self.filter.contains(message) {
            self.services
                .sink
                .send(sender, "Swearing is not allowed in the global chat.")
                .await;
            debug!(%sender, "message dropped by the word filter");
            return RouteOutcome::Rejected(RouteRejection::Filtered);
        }

        let recipients = default_recipients
            .iter()
            .copied()
            .filter(|p| !self.channels.is_global_hidden(*p))
            .collect();
        RouteOutcome::Global { recipients }
    }

    async fn reject_if_muted(&self, sender: PlayerId) -> bool {
        if self.services.mutes.is_muted(sender).await {
            self.services
                .sink
                .send(sender, "You cannot chat while you are muted.")
                .await;
            true
        } else {
            false
        }
    }
}
