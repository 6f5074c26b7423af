//! Command adapter.
//!
//! Parses the player-facing slash commands and calls into the core. This
//! layer owns wording and usage hints only; every rule that matters is
//! enforced by the core and surfaced here by mapping the typed errors onto
//! player notices.

use crate::config::ChatSettings;
use party_system::{
    Capability, PartyError, PartyRank, PartySystem, PlayerId, HostServices,
};
use std::sync::Arc;
use tracing::warn;

/// What the host should do with the line it handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The line was a command and has been handled.
    Handled,
    /// Re-post this text as a regular chat event from the player.
    Repost(String),
    /// Not one of ours; the host keeps processing the line.
    NotACommand,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandOptions {
    /// A bare `/p` toggles party chat.
    pub toggle_with_p: bool,
    /// `/p <message>` is inverted while party chat is toggled: the message
    /// goes out on the global path via the one-shot ignore flag.
    pub invert_p: bool,
}

impl From<&ChatSettings> for CommandOptions {
    fn from(chat: &ChatSettings) -> Self {
        Self {
            toggle_with_p: chat.toggle_with_p,
            invert_p: chat.invert_p,
        }
    }
}

pub struct CommandDispatcher {
    system: Arc<PartySystem>,
    services: HostServices,
    options: CommandOptions,
}

impl CommandDispatcher {
    pub fn new(system: Arc<PartySystem>, services: HostServices, options: CommandOptions) -> Self {
        Self {
            system,
            services,
            options,
        }
    }

    /// Handles one line from a player. Commands start with a slash;
    /// anything else is left to the host's chat pipeline.
    pub async fn dispatch(&self, player: PlayerId, line: &str) -> Dispatch {
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(word) if word.starts_with('/') => word.to_lowercase(),
            _ => return Dispatch::NotACommand,
        };
        let args: Vec<&str> = words.collect();

        match command.as_str() {
            "/party" => self.party_command(player, &args).await,
            "/p" => return self.p_command(player, &args).await,
            "/chat" => self.chat_command(player).await,
            "/a" => self.a_command(player, &args).await,
            "/nsfw" => self.nsfw_command(player, &args).await,
            "/nsfwlisten" => self.nsfwlisten_command(player).await,
            "/nsfwadmin" => self.nsfwadmin_command(player, &args).await,
            "/pa" => self.pa_command(player, &args).await,
            _ => return Dispatch::NotACommand,
        }

        Dispatch::Handled
    }

    // ========================================================================
    // /party
    // ========================================================================

    async fn party_command(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::User).await {
            self.no_access(player).await;
            return;
        }

        match args.first().map(|s| s.to_lowercase()).as_deref() {
            None | Some("help") => self.party_help(player).await,
            Some("create") => {
                self.party_create(player, args).await;
                self.persist().await;
            }
            Some("invite") => self.party_invite(player, args).await,
            Some("join") => {
                self.party_join(player).await;
                self.persist().await;
            }
            Some("leave") => {
                self.party_leave(player).await;
                self.persist().await;
            }
            Some("members") => self.party_members(player).await,
            Some("kick") => {
                self.party_kick(player, args).await;
                self.persist().await;
            }
            Some("leader") => {
                self.party_leader(player, args).await;
                self.persist().await;
            }
            Some("toggle") => self.party_toggle(player).await,
            Some("spy") => self.party_spy(player).await,
            Some(_) => self.party_help(player).await,
        }
    }

    async fn party_help(&self, player: PlayerId) {
        let in_party = self.system.store().party_of(player).await.is_some();
        let leader_cap = self.has(player, Capability::Leader).await;

        self.send(player, "--- Party Help ---").await;
        self.send(player, "/chat: Toggle the public chat.").await;
        if in_party {
            self.send(player, "/p <message>: Send a message to your party")
                .await;
            self.send(player, "/party leave: Leave your party").await;
            self.send(player, "/party members: Show the member list").await;
            self.send(player, "/party toggle: Toggle the party chat").await;
            if leader_cap {
                self.send(player, "/party invite <player>: Invite a player to your party")
                    .await;
                self.send(player, "/party kick <player>: Kick a player from your party")
                    .await;
                self.send(player, "/party leader <player>: Add a leader to your party")
                    .await;
            }
        } else {
            self.send(player, "/party join: Accept a party invitation").await;
            if leader_cap {
                self.send(player, "/party create <name>: Create a new chat party")
                    .await;
            }
        }
        if self.has(player, Capability::Admin).await {
            self.send(player, "/party spy: Toggle messages from all parties.")
                .await;
        }
    }

    async fn party_create(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Leader).await {
            self.no_access(player).await;
            return;
        }
        if self.system.store().party_of(player).await.is_some() {
            self.send(player, "You are already in a party.").await;
            return;
        }
        let name = match args.get(1) {
            Some(name) if args.len() == 2 => *name,
            _ => {
                self.send(player, "Usage: /party create <name>").await;
                return;
            }
        };

        match self.system.store().create_party(player, name).await {
            // The store already sent the confirmation and the invite hint.
            Ok(_) => {}
            Err(PartyError::InvalidName(name)) => {
                self.send(
                    player,
                    &format!(
                        "\"{name}\" is not a valid name. Allowed characters are A-Z, a-z, 0-9."
                    ),
                )
                .await;
            }
            Err(PartyError::DuplicateName(name)) => {
                self.send(
                    player,
                    &format!("The party \"{name}\" already exists. Please choose a different name."),
                )
                .await;
            }
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn party_invite(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Leader).await {
            self.no_access(player).await;
            return;
        }
        let Some(party) = self.system.store().party_of(player).await else {
            self.not_in_party(player).await;
            return;
        };
        if self.system.store().rank_of(party, player).await != Some(PartyRank::Leader) {
            self.send(player, "Only party leaders can invite other players.")
                .await;
            return;
        }
        let name = match args.get(1) {
            Some(name) if args.len() == 2 => *name,
            _ => {
                self.send(player, "Usage: /party invite <player>").await;
                return;
            }
        };

        let Some(invitee) = self.services.presence.find_by_name(name).await else {
            self.send(player, "You can only invite online players.").await;
            return;
        };
        if !self.has(invitee, Capability::User).await {
            self.send(player, "The player does not have the permission for the party system.")
                .await;
            return;
        }
        if self.system.store().party_of(invitee).await.is_some() {
            self.send(player, "The player is already in a party.").await;
            return;
        }

        self.system.channels().set_pending_invite(invitee, party);

        let inviter = self.services.name_of(player).await;
        let invitee_name = self.services.name_of(invitee).await;
        let party_name = self
            .system
            .store()
            .snapshot_of(party)
            .await
            .map(|s| s.name)
            .unwrap_or_default();
        self.send(player, &format!("You invited {invitee_name} to your party."))
            .await;
        self.send(
            invitee,
            &format!("{inviter} invited you to the party \"{party_name}\"."),
        )
        .await;
        self.send(invitee, "To accept the invitation, type /party join")
            .await;
    }

    async fn party_join(&self, player: PlayerId) {
        let Some(party) = self.system.channels().take_pending_invite(player) else {
            self.send(player, "No active party invitation.").await;
            return;
        };

        match self.system.store().add_player(party, player).await {
            Ok(()) => {}
            Err(PartyError::UnknownParty) => {
                // The party disbanded while the invitation was pending.
                self.send(player, "No active party invitation.").await;
            }
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn party_leave(&self, player: PlayerId) {
        match self.system.store().leave(player).await {
            Ok(()) => {}
            Err(PartyError::NotAMember) => self.not_in_party(player).await,
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn party_members(&self, player: PlayerId) {
        let Some(party) = self.system.store().party_of(player).await else {
            self.not_in_party(player).await;
            return;
        };
        let Some(snapshot) = self.system.store().snapshot_of(party).await else {
            self.not_in_party(player).await;
            return;
        };

        let mut leaders = Vec::new();
        let mut members = Vec::new();
        for (id, rank) in &snapshot.members {
            let name = self.services.name_of(*id).await;
            match rank {
                PartyRank::Leader => leaders.push(name),
                PartyRank::Member => members.push(name),
            }
        }
        leaders.sort();
        members.sort();

        self.send(
            player,
            &format!("Member List of the party \"{}\":", snapshot.name),
        )
        .await;
        self.send(
            player,
            &format!("Leaders ({}): {}", leaders.len(), leaders.join(", ")),
        )
        .await;
        self.send(
            player,
            &format!("Members ({}): {}", members.len(), members.join(", ")),
        )
        .await;
    }

    async fn party_kick(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Leader).await {
            self.no_access(player).await;
            return;
        }
        let Some(party) = self.system.store().party_of(player).await else {
            self.not_in_party(player).await;
            return;
        };
        let name = match args.get(1) {
            Some(name) if args.len() == 2 => *name,
            _ => {
                self.send(player, "Usage: /party kick <player>").await;
                return;
            }
        };
        let Some(target) = self.services.presence.find_by_name(name).await else {
            self.send(player, "You can only kick online players.").await;
            return;
        };

        match self.system.store().kick(player, party, target).await {
            Ok(()) => {}
            Err(PartyError::NotLeader) => {
                self.send(player, "Only party leaders can kick other players.")
                    .await;
            }
            Err(PartyError::TargetIsLeader) => {
                self.send(player, "You can't kick party leaders.").await;
            }
            Err(PartyError::TargetNotMember) => {
                self.send(player, "The player is not a member of your party.")
                    .await;
            }
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn party_leader(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Leader).await {
            self.no_access(player).await;
            return;
        }
        let Some(party) = self.system.store().party_of(player).await else {
            self.not_in_party(player).await;
            return;
        };
        if self.system.store().rank_of(party, player).await != Some(PartyRank::Leader) {
            self.send(player, "Only party leaders can promote other players.")
                .await;
            return;
        }
        let name = match args.get(1) {
            Some(name) if args.len() == 2 => *name,
            _ => {
                self.send(player, "Usage: /party leader <player>").await;
                return;
            }
        };
        let Some(target) = self.services.presence.find_by_name(name).await else {
            self.send(player, "You can only promote online players.").await;
            return;
        };

        match self.system.store().promote(party, target).await {
            Ok(()) => {}
            Err(PartyError::AlreadyLeader) => {
                self.send(player, "The player is already a leader.").await;
            }
            Err(PartyError::NotAMember) => {
                self.send(player, "The player is not a member of your party.")
                    .await;
            }
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn party_toggle(&self, player: PlayerId) {
        if self.system.store().party_of(player).await.is_none() {
            self.not_in_party(player).await;
            return;
        }
        if self.system.channels().toggle_party(player) {
            self.send(player, "Toggled party chat.").await;
        } else {
            self.send(player, "Detoggled party chat.").await;
        }
    }

    async fn party_spy(&self, player: PlayerId) {
        if !self.has(player, Capability::Admin).await {
            self.no_access(player).await;
            return;
        }
        if self.system.spies().toggle(player).await {
            self.send(player, "You enabled the spy mode.").await;
        } else {
            self.send(player, "You disabled the spy mode.").await;
        }
        if let Err(e) = self.system.save().await {
            warn!("failed to persist spy change: {e:#}");
        }
    }

    // ========================================================================
    // /p, /chat, /a
    // ========================================================================

    async fn p_command(&self, player: PlayerId, args: &[&str]) -> Dispatch {
        if !self.has(player, Capability::User).await {
            self.no_access(player).await;
            return Dispatch::Handled;
        }
        if self.system.store().party_of(player).await.is_none() {
            self.not_in_party(player).await;
            return Dispatch::Handled;
        }

        if args.is_empty() {
            if self.options.toggle_with_p {
                self.party_toggle(player).await;
            } else {
                self.send(player, "Usage: /p <message>").await;
            }
            return Dispatch::Handled;
        }

        let message = args.join(" ");

        // Inverted /p: while party chat is toggled, /p talks to everyone
        // instead. The one-shot ignore flag routes the reposted message down
        // the global path.
        let party_toggled = self
            .system
            .channels()
            .is_active(player, party_system::ActiveChannel::Party);
        if self.options.invert_p && party_toggled {
            if self.system.channels().is_global_hidden(player) {
                self.send(player, "Message cancelled. Type /chat to enable the global chat.")
                    .await;
                return Dispatch::Handled;
            }
            self.system.channels().set_ignore_next(player);
            return Dispatch::Repost(message);
        }

        self.system.router().post_to_party(player, &message).await;
        Dispatch::Handled
    }

    async fn chat_command(&self, player: PlayerId) {
        if !self.has(player, Capability::User).await {
            self.no_access(player).await;
            return;
        }
        if self.system.channels().toggle_global_hidden(player) {
            self.send(
                player,
                "The global chat is now hidden. Type /chat to enable the global chat.",
            )
            .await;
        } else {
            self.send(player, "The global chat is now visible.").await;
        }
    }

    async fn a_command(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Admin).await {
            self.no_access(player).await;
            return;
        }
        if args.is_empty() {
            if self.system.channels().toggle_admin(player) {
                self.send(player, "Admin chat is ON").await;
            } else {
                self.send(player, "Admin chat is OFF").await;
            }
        } else {
            self.system
                .router()
                .post_to_admin(player, &args.join(" "))
                .await;
        }
    }

    // ========================================================================
    // NSFW channel
    // ========================================================================

    async fn nsfw_command(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Nsfw).await {
            self.no_access(player).await;
            return;
        }

        if args.is_empty() {
            let (on, listening_enabled) = self.system.channels().toggle_nsfw(player);
            if on {
                if listening_enabled {
                    self.send(player, "NSFW Chat is ON - listening has been enabled.")
                        .await;
                } else {
                    self.send(player, "NSFW Chat is ON").await;
                }
            } else {
                self.send(player, "NSFW Chat is OFF").await;
            }
            return;
        }

        if !self.system.channels().is_nsfw_listening(player) {
            self.send(
                player,
                "You cannot send a message to the NSFW channel if you are not listening to it!",
            )
            .await;
            return;
        }
        self.system
            .router()
            .post_to_nsfw(player, &args.join(" "))
            .await;
    }

    async fn nsfwlisten_command(&self, player: PlayerId) {
        if !self.has(player, Capability::Nsfw).await {
            self.no_access(player).await;
            return;
        }
        if self.system.channels().toggle_nsfw_listening(player) {
            self.send(player, "You are now listening to the NSFW channel.")
                .await;
        } else {
            self.send(player, "You are no longer listening to the NSFW channel.")
                .await;
        }
    }

    async fn nsfwadmin_command(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Admin).await {
            self.no_access(player).await;
            return;
        }

        match (args.first().map(|s| s.to_lowercase()).as_deref(), args.get(1)) {
            (Some("add"), Some(word)) => {
                if self.system.filter().add_word(word) {
                    self.send(player, &format!("Added \"{word}\" to the word filter."))
                        .await;
                } else {
                    self.send(player, "That word is already in the filter.").await;
                }
            }
            (Some("remove"), Some(word)) => {
                if self.system.filter().remove_word(word) {
                    self.send(player, &format!("Removed \"{word}\" from the word filter."))
                        .await;
                } else {
                    self.send(player, "That word is not in the filter.").await;
                }
            }
            (Some("list"), None) => {
                let words = self.system.filter().words().join(", ");
                self.send(player, &format!("Filtered words: {words}")).await;
            }
            _ => {
                self.send(player, "Usage: /nsfwadmin add <word> | remove <word> | list")
                    .await;
            }
        }
    }

    // ========================================================================
    // /pa — party administration
    // ========================================================================

    async fn pa_command(&self, player: PlayerId, args: &[&str]) {
        if !self.has(player, Capability::Admin).await {
            self.no_access(player).await;
            return;
        }

        match (args.first().map(|s| s.to_lowercase()).as_deref(), args.len()) {
            (Some("list"), 1) => self.pa_list(player).await,
            (Some("disband"), 2) => {
                self.pa_disband(player, args[1]).await;
                self.persist().await;
            }
            (Some("lead"), 2) => {
                self.pa_lead(player, args[1]).await;
                self.persist().await;
            }
            (Some("rm"), 2) => {
                self.pa_remove(player, args[1]).await;
                self.persist().await;
            }
            _ => {
                self.send(player, "--- Party Admin Commands ---").await;
                self.send(player, "/pa rm <player> - Remove online player from current party")
                    .await;
                self.send(player, "/pa lead <player> - Promote online player to party leader")
                    .await;
                self.send(player, "/pa disband <party> - Disband party").await;
                self.send(player, "/pa list - List all parties and their members")
                    .await;
            }
        }
    }

    async fn pa_list(&self, player: PlayerId) {
        self.send(player, "--- Chat Parties ---").await;
        self.send(player, "A star indicates a leader of the party.").await;

        for snapshot in self.system.store().snapshot().await {
            let mut names = Vec::new();
            for (id, rank) in &snapshot.members {
                let name = self.services.name_of(*id).await;
                match rank {
                    PartyRank::Leader => names.push(format!("*{name}")),
                    PartyRank::Member => names.push(name),
                }
            }
            names.sort();
            self.send(player, &format!("{}: {}", snapshot.name, names.join(", ")))
                .await;
        }
    }

    async fn pa_disband(&self, player: PlayerId, name: &str) {
        let Some(party) = self.system.store().find_by_name(name).await else {
            self.send(player, "That party does not exist.").await;
            return;
        };
        match self.system.store().disband(party).await {
            Ok(()) => self.send(player, "The party has been disbanded.").await,
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn pa_lead(&self, player: PlayerId, name: &str) {
        let Some(target) = self.services.presence.find_by_name(name).await else {
            self.send(player, "That player is not online.").await;
            return;
        };
        let Some(party) = self.system.store().party_of(target).await else {
            self.send(player, "That player is not part of a party.").await;
            return;
        };
        match self.system.store().promote(party, target).await {
            Ok(()) => {}
            Err(PartyError::AlreadyLeader) => {
                self.send(player, "The player is already a leader.").await;
            }
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    async fn pa_remove(&self, player: PlayerId, name: &str) {
        let Some(target) = self.services.presence.find_by_name(name).await else {
            self.send(player, "That player is not online.").await;
            return;
        };
        let Some(party) = self.system.store().party_of(target).await else {
            self.send(player, "That player is not part of a party.").await;
            return;
        };
        match self.system.store().admin_kick(party, target).await {
            Ok(()) => {}
            Err(e) => self.send(player, &e.to_string()).await,
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn send(&self, player: PlayerId, text: &str) {
        self.services.sink.send(player, text).await;
    }

    /// Writes the current state through the persistence provider. Party
    /// mutations are durable as soon as the command completes.
    async fn persist(&self) {
        if let Err(e) = self.system.save().await {
            warn!("failed to persist party state: {e:#}");
        }
    }

    async fn has(&self, player: PlayerId, capability: Capability) -> bool {
        self.services
            .permissions
            .has_capability(player, capability)
            .await
    }

    async fn no_access(&self, player: PlayerId) {
        self.send(player, "You do not have access to that command.")
            .await;
    }

    async fn not_in_party(&self, player: PlayerId) {
        self.send(player, "You are not in a party.").await;
        if self.has(player, Capability::Leader).await {
            self.send(player, "Create your own party with /party create <name>.")
                .await;
        }
    }
}
