//! The party store.
//!
//! Owns every party, the player-to-party reverse index and the name
//! registry, all behind one lock so that a disband cascade is atomic with
//! respect to any concurrent membership query. Each player belongs to at
//! most one party; the reverse index makes that an invariant instead of a
//! linear scan.

use crate::channel::ChannelManager;
use crate::error::{PartyError, PartyResult};
use crate::party::Party;
use crate::providers::HostServices;
use crate::registry::NameRegistry;
use crate::spy::SpyBroadcaster;
use crate::types::{Capability, NameLimits, PartyId, PartyRank, PartySnapshot, PlayerId, RemoveReason};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

struct StoreInner {
    parties: HashMap<PartyId, Party>,
    by_player: HashMap<PlayerId, PartyId>,
    registry: NameRegistry,
}

pub struct PartyStore {
    inner: RwLock<StoreInner>,
    services: HostServices,
    channels: Arc<ChannelManager>,
    spies: Arc<SpyBroadcaster>,
}

impl PartyStore {
    pub fn new(
        services: HostServices,
        channels: Arc<ChannelManager>,
        spies: Arc<SpyBroadcaster>,
        limits: NameLimits,
    ) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                parties: HashMap::new(),
                by_player: HashMap::new(),
                registry: NameRegistry::new(limits),
            }),
            services,
            channels,
            spies,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The party the player belongs to, if any.
    pub async fn party_of(&self, player: PlayerId) -> Option<PartyId> {
        self.inner.read().await.by_player.get(&player).copied()
    }

    /// Case-insensitive party lookup by display name.
    pub async fn find_by_name(&self, name: &str) -> Option<PartyId> {
        self.inner.read().await.registry.party_by_name(name)
    }

    /// Case-insensitive party lookup by tag.
    pub async fn find_by_tag(&self, tag: &str) -> Option<PartyId> {
        self.inner.read().await.registry.party_by_tag(tag)
    }

    /// The player's rank within the given party.
    pub async fn rank_of(&self, party: PartyId, player: PlayerId) -> Option<PartyRank> {
        self.inner
            .read()
            .await
            .parties
            .get(&party)
            .and_then(|p| p.rank(player))
    }

    /// Snapshot of one party, if it still exists.
    pub async fn snapshot_of(&self, party: PartyId) -> Option<PartySnapshot> {
        self.inner
            .read()
            .await
            .parties
            .get(&party)
            .map(|p| p.snapshot())
    }

    /// Snapshots of every party, for the persistence provider.
    pub async fn snapshot(&self) -> Vec<PartySnapshot> {
        self.inner
            .read()
            .await
            .parties
            .values()
            .map(|p| p.snapshot())
            .collect()
    }

    pub async fn party_count(&self) -> usize {
        self.inner.read().await.parties.len()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Creates a party with `founder` as its sole leader.
    ///
    /// Validates and reserves the name, derives the tag and moves the
    /// founder out of any party they were in. The founder gets a
    /// confirmation and a hint on how to invite.
    pub async fn create_party(&self, founder: PlayerId, name: &str) -> PartyResult<PartyId> {
        if !self.services.presence.is_known(founder).await {
            return Err(PartyError::PlayerNeverSeen(founder));
        }

        let mut inner = self.inner.write().await;

        // Reserve first: a rejected name must leave the founder's current
        // membership untouched.
        let id = PartyId::new();
        let tag = inner.registry.reserve(name, id)?;

        if let Some(previous) = inner.by_player.get(&founder).copied() {
            self.remove_and_check(&mut inner, previous, founder, None, RemoveReason::MovedParty)
                .await?;
        }

        let party = Party::new(id, name.to_string(), tag.clone(), founder);
        inner.parties.insert(id, party);
        inner.by_player.insert(founder, id);
        drop(inner);

        let sink = &self.services.sink;
        sink.send(founder, &format!("You created the party \"{name}\"."))
            .await;
        sink.send(founder, "Invite your friends with /party invite <player>")
            .await;
        sink.send(founder, "Send a message to your party with /p <message>")
            .await;

        info!(party = %name, %tag, %founder, "party created");
        Ok(id)
    }

    /// Adds `player` to the party as a member.
    ///
    /// A player already in a different party is moved out of it first.
    /// Adding a player who is already in this party is a no-op.
    pub async fn add_player(&self, party: PartyId, player: PlayerId) -> PartyResult<()> {
        if !self.services.presence.is_known(player).await {
            return Err(PartyError::PlayerNeverSeen(player));
        }

        let mut inner = self.inner.write().await;

        {
            let target = inner.parties.get(&party).ok_or(PartyError::UnknownParty)?;
            if target.contains(player) {
                return Ok(());
            }
        }

        if let Some(previous) = inner.by_player.get(&player).copied() {
            self.remove_and_check(&mut inner, previous, player, None, RemoveReason::MovedParty)
                .await?;
        }

        // The move-out above cannot have touched this party: the player was
        // not in it.
        let target = inner.parties.get_mut(&party).ok_or(PartyError::UnknownParty)?;
        target.insert(player, PartyRank::Member);
        let name = target.name().to_string();
        let tag = target.tag().to_string();
        let roster: Vec<PlayerId> = target.players().collect();
        inner.by_player.insert(player, party);
        drop(inner);

        let joiner = self.services.name_of(player).await;
        self.services
            .sink
            .send(player, &format!("You joined the party \"{name}\"."))
            .await;
        self.services
            .sink
            .send(player, "Chat with /p <message>")
            .await;
        self.party_notice(&roster, Some(player), &format!("{joiner} joined the party."))
            .await;
        self.spies
            .notify(&tag, &roster, &format!("{joiner} joined the party {name}"))
            .await;

        info!(party = %name, %player, "player joined party");
        Ok(())
    }

    /// Removes `player` from the party for `reason`, disbanding the party
    /// if no leader remains afterwards.
    pub async fn remove_player(
        &self,
        party: PartyId,
        player: PlayerId,
        actor: Option<PlayerId>,
        reason: RemoveReason,
    ) -> PartyResult<()> {
        let mut inner = self.inner.write().await;
        self.remove_and_check(&mut inner, party, player, actor, reason)
            .await
    }

    /// The player leaves their party of their own accord.
    pub async fn leave(&self, player: PlayerId) -> PartyResult<()> {
        let mut inner = self.inner.write().await;
        let party = *inner
            .by_player
            .get(&player)
            .ok_or(PartyError::NotAMember)?;

        let roster = {
            let p = inner.parties.get(&party).ok_or(PartyError::UnknownParty)?;
            p.players().collect::<Vec<_>>()
        };

        self.remove_and_check(&mut inner, party, player, None, RemoveReason::Left)
            .await?;
        drop(inner);

        let leaver = self.services.name_of(player).await;
        let remaining: Vec<PlayerId> = roster.into_iter().filter(|p| *p != player).collect();
        self.party_notice(&remaining, None, &format!("{leaver} left the party."))
            .await;
        Ok(())
    }

    /// A party leader kicks a member.
    ///
    /// Only leaders may kick, leaders cannot be kicked, and the target must
    /// currently be a member.
    pub async fn kick(
        &self,
        actor: PlayerId,
        party: PartyId,
        target: PlayerId,
    ) -> PartyResult<()> {
        let mut inner = self.inner.write().await;

        let roster = {
            let p = inner.parties.get(&party).ok_or(PartyError::UnknownParty)?;
            if p.rank(actor) != Some(PartyRank::Leader) {
                return Err(PartyError::NotLeader);
            }
            match p.rank(target) {
                None => return Err(PartyError::TargetNotMember),
                Some(PartyRank::Leader) => return Err(PartyError::TargetIsLeader),
                Some(PartyRank::Member) => {}
            }
            p.players().collect::<Vec<_>>()
        };

        self.remove_and_check(
            &mut inner,
            party,
            target,
            Some(actor),
            RemoveReason::KickedByLeader,
        )
        .await?;
        drop(inner);

        let kicked = self.services.name_of(target).await;
        let remaining: Vec<PlayerId> = roster.into_iter().filter(|p| *p != target).collect();
        self.party_notice(&remaining, None, &format!("{kicked} was kicked from the party."))
            .await;
        Ok(())
    }

    /// An admin removes any player, leaders included. A leaderless party is
    /// disbanded by the usual check afterwards.
    pub async fn admin_kick(&self, party: PartyId, target: PlayerId) -> PartyResult<()> {
        let mut inner = self.inner.write().await;
        {
            let p = inner.parties.get(&party).ok_or(PartyError::UnknownParty)?;
            if !p.contains(target) {
                return Err(PartyError::TargetNotMember);
            }
        }
        self.remove_and_check(&mut inner, party, target, None, RemoveReason::KickedByAdmin)
            .await
    }

    /// Promotes a current member to leader.
    pub async fn promote(&self, party: PartyId, target: PlayerId) -> PartyResult<()> {
        let mut inner = self.inner.write().await;

        let (name, tag, roster) = {
            let p = inner.parties.get_mut(&party).ok_or(PartyError::UnknownParty)?;
            match p.rank(target) {
                None => return Err(PartyError::NotAMember),
                Some(PartyRank::Leader) => return Err(PartyError::AlreadyLeader),
                Some(PartyRank::Member) => {}
            }
            p.insert(target, PartyRank::Leader);
            (
                p.name().to_string(),
                p.tag().to_string(),
                p.players().collect::<Vec<_>>(),
            )
        };
        drop(inner);

        let promoted = self.services.name_of(target).await;
        self.party_notice(&roster, None, &format!("{promoted} is now a leader of the party."))
            .await;
        self.spies
            .notify(&tag, &roster, &format!("{promoted} is now a leader of the party {name}"))
            .await;

        info!(party = %name, %target, "member promoted to leader");
        Ok(())
    }

    /// Disbands the party, removing every member. Idempotent: a second call
    /// on the same party is a no-op.
    pub async fn disband(&self, party: PartyId) -> PartyResult<()> {
        let mut inner = self.inner.write().await;
        self.disband_locked(&mut inner, party).await
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Rebuilds the store from persisted snapshots.
    ///
    /// Leaderless snapshots are skipped with an error log, as are members
    /// the server has never seen and players that already appeared in an
    /// earlier snapshot.
    pub async fn restore(&self, snapshots: Vec<PartySnapshot>) -> usize {
        let mut inner = self.inner.write().await;
        inner.parties.clear();
        inner.by_player.clear();
        inner.registry.clear();

        let mut restored = 0;
        for snapshot in snapshots {
            let mut members = HashMap::new();
            for (player, rank) in &snapshot.members {
                if !self.services.presence.is_known(*player).await {
                    warn!(%player, party = %snapshot.name, "skipping unknown player in snapshot");
                    continue;
                }
                if inner.by_player.contains_key(player) {
                    warn!(%player, party = %snapshot.name, "player already restored into another party");
                    continue;
                }
                members.insert(*player, *rank);
            }

            if !members.values().any(|r| *r == PartyRank::Leader) {
                error!(party = %snapshot.name, "party has no leader, skipping");
                continue;
            }

            let id = PartyId::new();
            if let Err(e) = inner.registry.adopt(&snapshot.name, &snapshot.tag, id) {
                error!(party = %snapshot.name, "could not restore party: {e}");
                continue;
            }

            let snapshot = PartySnapshot {
                members,
                ..snapshot
            };
            for player in snapshot.members.keys() {
                inner.by_player.insert(*player, id);
            }
            inner.parties.insert(id, Party::from_snapshot(id, &snapshot));
            restored += 1;
        }

        info!(count = restored, "parties restored");
        restored
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Removes one roster entry and disbands the party if that left it
    /// without a leader. Must run under the store's write lock.
    async fn remove_and_check(
        &self,
        inner: &mut StoreInner,
        party: PartyId,
        player: PlayerId,
        actor: Option<PlayerId>,
        reason: RemoveReason,
    ) -> PartyResult<()> {
        self.remove_member(inner, party, player, actor, reason)
            .await?;

        let leaderless = inner
            .parties
            .get(&party)
            .map(|p| !p.is_disbanding() && !p.has_leader())
            .unwrap_or(false);
        if leaderless {
            self.disband_locked(inner, party).await?;
        }
        Ok(())
    }

    /// The bare removal: roster entry, reverse index, channel state and the
    /// reason-coded notices. No leaderless check; the disband cascade calls
    /// this directly for every member.
    async fn remove_member(
        &self,
        inner: &mut StoreInner,
        party: PartyId,
        player: PlayerId,
        actor: Option<PlayerId>,
        reason: RemoveReason,
    ) -> PartyResult<()> {
        let party_entry = inner.parties.get_mut(&party).ok_or(PartyError::UnknownParty)?;
        if party_entry.remove(player).is_none() {
            return Err(PartyError::TargetNotMember);
        }
        let name = party_entry.name().to_string();
        let tag = party_entry.tag().to_string();
        let remaining: Vec<PlayerId> = party_entry.players().collect();

        inner.by_player.remove(&player);
        self.channels.clear_party_channel(player);

        let kicker_name = match actor {
            Some(a) => Some(self.services.name_of(a).await),
            None => None,
        };
        if self.services.presence.is_online(player).await {
            self.services
                .sink
                .send(player, &reason.player_notice(kicker_name.as_deref()))
                .await;
        }

        let player_name = self.services.name_of(player).await;
        if let Some(text) = reason.spy_notice(&player_name, &name, kicker_name.as_deref()) {
            self.spies.notify(&tag, &remaining, &text).await;
        }

        Ok(())
    }

    /// The disband cascade. Guarded against re-entry: the party is marked
    /// as disbanding before the first removal, so the leaderless check does
    /// not fire again while members are being removed.
    async fn disband_locked(&self, inner: &mut StoreInner, party: PartyId) -> PartyResult<()> {
        let (name, tag, roster) = match inner.parties.get_mut(&party) {
            None => return Ok(()),
            Some(p) if p.is_disbanding() => return Ok(()),
            Some(p) => {
                p.mark_disbanding();
                (
                    p.name().to_string(),
                    p.tag().to_string(),
                    p.players().collect::<Vec<_>>(),
                )
            }
        };

        self.party_notice(&roster, None, "The party was disbanded.")
            .await;
        for player in roster {
            self.remove_member(inner, party, player, None, RemoveReason::Disbanded)
                .await?;
        }

        inner.parties.remove(&party);
        inner.registry.release(&name, &tag);

        self.spies
            .notify(&tag, &[], &format!("The party {name} was disbanded."))
            .await;

        info!(party = %name, "party disbanded");
        Ok(())
    }

    /// Sends a bracketed party notice to every online roster member with
    /// the base chat capability, except `skip`.
    async fn party_notice(&self, roster: &[PlayerId], skip: Option<PlayerId>, text: &str) {
        let line = format!("[Party] {text}");
        for member in roster {
            if Some(*member) == skip {
                continue;
            }
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
        }
    }
}
