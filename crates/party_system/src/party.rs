//! The party entity.
//!
//! A party is a named, ranked roster. Invariant: a party that is present in
//! the store has at least one leader; the store disbands a party as part of
//! whichever mutation left it leaderless. The `disbanding` guard keeps that
//! check from re-entering while a disband cascade is still removing members.

use crate::types::{PartyId, PartyRank, PartySnapshot, PlayerId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Party {
    id: PartyId,
    name: String,
    tag: String,
    roster: HashMap<PlayerId, PartyRank>,
    disbanding: bool,
}

impl Party {
    pub(crate) fn new(id: PartyId, name: String, tag: String, founder: PlayerId) -> Self {
        let mut roster = HashMap::new();
        roster.insert(founder, PartyRank::Leader);
        Self {
            id,
            name,
            tag,
            roster,
            disbanding: false,
        }
    }

    pub(crate) fn from_snapshot(id: PartyId, snapshot: &PartySnapshot) -> Self {
        Self {
            id,
            name: snapshot.name.clone(),
            tag: snapshot.tag.clone(),
            roster: snapshot.members.clone(),
            disbanding: false,
        }
    }

    pub fn id(&self) -> PartyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short label used in spy and log prefixes.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn rank(&self, player: PlayerId) -> Option<PartyRank> {
        self.roster.get(&player).copied()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.roster.contains_key(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.roster.keys().copied()
    }

    pub fn players_with_rank(&self, rank: PartyRank) -> Vec<PlayerId> {
        self.roster
            .iter()
            .filter(|(_, r)| **r == rank)
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn has_leader(&self) -> bool {
        self.roster.values().any(|r| *r == PartyRank::Leader)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub(crate) fn insert(&mut self, player: PlayerId, rank: PartyRank) {
        self.roster.insert(player, rank);
    }

    pub(crate) fn remove(&mut self, player: PlayerId) -> Option<PartyRank> {
        self.roster.remove(&player)
    }

    pub(crate) fn is_disbanding(&self) -> bool {
        self.disbanding
    }

    pub(crate) fn mark_disbanding(&mut self) {
        self.disbanding = true;
    }

    pub fn snapshot(&self) -> PartySnapshot {
        PartySnapshot {
            name: self.name.clone(),
            tag: self.tag.clone(),
            members: self.roster.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn founder_is_sole_leader() {
        let founder = PlayerId::new();
        let party = Party::new(PartyId::new(), "Alpha".into(), "Alp".into(), founder);
        assert_eq!(party.rank(founder), Some(PartyRank::Leader));
        assert_eq!(party.len(), 1);
        assert!(party.has_leader());
    }

    #[test]
    fn rank_entries_are_exclusive() {
        let founder = PlayerId::new();
        let other = PlayerId::new();
        let mut party = Party::new(PartyId::new(), "Alpha".into(), "Alp".into(), founder);
        party.insert(other, PartyRank::Member);
        party.insert(other, PartyRank::Leader);
        assert_eq!(party.rank(other), Some(PartyRank::Leader));
        assert_eq!(party.len(), 2);
        assert_eq!(party.players_with_rank(PartyRank::Leader).len(), 2);
    }

    #[test]
    fn snapshot_round_trips_the_roster() {
        let founder = PlayerId::new();
        let mut party = Party::new(PartyId::new(), "Alpha".into(), "Alp".into(), founder);
        party.insert(PlayerId::new(), PartyRank::Member);

        let snapshot = party.snapshot();
        let restored = Party::from_snapshot(PartyId::new(), &snapshot);
        assert_eq!(restored.name(), "Alpha");
        assert_eq!(restored.tag(), "Alp");
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.rank(founder), Some(PartyRank::Leader));
    }
}
