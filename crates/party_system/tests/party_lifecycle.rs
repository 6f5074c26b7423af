//! Membership state machine tests: creation, joining, ranks, kicks and the
//! cascading disband logic.

mod common;

use common::{system, TestHost};
use party_system::{PartyError, PartyRank, PartySnapshot, PlayerId, RemoveReason};
use std::collections::HashMap;

#[tokio::test]
async fn create_join_leave_disbands_when_the_last_leader_leaves() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    assert_eq!(sys.store().rank_of(party, alice).await, Some(PartyRank::Leader));

    sys.store().add_player(party, bob).await.unwrap();
    assert_eq!(sys.store().rank_of(party, bob).await, Some(PartyRank::Member));
    assert_eq!(sys.store().snapshot_of(party).await.unwrap().members.len(), 2);

    // Bob toggles party chat on; the disband below must clear it.
    sys.channels().toggle_party(bob);

    sys.store().leave(alice).await.unwrap();

    assert_eq!(sys.store().snapshot_of(party).await, None);
    assert_eq!(sys.store().party_of(bob).await, None);
    assert_eq!(sys.channels().active_channel(bob), None);
    assert!(host.received(bob, "disbanding"));
}

#[tokio::test]
async fn every_reachable_roster_has_a_leader() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");
    let carol = host.add_user("Carol");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().add_player(party, bob).await.unwrap();
    sys.store().add_player(party, carol).await.unwrap();
    sys.store().promote(party, bob).await.unwrap();
    sys.store().leave(alice).await.unwrap();
    sys.store().kick(bob, party, carol).await.unwrap();

    let snapshot = sys.store().snapshot_of(party).await.unwrap();
    assert!(snapshot.has_leader());
    assert_eq!(snapshot.members.len(), 1);

    // The remaining leader leaves; nothing may survive without one.
    sys.store().leave(bob).await.unwrap();
    assert_eq!(sys.store().snapshot_of(party).await, None);
    assert_eq!(sys.store().party_count().await, 0);
}

#[tokio::test]
async fn names_and_tags_stay_unique() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");
    let carol = host.add_user("Carol");

    sys.store().create_party(alice, "Alpha").await.unwrap();
    assert_eq!(
        sys.store().create_party(bob, "ALPHA").await,
        Err(PartyError::DuplicateName("ALPHA".to_string()))
    );

    // Same prefix, different name: the tag picks up a numeric suffix.
    let second = sys.store().create_party(carol, "Alpine").await.unwrap();
    let snapshot = sys.store().snapshot_of(second).await.unwrap();
    assert_eq!(snapshot.tag, "Alp1");
}

#[tokio::test]
async fn disband_is_idempotent_and_notifies_spies_once() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let spy = host.add_admin("Spy");
    sys.spies().register(spy).await;

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().disband(party).await.unwrap();
    sys.store().disband(party).await.unwrap();

    assert_eq!(host.count_received(spy, "was disbanded"), 1);

    // The registry released the name exactly once and the name is free.
    let dave = host.add_user("Dave");
    sys.store().create_party(dave, "Alpha").await.unwrap();
}

#[tokio::test]
async fn kick_enforces_rank_rules() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");
    let carol = host.add_user("Carol");
    let outsider = host.add_user("Outsider");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().add_player(party, bob).await.unwrap();
    sys.store().add_player(party, carol).await.unwrap();
    sys.store().promote(party, bob).await.unwrap();

    // Members cannot kick.
    assert_eq!(
        sys.store().kick(carol, party, bob).await,
        Err(PartyError::NotLeader)
    );
    // Leaders cannot kick leaders.
    assert_eq!(
        sys.store().kick(alice, party, bob).await,
        Err(PartyError::TargetIsLeader)
    );
    // The target must be in the party.
    assert_eq!(
        sys.store().kick(alice, party, outsider).await,
        Err(PartyError::TargetNotMember)
    );

    sys.store().kick(alice, party, carol).await.unwrap();
    assert_eq!(sys.store().party_of(carol).await, None);
    assert!(host.received(carol, "kicked from the party by Alice"));
}

#[tokio::test]
async fn promote_requires_a_current_member() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");
    let outsider = host.add_user("Outsider");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().add_player(party, bob).await.unwrap();

    assert_eq!(
        sys.store().promote(party, outsider).await,
        Err(PartyError::NotAMember)
    );
    assert_eq!(
        sys.store().promote(party, alice).await,
        Err(PartyError::AlreadyLeader)
    );

    sys.store().promote(party, bob).await.unwrap();
    assert_eq!(sys.store().rank_of(party, bob).await, Some(PartyRank::Leader));

    // With a second leader in place the party survives the founder leaving.
    sys.store().leave(alice).await.unwrap();
    assert!(sys.store().snapshot_of(party).await.is_some());
}

#[tokio::test]
async fn admin_kick_of_the_last_leader_disbands() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().add_player(party, bob).await.unwrap();

    sys.store().admin_kick(party, alice).await.unwrap();

    assert!(host.received(alice, "kicked from the party by an admin"));
    assert_eq!(sys.store().snapshot_of(party).await, None);
    assert_eq!(sys.store().party_of(bob).await, None);
}

#[tokio::test]
async fn joining_another_party_moves_the_player() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");
    let carol = host.add_user("Carol");

    let alpha = sys.store().create_party(alice, "Alpha").await.unwrap();
    let beta = sys.store().create_party(bob, "Beta").await.unwrap();
    sys.store().add_player(alpha, carol).await.unwrap();

    sys.store().add_player(beta, carol).await.unwrap();

    assert_eq!(sys.store().party_of(carol).await, Some(beta));
    assert!(!sys.store().snapshot_of(alpha).await.unwrap().members.contains_key(&carol));
    assert!(host.received(carol, "moved to a different party"));

    // Adding twice does not duplicate the roster entry.
    sys.store().add_player(beta, carol).await.unwrap();
    assert_eq!(sys.store().snapshot_of(beta).await.unwrap().members.len(), 2);
}

#[tokio::test]
async fn unseen_players_are_refused() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let ghost = PlayerId::new();

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    assert_eq!(
        sys.store().add_player(party, ghost).await,
        Err(PartyError::PlayerNeverSeen(ghost))
    );
    assert_eq!(
        sys.store().create_party(ghost, "Beta").await,
        Err(PartyError::PlayerNeverSeen(ghost))
    );
}

#[tokio::test]
async fn failed_creation_leaves_current_membership_untouched() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");

    let alpha = sys.store().create_party(alice, "Alpha").await.unwrap();
    assert_eq!(
        sys.store().create_party(alice, "no spaces!").await,
        Err(PartyError::InvalidName("no spaces!".to_string()))
    );
    assert_eq!(sys.store().party_of(alice).await, Some(alpha));
}

#[tokio::test]
async fn restore_skips_leaderless_parties_and_unknown_players() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");
    let ghost = PlayerId::new();

    let good = PartySnapshot {
        name: "Alpha".to_string(),
        tag: "Alp".to_string(),
        members: HashMap::from([
            (alice, PartyRank::Leader),
            (bob, PartyRank::Member),
            (ghost, PartyRank::Member),
        ]),
    };
    let leaderless = PartySnapshot {
        name: "Beta".to_string(),
        tag: "Bet".to_string(),
        members: HashMap::from([(bob, PartyRank::Member)]),
    };
    host.seed_parties(vec![good, leaderless]);

    sys.load().await.unwrap();

    assert_eq!(sys.store().party_count().await, 1);
    let alpha = sys.store().find_by_name("alpha").await.unwrap();
    let snapshot = sys.store().snapshot_of(alpha).await.unwrap();
    assert_eq!(snapshot.members.len(), 2);
    assert!(!snapshot.members.contains_key(&ghost));
    assert_eq!(sys.store().find_by_name("Beta").await, None);
}

#[tokio::test]
async fn snapshots_round_trip_through_persistence() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().add_player(party, bob).await.unwrap();
    sys.save().await.unwrap();

    let sys2 = system(&host);
    sys2.load().await.unwrap();
    let restored = sys2.store().find_by_name("Alpha").await.unwrap();
    let snapshot = sys2.store().snapshot_of(restored).await.unwrap();
    assert_eq!(snapshot.members.get(&alice), Some(&PartyRank::Leader));
    assert_eq!(snapshot.members.get(&bob), Some(&PartyRank::Member));
    assert_eq!(snapshot.tag, "Alp");
}

#[tokio::test]
async fn offline_players_get_no_removal_notice() {
    let host = TestHost::new();
    let sys = system(&host);
    let alice = host.add_user("Alice");
    let bob = host.add_user("Bob");

    let party = sys.store().create_party(alice, "Alpha").await.unwrap();
    sys.store().add_player(party, bob).await.unwrap();
    host.set_online(bob, false);
    host.clear_messages();

    sys.store()
        .remove_player(party, bob, None, RemoveReason::Other)
        .await
        .unwrap();

    assert!(host.messages_for(bob).is_empty());
    assert_eq!(sys.store().party_of(bob).await, None);
}
