//! Error types for the party system.
//!
//! Every validation or rank failure is a typed, user-recoverable error that
//! is returned to the command layer. Nothing in this crate panics on bad
//! input. Routing rejections (muted sender, filtered message) are outcomes,
//! not errors, and live with the router.

use crate::types::PlayerId;
use thiserror::Error;

/// Errors surfaced by party mutations and lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartyError {
    #[error("the party name '{0}' is not valid")]
    InvalidName(String),

    #[error("the party '{0}' already exists")]
    DuplicateName(String),

    #[error("the party tag '{0}' is already in use")]
    DuplicateTag(String),

    #[error("the player is not in the party")]
    NotAMember,

    #[error("the player is already a leader")]
    AlreadyLeader,

    #[error("only party leaders may do that")]
    NotLeader,

    #[error("party leaders cannot be kicked")]
    TargetIsLeader,

    #[error("the player is not a member of the party")]
    TargetNotMember,

    #[error("the party no longer exists")]
    UnknownParty,

    #[error("the player {0} has never been seen on this server")]
    PlayerNeverSeen(PlayerId),
}

/// Result alias for party operations.
pub type PartyResult<T> = Result<T, PartyError>;
