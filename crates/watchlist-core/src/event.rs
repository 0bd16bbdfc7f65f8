use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entry::{ListEntry, Vote};
use crate::error::{MutationError, StoreError};
use crate::item::{ItemIdentity, ListId};

/// What the user asked to do to one item in one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Vote(Vote),
    Add,
    Remove,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Vote(v) => write!(f, "vote {}", v),
            Mutation::Add => write!(f, "add"),
            Mutation::Remove => write!(f, "remove"),
        }
    }
}

/// How a mutation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted it. Carries the authoritative entry, or `None`
    /// after a removal.
    Applied(Option<ListEntry>),
    /// Add of an item the store already had in the list
    AlreadyMember,
    /// Removal of an item the store did not have in the list
    AlreadyAbsent,
    /// The list was restored to its pre-mutation state
    RolledBack(MutationError),
}

impl MutationOutcome {
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, MutationOutcome::RolledBack(_))
    }
}

/// Terminal record of one mutation, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub list_id: ListId,
    pub item: ItemIdentity,
    pub mutation: Mutation,
    pub outcome: MutationOutcome,
}

impl MutationReport {
    /// Message for the user, specific to the action and the outcome.
    /// Successes produce none.
    pub fn user_message(&self) -> Option<String> {
        let err = match &self.outcome {
            MutationOutcome::Applied(_) | MutationOutcome::AlreadyAbsent => return None,
            MutationOutcome::AlreadyMember => {
                return Some(format!("{} is already in this list", self.item));
            }
            MutationOutcome::RolledBack(err) => err,
        };
        let msg = match (self.mutation, err) {
            (_, MutationError::Materialization(_)) => {
                format!("Couldn't look up {}. Please try again.", self.item)
            }
            (Mutation::Add, MutationError::AlreadyAMember) => {
                format!("{} is already in this list", self.item)
            }
            (Mutation::Vote(_), MutationError::NotAMember) => {
                format!("{} is no longer in this list", self.item)
            }
            (_, MutationError::Conflict(_)) => {
                format!("{} was changed by someone else. Please try again.", self.item)
            }
            (_, MutationError::Timeout) => {
                format!("The server took too long to respond about {}", self.item)
            }
            (Mutation::Vote(_), _) => format!("Couldn't record your vote on {}", self.item),
            (Mutation::Add, _) => format!("Couldn't add {} to the list", self.item),
            (Mutation::Remove, _) => format!("Couldn't remove {} from the list", self.item),
        };
        Some(msg)
    }
}

/// Everything the coordinator reports after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Settled(MutationReport),
    /// Background refetch failed. Reported for logging, not shown to users.
    ResyncFailed { list_id: ListId, error: StoreError },
}

impl SyncEvent {
    pub fn user_message(&self) -> Option<String> {
        match self {
            SyncEvent::Settled(report) => report.user_message(),
            SyncEvent::ResyncFailed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{CatalogProvider, CatalogRef};

    fn report(mutation: Mutation, outcome: MutationOutcome) -> MutationReport {
        MutationReport {
            list_id: ListId::new_v4(),
            item: ItemIdentity::catalog(
                CatalogRef::new(CatalogProvider::CatalogA, "862"),
                Some("Toy Story"),
            ),
            mutation,
            outcome,
        }
    }

    #[test]
    fn success_has_no_message() {
        let r = report(Mutation::Remove, MutationOutcome::Applied(None));
        assert_eq!(r.user_message(), None);
    }

    #[test]
    fn already_member_is_not_a_generic_failure() {
        let r = report(Mutation::Add, MutationOutcome::AlreadyMember);
        let msg = r.user_message().unwrap();
        assert!(msg.contains("already in this list"));
        assert!(!msg.contains("Couldn't"));
    }

    #[test]
    fn messages_differ_per_action() {
        let err = MutationError::Remote(StoreError::Transport("reset".into()));
        let vote = report(Mutation::Vote(Vote::Up), MutationOutcome::RolledBack(err.clone()))
            .user_message()
            .unwrap();
        let add = report(Mutation::Add, MutationOutcome::RolledBack(err.clone()))
            .user_message()
            .unwrap();
        let remove = report(Mutation::Remove, MutationOutcome::RolledBack(err))
            .user_message()
            .unwrap();
        assert!(vote.contains("vote"));
        assert!(add.contains("add"));
        assert!(remove.contains("remove"));
        assert!(vote.contains("Toy Story"));
    }

    #[test]
    fn resync_failure_is_silent() {
        let event = SyncEvent::ResyncFailed {
            list_id: ListId::new_v4(),
            error: StoreError::Transport("timeout".into()),
        };
        assert_eq!(event.user_message(), None);
    }
}
