//! Vote state machine
//!
//! Transitions for an `Up` action (`Down` mirrors them):
//! ```text
//! None → Up     up +1
//! Up   → None   up -1
//! Down → Up     up +1, down -1
//! ```
//!
//! Voting the same direction twice removes the vote. Voting the opposite
//! direction switches in one step and moves the score by two.

use serde::{Deserialize, Serialize};

use crate::entry::{ListEntry, Vote};

/// Result of applying one action to the current vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTransition {
    pub new_vote: Option<Vote>,
    pub delta_up: i32,
    pub delta_down: i32,
}

impl VoteTransition {
    pub fn score_delta(&self) -> i32 {
        self.delta_up - self.delta_down
    }
}

pub fn transition(current: Option<Vote>, action: Vote) -> VoteTransition {
    let (new_vote, own, other) = match current {
        None => (Some(action), 1, 0),
        Some(v) if v == action => (None, -1, 0),
        Some(_) => (Some(action), 1, -1),
    };
    let (delta_up, delta_down) = match action {
        Vote::Up => (own, other),
        Vote::Down => (other, own),
    };
    VoteTransition {
        new_vote,
        delta_up,
        delta_down,
    }
}

/// Apply `action` to `entry`, returning the updated copy.
///
/// Counts never go below zero even if the cached counts have drifted from
/// the vote they are supposed to include.
pub fn apply_vote(entry: &ListEntry, action: Vote) -> ListEntry {
    let t = transition(entry.user_vote, action);
    ListEntry {
        upvotes: apply_delta(entry.upvotes, t.delta_up),
        downvotes: apply_delta(entry.downvotes, t.delta_down),
        user_vote: t.new_vote,
        ..entry.clone()
    }
}

fn apply_delta(count: u32, delta: i32) -> u32 {
    if delta >= 0 {
        count.saturating_add(delta.unsigned_abs())
    } else {
        count.saturating_sub(delta.unsigned_abs())
    }
}
