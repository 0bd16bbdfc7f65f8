use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::item::{ItemIdentity, ListId};

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn opposite(&self) -> Vote {
        match self {
            Vote::Up => Vote::Down,
            Vote::Down => Vote::Up,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Up => write!(f, "up"),
            Vote::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Vote::Up),
            "down" => Ok(Vote::Down),
            other => Err(format!("invalid vote: {other}")),
        }
    }
}

/// One item's row in a shared list.
///
/// The score is derived from `upvotes` and `downvotes` and never stored on
/// its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub list_id: ListId,
    pub item: ItemIdentity,
    pub upvotes: u32,
    pub downvotes: u32,
    /// The current user's vote on this entry
    pub user_vote: Option<Vote>,
}

impl ListEntry {
    /// A fresh entry with no votes, as it looks right after an add.
    pub fn new(list_id: ListId, item: ItemIdentity) -> Self {
        Self {
            list_id,
            item,
            upvotes: 0,
            downvotes: 0,
            user_vote: None,
        }
    }

    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }
}

/// A shared list as cached on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchList {
    pub id: ListId,
    pub name: String,
    pub entries: Vec<ListEntry>,
}

impl WatchList {
    pub fn new(id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Entries ordered by score, highest first. Ties keep list order.
    pub fn ranked(&self) -> Vec<&ListEntry> {
        let mut ranked: Vec<&ListEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.score().cmp(&a.score()));
        ranked
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemIdentity, PersistedId};

    fn entry(list_id: ListId, title: &str, up: u32, down: u32) -> ListEntry {
        ListEntry {
            upvotes: up,
            downvotes: down,
            ..ListEntry::new(list_id, ItemIdentity::persisted(PersistedId::new_v4(), Some(title)))
        }
    }

    #[test]
    fn score_is_derived_and_may_be_negative() {
        let list_id = ListId::new_v4();
        assert_eq!(entry(list_id, "Alien", 3, 1).score(), 2);
        assert_eq!(entry(list_id, "Cats", 0, 4).score(), -4);
    }

    #[test]
    fn ranked_orders_by_score_and_is_stable() {
        let list_id = ListId::new_v4();
        let mut list = WatchList::new(list_id, "Friday night");
        list.entries.push(entry(list_id, "Heat", 1, 0));
        list.entries.push(entry(list_id, "Ran", 5, 1));
        list.entries.push(entry(list_id, "Ikiru", 2, 1));

        let titles: Vec<_> = list
            .ranked()
            .iter()
            .map(|e| e.item.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["Ran", "Heat", "Ikiru"]);
    }

    #[test]
    fn vote_parses_case_insensitively() {
        assert_eq!("UP".parse::<Vote>(), Ok(Vote::Up));
        assert_eq!("down".parse::<Vote>(), Ok(Vote::Down));
        assert!("sideways".parse::<Vote>().is_err());
        assert_eq!(Vote::Up.opposite(), Vote::Down);
    }
}
