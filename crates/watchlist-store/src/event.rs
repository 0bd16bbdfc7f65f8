use serde::{Deserialize, Serialize};

use watchlist_core::{ListId, PersistedId, PersistedItem, Vote};

/// Events emitted by the store after a write commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    ItemCreated(PersistedItem),
    EntryAdded {
        list_id: ListId,
        item_id: PersistedId,
    },
    EntryRemoved {
        list_id: ListId,
        item_id: PersistedId,
    },
    VoteRecorded {
        list_id: ListId,
        item_id: PersistedId,
        user: String,
        vote: Option<Vote>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serde_round_trip() {
        let events = vec![
            StoreEvent::EntryAdded {
                list_id: ListId::new_v4(),
                item_id: PersistedId::new_v4(),
            },
            StoreEvent::VoteRecorded {
                list_id: ListId::new_v4(),
                item_id: PersistedId::new_v4(),
                user: "ana".into(),
                vote: None,
            },
        ];
        for e in &events {
            let json = serde_json::to_string(e).unwrap();
            let back: StoreEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(*e, back);
        }
    }
}
