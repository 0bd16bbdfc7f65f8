use serde::{Deserialize, Serialize};

use crate::entry::{ListEntry, WatchList};
use crate::event::Mutation;
use crate::item::{ItemIdentity, ListId};
use crate::membership::position;
use crate::vote::apply_vote;

/// Pre-mutation copy of one item's entry, held until the mutation settles.
///
/// `entry == None` records that the item was not a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimisticSnapshot {
    pub list_id: ListId,
    pub position: Option<usize>,
    pub entry: Option<ListEntry>,
}

impl OptimisticSnapshot {
    pub fn capture(list: &WatchList, item: &ItemIdentity) -> Self {
        let position = position(item, &list.entries);
        Self {
            list_id: list.id,
            position,
            entry: position.map(|i| list.entries[i].clone()),
        }
    }

    /// Put the item's entry back exactly as captured, leaving other
    /// entries alone.
    pub fn restore(&self, list: &mut WatchList, item: &ItemIdentity) {
        let current = position(item, &list.entries);
        match (&self.entry, current) {
            (Some(entry), Some(i)) => list.entries[i] = entry.clone(),
            (Some(entry), None) => {
                let at = self.position.unwrap_or(list.entries.len()).min(list.entries.len());
                list.entries.insert(at, entry.clone());
            }
            (None, Some(i)) => {
                list.entries.remove(i);
            }
            (None, None) => {}
        }
    }
}

/// Apply the local guess for `mutation` to `list`.
pub(crate) fn speculate(list: &mut WatchList, item: &ItemIdentity, mutation: Mutation) {
    let current = position(item, &list.entries);
    match (mutation, current) {
        (Mutation::Vote(action), Some(i)) => {
            list.entries[i] = apply_vote(&list.entries[i], action);
        }
        (Mutation::Vote(action), None) => {
            let provisional = ListEntry::new(list.id, item.clone());
            list.entries.push(apply_vote(&provisional, action));
        }
        (Mutation::Add, None) => list.entries.push(ListEntry::new(list.id, item.clone())),
        (Mutation::Add, Some(_)) => {}
        (Mutation::Remove, Some(i)) => {
            list.entries.remove(i);
        }
        (Mutation::Remove, None) => {}
    }
}

/// Overwrite the item's entry with the store's copy.
///
/// The entry carrying the store's persisted id wins over anything `item`
/// resolves to by title.
pub(crate) fn reconcile(list: &mut WatchList, item: &ItemIdentity, authoritative: ListEntry) {
    let current = authoritative
        .item
        .key
        .persisted()
        .and_then(|id| {
            list.entries
                .iter()
                .position(|e| e.item.key.persisted() == Some(id))
        })
        .or_else(|| position(item, &list.entries))
        .or_else(|| position(&authoritative.item, &list.entries));
    match current {
        Some(i) => list.entries[i] = authoritative,
        None => list.entries.push(authoritative),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Vote;
    use crate::item::{CatalogProvider, CatalogRef, PersistedId};

    fn list_of(titles: &[&str]) -> WatchList {
        let id = ListId::new_v4();
        let mut list = WatchList::new(id, "Weekend");
        for t in titles {
            list.entries.push(ListEntry::new(
                id,
                ItemIdentity::persisted(PersistedId::new_v4(), Some(t)),
            ));
        }
        list
    }

    #[test]
    fn restore_after_removal_reinserts_in_place() {
        let mut list = list_of(&["Alien", "Aliens", "Alien 3"]);
        let before = list.clone();
        let item = list.entries[1].item.clone();

        let snap = OptimisticSnapshot::capture(&list, &item);
        speculate(&mut list, &item, Mutation::Remove);
        assert_eq!(list.len(), 2);

        snap.restore(&mut list, &item);
        assert_eq!(list, before);
    }

    #[test]
    fn restore_drops_provisional_entry() {
        let mut list = list_of(&["Alien"]);
        let before = list.clone();
        let item = ItemIdentity::catalog(
            CatalogRef::new(CatalogProvider::CatalogB, "tt0078748"),
            Some("Alien: Resurrection"),
        );

        let snap = OptimisticSnapshot::capture(&list, &item);
        assert_eq!(snap.entry, None);
        speculate(&mut list, &item, Mutation::Vote(Vote::Up));
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries[1].upvotes, 1);

        snap.restore(&mut list, &item);
        assert_eq!(list, before);
    }

    #[test]
    fn reconcile_replaces_provisional_with_persisted_entry() {
        let mut list = list_of(&[]);
        let r = CatalogRef::new(CatalogProvider::CatalogA, "348");
        let item = ItemIdentity::catalog(r.clone(), Some("Alien"));
        speculate(&mut list, &item, Mutation::Add);

        let persisted = PersistedId::new_v4();
        let authoritative = ListEntry {
            upvotes: 4,
            ..ListEntry::new(list.id, item.with_persisted(persisted))
        };
        reconcile(&mut list, &item, authoritative.clone());
        assert_eq!(list.entries, vec![authoritative]);
    }

    #[test]
    fn reconcile_prefers_entry_with_the_stored_id() {
        let mut list = list_of(&["Dune"]);
        let r = CatalogRef::new(CatalogProvider::CatalogA, "438631");
        let stored = PersistedId::new_v4();
        let target = ItemIdentity::catalog(r, Some("Dune")).with_persisted(stored);
        list.entries.push(ListEntry::new(list.id, target.clone()));
        let untouched = list.entries[0].clone();

        // By title alone the caller resolves to the first "Dune".
        let caller = ItemIdentity::catalog(
            CatalogRef::new(CatalogProvider::CatalogB, "tt0087182"),
            Some("Dune"),
        );
        let authoritative = ListEntry {
            upvotes: 1,
            user_vote: Some(Vote::Up),
            ..ListEntry::new(list.id, target)
        };
        reconcile(&mut list, &caller, authoritative.clone());

        assert_eq!(list.entries, vec![untouched, authoritative]);
    }
}
