//! List membership under identity resolution
//!
//! Membership is decided with [`resolve`] rather than key equality: a list
//! may store the persisted id while the caller still holds the catalog
//! reference, or the other way round.

use crate::entry::{ListEntry, WatchList};
use crate::identity::resolve;
use crate::item::{ItemIdentity, PersistedId};

pub fn is_member(item: &ItemIdentity, list: &WatchList) -> bool {
    position(item, &list.entries).is_some()
}

/// Index of the first entry that resolves to `item`.
pub fn position(item: &ItemIdentity, entries: &[ListEntry]) -> Option<usize> {
    entries
        .iter()
        .position(|entry| resolve(item, &entry.item).is_match())
}

pub fn find_entry<'a>(item: &ItemIdentity, list: &'a WatchList) -> Option<&'a ListEntry> {
    position(item, &list.entries).map(|i| &list.entries[i])
}

/// Persisted id for `item`, either from its own key or from the list entry
/// it resolves to.
pub fn membership_key(item: &ItemIdentity, list: &WatchList) -> Option<PersistedId> {
    item.key
        .persisted()
        .or_else(|| find_entry(item, list).and_then(|entry| entry.item.key.persisted()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{CatalogProvider, CatalogRef, ItemKey, ListId};

    fn list_with(items: Vec<ItemIdentity>) -> WatchList {
        let id = ListId::new_v4();
        let mut list = WatchList::new(id, "Group queue");
        list.entries = items.into_iter().map(|i| ListEntry::new(id, i)).collect();
        list
    }

    #[test]
    fn catalog_ref_finds_persisted_entry() {
        let persisted = PersistedId::new_v4();
        let r = CatalogRef::new(CatalogProvider::CatalogB, "tt0080684");
        let list = list_with(vec![ItemIdentity {
            key: ItemKey::Persisted(persisted),
            external_ref: Some(r.clone()),
            title: Some("The Empire Strikes Back".into()),
        }]);

        let from_search = ItemIdentity::catalog(r, None);
        assert!(is_member(&from_search, &list));
        assert_eq!(membership_key(&from_search, &list), Some(persisted));
    }

    #[test]
    fn title_only_match_counts_as_member() {
        let list = list_with(vec![ItemIdentity::persisted(
            PersistedId::new_v4(),
            Some("Paris, Texas"),
        )]);
        let candidate = ItemIdentity::catalog(
            CatalogRef::new(CatalogProvider::CatalogA, "655"),
            Some("PARIS, TEXAS"),
        );
        assert!(is_member(&candidate, &list));
    }

    #[test]
    fn unknown_item_is_not_member() {
        let list = list_with(vec![ItemIdentity::persisted(
            PersistedId::new_v4(),
            Some("Tampopo"),
        )]);
        let candidate = ItemIdentity::catalog(
            CatalogRef::new(CatalogProvider::CatalogA, "11830"),
            Some("Tokyo Story"),
        );
        assert!(!is_member(&candidate, &list));
        assert_eq!(find_entry(&candidate, &list), None);
        assert_eq!(membership_key(&candidate, &list), None);
    }

    #[test]
    fn position_returns_first_match() {
        let id = PersistedId::new_v4();
        let list = list_with(vec![
            ItemIdentity::persisted(PersistedId::new_v4(), Some("Other")),
            ItemIdentity::persisted(id, Some("Target")),
        ]);
        assert_eq!(
            position(&ItemIdentity::persisted(id, None), &list.entries),
            Some(1)
        );
    }
}
