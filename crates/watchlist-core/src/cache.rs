//! Client-side list cache
//!
//! One watch channel per list. Presentation code reads through [`ListView`];
//! only the coordinator writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::entry::WatchList;
use crate::item::{ItemIdentity, ListId};
use crate::membership;

type Channels = HashMap<ListId, watch::Sender<Option<WatchList>>>;

#[derive(Default)]
pub struct ListCache {
    lists: Mutex<Channels>,
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a list. Yields `None` until the list has been loaded.
    pub fn subscribe(&self, list_id: ListId) -> watch::Receiver<Option<WatchList>> {
        self.channels()
            .entry(list_id)
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    pub fn snapshot(&self, list_id: ListId) -> Option<WatchList> {
        self.channels()
            .get(&list_id)
            .and_then(|tx| tx.borrow().clone())
    }

    pub fn cached_lists(&self) -> Vec<ListId> {
        let mut ids: Vec<ListId> = self
            .channels()
            .iter()
            .filter(|(_, tx)| tx.borrow().is_some())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Publish an authoritative copy of a list.
    pub(crate) fn replace(&self, list: WatchList) {
        let mut channels = self.channels();
        let tx = channels
            .entry(list.id)
            .or_insert_with(|| watch::channel(None).0);
        tx.send_replace(Some(list));
    }

    /// Edit a cached list in place and notify watchers. Returns `None`
    /// without calling `edit` when the list is not cached.
    pub(crate) fn update<R>(&self, list_id: ListId, edit: impl FnOnce(&mut WatchList) -> R) -> Option<R> {
        let channels = self.channels();
        let tx = channels.get(&list_id)?;
        let mut out = None;
        tx.send_if_modified(|slot| match slot.as_mut() {
            Some(list) => {
                out = Some(edit(list));
                true
            }
            None => false,
        });
        out
    }

    pub(crate) fn evict(&self, list_id: ListId) {
        if let Some(tx) = self.channels().get(&list_id) {
            tx.send_replace(None);
        }
    }

    fn channels(&self) -> MutexGuard<'_, Channels> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only handle on the cache for rendering.
#[derive(Clone)]
pub struct ListView {
    cache: Arc<ListCache>,
}

impl ListView {
    pub(crate) fn new(cache: Arc<ListCache>) -> Self {
        Self { cache }
    }

    pub fn subscribe(&self, list_id: ListId) -> watch::Receiver<Option<WatchList>> {
        self.cache.subscribe(list_id)
    }

    pub fn snapshot(&self, list_id: ListId) -> Option<WatchList> {
        self.cache.snapshot(list_id)
    }

    /// Whether `item` is in the cached copy of the list.
    pub fn is_member(&self, list_id: ListId, item: &ItemIdentity) -> bool {
        self.snapshot(list_id)
            .is_some_and(|list| membership::is_member(item, &list))
    }
}
