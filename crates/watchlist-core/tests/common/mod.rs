//! Scripted in-memory store for coordinator tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use watchlist_core::{
    apply_vote, CatalogProvider, CatalogRef, ItemIdentity, ListEntry, ListId, PersistedId,
    PersistedItem, StoreError, Vote, WatchList, WatchlistStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindOrCreate,
    ApplyVote,
    AddItem,
    RemoveItem,
    FetchList,
}

#[derive(Default)]
pub struct FakeStore {
    lists: Mutex<HashMap<ListId, WatchList>>,
    items: Mutex<HashMap<CatalogRef, PersistedItem>>,
    calls: Mutex<Vec<Op>>,
    failures: Mutex<HashMap<Op, VecDeque<StoreError>>>,
    gates: Mutex<HashMap<Op, Arc<Semaphore>>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_list(&self, name: &str) -> ListId {
        let id = ListId::new_v4();
        self.lists.lock().unwrap().insert(id, WatchList::new(id, name));
        id
    }

    /// Register a catalog title as already materialized and return it.
    pub fn seed_item(&self, external_id: &str, title: &str) -> PersistedItem {
        let catalog_ref = CatalogRef::new(CatalogProvider::CatalogA, external_id);
        let item = PersistedItem {
            id: PersistedId::new_v4(),
            title: title.to_string(),
            external_ref: Some(catalog_ref.clone()),
        };
        self.items.lock().unwrap().insert(catalog_ref, item.clone());
        item
    }

    /// Put an entry straight into the server's copy of a list.
    pub fn seed_entry(
        &self,
        list_id: ListId,
        item: &PersistedItem,
        upvotes: u32,
        downvotes: u32,
        user_vote: Option<Vote>,
    ) -> ListEntry {
        let entry = ListEntry {
            upvotes,
            downvotes,
            user_vote,
            ..ListEntry::new(list_id, item.identity())
        };
        self.lists
            .lock()
            .unwrap()
            .get_mut(&list_id)
            .unwrap()
            .entries
            .push(entry.clone());
        entry
    }

    /// Simulate other members voting on the server.
    pub fn others_vote(&self, list_id: ListId, item_id: PersistedId, up: u32, down: u32) {
        let mut lists = self.lists.lock().unwrap();
        let entry = lists
            .get_mut(&list_id)
            .unwrap()
            .entries
            .iter_mut()
            .find(|e| e.item.key.persisted() == Some(item_id))
            .unwrap();
        entry.upvotes += up;
        entry.downvotes += down;
    }

    pub fn server_list(&self, list_id: ListId) -> WatchList {
        self.lists.lock().unwrap()[&list_id].clone()
    }

    pub fn fail_next(&self, op: Op, err: StoreError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Hold every `op` call until [`FakeStore::release`] is called.
    pub fn hold(&self, op: Op) {
        self.gates
            .lock()
            .unwrap()
            .insert(op, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: Op) {
        if let Some(gate) = self.gates.lock().unwrap().get(&op) {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    async fn enter(&self, op: Op) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(op);
        let gate = self.gates.lock().unwrap().get(&op).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| StoreError::Transport(e.to_string()))?
                .forget();
        }
        // Let other tasks interleave the way a real network hop would.
        tokio::task::yield_now().await;
        match self.failures.lock().unwrap().get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_list<T>(
        &self,
        list_id: ListId,
        f: impl FnOnce(&mut WatchList) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut lists = self.lists.lock().unwrap();
        let list = lists
            .get_mut(&list_id)
            .ok_or(StoreError::ListNotFound(list_id))?;
        f(list)
    }

    fn item_by_id(&self, item_id: PersistedId) -> Result<PersistedItem, StoreError> {
        self.items
            .lock()
            .unwrap()
            .values()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(item_id))
    }
}

fn entry_index(list: &WatchList, item_id: PersistedId) -> Option<usize> {
    list.entries
        .iter()
        .position(|e| e.item.key.persisted() == Some(item_id))
}

#[async_trait]
impl WatchlistStore for FakeStore {
    async fn find_or_create_item(
        &self,
        catalog_ref: &CatalogRef,
        title: Option<&str>,
    ) -> Result<PersistedItem, StoreError> {
        self.enter(Op::FindOrCreate).await?;
        let mut items = self.items.lock().unwrap();
        let item = items
            .entry(catalog_ref.clone())
            .or_insert_with(|| PersistedItem {
                id: PersistedId::new_v4(),
                title: title.unwrap_or_default().to_string(),
                external_ref: Some(catalog_ref.clone()),
            });
        Ok(item.clone())
    }

    async fn apply_vote(
        &self,
        list_id: ListId,
        item_id: PersistedId,
        action: Vote,
    ) -> Result<ListEntry, StoreError> {
        self.enter(Op::ApplyVote).await?;
        self.with_list(list_id, |list| {
            let i = entry_index(list, item_id).ok_or(StoreError::NotAMember)?;
            list.entries[i] = apply_vote(&list.entries[i], action);
            Ok(list.entries[i].clone())
        })
    }

    async fn add_item(&self, list_id: ListId, item_id: PersistedId) -> Result<ListEntry, StoreError> {
        self.enter(Op::AddItem).await?;
        let item = self.item_by_id(item_id)?;
        self.with_list(list_id, |list| {
            if entry_index(list, item_id).is_some() {
                return Err(StoreError::AlreadyAMember);
            }
            let entry = ListEntry::new(list_id, item.identity());
            list.entries.push(entry.clone());
            Ok(entry)
        })
    }

    async fn remove_item(&self, list_id: ListId, item_id: PersistedId) -> Result<(), StoreError> {
        self.enter(Op::RemoveItem).await?;
        self.with_list(list_id, |list| {
            let i = entry_index(list, item_id).ok_or(StoreError::NotAMember)?;
            list.entries.remove(i);
            Ok(())
        })
    }

    async fn fetch_list(&self, list_id: ListId) -> Result<WatchList, StoreError> {
        self.enter(Op::FetchList).await?;
        self.with_list(list_id, |list| Ok(list.clone()))
    }
}

/// Identity of a search result that has not been materialized yet.
pub fn search_result(external_id: &str, title: &str) -> ItemIdentity {
    ItemIdentity::catalog(
        CatalogRef::new(CatalogProvider::CatalogA, external_id),
        Some(title),
    )
}

/// `(upvotes, downvotes, user_vote)` of the entry resolving to `item`.
pub fn counts(list: &WatchList, item: &ItemIdentity) -> Option<(u32, u32, Option<Vote>)> {
    watchlist_core::membership::find_entry(item, list).map(|e| (e.upvotes, e.downvotes, e.user_vote))
}
