use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::entry::{ListEntry, Vote, WatchList};
pub use crate::error::StoreError;
use crate::item::{CatalogRef, ListId, PersistedId, PersistedItem};

/// The remote store that owns the authoritative record.
///
/// Every method may suspend on the network. Implementations decide the
/// transport; the coordinator only relies on the error variants documented
/// on each method.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Find the item backed by `catalog_ref`, creating it on first use.
    ///
    /// Must return the same id for the same reference across repeated and
    /// concurrent calls.
    async fn find_or_create_item(
        &self,
        catalog_ref: &CatalogRef,
        title: Option<&str>,
    ) -> Result<PersistedItem, StoreError>;

    /// Apply the current user's vote and return the authoritative entry.
    ///
    /// Fails with [`StoreError::NotAMember`] when the item is not in the list.
    async fn apply_vote(
        &self,
        list_id: ListId,
        item_id: PersistedId,
        action: Vote,
    ) -> Result<ListEntry, StoreError>;

    /// Add an item to a list.
    ///
    /// Fails with [`StoreError::AlreadyAMember`] when it is already there.
    async fn add_item(&self, list_id: ListId, item_id: PersistedId)
        -> Result<ListEntry, StoreError>;

    /// Remove an item from a list.
    ///
    /// Fails with [`StoreError::NotAMember`] when it is not there.
    async fn remove_item(&self, list_id: ListId, item_id: PersistedId) -> Result<(), StoreError>;

    /// Load the authoritative state of a whole list.
    async fn fetch_list(&self, list_id: ListId) -> Result<WatchList, StoreError>;
}

/// Run a remote call under an optional deadline. `None` means it timed out.
pub(crate) async fn bounded<F: Future>(limit: Option<Duration>, call: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.ok(),
        None => Some(call.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::ListNotFound(ListId(uuid::Uuid::nil()));
        assert!(err.to_string().contains("not found"));

        let err = StoreError::Transport("connection reset".into());
        assert!(err.to_string().contains("connection reset"));
    }
}
