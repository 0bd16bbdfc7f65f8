//! Optimistic mutation coordinator
//!
//! Per item: `Idle → Pending → {Settled-Success, Settled-Failure}`.
//!
//! [`MutationCoordinator::mutate`] snapshots the entry, publishes the local
//! guess, and hands the remote half to a spawned task. That task
//! materializes the item if needed, calls the store, then either overwrites
//! the guess with the store's entry or restores the snapshot. The item's
//! session ends whatever happens, and successful mutations schedule a
//! delayed refetch of the list.

mod session;
mod snapshot;

pub use session::VotingSession;
pub use snapshot::OptimisticSnapshot;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::{ListCache, ListView};
use crate::config::SyncConfig;
use crate::entry::{ListEntry, WatchList};
use crate::error::{MutationError, StoreError};
use crate::event::{Mutation, MutationOutcome, MutationReport, SyncEvent};
use crate::item::{ItemIdentity, ListId, PersistedId};
use crate::materializer::CatalogMaterializer;
use crate::membership;
use crate::store::{bounded, WatchlistStore};
use session::{SessionGuard, SessionTable};
use snapshot::{reconcile, speculate};

/// Result of submitting a mutation.
#[must_use]
#[derive(Debug)]
pub enum Submission {
    Accepted(MutationHandle),
    /// Another mutation on the same item is still in flight
    Rejected,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }

    /// Wait for the mutation to settle. `None` if it was rejected.
    pub async fn outcome(self) -> Option<MutationOutcome> {
        match self {
            Submission::Accepted(handle) => Some(handle.outcome().await),
            Submission::Rejected => None,
        }
    }
}

/// Handle on an accepted mutation.
#[derive(Debug)]
pub struct MutationHandle {
    task: JoinHandle<MutationOutcome>,
}

impl MutationHandle {
    pub async fn outcome(self) -> MutationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => MutationOutcome::RolledBack(MutationError::Aborted(err.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum Settlement {
    Applied(ListEntry),
    Removed,
    AlreadyMember,
    AlreadyAbsent,
}

/// Owns the list cache and the session table. All writes to either go
/// through here.
#[derive(Clone)]
pub struct MutationCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn WatchlistStore>,
    materializer: CatalogMaterializer,
    cache: Arc<ListCache>,
    sessions: Arc<SessionTable>,
    events: broadcast::Sender<SyncEvent>,
    config: SyncConfig,
}

impl MutationCoordinator {
    pub fn new(store: Arc<dyn WatchlistStore>, config: SyncConfig) -> Self {
        Self::with_cache(store, Arc::new(ListCache::new()), config)
    }

    /// Build on an existing cache, e.g. one shared with other views.
    pub fn with_cache(store: Arc<dyn WatchlistStore>, cache: Arc<ListCache>, config: SyncConfig) -> Self {
        let materializer = CatalogMaterializer::new(Arc::clone(&store))
            .with_timeout(config.remote_timeout())
            .with_coalescing(config.coalesce_materialize);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                store,
                materializer,
                cache,
                sessions: SessionTable::new(),
                events,
                config,
            }),
        }
    }

    pub fn view(&self) -> ListView {
        ListView::new(Arc::clone(&self.inner.cache))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn materializer(&self) -> &CatalogMaterializer {
        &self.inner.materializer
    }

    /// Load the authoritative copy of a list into the cache.
    pub async fn refresh(&self, list_id: ListId) -> Result<WatchList, StoreError> {
        self.inner.refresh(list_id).await
    }

    /// Drop a list from the cache, e.g. after it was deleted.
    pub fn forget(&self, list_id: ListId) {
        self.inner.cache.evict(list_id);
    }

    pub fn is_member(&self, list_id: ListId, item: &ItemIdentity) -> bool {
        self.view().is_member(list_id, item)
    }

    pub fn in_flight(&self, item: &ItemIdentity) -> bool {
        self.inner.sessions.is_in_flight(item)
    }

    pub fn active_sessions(&self) -> Vec<VotingSession> {
        self.inner.sessions.active()
    }

    /// Submit a mutation on `item` in `list_id`.
    ///
    /// The local guess is visible in the cache before this returns. The
    /// remote half runs on a spawned task, so this must be called from
    /// within a Tokio runtime. A second call for an item whose previous
    /// mutation has not settled is rejected without side effects.
    pub fn mutate(&self, list_id: ListId, item: ItemIdentity, mutation: Mutation) -> Submission {
        let Some(guard) = self.inner.sessions.try_begin(&item) else {
            tracing::debug!(%list_id, %item, %mutation, "mutation rejected, item in flight");
            return Submission::Rejected;
        };

        let prepared = self
            .inner
            .cache
            .update(list_id, |list| {
                let snapshot = OptimisticSnapshot::capture(list, &item);
                let known_id = membership::membership_key(&item, list);
                speculate(list, &item, mutation);
                (Some(snapshot), known_id)
            })
            .unwrap_or((None, item.key.persisted()));

        tracing::debug!(%list_id, %item, %mutation, "mutation accepted");
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            inner
                .settle(guard, list_id, item, mutation, prepared.0, prepared.1)
                .await
        });
        Submission::Accepted(MutationHandle { task })
    }
}

impl Inner {
    async fn settle(
        self: Arc<Self>,
        guard: SessionGuard,
        list_id: ListId,
        item: ItemIdentity,
        mutation: Mutation,
        snapshot: Option<OptimisticSnapshot>,
        known_id: Option<PersistedId>,
    ) -> MutationOutcome {
        let cached = snapshot.is_some();
        let outcome = match self.execute(list_id, &item, mutation, known_id, cached).await {
            Ok(Settlement::Applied(entry)) => {
                self.cache
                    .update(list_id, |list| reconcile(list, &item, entry.clone()));
                MutationOutcome::Applied(Some(entry))
            }
            Ok(Settlement::Removed) => MutationOutcome::Applied(None),
            Ok(Settlement::AlreadyMember) => MutationOutcome::AlreadyMember,
            Ok(Settlement::AlreadyAbsent) => MutationOutcome::AlreadyAbsent,
            Err(err) => {
                tracing::warn!(%list_id, %item, %mutation, error = %err, "rolling back");
                if let Some(snapshot) = &snapshot {
                    self.cache
                        .update(list_id, |list| snapshot.restore(list, &item));
                }
                MutationOutcome::RolledBack(err)
            }
        };
        drop(guard);

        let _ = self.events.send(SyncEvent::Settled(MutationReport {
            list_id,
            item,
            mutation,
            outcome: outcome.clone(),
        }));

        if !outcome.is_rolled_back() && self.config.resync.enabled {
            self.schedule_resync(list_id);
        }
        outcome
    }

    async fn execute(
        &self,
        list_id: ListId,
        item: &ItemIdentity,
        mutation: Mutation,
        known_id: Option<PersistedId>,
        cached: bool,
    ) -> Result<Settlement, MutationError> {
        let item_id = match (known_id, mutation) {
            (Some(id), _) => id,
            // Nothing in the loaded list resolves to it.
            (None, Mutation::Remove) if cached => return Ok(Settlement::AlreadyAbsent),
            (None, _) => self.materializer.materialize(item).await?,
        };

        match mutation {
            Mutation::Vote(action) => {
                match self.remote(self.store.apply_vote(list_id, item_id, action)).await {
                    Err(MutationError::NotAMember) => {
                        tracing::debug!(%list_id, %item_id, "not yet a member, adding before vote");
                        match self.remote(self.store.add_item(list_id, item_id)).await {
                            Ok(_) | Err(MutationError::AlreadyAMember) => {}
                            Err(err) => return Err(err),
                        }
                        self.remote(self.store.apply_vote(list_id, item_id, action))
                            .await
                            .map(Settlement::Applied)
                    }
                    other => other.map(Settlement::Applied),
                }
            }
            Mutation::Add => match self.remote(self.store.add_item(list_id, item_id)).await {
                Ok(entry) => Ok(Settlement::Applied(entry)),
                Err(MutationError::AlreadyAMember) => Ok(Settlement::AlreadyMember),
                Err(err) => Err(err),
            },
            Mutation::Remove => match self.remote(self.store.remove_item(list_id, item_id)).await {
                Ok(()) => Ok(Settlement::Removed),
                Err(MutationError::NotAMember) => Ok(Settlement::AlreadyAbsent),
                Err(err) => Err(err),
            },
        }
    }

    async fn remote<T, F>(&self, call: F) -> Result<T, MutationError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match bounded(self.config.remote_timeout(), call).await {
            Some(result) => result.map_err(MutationError::from),
            None => Err(MutationError::Timeout),
        }
    }

    async fn refresh(&self, list_id: ListId) -> Result<WatchList, StoreError> {
        let list = bounded(self.config.remote_timeout(), self.store.fetch_list(list_id))
            .await
            .unwrap_or_else(|| Err(StoreError::Transport("fetch timed out".to_string())))?;
        tracing::info!(%list_id, entries = list.len(), "list loaded");
        self.cache.replace(list.clone());
        Ok(list)
    }

    /// Best-effort refetch to absorb drift such as other members' votes.
    fn schedule_resync(self: &Arc<Self>, list_id: ListId) {
        let inner = Arc::clone(self);
        let delay = self.config.resync_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(error) = inner.refresh(list_id).await {
                tracing::warn!(%list_id, %error, "background resync failed");
                let _ = inner.events.send(SyncEvent::ResyncFailed { list_id, error });
            }
        });
    }
}
