//! Per-item voting sessions
//!
//! A session exists from the moment a mutation is accepted until it settles.
//! While one exists for an item, further mutations on anything that resolves
//! to the same item are turned away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::resolve;
use crate::item::ItemIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSession {
    pub id: u64,
    pub item: ItemIdentity,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct SessionTable {
    sessions: Mutex<Vec<VotingSession>>,
    next_id: AtomicU64,
}

impl SessionTable {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a session for `item` unless one already covers it.
    pub(crate) fn try_begin(self: &Arc<Self>, item: &ItemIdentity) -> Option<SessionGuard> {
        let mut sessions = self.lock();
        if sessions.iter().any(|s| resolve(&s.item, item).is_match()) {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        sessions.push(VotingSession {
            id,
            item: item.clone(),
            started_at: Utc::now(),
        });
        Some(SessionGuard {
            table: Arc::clone(self),
            id,
        })
    }

    pub(crate) fn is_in_flight(&self, item: &ItemIdentity) -> bool {
        self.lock().iter().any(|s| resolve(&s.item, item).is_match())
    }

    pub(crate) fn active(&self) -> Vec<VotingSession> {
        self.lock().clone()
    }

    fn end(&self, id: u64) {
        self.lock().retain(|s| s.id != id);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<VotingSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ends its session when dropped, whether the mutation returned, failed,
/// panicked or was cancelled.
pub(crate) struct SessionGuard {
    table: Arc<SessionTable>,
    id: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.table.end(self.id);
    }
}
