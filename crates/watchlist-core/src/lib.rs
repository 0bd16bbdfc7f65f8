//! Watchlist Core - optimistic synchronization for shared lists
//!
//! Lets a user vote on, add, or remove an item from a shared list and see
//! the result immediately, while the authoritative record lives in a remote
//! [`WatchlistStore`].
//!
//! # Pieces
//!
//! - [`identity`]: decides whether two references denote the same item
//!   across the catalog, persisted and title namespaces
//! - [`materializer`]: turns catalog references into persisted ids
//! - [`vote`]: the pure vote state machine
//! - [`membership`]: list membership under identity resolution
//! - [`coordinator`]: snapshot, speculative apply, remote call, reconcile or
//!   roll back, one mutation per item at a time
//!
//! Presentation code reads lists through [`ListView`] and writes only through
//! [`MutationCoordinator::mutate`].

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod event;
pub mod identity;
pub mod item;
pub mod materializer;
pub mod membership;
pub mod store;
pub mod vote;

pub use cache::{ListCache, ListView};
pub use config::{ResyncConfig, SyncConfig};
pub use coordinator::{
    MutationCoordinator, MutationHandle, OptimisticSnapshot, Submission, VotingSession,
};
pub use entry::{ListEntry, Vote, WatchList};
pub use error::{
    ConfigError, IdentityError, MaterializationError, MutationError, Result, StoreError,
    WatchlistError,
};
pub use event::{Mutation, MutationOutcome, MutationReport, SyncEvent};
pub use identity::{canonicalize, resolve, MatchReason, Resolution};
pub use item::{CatalogProvider, CatalogRef, ItemIdentity, ItemKey, ListId, PersistedId, PersistedItem};
pub use materializer::CatalogMaterializer;
pub use membership::is_member;
pub use store::WatchlistStore;
pub use vote::{apply_vote, transition, VoteTransition};
