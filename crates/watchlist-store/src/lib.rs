//! SQLite-backed [`WatchlistStore`](watchlist_core::WatchlistStore).
//!
//! The database is the authority for membership and vote counts. Several
//! users can share one connection through [`SqliteWatchlistStore::as_user`],
//! each seeing their own `user_vote` on every entry.

pub mod event;
pub mod sqlite_store;

pub use event::StoreEvent;
pub use sqlite_store::{ListSummary, SqliteWatchlistStore};
