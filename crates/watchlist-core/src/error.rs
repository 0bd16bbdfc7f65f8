//! Error types for watchlist-core

use thiserror::Error;

use crate::item::{CatalogProvider, CatalogRef, ListId, PersistedId};

/// Result type alias for watchlist operations
pub type Result<T> = std::result::Result<T, WatchlistError>;

/// Main error type for watchlist operations
#[derive(Error, Debug)]
pub enum WatchlistError {
    /// Identifier could not be canonicalized
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Store collaborator failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog reference could not be materialized
    #[error("Materialization error: {0}")]
    Materialization(#[from] MaterializationError),

    /// A mutation ended in rollback
    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Identifier parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Neither a catalog reference nor a persisted id
    #[error("Unrecognized item id: {0:?}")]
    Unrecognized(String),

    /// Prefix names no known catalog provider
    #[error("Unknown catalog provider: {0}")]
    UnknownProvider(String),

    /// Prefix present but no external id after it
    #[error("Empty external id for provider {0}")]
    EmptyExternalId(CatalogProvider),
}

/// Errors reported by the store collaborator.
///
/// `NotAMember` and `AlreadyAMember` must stay distinguishable from generic
/// failures: the coordinator recovers from both.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Item is not a member of the list")]
    NotAMember,

    #[error("Item is already a member of the list")]
    AlreadyAMember,

    #[error("List not found: {0}")]
    ListNotFound(ListId),

    #[error("Item not found: {0}")]
    ItemNotFound(PersistedId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failure to turn a catalog reference into a persisted id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterializationError {
    #[error("Failed to materialize {catalog_ref}: {source}")]
    Store {
        catalog_ref: CatalogRef,
        #[source]
        source: StoreError,
    },

    #[error("Timed out materializing {0}")]
    Timeout(CatalogRef),
}

/// Terminal failure of a single mutation. The list is rolled back whenever
/// one of these is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error(transparent)]
    Materialization(#[from] MaterializationError),

    /// Vote attempted on an absent entry and the add fallback did not help
    #[error("Item is not a member of the list")]
    NotAMember,

    #[error("Item is already a member of the list")]
    AlreadyAMember,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Remote error: {0}")]
    Remote(StoreError),

    #[error("Remote call timed out")]
    Timeout,

    /// The mutation task ended without settling, e.g. it panicked
    #[error("Mutation aborted: {0}")]
    Aborted(String),
}

impl From<StoreError> for MutationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotAMember => MutationError::NotAMember,
            StoreError::AlreadyAMember => MutationError::AlreadyAMember,
            StoreError::Conflict(msg) => MutationError::Conflict(msg),
            other => MutationError::Remote(other),
        }
    }
}

/// Configuration validation error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
