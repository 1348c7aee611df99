//! Config store error types.

use thiserror::Error;

/// Errors surfaced by the Config Store.
///
/// Kept as a closed enum (rather than wrapping `surrealdb::Error` directly
/// at every call site) so upper layers can pattern-match a kind without
/// depending on the storage engine's own error type (§11).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The embedded engine could not be opened or connected to.
    #[error("failed to connect to config store: {0}")]
    Connection(String),

    /// A query against the store failed.
    #[error("config store query failed: {0}")]
    Query(String),

    /// A row existed but failed to decode into its entity type.
    #[error("config store row was malformed: {0}")]
    Decode(String),

    /// A lookup by id found no matching row.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"peer"`.
        entity: &'static str,
        /// The id that was not found.
        id: i64,
    },

    /// A unique-name constraint (peer name, username) was violated.
    #[error("{entity} with name {name:?} already exists")]
    DuplicateName {
        /// Entity kind, e.g. `"peer"`.
        entity: &'static str,
        /// The conflicting name.
        name: String,
    },
}

/// Result type for config store operations.
pub type StorageResult<T> = Result<T, StorageError>;
