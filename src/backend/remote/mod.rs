// src/backend/remote/mod.rs
//! Boundary to the remote document store. Everything past this trait is
//! untrusted: records are decoded into typed models by the caller and any
//! call may fail transiently.

pub mod document;
pub mod error;
pub mod query;
pub mod subscription;
pub mod write;

pub use document::{Document, DocumentPath, Fields, SchemaError, StoreTimestamp, Value};
pub use error::{StoreError, StoreErrorKind};
pub use query::{CompositeIndex, Direction, Filter, FilterOp, IndexState, OrderBy, Query};
pub use subscription::{SnapshotListener, Subscription};
pub use write::{FieldUpdate, Precondition, UpdateOp, Write, WriteBatch};

/// Collection names and nested collection paths.
pub mod collections {
    pub const MEMORIES: &str = "memories";
    pub const INVITATIONS: &str = "invitations";
    pub const ACTIVITIES: &str = "activities";
    pub const SETTINGS: &str = "settings";
    pub const VAULTS: &str = "vaults";

    pub fn comments(memory_id: &str) -> String {
        format!("{}/{}/comments", MEMORIES, memory_id)
    }

    pub fn members(vault_id: &str) -> String {
        format!("{}/{}/members", VAULTS, vault_id)
    }
}

/// Operations offered by the document store.
///
/// Reads and writes are asynchronous and may fail with a transient
/// [`StoreErrorKind::Unavailable`]; callers go through the retry policy.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Creates a document under a generated id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<DocumentPath, StoreError>;

    /// Replaces the document, or with `merge` overlays the given top-level
    /// fields onto whatever is there.
    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool)
        -> Result<(), StoreError>;

    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, path: &DocumentPath, updates: Vec<FieldUpdate>)
        -> Result<(), StoreError>;

    async fn delete(&self, path: &DocumentPath) -> Result<(), StoreError>;

    /// Ordered queries that need a composite index fail with
    /// `FailedPrecondition` while that index is missing or still building.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Applies every write or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Registers a live query. The listener receives the initial snapshot
    /// before this returns.
    fn subscribe(&self, query: Query, listener: SnapshotListener)
        -> Result<Subscription, StoreError>;

    /// Advisory connectivity signal. Never used to skip an attempt.
    fn is_connected(&self) -> bool;
}
