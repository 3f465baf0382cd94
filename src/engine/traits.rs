//! CredentialRepository trait definition
//!
//! This is the core abstraction that every storage backend implements.
//! Callers (the command layer, the import/export pipeline) only ever talk to
//! a backend through this trait.

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::engine::types::{
    BackendKind, CredentialId, CredentialPatch, CredentialRecord, NewCredential,
};

/// Core trait that all storage backends must implement
///
/// An instance owns a single physical connection and runs one operation at
/// a time against it. Callers must await each operation before issuing the
/// next; there is no internal queueing.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Returns the backend this repository is bound to
    fn backend_kind(&self) -> BackendKind;

    /// Returns the locator this repository was created with
    fn connection_string(&self) -> &str;

    /// Ensures the schema exists
    ///
    /// Idempotent and safe to call on every startup.
    async fn create_database(&self) -> EngineResult<()>;

    /// Returns every record in ascending id order
    async fn get_all(&self) -> EngineResult<Vec<CredentialRecord>>;

    /// Returns the record with the given id, or `None` if there is none
    async fn get_by_id(&self, id: CredentialId) -> EngineResult<Option<CredentialRecord>>;

    /// Inserts a record and returns the id the backend assigned to it
    ///
    /// Fails with `Persistence` when a required field is missing.
    async fn insert(&self, credential: &NewCredential) -> EngineResult<CredentialId>;

    /// Writes the fields present in `patch` and advances `modified_at`
    ///
    /// Fails with `NotFound` when no record has the given id.
    async fn update(&self, id: CredentialId, patch: &CredentialPatch) -> EngineResult<()>;

    /// Deletes a record. Deleting an absent id is not an error.
    async fn delete(&self, id: CredentialId) -> EngineResult<()>;

    /// Releases the underlying connection
    ///
    /// Closing twice is a no-op. Any later operation fails with `Closed`.
    async fn close(&self) -> EngineResult<()>;

    /// Whether `close` has been called on this instance
    async fn is_closed(&self) -> bool;
}
