//! Persistence trait for plate records.

use {
    async_trait::async_trait,
    carlink_common::{ParticipantId, Tag},
};

use crate::{
    Result,
    record::{RecordPatch, RegistryRecord},
};

/// Persistence backend for the plate registry.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(&self, tag: &Tag) -> Result<Option<RegistryRecord>>;

    /// The record owned by `identity`, if they registered a plate.
    async fn find_by_identity(&self, identity: ParticipantId) -> Result<Option<RegistryRecord>>;

    /// Insert a new record. Fails with `DuplicateTag` if the plate exists and
    /// `IdentityTaken` if the identity already owns another plate.
    async fn insert(&self, record: &RegistryRecord) -> Result<()>;

    /// Apply `patch` to the record for `tag` and return the updated record.
    async fn update(&self, tag: &Tag, patch: &RecordPatch) -> Result<RegistryRecord>;
}
