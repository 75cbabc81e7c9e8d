//! In-memory registry for tests and resolver-only deployments.

use std::{collections::HashMap, sync::Mutex};

use {
    async_trait::async_trait,
    carlink_common::{ParticipantId, Tag},
};

use crate::{
    Error, Result,
    record::{RecordPatch, RegistryRecord},
    store::RegistryStore,
};

/// In-memory store backed by `HashMap`. No persistence.
#[derive(Default)]
pub struct InMemoryRegistryStore {
    records: Mutex<HashMap<Tag, RegistryRecord>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, for assertions.
    pub fn records(&self) -> Vec<RegistryRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.values().cloned().collect()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn get(&self, tag: &Tag) -> Result<Option<RegistryRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(tag).cloned())
    }

    async fn find_by_identity(&self, identity: ParticipantId) -> Result<Option<RegistryRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .find(|r| r.identity == Some(identity))
            .cloned())
    }

    async fn insert(&self, record: &RegistryRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.tag) {
            return Err(Error::duplicate_tag(&record.tag));
        }
        if let Some(identity) = record.identity
            && records.values().any(|r| r.identity == Some(identity))
        {
            return Err(Error::identity_taken(identity));
        }
        records.insert(record.tag.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, tag: &Tag, patch: &RecordPatch) -> Result<RegistryRecord> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(identity) = patch.identity
            && records
                .values()
                .any(|r| r.identity == Some(identity) && &r.tag != tag)
        {
            return Err(Error::identity_taken(identity));
        }
        let record = records.get_mut(tag).ok_or_else(|| Error::not_found(tag))?;
        patch.apply(record);
        Ok(record.clone())
    }
}
