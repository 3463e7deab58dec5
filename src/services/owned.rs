//! Resource access facade.
//!
//! One generic service per owned record type. The owner of a new record is always
//! the requester passed in by the caller; payload types have no owner field, so
//! whatever a client puts in the body cannot change it. Every single-record
//! operation loads the record and runs it through [`guard`] first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::store::{OwnedStore, StoreError};
use crate::ownership::{guard, AccessError, OwnedRecord};
use crate::services::ServiceError;

/// Client input for creating an `R`
pub trait CreatePayload<R>: Send {
    fn validate(&self) -> Result<(), ServiceError>;

    fn into_record(self, id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> R;
}

/// Client input for partially updating an `R`; absent fields are left alone
pub trait PatchPayload<R>: Send {
    fn validate(&self) -> Result<(), ServiceError>;

    fn apply_to(self, record: &mut R);
}

pub struct OwnedResourceService<R> {
    store: Arc<dyn OwnedStore<R>>,
}

impl<R> Clone for OwnedResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<R: OwnedRecord> OwnedResourceService<R> {
    pub fn new(store: Arc<dyn OwnedStore<R>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn OwnedStore<R>> {
        &self.store
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    pub async fn create<P: CreatePayload<R>>(&self, owner_id: Uuid, payload: P) -> Result<R, ServiceError> {
        tracing::debug!("Creating {} for {}", R::KIND, owner_id);
        payload.validate()?;

        let record = payload.into_record(Uuid::new_v4(), owner_id, Utc::now());
        let saved = self.store.insert(record).await?;

        tracing::info!("Created {} {} for {}", R::KIND, saved.id(), owner_id);
        Ok(saved)
    }

    pub async fn get_one(&self, id: Uuid, owner_id: Uuid) -> Result<R, ServiceError> {
        tracing::debug!("Fetching {} {} for {}", R::KIND, id, owner_id);
        let found = self.store.find(id).await?;
        Ok(guard(found, id, owner_id)?)
    }

    pub async fn list_all_for_owner(&self, owner_id: Uuid) -> Result<Vec<R>, ServiceError> {
        tracing::debug!("Listing {} records for {}", R::KIND, owner_id);
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    pub async fn update<P: PatchPayload<R>>(&self, id: Uuid, owner_id: Uuid, patch: P) -> Result<R, ServiceError> {
        tracing::debug!("Updating {} {} for {}", R::KIND, id, owner_id);
        let mut record = self.get_one(id, owner_id).await?;

        patch.validate()?;
        patch.apply_to(&mut record);

        let saved = self.save(owner_id, record).await?;
        tracing::info!("Updated {} {}", R::KIND, id);
        Ok(saved)
    }

    /// Persist a record the caller already loaded through [`Self::get_one`]
    pub async fn save(&self, owner_id: Uuid, mut record: R) -> Result<R, ServiceError> {
        if record.owner_id() != owner_id {
            tracing::error!("Refusing to save {} {} under a different owner", R::KIND, record.id());
            return Err(AccessError::Unauthorized { kind: R::KIND, id: record.id() }.into());
        }

        record.touch(Utc::now());
        Ok(self.store.update(record).await?)
    }

    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), ServiceError> {
        tracing::debug!("Deleting {} {} for {}", R::KIND, id, owner_id);
        self.get_one(id, owner_id).await?;

        if !self.store.delete(id).await? {
            return Err(AccessError::NotFound { kind: R::KIND, id }.into());
        }

        tracing::info!("Deleted {} {}", R::KIND, id);
        Ok(())
    }

    pub async fn delete_all_for_owner(&self, owner_id: Uuid) -> Result<u64, ServiceError> {
        let count = self.store.delete_by_owner(owner_id).await?;
        tracing::info!("Deleted {} {} records for {}", count, R::KIND, owner_id);
        Ok(count)
    }
}
