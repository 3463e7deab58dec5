//! Ownership guard shared by every resource service.
//!
//! A resource belongs to exactly one user. Before any single-resource read, update
//! or delete the service loads the record and hands it to [`guard`], which turns a
//! missing record into `NotFound` and a foreign one into `Unauthorized`. Listing
//! never goes through the guard; it filters by owner in the store query instead.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A record owned by a single user
pub trait OwnedRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Human-readable resource name used in messages and logs
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;

    /// Record a modification time
    fn touch(&mut self, now: DateTime<Utc>);
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("requester does not own this resource")]
pub struct UnauthorizedAccess;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("{kind} not found with id: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("You are not authorized to access {kind} {id}")]
    Unauthorized { kind: &'static str, id: Uuid },
}

pub fn authorize(owner_id: Uuid, requester_id: Uuid) -> Result<(), UnauthorizedAccess> {
    if owner_id == requester_id {
        Ok(())
    } else {
        Err(UnauthorizedAccess)
    }
}

/// Resolve a lookup result for `requester`, enforcing ownership
pub fn guard<R: OwnedRecord>(found: Option<R>, id: Uuid, requester_id: Uuid) -> Result<R, AccessError> {
    let record = found.ok_or_else(|| {
        tracing::warn!("{} {} not found (requested by {})", R::KIND, id, requester_id);
        AccessError::NotFound { kind: R::KIND, id }
    })?;

    authorize(record.owner_id(), requester_id).map_err(|_| {
        tracing::warn!(
            "Unauthorized access to {} {}: owner {}, requester {}",
            R::KIND,
            id,
            record.owner_id(),
            requester_id
        );
        AccessError::Unauthorized { kind: R::KIND, id }
    })?;

    Ok(record)
}
