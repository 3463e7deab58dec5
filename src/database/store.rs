use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::ownership::OwnedRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("Unknown column: {0}")]
    InvalidColumn(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.message().to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Static description of a record's table
pub trait Table {
    const TABLE: &'static str;
    /// Columns rewritten by `update`
    const UPDATABLE: &'static [&'static str];
    /// Columns accepted by `list_matching`
    const FILTERABLE: &'static [&'static str];
}

/// Persistence for one kind of owned record.
///
/// Every query that returns more than one row is scoped to an owner; there is no
/// unscoped listing.
#[async_trait]
pub trait OwnedStore<R: OwnedRecord>: Send + Sync {
    async fn insert(&self, record: R) -> Result<R, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<R>, StoreError>;

    /// Newest first
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<R>, StoreError>;

    /// Owner's records whose `column` equals `value`, newest first
    async fn list_matching(&self, owner_id: Uuid, column: &str, value: Value) -> Result<Vec<R>, StoreError>;

    /// Last write wins
    async fn update(&self, record: R) -> Result<R, StoreError>;

    /// `false` when nothing was deleted
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
