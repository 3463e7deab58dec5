use async_trait::async_trait;
use uuid::Uuid;

use crate::database::models::user::User;
use crate::database::store::StoreError;

/// Account persistence. Username and email are unique; violations surface as
/// [`StoreError::Duplicate`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Case-insensitive
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn update(&self, user: User) -> Result<User, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
