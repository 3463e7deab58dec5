use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::user::User;
use crate::database::store::{OwnedStore, StoreError, Table};
use crate::database::users::UserStore;
use crate::ownership::OwnedRecord;

/// In-process store for development and tests
pub struct MemoryStore<R> {
    records: Arc<RwLock<HashMap<Uuid, R>>>,
}

impl<R: OwnedRecord + Table> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<R: OwnedRecord + Table> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<R: OwnedRecord>(mut records: Vec<R>) -> Vec<R> {
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    records
}

#[async_trait]
impl<R: OwnedRecord + Table> OwnedStore<R> for MemoryStore<R> {
    async fn insert(&self, record: R) -> Result<R, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id()) {
            return Err(StoreError::Duplicate(format!("{} {} already exists", R::KIND, record.id())));
        }
        records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<R>, StoreError> {
        let records = self.records.read().await;
        let owned = records
            .values()
            .filter(|r| r.owner_id() == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(owned))
    }

    async fn list_matching(&self, owner_id: Uuid, column: &str, value: Value) -> Result<Vec<R>, StoreError> {
        if !R::FILTERABLE.contains(&column) {
            return Err(StoreError::InvalidColumn(column.to_string()));
        }

        let records = self.records.read().await;
        let mut matched = Vec::new();
        for record in records.values().filter(|r| r.owner_id() == owner_id) {
            let row = serde_json::to_value(record)?;
            if row.get(column) == Some(&value) {
                matched.push(record.clone());
            }
        }
        Ok(newest_first(matched))
    }

    async fn update(&self, record: R) -> Result<R, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(StoreError::Query(format!("{} {} does not exist", R::KIND, record.id()))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.owner_id() != owner_id);
        Ok((before - records.len()) as u64)
    }
}

/// In-process user table with the same uniqueness rules as the database
#[derive(Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflicts(existing: &User, candidate: &User) -> Option<&'static str> {
    if existing.id == candidate.id {
        return None;
    }
    if existing.username == candidate.username {
        Some("username")
    } else if existing.email.eq_ignore_ascii_case(&candidate.email) {
        Some("email")
    } else {
        None
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if let Some(field) = users.values().find_map(|u| conflicts(u, &user)) {
            return Err(StoreError::Duplicate(format!("User with this {} already exists", field)));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn update(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if let Some(field) = users.values().find_map(|u| conflicts(u, &user)) {
            return Err(StoreError::Duplicate(format!("User with this {} already exists", field)));
        }
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(user)
            }
            None => Err(StoreError::Query(format!("User {} does not exist", user.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
