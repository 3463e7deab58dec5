//! Postgres-backed stores.
//!
//! Records cross the SQL boundary as JSON: reads select `to_jsonb(t)` and writes go
//! through `jsonb_populate_record`, so the serde shape of a model is its row shape.
//! Table and column names come from [`Table`] constants only.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{types::Json, Encode, PgPool, Postgres, Type};
use uuid::Uuid;

use crate::database::models::user::User;
use crate::database::store::{OwnedStore, StoreError, Table};
use crate::database::users::UserStore;
use crate::ownership::OwnedRecord;

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

async fn insert_row<T>(pool: &PgPool, record: &T) -> Result<T, StoreError>
where
    T: Table + Serialize + DeserializeOwned + Send + Unpin + 'static,
{
    let table = quote_identifier(T::TABLE);
    let sql = format!(
        "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) RETURNING to_jsonb({table}.*)"
    );
    let Json(row) = sqlx::query_scalar::<_, Json<T>>(&sql)
        .bind(Json(serde_json::to_value(record)?))
        .fetch_one(pool)
        .await?;
    Ok(row)
}

fn lookup_sql(table: &str, column: &str) -> String {
    format!(
        "SELECT to_jsonb(t) FROM {} t WHERE t.{} = $1 LIMIT 1",
        quote_identifier(table),
        quote_identifier(column)
    )
}

/// Single-row lookup on a typed column so its index applies
async fn find_row<T, V>(pool: &PgPool, column: &str, value: V) -> Result<Option<T>, StoreError>
where
    T: Table + DeserializeOwned + Send + Unpin + 'static,
    V: for<'q> Encode<'q, Postgres> + Type<Postgres> + Send + 'static,
{
    let sql = lookup_sql(T::TABLE, column);
    let row = sqlx::query_scalar::<_, Json<T>>(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|Json(r)| r))
}

async fn update_row<T>(pool: &PgPool, id: Uuid, record: &T) -> Result<Option<T>, StoreError>
where
    T: Table + Serialize + DeserializeOwned + Send + Unpin + 'static,
{
    let table = quote_identifier(T::TABLE);
    let columns = T::UPDATABLE
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {table} SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
         WHERE id = $2 RETURNING to_jsonb({table}.*)"
    );
    let row = sqlx::query_scalar::<_, Json<T>>(&sql)
        .bind(Json(serde_json::to_value(record)?))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|Json(r)| r))
}

async fn delete_row<T: Table>(pool: &PgPool, column: &str, id: Uuid) -> Result<u64, StoreError> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = $1",
        quote_identifier(T::TABLE),
        quote_identifier(column)
    );
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

/// [`OwnedStore`] over one table of a service database
pub struct PgStore<R> {
    pool: PgPool,
    _phantom: PhantomData<R>,
}

impl<R> PgStore<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<R> OwnedStore<R> for PgStore<R>
where
    R: OwnedRecord + Table + Unpin,
{
    async fn insert(&self, record: R) -> Result<R, StoreError> {
        insert_row(&self.pool, &record).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        find_row(&self.pool, "id", id).await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<R>, StoreError> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE owner_id = $1 ORDER BY created_at DESC",
            quote_identifier(R::TABLE)
        );
        let rows = sqlx::query_scalar::<_, Json<R>>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(r)| r).collect())
    }

    async fn list_matching(&self, owner_id: Uuid, column: &str, value: Value) -> Result<Vec<R>, StoreError> {
        if !R::FILTERABLE.contains(&column) {
            return Err(StoreError::InvalidColumn(column.to_string()));
        }

        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE owner_id = $1 AND to_jsonb(t.{}) = $2 ORDER BY created_at DESC",
            quote_identifier(R::TABLE),
            quote_identifier(column)
        );
        let rows = sqlx::query_scalar::<_, Json<R>>(&sql)
            .bind(owner_id)
            .bind(Json(value))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(r)| r).collect())
    }

    async fn update(&self, record: R) -> Result<R, StoreError> {
        update_row(&self.pool, record.id(), &record)
            .await?
            .ok_or_else(|| StoreError::Query(format!("{} {} does not exist", R::KIND, record.id())))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(delete_row::<R>(&self.pool, "id", id).await? > 0)
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        delete_row::<R>(&self.pool, "owner_id", owner_id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// [`UserStore`] over the `users` table
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        insert_row(&self.pool, &user).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        find_row(&self.pool, "id", id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        find_row(&self.pool, "username", username.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        // Emails are stored lowercased
        find_row(&self.pool, "email", email.to_lowercase()).await
    }

    async fn update(&self, user: User) -> Result<User, StoreError> {
        update_row(&self.pool, user.id, &user)
            .await?
            .ok_or_else(|| StoreError::Query(format!("User {} does not exist", user.id)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(delete_row::<User>(&self.pool, "id", id).await? > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("notes"), "\"notes\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn lookups_compare_the_bare_column() {
        let sql = lookup_sql("users", "email");
        assert_eq!(sql, "SELECT to_jsonb(t) FROM \"users\" t WHERE t.\"email\" = $1 LIMIT 1");
    }
}
