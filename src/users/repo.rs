use std::collections::BTreeMap;

use axum::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint failed on the field: `{0}`")]
    UniqueViolation(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for user rows.
///
/// Each call is a single independent datastore operation; callers get no
/// isolation between two calls (e.g. `count` and `find_page`).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a row and return it with its generated id.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Total number of rows.
    async fn count(&self) -> StoreResult<i64>;

    /// Rows in insertion order, skipping `skip` and returning at most `take`.
    async fn find_page(&self, skip: i64, take: i64) -> StoreResult<Vec<User>>;

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>>;

    /// Apply a partial update; `Ok(None)` when no row has this id.
    async fn update(&self, id: i32, changes: UserChanges) -> StoreResult<Option<User>>;

    /// Hard delete; `Ok(false)` when no row has this id.
    async fn delete(&self, id: i32) -> StoreResult<bool>;
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    let unique = matches!(
        &e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    );
    if unique {
        StoreError::UniqueViolation("email")
    } else {
        StoreError::Database(e)
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, name, photo)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password, name, photo
            "#,
        )
        .bind(user.email)
        .bind(user.password)
        .bind(user.name)
        .bind(user.photo)
        .fetch_one(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row)
    }

    async fn count(&self) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(total)
    }

    async fn find_page(&self, skip: i64, take: i64) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, name, photo
            FROM users
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(take)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password, name, photo FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i32, changes: UserChanges) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   password = COALESCE($3, password),
                   name = COALESCE($4, name),
                   photo = COALESCE($5, photo)
             WHERE id = $1
            RETURNING id, email, password, name, photo
            "#,
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.password)
        .bind(changes.name)
        .bind(changes.photo)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Debug, Default)]
struct Table {
    last_id: i32,
    rows: BTreeMap<i32, User>,
}

/// Process-local store with the same id and unique-email rules as the SQL table.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    table: RwLock<Table>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("email"));
        }
        table.last_id += 1;
        let row = User {
            id: table.last_id,
            email: user.email,
            password: user.password,
            name: user.name,
            photo: user.photo,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.table.read().await.rows.len() as i64)
    }

    async fn find_page(&self, skip: i64, take: i64) -> StoreResult<Vec<User>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, id: i32, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut table = self.table.write().await;
        if let Some(email) = &changes.email {
            if table.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation("email"));
            }
        }
        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(row);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i32) -> StoreResult<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}
