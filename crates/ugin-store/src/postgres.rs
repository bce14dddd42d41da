//! PostgreSQL store implementations
//!
//! Provides connection management, schema setup, and the post/account stores
//! on top of SQLx. Listing counts and the page are read inside one
//! `REPEATABLE READ` transaction so they agree under concurrent writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use ugin_core::{
    Account, AccountStore, DatabaseConfig, ListingPage, ListingQuery, Post, PostDraft, PostStore,
    Result, UginError,
};
use uuid::Uuid;

/// Open a connection pool
pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect(url)
        .await
        .map_err(|e| UginError::DatabaseError(format!("PostgreSQL connection failed: {e}")))
}

/// Initialize schema (idempotent)
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id UUID PRIMARY KEY,
            identifier TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    tracing::info!("Database schema initialized");
    Ok(())
}

fn db_error(e: sqlx::Error) -> UginError {
    UginError::DatabaseError(e.to_string())
}

/// Post row from database
#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const POST_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// PostgreSQL post store
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `WHERE` clause for a listing's search filter, bound as `$1`
///
/// Column names come from the listing allow-list, never from the client.
fn search_clause(query: &ListingQuery) -> Option<(String, String)> {
    query.search().map(|filter| {
        let conditions: Vec<String> = filter
            .fields()
            .iter()
            .map(|field| format!("\"{field}\" ILIKE $1 ESCAPE '\\'"))
            .collect();
        (
            format!("WHERE ({})", conditions.join(" OR ")),
            filter.like_pattern(),
        )
    })
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn query(&self, query: &ListingQuery) -> Result<ListingPage<Post>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let total: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;

        let search = search_clause(query);
        let filtered: i64 = match &search {
            Some((clause, pattern)) => {
                sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM posts {clause}"))
                    .bind(pattern.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_error)?
            }
            None => total,
        };

        let direction = query.sort_order().as_sql();
        let (clause, first_param) = match &search {
            Some((clause, _)) => (clause.as_str(), 2),
            None => ("", 1),
        };
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts {clause} ORDER BY \"{field}\" {direction}, id {direction} LIMIT ${limit} OFFSET ${offset}",
            field = query.sort_field(),
            limit = first_param,
            offset = first_param + 1,
        );

        tracing::debug!(sql = %sql, "Listing posts");
        let mut select = sqlx::query_as::<_, PostRow>(&sql);
        if let Some((_, pattern)) = &search {
            select = select.bind(pattern.as_str());
        }
        let rows = select
            .bind(i64::from(query.limit()))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        Ok(ListingPage {
            total: total.max(0) as u64,
            filtered: filtered.max(0) as u64,
            items: rows.into_iter().map(Post::from).collect(),
        })
    }

    async fn get(&self, id: i64) -> Result<Post> {
        sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Post::from)
            .ok_or_else(|| UginError::NotFound(format!("post {id}")))
    }

    async fn create(&self, draft: PostDraft) -> Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (name, description) VALUES ($1, $2) RETURNING {POST_COLUMNS}"
        ))
        .bind(draft.name.unwrap_or_default())
        .bind(draft.description.unwrap_or_default())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, draft: PostDraft) -> Result<Post> {
        sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE posts
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.name)
        .bind(draft.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Post::from)
        .ok_or_else(|| UginError::NotFound(format!("post {id}")))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(UginError::NotFound(format!("post {id}")));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    identifier: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            identifier: row.identifier,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL account store
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Account> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT id, identifier, password_hash, created_at FROM accounts WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Account::from)
        .ok_or_else(|| UginError::NotFound("account".to_string()))
    }

    async fn create(&self, account: Account) -> Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, identifier, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, identifier, password_hash, created_at
            "#,
        )
        .bind(account.id)
        .bind(account.identifier.as_str())
        .bind(account.password_hash.as_str())
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unique = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if unique {
                UginError::Conflict(format!("account {} already exists", account.identifier))
            } else {
                db_error(e)
            }
        })?;

        Ok(row.into())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
