//! `WishStore` over SQL.
//!
//! Rows live in a single `wishes` table. Ids, enums and timestamps are kept as
//! text (RFC 3339 for timestamps) so the same schema and statements serve both
//! SQLite and PostgreSQL.

use crate::pool::{DbPool, PoolSize, PostgresPool, SqlitePool};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Display;
use tandem_core::error::StoreError;
use tandem_core::event::{ChangeNotice, SharedFeed};
use tandem_core::patch::{Precondition, WishPatch};
use tandem_core::reorder::sort_wishes;
use tandem_core::store::{StoreResult, WishStore};
use tandem_core::wish::{NewWish, Wish, WishId};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS wishes (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    created_by_role TEXT NOT NULL,
    proposed_by_role TEXT,
    completed_at TEXT,
    sort_order BIGINT NOT NULL,
    created_at TEXT NOT NULL
)";

const COLUMNS: &str =
    "id, title, status, created_by_role, proposed_by_role, completed_at, sort_order, created_at";

type RawWish = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
    String,
);

/// A `WishStore` backed by one of the [`DbPool`](crate::pool::DbPool) wrappers.
///
/// Call [`migrate`](SqlWishStore::migrate) once before use. With a feed
/// attached, every successful write publishes on the wishes topic.
pub struct SqlWishStore<P> {
    pool: P,
    feed: Option<SharedFeed>,
}

impl<P> SqlWishStore<P> {
    pub fn new(pool: P) -> Self {
        Self { pool, feed: None }
    }

    pub fn with_feed(mut self, feed: SharedFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    fn notify(&self) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeNotice::wishes());
        }
    }
}

impl<P: DbPool> SqlWishStore<P> {
    /// Round-trips a trivial query on the underlying pool.
    pub async fn ping(&self) -> StoreResult<()> {
        Ok(self.pool.ping().await?)
    }

    pub fn pool_size(&self) -> PoolSize {
        self.pool.size()
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn corrupt<E: Display>(column: &'static str) -> impl Fn(E) -> StoreError {
    move |e| StoreError::Backend(format!("corrupt `{column}` column: {e}"))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(column: &'static str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(corrupt(column))
}

fn decode(row: RawWish) -> StoreResult<Wish> {
    let (id, title, status, created_by, proposed_by, completed_at, sort_order, created_at) = row;
    Ok(Wish {
        id: id.parse().map_err(corrupt("id"))?,
        title,
        status: status.parse().map_err(corrupt("status"))?,
        created_by_role: created_by.parse().map_err(corrupt("created_by_role"))?,
        proposed_by_role: proposed_by
            .map(|role| role.parse().map_err(corrupt("proposed_by_role")))
            .transpose()?,
        completed_at: completed_at
            .map(|raw| parse_timestamp("completed_at", &raw))
            .transpose()?,
        sort_order,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

// Both backends accept `$N` placeholders, so only the pool and database
// types and the null-safe comparison differ between the two implementations.
macro_rules! sql_wish_store {
    ($pool:ty, $db:ty, $backend:literal, $null_safe_eq:literal) => {
        impl SqlWishStore<$pool> {
            /// Creates the `wishes` table if it does not exist.
            pub async fn migrate(&self) -> StoreResult<()> {
                self.ping().await?;
                sqlx::query(CREATE_TABLE)
                    .execute(self.pool.inner())
                    .await
                    .map_err(backend)?;
                tracing::debug!(backend = $backend, "Wishes table ready");
                Ok(())
            }
        }

        #[async_trait]
        impl WishStore for SqlWishStore<$pool> {
            async fn list_wishes(&self) -> StoreResult<Vec<Wish>> {
                let rows = sqlx::query_as::<_, RawWish>(&format!("SELECT {COLUMNS} FROM wishes"))
                    .fetch_all(self.pool.inner())
                    .await
                    .map_err(backend)?;
                let mut wishes = rows.into_iter().map(decode).collect::<StoreResult<Vec<_>>>()?;
                sort_wishes(&mut wishes);
                Ok(wishes)
            }

            async fn get_wish(&self, id: WishId) -> StoreResult<Option<Wish>> {
                sqlx::query_as::<_, RawWish>(&format!("SELECT {COLUMNS} FROM wishes WHERE id = $1"))
                    .bind(id.to_string())
                    .fetch_optional(self.pool.inner())
                    .await
                    .map_err(backend)?
                    .map(decode)
                    .transpose()
            }

            async fn insert_wish(&self, new: NewWish) -> StoreResult<Wish> {
                let sort_order = match new.sort_order {
                    Some(sort_order) => sort_order,
                    None => sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(sort_order) FROM wishes")
                        .fetch_one(self.pool.inner())
                        .await
                        .map_err(backend)?
                        .map_or(0, |max| max + 1),
                };
                let wish = Wish::create(WishId::new_v4(), new, sort_order, Utc::now());

                sqlx::query(&format!(
                    "INSERT INTO wishes ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
                ))
                .bind(wish.id.to_string())
                .bind(wish.title.as_str())
                .bind(wish.status.as_str())
                .bind(wish.created_by_role.as_str())
                .bind(wish.proposed_by_role.map(|role| role.as_str()))
                .bind(wish.completed_at.map(timestamp))
                .bind(wish.sort_order)
                .bind(timestamp(wish.created_at))
                .execute(self.pool.inner())
                .await
                .map_err(backend)?;

                tracing::debug!(backend = $backend, tandem.wish = %wish.id, "Inserted wish");
                self.notify();
                Ok(wish)
            }

            async fn update_wish_if(
                &self,
                id: WishId,
                expected: Option<Precondition>,
                patch: &WishPatch,
            ) -> StoreResult<Wish> {
                if patch.is_empty() {
                    let wish = self.get_wish(id).await?.ok_or(StoreError::NotFound(id))?;
                    return match expected {
                        Some(expected) if !expected.holds_for(&wish) => Err(StoreError::Conflict(id)),
                        _ => Ok(wish),
                    };
                }

                let mut query = sqlx::QueryBuilder::<$db>::new("UPDATE wishes SET ");
                let mut set = query.separated(", ");
                if let Some(status) = patch.status {
                    set.push("status = ").push_bind_unseparated(status.as_str());
                }
                if let Some(proposer) = patch.proposed_by_role {
                    set.push("proposed_by_role = ")
                        .push_bind_unseparated(proposer.map(|role| role.as_str()));
                }
                if let Some(completed_at) = patch.completed_at {
                    set.push("completed_at = ")
                        .push_bind_unseparated(completed_at.map(timestamp));
                }
                if let Some(title) = &patch.title {
                    set.push("title = ").push_bind_unseparated(title.clone());
                }
                if let Some(sort_order) = patch.sort_order {
                    set.push("sort_order = ").push_bind_unseparated(sort_order);
                }
                query.push(" WHERE id = ").push_bind(id.to_string());
                if let Some(expected) = expected {
                    query
                        .push(" AND status = ")
                        .push_bind(expected.status.as_str())
                        .push(concat!(" AND proposed_by_role ", $null_safe_eq, " "))
                        .push_bind(expected.proposed_by_role.map(|role| role.as_str()));
                }
                query.push(" RETURNING ").push(COLUMNS);

                let row = query
                    .build_query_as::<RawWish>()
                    .fetch_optional(self.pool.inner())
                    .await
                    .map_err(backend)?;
                let Some(row) = row else {
                    // Nothing matched: either the row is gone or the guard failed.
                    return Err(match self.get_wish(id).await? {
                        Some(_) => StoreError::Conflict(id),
                        None => StoreError::NotFound(id),
                    });
                };
                let wish = decode(row)?;

                tracing::debug!(backend = $backend, tandem.wish = %id, "Updated wish");
                self.notify();
                Ok(wish)
            }
        }
    };
}

sql_wish_store!(SqlitePool, sqlx::Sqlite, "sqlite", "IS");
sql_wish_store!(PostgresPool, sqlx::Postgres, "postgres", "IS NOT DISTINCT FROM");
