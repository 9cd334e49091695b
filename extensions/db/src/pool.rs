//! Connection pools for the wish store.
//!
//! Each backend gets a thin wrapper over its `sqlx` pool so stores and the
//! `Bus` can hold it by a concrete type.

use async_trait::async_trait;
use tandem_core::config::DatabaseConfig;
use tandem_core::error::StoreError;

/// Common surface of the supported pools.
#[async_trait]
pub trait DbPool: Send + Sync + 'static {
    /// The raw connection type for this database.
    type Connection: Send + 'static;

    /// Get a connection from the pool.
    async fn acquire(&self) -> Result<Self::Connection, DbPoolError>;

    /// Round-trips a trivial query.
    async fn ping(&self) -> Result<(), DbPoolError>;

    fn size(&self) -> PoolSize;

    /// Close the pool gracefully.
    async fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSize {
    /// Open connections, idle or in use.
    pub open: u32,
    pub idle: u32,
    /// Connections currently checked out.
    pub active: u32,
}

impl PoolSize {
    fn of(open: u32, idle: usize) -> Self {
        let idle = u32::try_from(idle).unwrap_or(u32::MAX).min(open);
        Self {
            open,
            idle,
            active: open - idle,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbPoolError {
    #[error("failed to acquire connection from pool: {0}")]
    AcquireFailed(String),

    #[error("unsupported database url `{0}`")]
    UnsupportedUrl(String),

    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl From<DbPoolError> for StoreError {
    fn from(err: DbPoolError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Which backend a connection url points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self, DbPoolError> {
        if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else {
            Err(DbPoolError::UnsupportedUrl(url.to_string()))
        }
    }
}

// ============== PostgreSQL Pool ==============

#[derive(Clone)]
pub struct PostgresPool {
    inner: sqlx::PgPool,
}

impl PostgresPool {
    pub async fn new(url: &str) -> Result<Self, DbPoolError> {
        Self::with_options(url, sqlx::postgres::PgPoolOptions::new()).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, DbPoolError> {
        let options = sqlx::postgres::PgPoolOptions::new().max_connections(config.max_connections);
        Self::with_options(&config.url, options).await
    }

    pub async fn with_options(
        url: &str,
        options: sqlx::postgres::PgPoolOptions,
    ) -> Result<Self, DbPoolError> {
        let inner = options.connect(url).await?;
        tracing::debug!(backend = "postgres", "Connected database pool");
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &sqlx::PgPool {
        &self.inner
    }
}

#[async_trait]
impl DbPool for PostgresPool {
    type Connection = sqlx::pool::PoolConnection<sqlx::Postgres>;

    async fn acquire(&self) -> Result<Self::Connection, DbPoolError> {
        self.inner
            .acquire()
            .await
            .map_err(|e| DbPoolError::AcquireFailed(e.to_string()))
    }

    async fn ping(&self) -> Result<(), DbPoolError> {
        sqlx::query("SELECT 1").execute(self.inner()).await?;
        Ok(())
    }

    fn size(&self) -> PoolSize {
        PoolSize::of(self.inner.size(), self.inner.num_idle())
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

// ============== SQLite Pool ==============

#[derive(Clone)]
pub struct SqlitePool {
    inner: sqlx::SqlitePool,
}

impl SqlitePool {
    pub async fn new(url: &str) -> Result<Self, DbPoolError> {
        Self::with_options(url, sqlx::sqlite::SqlitePoolOptions::new()).await
    }

    /// An in-memory database on a single connection; every extra connection
    /// would open a separate empty database.
    pub async fn in_memory() -> Result<Self, DbPoolError> {
        let options = sqlx::sqlite::SqlitePoolOptions::new().max_connections(1);
        Self::with_options("sqlite::memory:", options).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, DbPoolError> {
        let max = if config.url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };
        let options = sqlx::sqlite::SqlitePoolOptions::new().max_connections(max);
        Self::with_options(&config.url, options).await
    }

    pub async fn with_options(
        url: &str,
        options: sqlx::sqlite::SqlitePoolOptions,
    ) -> Result<Self, DbPoolError> {
        let inner = options.connect(url).await?;
        tracing::debug!(backend = "sqlite", "Connected database pool");
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &sqlx::SqlitePool {
        &self.inner
    }
}

#[async_trait]
impl DbPool for SqlitePool {
    type Connection = sqlx::pool::PoolConnection<sqlx::Sqlite>;

    async fn acquire(&self) -> Result<Self::Connection, DbPoolError> {
        self.inner
            .acquire()
            .await
            .map_err(|e| DbPoolError::AcquireFailed(e.to_string()))
    }

    async fn ping(&self) -> Result<(), DbPoolError> {
        sqlx::query("SELECT 1").execute(self.inner()).await?;
        Ok(())
    }

    fn size(&self) -> PoolSize {
        PoolSize::of(self.inner.size(), self.inner.num_idle())
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
