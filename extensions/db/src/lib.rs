//! SQL persistence for the wish board.
//!
//! [`connect`] picks the backend from the configured url, opens a pool,
//! creates the schema and hands back a store ready to share.

pub mod pool;
pub mod store;

pub use pool::{Backend, DbPool, DbPoolError, PoolSize, PostgresPool, SqlitePool};
pub use store::SqlWishStore;

use std::sync::Arc;
use tandem_core::config::DatabaseConfig;
use tandem_core::event::SharedFeed;
use tandem_core::store::{SharedStore, StoreResult};

pub mod prelude {
    pub use crate::pool::{DbPool, PoolSize, PostgresPool, SqlitePool};
    pub use crate::store::SqlWishStore;
    pub use crate::connect;
}

/// Opens and migrates the store named by `config`.
pub async fn connect(config: &DatabaseConfig, feed: Option<SharedFeed>) -> StoreResult<SharedStore> {
    let backend = Backend::from_url(&config.url)?;
    tracing::info!(?backend, max_connections = config.max_connections, "Opening wish store");
    match backend {
        Backend::Sqlite => {
            let store = attach(SqlWishStore::new(SqlitePool::from_config(config).await?), feed);
            store.migrate().await?;
            log_ready(&store);
            Ok(Arc::new(store))
        }
        Backend::Postgres => {
            let store = attach(SqlWishStore::new(PostgresPool::from_config(config).await?), feed);
            store.migrate().await?;
            log_ready(&store);
            Ok(Arc::new(store))
        }
    }
}

fn log_ready<P: DbPool>(store: &SqlWishStore<P>) {
    let size = store.pool_size();
    tracing::debug!(open = size.open, idle = size.idle, "Wish store ready");
}

fn attach<P>(store: SqlWishStore<P>, feed: Option<SharedFeed>) -> SqlWishStore<P> {
    match feed {
        Some(feed) => store.with_feed(feed),
        None => store,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::role::Role;
    use tandem_core::store::WishStore;
    use tandem_core::wish::NewWish;

    #[tokio::test]
    async fn connects_to_in_memory_sqlite_from_defaults() {
        let store = connect(&DatabaseConfig::default(), None).await.unwrap();
        let wish = store.insert_wish(NewWish::new("tea", Role::User)).await.unwrap();
        assert_eq!(store.list_wishes().await.unwrap(), vec![wish]);
    }

    #[tokio::test]
    async fn unsupported_url_is_a_backend_error() {
        let config = DatabaseConfig {
            url: "mysql://localhost/wishes".to_string(),
            max_connections: 1,
        };
        assert!(connect(&config, None).await.is_err());
    }
}
