//! Runtime backend selection.

use async_trait::async_trait;
use thiserror::Error;

use idtables_core::storage::{
    BatchOperation, ContinuationToken, EntityPage, Result, StoreError, TableEntity, TableStore,
};

use crate::config::{Backend, Config, ConfigError};

#[cfg(feature = "dynamodb")]
use super::dynamodb::DynamoDbTableStore;
#[cfg(feature = "inmemory")]
use super::inmemory::InMemoryTableStore;
#[cfg(feature = "sqlite")]
use super::sqlite::SqliteTableStore;

/// Errors raised while opening the configured backend.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whichever compiled-in backend the configuration selects.
pub enum ConfiguredStore {
    #[cfg(feature = "inmemory")]
    Memory(InMemoryTableStore),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteTableStore),
    #[cfg(feature = "dynamodb")]
    DynamoDb(DynamoDbTableStore),
}

impl ConfiguredStore {
    /// Opens the backend named by `config.backend`.
    ///
    /// Fails with `BackendNotCompiled` when its cargo feature is off.
    pub async fn connect(config: &Config) -> std::result::Result<Self, ConnectError> {
        match config.backend {
            #[cfg(feature = "inmemory")]
            Backend::Memory => Ok(Self::Memory(
                InMemoryTableStore::new().with_page_size(config.page_size),
            )),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => Ok(Self::Sqlite(
                SqliteTableStore::new(&config.sqlite_path)
                    .await?
                    .with_page_size(config.page_size),
            )),
            #[cfg(feature = "dynamodb")]
            Backend::DynamoDb => Ok(Self::DynamoDb(
                DynamoDbTableStore::from_config(config).await?,
            )),
            #[allow(unreachable_patterns)]
            backend => Err(ConfigError::BackendNotCompiled(backend, backend.feature()).into()),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            #[cfg(feature = "inmemory")]
            Self::Memory(_) => Backend::Memory,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => Backend::Sqlite,
            #[cfg(feature = "dynamodb")]
            Self::DynamoDb(_) => Backend::DynamoDb,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "inmemory")]
            ConfiguredStore::Memory($store) => $call,
            #[cfg(feature = "sqlite")]
            ConfiguredStore::Sqlite($store) => $call,
            #[cfg(feature = "dynamodb")]
            ConfiguredStore::DynamoDb($store) => $call,
        }
    };
}

#[async_trait]
impl TableStore for ConfiguredStore {
    async fn create_table_if_missing(&self, table: &str) -> Result<()> {
        dispatch!(self, store => store.create_table_if_missing(table).await)
    }

    async fn insert(&self, table: &str, entity: TableEntity) -> Result<()> {
        dispatch!(self, store => store.insert(table, entity).await)
    }

    async fn insert_or_replace(&self, table: &str, entity: TableEntity) -> Result<()> {
        dispatch!(self, store => store.insert_or_replace(table, entity).await)
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()> {
        dispatch!(self, store => store.delete(table, partition_key, row_key).await)
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>> {
        dispatch!(self, store => store.retrieve(table, partition_key, row_key).await)
    }

    async fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<EntityPage> {
        dispatch!(self, store => store.query_partition(table, partition_key, continuation).await)
    }

    async fn execute_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()> {
        dispatch!(self, store => store.execute_batch(table, operations).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtables_core::storage::{KeyPair, Properties, TableEntity};

    #[cfg(feature = "inmemory")]
    #[tokio::test]
    async fn test_connect_memory_backend() {
        let store = ConfiguredStore::connect(&Config::default()).await.unwrap();
        assert_eq!(store.backend(), Backend::Memory);

        store.create_table_if_missing("T").await.unwrap();
        assert!(store.retrieve("T", "p", "r").await.unwrap().is_none());
    }

    #[cfg(not(feature = "dynamodb"))]
    #[tokio::test]
    async fn test_backend_not_compiled() {
        let config = Config {
            backend: Backend::DynamoDb,
            ..Config::default()
        };

        let err = ConfiguredStore::connect(&config).await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "backend 'dynamodb' is not compiled in, rebuild with the 'dynamodb' feature"
        );
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_connect_sqlite_backend() {
        let config = Config {
            backend: Backend::Sqlite,
            sqlite_path: ":memory:".to_string(),
            ..Config::default()
        };

        let store = ConfiguredStore::connect(&config).await.unwrap();
        assert_eq!(store.backend(), Backend::Sqlite);
    }

    #[cfg(any(feature = "inmemory", feature = "sqlite"))]
    async fn assert_pages_by_config(config: Config) {
        let store = ConfiguredStore::connect(&config).await.unwrap();
        store.create_table_if_missing("T").await.unwrap();
        for row in ["a", "b", "c"] {
            let entity = TableEntity::new(KeyPair::new("p", row), Properties::new());
            store.insert("T", entity).await.unwrap();
        }

        let first = store.query_partition("T", "p", None).await.unwrap();
        assert_eq!(first.entities.len(), 2);
        let rest = store
            .query_partition("T", "p", first.continuation.as_ref())
            .await
            .unwrap();
        assert_eq!(rest.entities.len(), 1);
        assert!(rest.continuation.is_none());
    }

    #[cfg(feature = "inmemory")]
    #[tokio::test]
    async fn test_memory_backend_uses_configured_page_size() {
        assert_pages_by_config(Config {
            page_size: 2,
            ..Config::default()
        })
        .await;
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_backend_uses_configured_page_size() {
        assert_pages_by_config(Config {
            backend: Backend::Sqlite,
            sqlite_path: ":memory:".to_string(),
            page_size: 2,
            ..Config::default()
        })
        .await;
    }
}
