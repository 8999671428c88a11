//! SQLite table store implementation.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use idtables_core::storage::{
    validate_batch, BatchOperation, ContinuationToken, EntityPage, KeyPair, Properties, Result,
    StoreError, TableEntity, TableStore,
};

use super::error::{is_duplicate_key, map_tokio_rusqlite_error, store_err, wrap_err};
use super::schema;
use crate::config::DEFAULT_PAGE_SIZE;

type CallResult<T> = std::result::Result<T, tokio_rusqlite::Error>;

/// SQLite-based table store.
///
/// Batches run inside one SQL transaction, so they are atomic here even
/// though only single-partition batches are accepted.
pub struct SqliteTableStore {
    conn: Connection,
    page_size: usize,
}

impl SqliteTableStore {
    /// Creates a store with a file-based database.
    ///
    /// The database file will be created if it doesn't exist.
    /// Schema tables are created automatically.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;
        tracing::info!(path = %path, "Opened SQLite table store");

        Ok(Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Creates a store with an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Sets the number of rows per partition page. Values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES).map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(map_tokio_rusqlite_error)
    }
}

// ============================================================================
// Row helpers (run inside connection closures)
// ============================================================================

fn require_table(conn: &rusqlite::Connection, table: &str) -> CallResult<()> {
    let found: Option<String> = conn
        .query_row(schema::SELECT_TABLE, [table], |row| row.get(0))
        .optional()
        .map_err(wrap_err)?;

    match found {
        Some(_) => Ok(()),
        None => Err(store_err(StoreError::TableNotFound(table.to_string()))),
    }
}

fn encode_properties(properties: &Properties) -> Result<String> {
    serde_json::to_string(properties).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_properties(table: &str, key: &KeyPair, json: &str) -> CallResult<Properties> {
    serde_json::from_str(json).map_err(|e| {
        store_err(StoreError::Serialization(format!(
            "{table} entity {key}: {e}"
        )))
    })
}

fn insert_row(
    conn: &rusqlite::Connection,
    table: &str,
    key: &KeyPair,
    properties: &str,
) -> CallResult<()> {
    conn.execute(
        schema::INSERT_ENTITY,
        rusqlite::params![table, key.partition_key, key.row_key, properties],
    )
    .map_err(|e| {
        if is_duplicate_key(&e) {
            store_err(StoreError::conflict(table, key))
        } else {
            wrap_err(e)
        }
    })?;
    Ok(())
}

fn delete_row(conn: &rusqlite::Connection, table: &str, key: &KeyPair) -> CallResult<()> {
    let rows = conn
        .execute(
            schema::DELETE_ENTITY,
            rusqlite::params![table, key.partition_key, key.row_key],
        )
        .map_err(wrap_err)?;

    if rows == 0 {
        return Err(store_err(StoreError::not_found(table, key)));
    }
    Ok(())
}

// ============================================================================
// TableStore implementation
// ============================================================================

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn create_table_if_missing(&self, table: &str) -> Result<()> {
        let table = table.to_string();
        let created_at = Utc::now().to_rfc3339();

        let created = self
            .conn
            .call(move |conn| {
                let rows = conn
                    .execute(schema::REGISTER_TABLE, rusqlite::params![table, created_at])
                    .map_err(wrap_err)?;
                Ok((rows > 0).then_some(table))
            })
            .await
            .map_err(map_tokio_rusqlite_error)?;

        if let Some(table) = created {
            tracing::info!(table = %table, "Registered SQLite table");
        }
        Ok(())
    }

    async fn insert(&self, table: &str, entity: TableEntity) -> Result<()> {
        let table = table.to_string();
        let key = entity.key();
        let properties = encode_properties(&entity.properties)?;

        self.conn
            .call(move |conn| {
                require_table(conn, &table)?;
                insert_row(conn, &table, &key, &properties)
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    async fn insert_or_replace(&self, table: &str, entity: TableEntity) -> Result<()> {
        let table = table.to_string();
        let properties = encode_properties(&entity.properties)?;

        self.conn
            .call(move |conn| {
                require_table(conn, &table)?;
                conn.execute(
                    schema::UPSERT_ENTITY,
                    rusqlite::params![table, entity.partition_key, entity.row_key, properties],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()> {
        let table = table.to_string();
        let key = KeyPair::new(partition_key, row_key);

        self.conn
            .call(move |conn| {
                require_table(conn, &table)?;
                delete_row(conn, &table, &key)
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>> {
        let table = table.to_string();
        let key = KeyPair::new(partition_key, row_key);

        self.conn
            .call(move |conn| {
                require_table(conn, &table)?;
                let json: Option<String> = conn
                    .query_row(
                        schema::SELECT_ENTITY,
                        rusqlite::params![table, key.partition_key, key.row_key],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(wrap_err)?;

                match json {
                    Some(json) => {
                        let properties = decode_properties(&table, &key, &json)?;
                        Ok(Some(TableEntity::new(key, properties)))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    async fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<EntityPage> {
        let table = table.to_string();
        let partition_key = partition_key.to_string();
        let start_after = continuation.map(|token| token.as_str().to_string());
        let page_size = self.page_size;
        // One extra row tells whether another page follows.
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX).saturating_add(1);

        self.conn
            .call(move |conn| {
                require_table(conn, &table)?;

                let mut stmt = conn
                    .prepare(schema::SELECT_PARTITION_PAGE)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map(
                        rusqlite::params![table, partition_key, start_after, limit],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                    )
                    .map_err(wrap_err)?;

                let mut entities = Vec::new();
                let mut has_more = false;
                for row_result in rows {
                    let (row_key, json) = row_result.map_err(wrap_err)?;
                    if entities.len() == page_size {
                        has_more = true;
                        break;
                    }
                    let key = KeyPair::new(&partition_key, row_key);
                    let properties = decode_properties(&table, &key, &json)?;
                    entities.push(TableEntity::new(key, properties));
                }

                let continuation = match entities.last() {
                    Some(last) if has_more => Some(ContinuationToken::new(&last.row_key)),
                    _ => None,
                };

                Ok(EntityPage {
                    entities,
                    continuation,
                })
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    async fn execute_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()> {
        validate_batch(&operations)?;

        let table = table.to_string();
        let mut encoded = Vec::with_capacity(operations.len());
        for op in operations {
            match op {
                BatchOperation::Insert(entity) => {
                    let properties = encode_properties(&entity.properties)?;
                    encoded.push((entity.key(), Some(properties)));
                }
                BatchOperation::Delete(key) => encoded.push((key, None)),
            }
        }

        self.conn
            .call(move |conn| {
                require_table(conn, &table)?;

                // Dropping the transaction on error rolls it back.
                let tx = conn.transaction().map_err(wrap_err)?;
                for (key, properties) in &encoded {
                    match properties {
                        Some(properties) => insert_row(&tx, &table, key, properties)?,
                        None => delete_row(&tx, &table, key)?,
                    }
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(pk: &str, rk: &str, name: &str) -> TableEntity {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), json!(name));
        properties.insert("accessFailedCount".to_string(), json!(3));
        TableEntity::new(KeyPair::new(pk, rk), properties)
    }

    async fn store() -> SqliteTableStore {
        let store = SqliteTableStore::new_in_memory().await.unwrap();
        store.create_table_if_missing("T").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected() {
        let store = SqliteTableStore::new_in_memory().await.unwrap();
        let err = store.insert("Missing", entity("p", "r", "a")).await.unwrap_err();
        assert_eq!(err, StoreError::TableNotFound("Missing".to_string()));
    }

    #[tokio::test]
    async fn test_insert_and_retrieve() {
        let store = store().await;
        store.insert("T", entity("p", "r", "alice")).await.unwrap();

        let found = store.retrieve("T", "p", "r").await.unwrap().unwrap();
        assert_eq!(found, entity("p", "r", "alice"));
        assert!(store.retrieve("T", "p", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let store = store().await;
        store.insert("T", entity("p", "r", "alice")).await.unwrap();

        let err = store.insert("T", entity("p", "r", "bob")).await.unwrap_err();
        assert_eq!(err, StoreError::conflict("T", &KeyPair::new("p", "r")));
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let store = store().await;
        store.create_table_if_missing("U").await.unwrap();
        store.insert("T", entity("p", "r", "alice")).await.unwrap();

        store.insert("U", entity("p", "r", "bob")).await.unwrap();
        assert!(store.retrieve("U", "p", "r").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_or_replace_overwrites() {
        let store = store().await;
        store.insert_or_replace("T", entity("p", "r", "alice")).await.unwrap();
        store.insert_or_replace("T", entity("p", "r", "alicia")).await.unwrap();

        let found = store.retrieve("T", "p", "r").await.unwrap().unwrap();
        assert_eq!(found.properties["name"], json!("alicia"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = store().await;
        let err = store.delete("T", "p", "r").await.unwrap_err();
        assert_eq!(err, StoreError::not_found("T", &KeyPair::new("p", "r")));
    }

    #[tokio::test]
    async fn test_query_partition_pages() {
        let store = store().await.with_page_size(2);
        for rk in ["c", "a", "b", ""] {
            store.insert("T", entity("p", rk, rk)).await.unwrap();
        }
        store.insert("T", entity("q", "z", "z")).await.unwrap();

        let first = store.query_partition("T", "p", None).await.unwrap();
        let row_keys: Vec<_> = first.entities.iter().map(|e| e.row_key.as_str()).collect();
        assert_eq!(row_keys, ["", "a"]);

        let token = first.continuation.unwrap();
        let second = store.query_partition("T", "p", Some(&token)).await.unwrap();
        let row_keys: Vec<_> = second.entities.iter().map(|e| e.row_key.as_str()).collect();
        assert_eq!(row_keys, ["b", "c"]);
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let store = store().await;
        store.insert("T", entity("p", "b", "existing")).await.unwrap();

        let ops = vec![
            BatchOperation::Insert(entity("p", "a", "new")),
            BatchOperation::Delete(KeyPair::new("p", "missing")),
        ];
        let err = store.execute_batch("T", ops).await.unwrap_err();

        assert_eq!(err, StoreError::not_found("T", &KeyPair::new("p", "missing")));
        assert!(store.retrieve("T", "p", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_commits() {
        let store = store().await;
        store.insert("T", entity("p", "old", "old")).await.unwrap();

        let ops = vec![
            BatchOperation::Insert(entity("p", "new", "new")),
            BatchOperation::Delete(KeyPair::new("p", "old")),
        ];
        store.execute_batch("T", ops).await.unwrap();

        assert!(store.retrieve("T", "p", "new").await.unwrap().is_some());
        assert!(store.retrieve("T", "p", "old").await.unwrap().is_none());
    }
}
