//! In-memory table store implementation.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use idtables_core::storage::{
    validate_batch, BatchOperation, ContinuationToken, EntityPage, KeyPair, Properties, Result,
    StoreError, TableEntity, TableStore,
};

use crate::config::DEFAULT_PAGE_SIZE;

/// Rows of one table, ordered by `(partition_key, row_key)`.
type Rows = BTreeMap<(String, String), Properties>;

/// In-memory table store.
///
/// Tables must be created before use; any other operation on an unknown
/// table fails with `TableNotFound`. Partition scans are ordered by row key
/// and the continuation token is the last row key of the page.
#[derive(Debug, Clone)]
pub struct InMemoryTableStore {
    tables: Arc<RwLock<HashMap<String, Rows>>>,
    page_size: usize,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the number of rows per page. Values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Names of the tables created so far, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<_> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of rows in `table`, or `None` if it was never created.
    pub async fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.read().await.get(table).map(BTreeMap::len)
    }
}

fn row_id(key: &KeyPair) -> (String, String) {
    (key.partition_key.clone(), key.row_key.clone())
}

fn missing_table(table: &str) -> StoreError {
    StoreError::TableNotFound(table.to_string())
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn create_table_if_missing(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.contains_key(table) {
            tables.insert(table.to_string(), Rows::new());
            tracing::info!(table = %table, "Created in-memory table");
        }
        Ok(())
    }

    async fn insert(&self, table: &str, entity: TableEntity) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        let key = entity.key();
        let id = row_id(&key);
        if rows.contains_key(&id) {
            return Err(StoreError::conflict(table, &key));
        }
        rows.insert(id, entity.properties);
        Ok(())
    }

    async fn insert_or_replace(&self, table: &str, entity: TableEntity) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        rows.insert(
            (entity.partition_key, entity.row_key),
            entity.properties,
        );
        Ok(())
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        let key = KeyPair::new(partition_key, row_key);
        if rows.remove(&row_id(&key)).is_none() {
            return Err(StoreError::not_found(table, &key));
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| missing_table(table))?;

        let key = KeyPair::new(partition_key, row_key);
        Ok(rows
            .get(&row_id(&key))
            .map(|properties| TableEntity::new(key, properties.clone())))
    }

    async fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<EntityPage> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| missing_table(table))?;

        let start = match continuation {
            Some(token) => Bound::Excluded((partition_key.to_string(), token.as_str().to_string())),
            None => Bound::Included((partition_key.to_string(), String::new())),
        };

        let mut matching = rows
            .range((start, Bound::Unbounded))
            .take_while(|((pk, _), _)| pk == partition_key);

        let entities: Vec<TableEntity> = matching
            .by_ref()
            .take(self.page_size)
            .map(|((pk, rk), properties)| {
                TableEntity::new(KeyPair::new(pk, rk), properties.clone())
            })
            .collect();

        let continuation = match (matching.next(), entities.last()) {
            (Some(_), Some(last)) => Some(ContinuationToken::new(&last.row_key)),
            _ => None,
        };

        Ok(EntityPage {
            entities,
            continuation,
        })
    }

    async fn execute_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()> {
        validate_batch(&operations)?;

        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        // Check everything first so a failing batch leaves the table untouched.
        for op in &operations {
            let key = op.key();
            let exists = rows.contains_key(&row_id(&key));
            match op {
                BatchOperation::Insert(_) if exists => {
                    return Err(StoreError::conflict(table, &key));
                }
                BatchOperation::Delete(_) if !exists => {
                    return Err(StoreError::not_found(table, &key));
                }
                _ => {}
            }
        }

        for op in operations {
            match op {
                BatchOperation::Insert(entity) => {
                    rows.insert((entity.partition_key, entity.row_key), entity.properties);
                }
                BatchOperation::Delete(key) => {
                    rows.remove(&row_id(&key));
                }
            }
        }
        Ok(())
    }
}
