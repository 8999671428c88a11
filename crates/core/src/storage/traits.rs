use async_trait::async_trait;

use super::{BatchOperation, ContinuationToken, EntityPage, Result, TableEntity};

/// A schemaless two-key table store.
///
/// Tables are flat `(partition_key, row_key)` spaces. The store offers point
/// operations, paged scans of one partition, and batches that are atomic only
/// within a single partition. Implementations never retry.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Creates the table if it does not exist yet. Idempotent.
    async fn create_table_if_missing(&self, table: &str) -> Result<()>;

    /// Inserts an entity, failing with `Conflict` if the key exists.
    async fn insert(&self, table: &str, entity: TableEntity) -> Result<()>;

    /// Inserts or fully replaces an entity. Last write wins.
    async fn insert_or_replace(&self, table: &str, entity: TableEntity) -> Result<()>;

    /// Deletes an entity, failing with `NotFound` if the key is absent.
    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()>;

    /// Point lookup. A missing entity is `Ok(None)`, not an error.
    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>>;

    /// Returns one page of a partition, resuming after `continuation`.
    async fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<EntityPage>;

    /// Applies every operation or none. All operations must share a partition.
    async fn execute_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()>;
}
