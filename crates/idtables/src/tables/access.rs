use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use idtables_core::storage::{BatchOperation, KeyPair, Result, TableStore};

use super::entity::{from_entity, to_entity};
use super::scan::PartitionScan;

/// Typed access to the logical tables of one [`TableStore`].
///
/// Stateless apart from the shared store handle and an optional table-name
/// prefix: no cache, no locks, no retries. Each call lazily creates its table
/// before touching it. Cloning is cheap and shares the store.
pub struct TableAccess<S> {
    store: Arc<S>,
    table_prefix: String,
}

impl<S> Clone for TableAccess<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table_prefix: self.table_prefix.clone(),
        }
    }
}

impl<S: TableStore> TableAccess<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            table_prefix: String::new(),
        }
    }

    /// Prepends `prefix` to every logical table name.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Physical name of a logical table.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{table}", self.table_prefix)
    }

    async fn open(&self, table: &str) -> Result<String> {
        let name = self.table_name(table);
        self.store.create_table_if_missing(&name).await?;
        Ok(name)
    }

    /// Creates each of the given logical tables if missing.
    pub async fn ensure_tables<'a, I>(&self, tables: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str> + Send,
        I::IntoIter: Send,
    {
        for table in tables {
            let name = self.open(table).await?;
            tracing::info!(table = %name, "Ensured table");
        }
        Ok(())
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Inserts `item` under `key`. Fails with `Conflict` if the key exists.
    pub async fn insert<T>(&self, table: &str, item: &T, key: &KeyPair) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let entity = to_entity(item, key.clone())?;
        let name = self.open(table).await?;
        tracing::debug!(
            table = %name,
            partition_key = %key.partition_key,
            row_key = %key.row_key,
            "insert"
        );
        self.store.insert(&name, entity).await
    }

    /// Inserts or fully replaces the row at `key`.
    pub async fn insert_or_replace<T>(&self, table: &str, item: &T, key: &KeyPair) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let entity = to_entity(item, key.clone())?;
        let name = self.open(table).await?;
        tracing::debug!(
            table = %name,
            partition_key = %key.partition_key,
            row_key = %key.row_key,
            "insert_or_replace"
        );
        self.store.insert_or_replace(&name, entity).await
    }

    /// Deletes the row at `key`. Fails with `NotFound` if absent.
    pub async fn delete(&self, table: &str, key: &KeyPair) -> Result<()> {
        let name = self.open(table).await?;
        tracing::debug!(
            table = %name,
            partition_key = %key.partition_key,
            row_key = %key.row_key,
            "delete"
        );
        self.store
            .delete(&name, &key.partition_key, &key.row_key)
            .await
    }

    /// Point lookup. An absent row is `Ok(None)`.
    pub async fn find<T: DeserializeOwned>(&self, table: &str, key: &KeyPair) -> Result<Option<T>> {
        let name = self.open(table).await?;
        tracing::debug!(
            table = %name,
            partition_key = %key.partition_key,
            row_key = %key.row_key,
            "find"
        );
        self.store
            .retrieve(&name, &key.partition_key, &key.row_key)
            .await?
            .map(from_entity)
            .transpose()
    }

    /// All rows of one partition.
    ///
    /// The scan is lazy: the table is created when a pass starts, so building
    /// a scan never touches the store.
    pub fn find_all_in_partition<T>(
        &self,
        table: &str,
        partition_key: &str,
    ) -> PartitionScan<S, T> {
        PartitionScan::new(
            Arc::clone(&self.store),
            self.table_name(table),
            partition_key.to_string(),
        )
    }

    // ========================================================================
    // Batch operations
    // ========================================================================

    /// Inserts `items` as one atomic batch.
    ///
    /// Every item must map to the same partition and the batch may hold at
    /// most 100 rows, otherwise the store rejects it with `InvalidBatch`.
    /// An empty slice is a no-op.
    pub async fn insert_batch<T, P, R>(
        &self,
        table: &str,
        items: &[T],
        partition_key: P,
        row_key: R,
    ) -> Result<()>
    where
        T: Serialize + Sync,
        P: Fn(&T) -> String + Send,
        R: Fn(&T) -> String + Send,
    {
        if items.is_empty() {
            return Ok(());
        }

        let operations = items
            .iter()
            .map(|item| {
                to_entity(item, KeyPair::new(partition_key(item), row_key(item)))
                    .map(BatchOperation::Insert)
            })
            .collect::<Result<Vec<_>>>()?;

        let name = self.open(table).await?;
        tracing::debug!(table = %name, operations = operations.len(), "insert_batch");
        self.store.execute_batch(&name, operations).await
    }

    /// Deletes the rows of `items` within one partition as one atomic batch.
    ///
    /// Any missing row fails the whole batch with `NotFound`. An empty slice
    /// is a no-op.
    pub async fn delete_batch<T, R>(
        &self,
        table: &str,
        items: &[T],
        partition_key: &str,
        row_key: R,
    ) -> Result<()>
    where
        T: Sync,
        R: Fn(&T) -> String + Send,
    {
        if items.is_empty() {
            return Ok(());
        }

        let operations: Vec<_> = items
            .iter()
            .map(|item| BatchOperation::Delete(KeyPair::new(partition_key, row_key(item))))
            .collect();

        let name = self.open(table).await?;
        tracing::debug!(
            table = %name,
            partition_key = %partition_key,
            operations = operations.len(),
            "delete_batch"
        );
        self.store.execute_batch(&name, operations).await
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::storage::inmemory::InMemoryTableStore;
    use futures_util::StreamExt;
    use idtables_core::identity::Claim;
    use idtables_core::storage::keys::{claim_key, owner_claim_key};
    use idtables_core::storage::StoreError;

    fn access(page_size: usize) -> TableAccess<InMemoryTableStore> {
        TableAccess::new(InMemoryTableStore::new().with_page_size(page_size))
    }

    fn claims(n: usize) -> Vec<Claim> {
        (0..n).map(|i| Claim::new("perm", format!("c{i:02}"))).collect()
    }

    #[tokio::test]
    async fn test_operations_create_tables_lazily() {
        let access = access(10);
        let found: Option<Claim> = access.find("Claims", &KeyPair::new("u1", "x")).await.unwrap();

        assert!(found.is_none());
        assert_eq!(access.store().table_names().await, vec!["Claims".to_string()]);
    }

    #[tokio::test]
    async fn test_table_prefix_is_applied() {
        let access = access(10).with_table_prefix("dev");
        let claim = Claim::new("role", "admin");
        access
            .insert("Claims", &claim, &owner_claim_key("u1", &claim))
            .await
            .unwrap();

        assert_eq!(access.table_name("Claims"), "devClaims");
        assert_eq!(access.store().row_count("devClaims").await, Some(1));
    }

    #[tokio::test]
    async fn test_insert_find_delete() {
        let access = access(10);
        let claim = Claim::new("role", "admin");
        let key = owner_claim_key("u1", &claim);

        access.insert("Claims", &claim, &key).await.unwrap();
        let err = access.insert("Claims", &claim, &key).await.unwrap_err();
        assert!(err.is_conflict());

        let found: Option<Claim> = access.find("Claims", &key).await.unwrap();
        assert_eq!(found, Some(claim));

        access.delete("Claims", &key).await.unwrap();
        let err = access.delete("Claims", &key).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_partition_scan_follows_continuations() {
        let access = access(3);
        let all = claims(7);
        access
            .insert_batch("Claims", &all, |_| "u1".to_string(), claim_key)
            .await
            .unwrap();

        let scan = access.find_all_in_partition::<Claim>("Claims", "u1");
        let found = scan.collect_all().await.unwrap();

        assert_eq!(found, all);
    }

    #[tokio::test]
    async fn test_partition_scan_is_restartable() {
        let access = access(2);
        access
            .insert_batch("Claims", &claims(3), |_| "u1".to_string(), claim_key)
            .await
            .unwrap();

        let scan = access.find_all_in_partition::<Claim>("Claims", "u1");
        let first: Vec<_> = scan.stream().take(1).collect().await;
        assert_eq!(first.len(), 1);

        let second = scan.collect_all().await.unwrap();
        assert_eq!(second.len(), 3);
    }

    #[tokio::test]
    async fn test_scan_of_empty_partition() {
        let access = access(2);
        let found = access
            .find_all_in_partition::<Claim>("Claims", "nobody")
            .collect_all()
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batches_never_reach_the_store() {
        let access = access(10);
        access
            .insert_batch::<Claim, _, _>("Claims", &[], |_| "u1".to_string(), claim_key)
            .await
            .unwrap();
        access
            .delete_batch::<Claim, _>("Claims", &[], "u1", claim_key)
            .await
            .unwrap();

        assert!(access.store().table_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_batch_fails_whole_batch_on_missing_row() {
        let access = access(10);
        let all = claims(2);
        access
            .insert("Claims", &all[0], &owner_claim_key("u1", &all[0]))
            .await
            .unwrap();

        let err = access
            .delete_batch("Claims", &all, "u1", claim_key)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let remaining: Option<Claim> = access
            .find("Claims", &owner_claim_key("u1", &all[0]))
            .await
            .unwrap();
        assert!(remaining.is_some());
    }

    #[tokio::test]
    async fn test_batch_over_limit_is_rejected() {
        let access = access(10);
        let err = access
            .insert_batch("Claims", &claims(101), |_| "u1".to_string(), claim_key)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidBatch(_)));
    }
}
