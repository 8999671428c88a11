//! Lazy partition scans.

use std::marker::PhantomData;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;

use idtables_core::storage::{ContinuationToken, Result, TableStore};

use super::entity::from_entity;

/// Every row of one partition, deserialized as `T`.
///
/// Holding a scan performs no I/O. Each call to [`PartitionScan::stream`]
/// starts over from the first page, following continuation tokens until the
/// store reports the partition exhausted. Row order is whatever the store
/// returns.
pub struct PartitionScan<S, T> {
    store: Arc<S>,
    table: String,
    partition_key: String,
    _record: PhantomData<fn() -> T>,
}

impl<S, T> PartitionScan<S, T> {
    pub(crate) fn new(store: Arc<S>, table: String, partition_key: String) -> Self {
        Self {
            store,
            table,
            partition_key,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

impl<S, T> PartitionScan<S, T>
where
    S: TableStore,
    T: DeserializeOwned + Send,
{
    /// Starts a fresh pass over the partition.
    pub fn stream(&self) -> impl Stream<Item = Result<T>> + Send + '_ {
        try_stream! {
            self.store.create_table_if_missing(&self.table).await?;

            let mut continuation: Option<ContinuationToken> = None;
            let mut pages = 0usize;

            loop {
                let page = self
                    .store
                    .query_partition(&self.table, &self.partition_key, continuation.as_ref())
                    .await?;
                pages += 1;

                tracing::debug!(
                    table = %self.table,
                    partition_key = %self.partition_key,
                    page = pages,
                    rows = page.entities.len(),
                    "Scanned partition page"
                );

                for entity in page.entities {
                    yield from_entity::<T>(entity)?;
                }

                match page.continuation {
                    Some(token) => continuation = Some(token),
                    None => break,
                }
            }
        }
    }

    /// Drains a fresh pass into a `Vec`.
    pub async fn collect_all(&self) -> Result<Vec<T>> {
        self.stream().try_collect().await
    }
}
