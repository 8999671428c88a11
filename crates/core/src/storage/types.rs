use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{KeyPair, Result, StoreError};

/// Flat property bag stored alongside an entity's keys.
pub type Properties = Map<String, Value>;

/// Maximum number of operations a single batch may carry.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// One row of a table: its key pair plus its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: Properties,
}

impl TableEntity {
    pub fn new(key: KeyPair, properties: Properties) -> Self {
        Self {
            partition_key: key.partition_key,
            row_key: key.row_key,
            properties,
        }
    }

    pub fn key(&self) -> KeyPair {
        KeyPair::new(&self.partition_key, &self.row_key)
    }
}

/// Opaque position to resume a partition query from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a partition query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPage {
    pub entities: Vec<TableEntity>,
    /// `None` once the partition is exhausted.
    pub continuation: Option<ContinuationToken>,
}

/// A single operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    /// Insert that fails the whole batch if the key exists.
    Insert(TableEntity),
    /// Delete that fails the whole batch if the key is absent.
    Delete(KeyPair),
}

impl BatchOperation {
    pub fn partition_key(&self) -> &str {
        match self {
            Self::Insert(entity) => &entity.partition_key,
            Self::Delete(key) => &key.partition_key,
        }
    }

    pub fn key(&self) -> KeyPair {
        match self {
            Self::Insert(entity) => entity.key(),
            Self::Delete(key) => key.clone(),
        }
    }
}

/// Checks a batch is submittable: non-empty, bounded, single partition, and
/// touching each row at most once.
///
/// Returns the shared partition key.
pub fn validate_batch(operations: &[BatchOperation]) -> Result<&str> {
    let first = operations
        .first()
        .ok_or_else(|| StoreError::InvalidBatch("batch has no operations".to_string()))?;

    if operations.len() > MAX_BATCH_OPERATIONS {
        return Err(StoreError::InvalidBatch(format!(
            "batch has {} operations, limit is {MAX_BATCH_OPERATIONS}",
            operations.len()
        )));
    }

    let partition_key = first.partition_key();
    if let Some(other) = operations
        .iter()
        .find(|op| op.partition_key() != partition_key)
    {
        return Err(StoreError::InvalidBatch(format!(
            "batch spans partitions '{partition_key}' and '{}'",
            other.partition_key()
        )));
    }

    let mut seen = HashSet::with_capacity(operations.len());
    for op in operations {
        let key = op.key();
        if !seen.insert(key.row_key.clone()) {
            return Err(StoreError::InvalidBatch(format!(
                "batch touches {key} more than once"
            )));
        }
    }

    Ok(partition_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(pk: &str, rk: &str) -> BatchOperation {
        BatchOperation::Insert(TableEntity::new(KeyPair::new(pk, rk), Properties::new()))
    }

    #[test]
    fn test_validate_batch_single_partition() {
        let ops = vec![
            insert("u1", "a"),
            BatchOperation::Delete(KeyPair::new("u1", "b")),
        ];
        assert_eq!(validate_batch(&ops).unwrap(), "u1");
    }

    #[test]
    fn test_validate_batch_rejects_empty() {
        assert!(matches!(
            validate_batch(&[]),
            Err(StoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn test_validate_batch_rejects_mixed_partitions() {
        let ops = vec![insert("u1", "a"), insert("u2", "a")];
        let err = validate_batch(&ops).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid batch: batch spans partitions 'u1' and 'u2'"
        );
    }

    #[test]
    fn test_validate_batch_rejects_oversized() {
        let ops: Vec<_> = (0..=MAX_BATCH_OPERATIONS)
            .map(|i| insert("u1", &i.to_string()))
            .collect();
        assert!(matches!(
            validate_batch(&ops),
            Err(StoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn test_validate_batch_rejects_repeated_row() {
        let ops = vec![
            insert("u1", "a"),
            BatchOperation::Delete(KeyPair::new("u1", "a")),
        ];
        let err = validate_batch(&ops).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid batch: batch touches (u1, a) more than once"
        );
    }

    #[test]
    fn test_entity_key() {
        let entity = TableEntity::new(KeyPair::new("p", "r"), Properties::new());
        assert_eq!(entity.key(), KeyPair::new("p", "r"));
    }
}
