//! DynamoDB table store implementation.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, Delete, KeySchemaElement, KeyType, Put,
    ScalarAttributeType, TableStatus, TransactWriteItem,
};
use aws_sdk_dynamodb::Client;
use tokio::sync::RwLock;

use idtables_core::storage::{
    validate_batch, BatchOperation, ContinuationToken, EntityPage, KeyPair, Result, StoreError,
    TableEntity, TableStore,
};

use super::conversions::{
    entity_to_item, item_to_entity, key_item, PARTITION_KEY_ATTR, ROW_KEY_ATTR,
};
use super::error::{
    map_connection_error, map_create_table_error, map_delete_item_error,
    map_describe_table_error, map_get_item_error, map_put_item_error, map_query_error,
    map_transact_write_error, TransactItemKind,
};
use crate::config::{Config, DEFAULT_PAGE_SIZE};

/// Polls while a freshly created table becomes active.
const TABLE_ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const TABLE_ACTIVE_MAX_POLLS: u32 = 60;

/// DynamoDB-based table store.
///
/// Each logical table is one DynamoDB table with key schema `PK` (hash) and
/// `SK` (range), billed on demand. Tables seen to exist are remembered so
/// `create_table_if_missing` costs a round trip only once per table.
pub struct DynamoDbTableStore {
    client: Client,
    page_size: i32,
    known_tables: RwLock<HashSet<String>>,
}

impl DynamoDbTableStore {
    /// Creates a store with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE as i32,
            known_tables: RwLock::new(HashSet::new()),
        }
    }

    /// Creates a store from configuration.
    ///
    /// Uses the AWS SDK default credential chain with the configured region
    /// and optional endpoint override.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()));
        if let Some(endpoint) = &config.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        if sdk_config.credentials_provider().is_none() {
            return Err(map_connection_error("no AWS credentials provider configured"));
        }

        tracing::info!(
            region = %config.aws_region,
            endpoint = config.aws_endpoint_url.as_deref().unwrap_or("default"),
            "Configured DynamoDB table store"
        );
        Ok(Self::new(Client::new(&sdk_config)).with_page_size(config.page_size))
    }

    /// Sets the query page limit. Values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = i32::try_from(page_size.max(1)).unwrap_or(i32::MAX);
        self
    }

    async fn table_status(&self, table: &str) -> Result<Option<TableStatus>> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(output) => Ok(output
                .table()
                .and_then(|t| t.table_status())
                .cloned()
                .or(Some(TableStatus::Active))),
            Err(err) => map_describe_table_error(err).map(|_| None),
        }
    }

    async fn create_table(&self, table: &str) -> Result<()> {
        let build_err = |e: aws_sdk_dynamodb::error::BuildError| StoreError::Backend(e.to_string());

        let result = self
            .client
            .create_table()
            .table_name(table)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(PARTITION_KEY_ATTR)
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(build_err)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ROW_KEY_ATTR)
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(build_err)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(PARTITION_KEY_ATTR)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(build_err)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ROW_KEY_ATTR)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(build_err)?,
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(table = %table, "Created DynamoDB table");
                Ok(())
            }
            Err(err) => map_create_table_error(err),
        }
    }

    async fn wait_until_active(&self, table: &str) -> Result<()> {
        for _ in 0..TABLE_ACTIVE_MAX_POLLS {
            if let Some(TableStatus::Active) = self.table_status(table).await? {
                return Ok(());
            }
            tokio::time::sleep(TABLE_ACTIVE_POLL_INTERVAL).await;
        }
        Err(StoreError::Backend(format!(
            "table {table} did not become active"
        )))
    }
}

fn transact_item(table: &str, op: BatchOperation) -> Result<(TransactWriteItem, TransactItemKind)> {
    let build_err = |e: aws_sdk_dynamodb::error::BuildError| StoreError::Backend(e.to_string());

    match op {
        BatchOperation::Insert(entity) => {
            let put = Put::builder()
                .table_name(table)
                .set_item(Some(entity_to_item(&entity)))
                .condition_expression("attribute_not_exists(PK)")
                .build()
                .map_err(build_err)?;
            Ok((
                TransactWriteItem::builder().put(put).build(),
                TransactItemKind::Insert(entity.key()),
            ))
        }
        BatchOperation::Delete(key) => {
            let delete = Delete::builder()
                .table_name(table)
                .set_key(Some(key_item(&key)))
                .condition_expression("attribute_exists(PK)")
                .build()
                .map_err(build_err)?;
            Ok((
                TransactWriteItem::builder().delete(delete).build(),
                TransactItemKind::Delete(key),
            ))
        }
    }
}

// ============================================================================
// TableStore implementation
// ============================================================================

#[async_trait]
impl TableStore for DynamoDbTableStore {
    async fn create_table_if_missing(&self, table: &str) -> Result<()> {
        if self.known_tables.read().await.contains(table) {
            return Ok(());
        }

        match self.table_status(table).await? {
            Some(TableStatus::Active) => {}
            Some(_) => self.wait_until_active(table).await?,
            None => {
                self.create_table(table).await?;
                self.wait_until_active(table).await?;
            }
        }

        self.known_tables.write().await.insert(table.to_string());
        Ok(())
    }

    async fn insert(&self, table: &str, entity: TableEntity) -> Result<()> {
        let key = entity.key();
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(entity_to_item(&entity)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| map_put_item_error(e, table, &key))?;

        Ok(())
    }

    async fn insert_or_replace(&self, table: &str, entity: TableEntity) -> Result<()> {
        let key = entity.key();
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(entity_to_item(&entity)))
            .send()
            .await
            .map_err(|e| map_put_item_error(e, table, &key))?;

        Ok(())
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<()> {
        let key = KeyPair::new(partition_key, row_key);
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(key_item(&key)))
            .condition_expression("attribute_exists(PK)")
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, table, &key))?;

        Ok(())
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key_item(&KeyPair::new(partition_key, row_key))))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_get_item_error(e, table))?;

        result.item.map(item_to_entity).transpose()
    }

    async fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<EntityPage> {
        let start_key =
            continuation.map(|token| key_item(&KeyPair::new(partition_key, token.as_str())));

        let result = self
            .client
            .query()
            .table_name(table)
            .key_condition_expression("PK = :pk")
            .expression_attribute_values(":pk", AttributeValue::S(partition_key.to_string()))
            .consistent_read(true)
            .limit(self.page_size)
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|e| map_query_error(e, table))?;

        let continuation = match result
            .last_evaluated_key
            .as_ref()
            .and_then(|key| key.get(ROW_KEY_ATTR))
        {
            Some(AttributeValue::S(row_key)) => Some(ContinuationToken::new(row_key)),
            _ => None,
        };

        let entities = result
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_to_entity)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntityPage {
            entities,
            continuation,
        })
    }

    async fn execute_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()> {
        validate_batch(&operations)?;

        let (items, kinds): (Vec<_>, Vec<_>) = operations
            .into_iter()
            .map(|op| transact_item(table, op))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| map_transact_write_error(e, table, &kinds))?;

        Ok(())
    }
}
