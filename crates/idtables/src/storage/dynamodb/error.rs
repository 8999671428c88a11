//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `idtables_core::storage`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use idtables_core::storage::{KeyPair, StoreError};

/// Cancellation reason code for a failed condition expression.
const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

fn throughput_exceeded() -> StoreError {
    StoreError::Backend("Throughput exceeded, please retry".to_string())
}

fn request_limit_exceeded() -> StoreError {
    StoreError::Backend("Request limit exceeded, please retry".to_string())
}

fn internal_server_error() -> StoreError {
    StoreError::Backend("DynamoDB internal server error".to_string())
}

/// Map a DescribeTable SDK error. `Ok(false)` means the table does not exist.
pub fn map_describe_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DescribeTableError, R>,
) -> Result<bool, StoreError> {
    match err.into_service_error() {
        DescribeTableError::ResourceNotFoundException(_) => Ok(false),
        DescribeTableError::InternalServerError(_) => Err(internal_server_error()),
        err => Err(StoreError::Backend(format!("DescribeTable failed: {:?}", err))),
    }
}

/// Map a CreateTable SDK error. `Ok(())` when a concurrent caller won the race.
pub fn map_create_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<CreateTableError, R>,
) -> Result<(), StoreError> {
    match err.into_service_error() {
        CreateTableError::ResourceInUseException(_) => Ok(()),
        CreateTableError::LimitExceededException(_) => {
            Err(StoreError::Backend("Table limit exceeded".to_string()))
        }
        CreateTableError::InternalServerError(_) => Err(internal_server_error()),
        err => Err(StoreError::Backend(format!("CreateTable failed: {:?}", err))),
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        GetItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        GetItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        GetItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::Backend(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        QueryError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        QueryError::RequestLimitExceeded(_) => request_limit_exceeded(),
        QueryError::InternalServerError(_) => internal_server_error(),
        err => StoreError::Backend(format!("Query failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to StoreError.
///
/// A failed `attribute_not_exists(PK)` condition means the row exists.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    table: &str,
    key: &KeyPair,
) -> StoreError {
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => StoreError::conflict(table, key),
        PutItemError::ResourceNotFoundException(_) => StoreError::TableNotFound(table.to_string()),
        PutItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        PutItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Backend("Item collection size limit exceeded".to_string())
        }
        PutItemError::TransactionConflictException(_) => {
            StoreError::Backend("Transaction conflict, please retry".to_string())
        }
        PutItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::Backend(format!("PutItem failed: {:?}", err)),
    }
}

/// Map a DeleteItem SDK error to StoreError.
///
/// A failed `attribute_exists(PK)` condition means the row is absent.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    table: &str,
    key: &KeyPair,
) -> StoreError {
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => StoreError::not_found(table, key),
        DeleteItemError::ResourceNotFoundException(_) => {
            StoreError::TableNotFound(table.to_string())
        }
        DeleteItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        DeleteItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        DeleteItemError::TransactionConflictException(_) => {
            StoreError::Backend("Transaction conflict, please retry".to_string())
        }
        DeleteItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::Backend(format!("DeleteItem failed: {:?}", err)),
    }
}

/// What one transaction item was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactItemKind {
    Insert(KeyPair),
    Delete(KeyPair),
}

/// Map a TransactWriteItems SDK error to StoreError.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
    table: &str,
    items: &[TransactItemKind],
) -> StoreError {
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(canceled) => {
            let codes: Vec<Option<&str>> = canceled
                .cancellation_reasons()
                .iter()
                .map(|reason| reason.code())
                .collect();
            map_cancellation_reasons(table, items, &codes)
        }
        TransactWriteItemsError::ResourceNotFoundException(_) => {
            StoreError::TableNotFound(table.to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            throughput_exceeded()
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => request_limit_exceeded(),
        TransactWriteItemsError::InternalServerError(_) => internal_server_error(),
        err => StoreError::Backend(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Picks the first item whose condition failed and reports it as the
/// insert `Conflict` or delete `NotFound` it stands for.
///
/// `codes` is positional: one entry per transaction item.
pub fn map_cancellation_reasons(
    table: &str,
    items: &[TransactItemKind],
    codes: &[Option<&str>],
) -> StoreError {
    let failed = codes
        .iter()
        .zip(items)
        .find(|(code, _)| **code == Some(CONDITIONAL_CHECK_FAILED));

    match failed {
        Some((_, TransactItemKind::Insert(key))) => StoreError::conflict(table, key),
        Some((_, TransactItemKind::Delete(key))) => StoreError::not_found(table, key),
        None => {
            let codes: Vec<&str> = codes.iter().map(|c| c.unwrap_or("None")).collect();
            StoreError::Backend(format!(
                "Transaction cancelled: [{}]",
                codes.join(", ")
            ))
        }
    }
}

/// Map a generic connection/config error to StoreError.
pub fn map_connection_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::ConnectionFailed(err.to_string())
}
