//! DynamoDB table store.
//!
//! One DynamoDB table per logical table, using `aws-sdk-dynamodb`. Batches
//! are sent as `TransactWriteItems`, which caps them at 100 operations.

mod conversions;
mod error;
mod store;

pub use store::DynamoDbTableStore;
