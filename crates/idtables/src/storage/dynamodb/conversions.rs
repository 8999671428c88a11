//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and
//! table entities. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Number, Value};

use idtables_core::storage::{KeyPair, Properties, Result, StoreError, TableEntity};

/// Hash key attribute of every table.
pub const PARTITION_KEY_ATTR: &str = "PK";
/// Range key attribute of every table.
pub const ROW_KEY_ATTR: &str = "SK";

pub type Item = HashMap<String, AttributeValue>;

// ============================================================================
// JSON values
// ============================================================================

/// Convert a JSON value to a DynamoDB attribute.
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute back to JSON.
///
/// Binary and set attributes are never written by this store and are rejected.
pub fn attribute_to_json(name: &str, attribute: &AttributeValue) -> Result<Value> {
    Ok(match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(n.parse::<Number>().map_err(|_| {
            StoreError::InvalidData(format!("attribute {name} holds a malformed number: {n}"))
        })?),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(|v| attribute_to_json(name, v))
                .collect::<Result<_>>()?,
        ),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), attribute_to_json(k, v)?)))
                .collect::<Result<_>>()?,
        ),
        other => {
            return Err(StoreError::InvalidData(format!(
                "attribute {name} has unsupported type: {other:?}"
            )))
        }
    })
}

// ============================================================================
// Entities
// ============================================================================

/// DynamoDB key of a row.
pub fn key_item(key: &KeyPair) -> Item {
    HashMap::from([
        (
            PARTITION_KEY_ATTR.to_string(),
            AttributeValue::S(key.partition_key.clone()),
        ),
        (
            ROW_KEY_ATTR.to_string(),
            AttributeValue::S(key.row_key.clone()),
        ),
    ])
}

/// Convert an entity to a DynamoDB item. Key attributes override any
/// property with the same name.
pub fn entity_to_item(entity: &TableEntity) -> Item {
    let mut item: Item = entity
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), json_to_attribute(v)))
        .collect();
    item.extend(key_item(&entity.key()));
    item
}

/// Convert a DynamoDB item to an entity.
pub fn item_to_entity(mut item: Item) -> Result<TableEntity> {
    let partition_key = take_key(&mut item, PARTITION_KEY_ATTR)?;
    let row_key = take_key(&mut item, ROW_KEY_ATTR)?;

    let properties = item
        .iter()
        .map(|(k, v)| Ok((k.clone(), attribute_to_json(k, v)?)))
        .collect::<Result<Properties>>()?;

    Ok(TableEntity::new(KeyPair::new(partition_key, row_key), properties))
}

fn take_key(item: &mut Item, name: &str) -> Result<String> {
    match item.remove(name) {
        Some(AttributeValue::S(s)) => Ok(s),
        Some(_) => Err(StoreError::InvalidData(format!(
            "key attribute {name} is not a string"
        ))),
        None => Err(StoreError::InvalidData(format!(
            "item has no {name} attribute"
        ))),
    }
}
