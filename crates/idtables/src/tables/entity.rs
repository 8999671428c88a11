//! Record <-> entity conversion.
//!
//! Records are serialized with serde into a flat JSON object that becomes the
//! entity's property bag. Keys travel separately and never appear as properties.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use idtables_core::storage::{KeyPair, Result, StoreError, TableEntity};

/// Serializes `item` into an entity stored under `key`.
///
/// Fails with `Serialization` unless the record serializes to a JSON object.
pub fn to_entity<T: Serialize + ?Sized>(item: &T, key: KeyPair) -> Result<TableEntity> {
    match serde_json::to_value(item).map_err(|e| StoreError::Serialization(e.to_string()))? {
        Value::Object(properties) => Ok(TableEntity::new(key, properties)),
        other => Err(StoreError::Serialization(format!(
            "record must serialize to an object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Deserializes an entity's properties back into a record.
pub fn from_entity<T: DeserializeOwned>(entity: TableEntity) -> Result<T> {
    serde_json::from_value(Value::Object(entity.properties)).map_err(|e| {
        StoreError::Serialization(format!(
            "entity ({}, {}): {e}",
            entity.partition_key, entity.row_key
        ))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtables_core::identity::{Claim, IdentityUser};

    #[test]
    fn test_user_entity_round_trip() {
        let user = IdentityUser::new("alice")
            .with_id("u1")
            .with_email("a@x.com", "A@X.COM");

        let entity = to_entity(&user, KeyPair::new("u1", "u1")).unwrap();
        assert_eq!(entity.partition_key, "u1");
        assert_eq!(entity.properties["userName"], "alice");

        let parsed: IdentityUser = from_entity(entity).unwrap();
        assert_eq!(parsed, user);
    }

    #[test]
    fn test_claim_entity_properties() {
        let entity =
            to_entity(&Claim::new("role", "admin"), KeyPair::new("u1", "roleadmin")).unwrap();
        assert_eq!(entity.properties["type"], "role");
        assert_eq!(entity.properties["value"], "admin");
    }

    #[test]
    fn test_scalar_record_is_rejected() {
        let err = to_entity("just a string", KeyPair::new("p", "r")).unwrap_err();
        assert_eq!(
            err,
            StoreError::Serialization("record must serialize to an object, got string".to_string())
        );
    }

    #[test]
    fn test_mismatched_properties_fail_deserialization() {
        let mut entity = to_entity(&Claim::new("a", "b"), KeyPair::new("p", "r")).unwrap();
        entity
            .properties
            .insert("accessFailedCount".to_string(), Value::String("many".to_string()));

        let result: Result<IdentityUser> = from_entity(entity);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
