//! SQLite schema definitions and SQL query constants.
//!
//! Pure data, no I/O.

/// SQL statement to create the backing tables.
pub const CREATE_TABLES: &str = r#"
-- Logical tables created through create_table_if_missing
CREATE TABLE IF NOT EXISTS table_registry (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

-- Rows of every logical table, properties as a JSON object
CREATE TABLE IF NOT EXISTS entities (
    table_name TEXT NOT NULL,
    partition_key TEXT NOT NULL,
    row_key TEXT NOT NULL,
    properties TEXT NOT NULL,
    PRIMARY KEY (table_name, partition_key, row_key)
);
"#;

// Registry queries
pub const REGISTER_TABLE: &str = r#"
INSERT OR IGNORE INTO table_registry (name, created_at)
VALUES (?1, ?2)
"#;

pub const SELECT_TABLE: &str = r#"
SELECT name
FROM table_registry
WHERE name = ?1
"#;

// Entity queries
pub const INSERT_ENTITY: &str = r#"
INSERT INTO entities (table_name, partition_key, row_key, properties)
VALUES (?1, ?2, ?3, ?4)
"#;

pub const UPSERT_ENTITY: &str = r#"
INSERT INTO entities (table_name, partition_key, row_key, properties)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (table_name, partition_key, row_key)
DO UPDATE SET properties = excluded.properties
"#;

pub const DELETE_ENTITY: &str = r#"
DELETE FROM entities
WHERE table_name = ?1 AND partition_key = ?2 AND row_key = ?3
"#;

pub const SELECT_ENTITY: &str = r#"
SELECT properties
FROM entities
WHERE table_name = ?1 AND partition_key = ?2 AND row_key = ?3
"#;

/// One page of a partition. `?3` is the exclusive start row key, NULL for the first page.
pub const SELECT_PARTITION_PAGE: &str = r#"
SELECT row_key, properties
FROM entities
WHERE table_name = ?1 AND partition_key = ?2 AND (?3 IS NULL OR row_key > ?3)
ORDER BY row_key ASC
LIMIT ?4
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_valid_sql() {
        assert!(CREATE_TABLES.contains("CREATE TABLE IF NOT EXISTS table_registry"));
        assert!(CREATE_TABLES.contains("CREATE TABLE IF NOT EXISTS entities"));
        assert!(CREATE_TABLES.contains("PRIMARY KEY (table_name, partition_key, row_key)"));
    }

    #[test]
    fn test_queries_contain_expected_keywords() {
        assert!(REGISTER_TABLE.contains("INSERT OR IGNORE"));
        assert!(UPSERT_ENTITY.contains("ON CONFLICT"));
        assert!(DELETE_ENTITY.contains("DELETE"));
        assert!(SELECT_ENTITY.contains("SELECT"));
        assert!(SELECT_PARTITION_PAGE.contains("ORDER BY row_key"));
        assert!(SELECT_PARTITION_PAGE.contains("LIMIT"));
    }
}
