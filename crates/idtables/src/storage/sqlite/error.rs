//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `StoreError`.
//! Store-level failures raised inside a connection closure travel as
//! `tokio_rusqlite::Error::Other` and are unwrapped unchanged.

use idtables_core::storage::StoreError;

/// Wraps a rusqlite error for tokio_rusqlite closures.
pub fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// Carries a `StoreError` out of a tokio_rusqlite closure.
pub fn store_err(e: StoreError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(e))
}

/// True for primary-key and unique constraint violations.
pub fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Maps a rusqlite error to a StoreError.
///
/// # Error Mapping
///
/// - `SQLITE_CANTOPEN` → `StoreError::ConnectionFailed`
/// - All other errors → `StoreError::Backend`
fn map_rusqlite_error(err: &rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::CannotOpen =>
        {
            StoreError::ConnectionFailed(format!("Cannot open database: {err}"))
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a StoreError.
///
/// This is the main entry point for error mapping in async code.
pub fn map_tokio_rusqlite_error(err: tokio_rusqlite::Error) -> StoreError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => map_rusqlite_error(&rusqlite_err),
        tokio_rusqlite::Error::Close(_) | tokio_rusqlite::Error::ConnectionClosed => {
            StoreError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        tokio_rusqlite::Error::Other(inner) => match inner.downcast::<StoreError>() {
            Ok(store_err) => *store_err,
            Err(other) => StoreError::Backend(other.to_string()),
        },
        other => StoreError::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtables_core::storage::KeyPair;
    use rusqlite::ffi;

    fn constraint(extended_code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code,
            },
            None,
        )
    }

    #[test]
    fn test_primary_key_violation_is_duplicate() {
        assert!(is_duplicate_key(&constraint(ffi::SQLITE_CONSTRAINT_PRIMARYKEY)));
        assert!(is_duplicate_key(&constraint(ffi::SQLITE_CONSTRAINT_UNIQUE)));
        assert!(!is_duplicate_key(&constraint(ffi::SQLITE_CONSTRAINT_NOTNULL)));
    }

    #[test]
    fn test_store_error_passes_through() {
        let original = StoreError::not_found("UsersById", &KeyPair::new("u1", "u1"));
        let result = map_tokio_rusqlite_error(store_err(original.clone()));
        assert_eq!(result, original);
    }

    #[test]
    fn test_other_error_maps_to_backend() {
        let err = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));
        assert_eq!(
            map_tokio_rusqlite_error(err),
            StoreError::Backend("test error".to_string())
        );
    }

    #[test]
    fn test_cannot_open_maps_to_connection_failed() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::CannotOpen,
                extended_code: ffi::SQLITE_CANTOPEN,
            },
            None,
        );
        let result = map_tokio_rusqlite_error(wrap_err(err));
        assert!(matches!(result, StoreError::ConnectionFailed(_)));
    }
}
