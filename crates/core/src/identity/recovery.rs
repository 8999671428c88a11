//! Two-factor recovery codes as a value type.
//!
//! The persisted form is a single `;`-joined string stored as a user token.
//! Codes are validated on construction so the delimiter can never appear
//! inside a code.

use std::fmt;

use thiserror::Error;

use crate::storage::StoreError;

/// Separator used in the persisted form.
pub const RECOVERY_CODE_DELIMITER: char = ';';

/// Errors that can occur when constructing a recovery code set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoveryCodeError {
    #[error("recovery code must not be empty")]
    Empty,
    #[error("recovery code contains the reserved delimiter ';': {0}")]
    ContainsDelimiter(String),
}

impl From<RecoveryCodeError> for StoreError {
    fn from(err: RecoveryCodeError) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

/// An ordered set of distinct one-time recovery codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryCodes(Vec<String>);

impl RecoveryCodes {
    /// Builds a code set, dropping duplicates while keeping first-seen order.
    pub fn new<I, S>(codes: I) -> Result<Self, RecoveryCodeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Vec::new();
        for code in codes {
            let code = code.into();
            if code.is_empty() {
                return Err(RecoveryCodeError::Empty);
            }
            if code.contains(RECOVERY_CODE_DELIMITER) {
                return Err(RecoveryCodeError::ContainsDelimiter(code));
            }
            if !set.contains(&code) {
                set.push(code);
            }
        }
        Ok(Self(set))
    }

    /// Parses the persisted form. Empty segments are ignored, so `""` is the empty set.
    pub fn parse(merged: &str) -> Self {
        let mut set: Vec<String> = Vec::new();
        for code in merged.split(RECOVERY_CODE_DELIMITER) {
            if !code.is_empty() && !set.iter().any(|c| c == code) {
                set.push(code.to_string());
            }
        }
        Self(set)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    /// Removes `code` from the set. Returns whether it was present.
    pub fn redeem(&mut self, code: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c != code);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The persisted `;`-joined form.
    pub fn to_merged(&self) -> String {
        let delimiter = RECOVERY_CODE_DELIMITER.to_string();
        self.0.join(delimiter.as_str())
    }
}

impl fmt::Display for RecoveryCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_merged())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_delimiter() {
        let result = RecoveryCodes::new(["abc", "d;e"]);
        assert_eq!(
            result,
            Err(RecoveryCodeError::ContainsDelimiter("d;e".to_string()))
        );
    }

    #[test]
    fn test_new_rejects_empty_code() {
        assert_eq!(RecoveryCodes::new([""]), Err(RecoveryCodeError::Empty));
    }

    #[test]
    fn test_new_drops_duplicates() {
        let codes = RecoveryCodes::new(["a", "b", "a"]).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes.to_merged(), "a;b");
    }

    #[test]
    fn test_parse_empty_string_is_empty_set() {
        let codes = RecoveryCodes::parse("");
        assert!(codes.is_empty());
        assert_eq!(codes.len(), 0);
    }

    #[test]
    fn test_parse_and_merge_preserve_order() {
        let codes = RecoveryCodes::parse("one;two;three");
        assert_eq!(codes.iter().collect::<Vec<_>>(), ["one", "two", "three"]);
        assert_eq!(codes.to_string(), "one;two;three");
    }

    #[test]
    fn test_merged_form_parses_back() {
        let codes = RecoveryCodes::new(["x1", "y2", "z3"]).unwrap();
        let merged = codes.to_merged();

        assert_eq!(merged.matches(RECOVERY_CODE_DELIMITER).count(), 2);
        assert_eq!(RecoveryCodes::parse(&merged), codes);
    }

    #[test]
    fn test_redeem_removes_once() {
        let mut codes = RecoveryCodes::parse("one;two");

        assert!(codes.redeem("one"));
        assert!(!codes.contains("one"));
        assert_eq!(codes.len(), 1);

        assert!(!codes.redeem("one"));
        assert_eq!(codes.len(), 1);
    }
}
