//! Key derivation functions.
//!
//! Pure functions mapping a logical attribute to the `(partition, row)` key pair
//! of one projection. All functions are sync and have no side effects.
//!
//! Composite keys are plain concatenations, kept byte-compatible with the
//! existing persisted layout. `claim_key` has no separator, so
//! `("ab", "c")` and `("a", "bc")` share a key.

use crate::identity::Claim;

/// Separator between login provider and token name in token row keys.
pub const TOKEN_KEY_SEPARATOR: &str = ":";

/// A `(partition, row)` key pair addressing exactly one entity in a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPair {
    pub partition_key: String,
    pub row_key: String,
}

impl KeyPair {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl std::fmt::Display for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

// ============================================================================
// Identity and name keys
// ============================================================================

/// Key for an id lookup.
///
/// Pattern: `(<id>, <id>)`
pub fn id_key(id: &str) -> KeyPair {
    KeyPair::new(id, id)
}

/// Key for a normalized user name, role name or email lookup.
///
/// Pattern: `(<normalized>, <normalized>)`
pub fn normalized_key(normalized: &str) -> KeyPair {
    KeyPair::new(normalized, normalized)
}

// ============================================================================
// Claim keys
// ============================================================================

/// Composite claim key.
///
/// Pattern: `<type><value>`
pub fn claim_key(claim: &Claim) -> String {
    format!("{}{}", claim.claim_type, claim.value)
}

/// Key for the "claims of an owner" projection.
///
/// Pattern: `(<owner_id>, <type><value>)`
pub fn owner_claim_key(owner_id: &str, claim: &Claim) -> KeyPair {
    KeyPair::new(owner_id, claim_key(claim))
}

/// Key for the inverse "owners of a claim" projection.
///
/// Pattern: `(<type><value>, <owner_id>)`
pub fn claim_owner_key(claim: &Claim, owner_id: &str) -> KeyPair {
    KeyPair::new(claim_key(claim), owner_id)
}

// ============================================================================
// Login keys
// ============================================================================

/// Key resolving an external login to its user.
///
/// Pattern: `(<login_provider>, <provider_key>)`
pub fn login_key(login_provider: &str, provider_key: &str) -> KeyPair {
    KeyPair::new(login_provider, provider_key)
}

/// Key for the "logins of a user" projection.
///
/// Pattern: `(<user_id>, <login_provider>)`
pub fn user_login_key(user_id: &str, login_provider: &str) -> KeyPair {
    KeyPair::new(user_id, login_provider)
}

// ============================================================================
// Token keys
// ============================================================================

/// Row key for a user token.
///
/// Pattern: `<login_provider>:<name>`
pub fn token_row_key(login_provider: &str, name: &str) -> String {
    format!("{login_provider}{TOKEN_KEY_SEPARATOR}{name}")
}

/// Key for a user token.
///
/// Pattern: `(<user_id>, <login_provider>:<name>)`
pub fn token_key(user_id: &str, login_provider: &str, name: &str) -> KeyPair {
    KeyPair::new(user_id, token_row_key(login_provider, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_key() {
        assert_eq!(id_key("u1"), KeyPair::new("u1", "u1"));
    }

    #[test]
    fn test_normalized_key() {
        assert_eq!(normalized_key("A@X.COM"), KeyPair::new("A@X.COM", "A@X.COM"));
    }

    #[test]
    fn test_claim_keys_are_inverse() {
        let claim = Claim::new("role", "admin");

        assert_eq!(claim_key(&claim), "roleadmin");
        assert_eq!(owner_claim_key("u1", &claim), KeyPair::new("u1", "roleadmin"));
        assert_eq!(claim_owner_key(&claim, "u1"), KeyPair::new("roleadmin", "u1"));
    }

    #[test]
    fn test_claim_key_collides_without_separator() {
        let left = Claim::new("ab", "c");
        let right = Claim::new("a", "bc");

        assert_eq!(claim_key(&left), claim_key(&right));
    }

    #[test]
    fn test_login_keys() {
        assert_eq!(login_key("google", "123"), KeyPair::new("google", "123"));
        assert_eq!(user_login_key("u1", "google"), KeyPair::new("u1", "google"));
    }

    #[test]
    fn test_token_key() {
        assert_eq!(token_row_key("google", "access"), "google:access");
        assert_eq!(
            token_key("u1", "google", "access"),
            KeyPair::new("u1", "google:access")
        );
    }

    #[test]
    fn test_key_pair_display() {
        assert_eq!(KeyPair::new("p", "r").to_string(), "(p, r)");
    }
}
