//! Declarative projection sets.
//!
//! A projection is one table holding a full copy of a record under a key derived
//! from the record. Create, update and delete iterate these tables instead of
//! spelling out each write, so adding a lookup path means adding one entry.

use crate::identity::{IdentityRole, IdentityUser};

use super::keys::{id_key, normalized_key, KeyPair};
use super::tables;

/// One table plus the rule deriving a record's key in it.
///
/// `key` returns `None` when the record has no value for the indexed
/// attribute; such a record has no row in that table.
pub struct Projection<T> {
    pub table: &'static str,
    pub key: fn(&T) -> Option<KeyPair>,
}

impl<T> Projection<T> {
    pub fn key_for(&self, record: &T) -> Option<KeyPair> {
        (self.key)(record)
    }

    /// The key `previous` occupied that `current` no longer does.
    pub fn stale_key(&self, previous: &T, current: &T) -> Option<KeyPair> {
        let old = self.key_for(previous)?;
        match self.key_for(current) {
            Some(new) if new == old => None,
            _ => Some(old),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn role_by_id(role: &IdentityRole) -> Option<KeyPair> {
    Some(id_key(&role.id))
}

fn role_by_name(role: &IdentityRole) -> Option<KeyPair> {
    non_empty(role.normalized_name.as_ref()).map(normalized_key)
}

fn user_by_id(user: &IdentityUser) -> Option<KeyPair> {
    Some(id_key(&user.id))
}

fn user_by_user_name(user: &IdentityUser) -> Option<KeyPair> {
    non_empty(user.normalized_user_name.as_ref()).map(normalized_key)
}

fn user_by_email(user: &IdentityUser) -> Option<KeyPair> {
    non_empty(user.normalized_email.as_ref()).map(normalized_key)
}

/// Projections of a role record. The id projection comes first.
pub const ROLE_PROJECTIONS: [Projection<IdentityRole>; 2] = [
    Projection {
        table: tables::ROLES_BY_ID,
        key: role_by_id,
    },
    Projection {
        table: tables::ROLES_BY_NAME,
        key: role_by_name,
    },
];

/// Projections of a user record. The id projection comes first.
pub const USER_PROJECTIONS: [Projection<IdentityUser>; 3] = [
    Projection {
        table: tables::USERS_BY_ID,
        key: user_by_id,
    },
    Projection {
        table: tables::USERS_BY_USER_NAME,
        key: user_by_user_name,
    },
    Projection {
        table: tables::USERS_BY_EMAIL,
        key: user_by_email,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> IdentityUser {
        IdentityUser::new("alice")
            .with_id("u1")
            .with_normalized_user_name("ALICE")
            .with_email("a@x.com", "A@X.COM")
    }

    #[test]
    fn test_user_projection_keys() {
        let user = alice();
        let keys: Vec<_> = USER_PROJECTIONS.iter().map(|p| p.key_for(&user)).collect();

        assert_eq!(
            keys,
            vec![
                Some(KeyPair::new("u1", "u1")),
                Some(KeyPair::new("ALICE", "ALICE")),
                Some(KeyPair::new("A@X.COM", "A@X.COM")),
            ]
        );
    }

    #[test]
    fn test_missing_email_has_no_projection() {
        let mut user = alice();
        user.normalized_email = None;
        assert!(USER_PROJECTIONS[2].key_for(&user).is_none());

        user.normalized_email = Some(String::new());
        assert!(USER_PROJECTIONS[2].key_for(&user).is_none());
    }

    #[test]
    fn test_stale_key_after_rename() {
        let previous = alice();
        let mut current = previous.clone();
        current.normalized_user_name = Some("ALICIA".to_string());

        assert_eq!(
            USER_PROJECTIONS[1].stale_key(&previous, &current),
            Some(KeyPair::new("ALICE", "ALICE"))
        );
        assert_eq!(USER_PROJECTIONS[0].stale_key(&previous, &current), None);
        assert_eq!(USER_PROJECTIONS[2].stale_key(&previous, &current), None);
    }

    #[test]
    fn test_stale_key_when_attribute_cleared() {
        let previous = IdentityRole::new("Admin").with_normalized_name("ADMIN");
        let mut current = previous.clone();
        current.normalized_name = None;

        assert_eq!(
            ROLE_PROJECTIONS[1].stale_key(&previous, &current),
            Some(KeyPair::new("ADMIN", "ADMIN"))
        );
    }
}
