//! Logical table names.
//!
//! Each table is a flat partition/row-key space. Names are alphanumeric so they
//! are valid for every backend; deployments may prepend a prefix.

// ============================================================================
// Role tables
// ============================================================================

pub const ROLES_BY_ID: &str = "RolesById";
pub const ROLES_BY_NAME: &str = "RolesByName";
pub const ROLE_CLAIMS_BY_ROLE_ID: &str = "RoleClaimsByRoleId";

// ============================================================================
// User tables
// ============================================================================

pub const USERS_BY_ID: &str = "UsersById";
pub const USERS_BY_USER_NAME: &str = "UsersByUserName";
pub const USERS_BY_EMAIL: &str = "UsersByEmail";
pub const USERS_BY_LOGIN: &str = "UsersByLogin";
pub const USER_LOGINS_BY_USER_ID: &str = "UserLoginsByUserId";
pub const USER_CLAIMS_BY_USER_ID: &str = "UserClaimsByUserId";
pub const USERS_BY_CLAIM: &str = "UsersByClaim";
pub const USER_TOKENS_BY_USER_ID: &str = "UserTokensByUserId";

pub const ROLE_TABLES: [&str; 3] = [ROLES_BY_ID, ROLES_BY_NAME, ROLE_CLAIMS_BY_ROLE_ID];

pub const USER_TABLES: [&str; 8] = [
    USERS_BY_ID,
    USERS_BY_USER_NAME,
    USERS_BY_EMAIL,
    USERS_BY_LOGIN,
    USER_LOGINS_BY_USER_ID,
    USER_CLAIMS_BY_USER_ID,
    USERS_BY_CLAIM,
    USER_TOKENS_BY_USER_ID,
];

/// Every table the identity stores touch.
pub fn all_tables() -> impl Iterator<Item = &'static str> {
    ROLE_TABLES.into_iter().chain(USER_TABLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_are_unique_and_alphanumeric() {
        let names: Vec<_> = all_tables().collect();
        let unique: HashSet<_> = names.iter().collect();

        assert_eq!(names.len(), 11);
        assert_eq!(unique.len(), names.len());
        assert!(names
            .iter()
            .all(|n| n.chars().all(|c| c.is_ascii_alphanumeric())));
    }
}
