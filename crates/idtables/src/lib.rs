//! Identity stores persisted as denormalized projections in a
//! partition/row-key table store.
//!
//! - [`tables`]: typed access to logical tables over any [`TableStore`]
//! - [`stores`]: the role and user stores
//! - [`storage`]: table store backends
//! - [`IdentityTables`]: both stores wired over one shared backend

pub mod config;
pub mod storage;
pub mod stores;
pub mod tables;

use std::sync::Arc;

use idtables_core::storage::{tables as table_names, Result, TableStore};

pub use config::{Backend, Config, ConfigError};
pub use stores::{RoleTableStore, UserTableStore};
pub use tables::TableAccess;

/// A role store and a user store sharing one backend and table prefix.
pub struct IdentityTables<S> {
    access: TableAccess<S>,
    roles: RoleTableStore<S>,
    users: UserTableStore<S>,
}

impl<S: TableStore> IdentityTables<S> {
    pub fn new(store: S) -> Self {
        Self::with_access(TableAccess::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self::with_access(TableAccess::from_shared(store))
    }

    pub fn with_access(access: TableAccess<S>) -> Self {
        Self {
            roles: RoleTableStore::new(access.clone()),
            users: UserTableStore::new(access.clone()),
            access,
        }
    }

    /// Rebuilds both stores with every table name prefixed by `prefix`.
    pub fn with_table_prefix(self, prefix: impl Into<String>) -> Self {
        Self::with_access(self.access.with_table_prefix(prefix))
    }

    pub fn roles(&self) -> &RoleTableStore<S> {
        &self.roles
    }

    pub fn users(&self) -> &UserTableStore<S> {
        &self.users
    }

    pub fn access(&self) -> &TableAccess<S> {
        &self.access
    }

    /// Creates all eleven logical tables up front.
    pub async fn ensure_tables(&self) -> Result<()> {
        self.access.ensure_tables(table_names::all_tables()).await
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::storage::inmemory::InMemoryTableStore;
    use idtables_core::identity::{
        Claim, IdentityRole, IdentityUser, RoleClaimStore, RoleStore, UserStore,
    };

    #[tokio::test]
    async fn test_ensure_tables_creates_every_table() {
        let tables = IdentityTables::new(InMemoryTableStore::new()).with_table_prefix("t");
        tables.ensure_tables().await.unwrap();

        let names = tables.access().store().table_names().await;
        assert_eq!(names.len(), 11);
        assert!(names.iter().all(|name| name.starts_with('t')));
        assert!(names.contains(&"tUsersById".to_string()));
    }

    #[tokio::test]
    async fn test_stores_share_the_backend() {
        let store = Arc::new(InMemoryTableStore::new());
        let tables = IdentityTables::from_shared(Arc::clone(&store));

        let role = IdentityRole::new("Admin").with_normalized_name("ADMIN");
        let user = IdentityUser::new("alice").with_normalized_user_name("ALICE");
        tables.roles().create_role(&role).await.unwrap();
        tables
            .roles()
            .add_role_claim(&role, &Claim::new("perm", "all"))
            .await
            .unwrap();
        tables.users().create_user(&user).await.unwrap();

        assert_eq!(store.row_count("RolesById").await, Some(1));
        assert_eq!(store.row_count("UsersById").await, Some(1));
        assert!(tables.users().find_user_by_name("ALICE").await.unwrap().is_some());
    }
}
