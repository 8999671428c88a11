//! Role store.
//!
//! A role lives in two projections, `RolesById` and `RolesByName`, and owns a
//! claims partition in `RoleClaimsByRoleId` keyed by its id.

use async_trait::async_trait;

use idtables_core::identity::{Claim, IdentityRole, RoleClaimStore, RoleStore};
use idtables_core::storage::keys::{id_key, normalized_key, owner_claim_key};
use idtables_core::storage::{tables, Result, TableStore, ROLE_PROJECTIONS};

use super::projection::{
    delete_projections, ignore_missing, replace_projections, write_projections, WriteMode,
};
use crate::tables::TableAccess;

/// Role store over a [`TableStore`].
pub struct RoleTableStore<S> {
    access: TableAccess<S>,
}

impl<S> Clone for RoleTableStore<S> {
    fn clone(&self) -> Self {
        Self {
            access: self.access.clone(),
        }
    }
}

impl<S: TableStore> RoleTableStore<S> {
    pub fn new(access: TableAccess<S>) -> Self {
        Self { access }
    }

    pub fn access(&self) -> &TableAccess<S> {
        &self.access
    }
}

#[async_trait]
impl<S: TableStore> RoleStore for RoleTableStore<S> {
    async fn create_role(&self, role: &IdentityRole) -> Result<()> {
        write_projections(&self.access, &ROLE_PROJECTIONS, role, WriteMode::Insert).await?;
        tracing::debug!(role_id = %role.id, "Created role");
        Ok(())
    }

    async fn update_role(&self, role: &IdentityRole) -> Result<()> {
        let previous = self.find_role_by_id(&role.id).await?;
        replace_projections(&self.access, &ROLE_PROJECTIONS, previous.as_ref(), role).await
    }

    async fn delete_role(&self, role: &IdentityRole) -> Result<()> {
        delete_projections(&self.access, &ROLE_PROJECTIONS, role).await?;

        let claims = self.get_role_claims(role).await?;
        for claim in &claims {
            let key = owner_claim_key(&role.id, claim);
            ignore_missing(self.access.delete(tables::ROLE_CLAIMS_BY_ROLE_ID, &key).await)?;
        }

        tracing::debug!(role_id = %role.id, claims = claims.len(), "Deleted role");
        Ok(())
    }

    async fn find_role_by_id(&self, role_id: &str) -> Result<Option<IdentityRole>> {
        self.access.find(tables::ROLES_BY_ID, &id_key(role_id)).await
    }

    async fn find_role_by_name(&self, normalized_name: &str) -> Result<Option<IdentityRole>> {
        self.access
            .find(tables::ROLES_BY_NAME, &normalized_key(normalized_name))
            .await
    }
}

#[async_trait]
impl<S: TableStore> RoleClaimStore for RoleTableStore<S> {
    async fn get_role_claims(&self, role: &IdentityRole) -> Result<Vec<Claim>> {
        self.access
            .find_all_in_partition(tables::ROLE_CLAIMS_BY_ROLE_ID, &role.id)
            .collect_all()
            .await
    }

    async fn add_role_claim(&self, role: &IdentityRole, claim: &Claim) -> Result<()> {
        self.access
            .insert(
                tables::ROLE_CLAIMS_BY_ROLE_ID,
                claim,
                &owner_claim_key(&role.id, claim),
            )
            .await
    }

    async fn remove_role_claim(&self, role: &IdentityRole, claim: &Claim) -> Result<()> {
        self.access
            .delete(
                tables::ROLE_CLAIMS_BY_ROLE_ID,
                &owner_claim_key(&role.id, claim),
            )
            .await
    }
}
