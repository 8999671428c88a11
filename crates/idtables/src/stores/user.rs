//! User store.
//!
//! A user lives in three projections (`UsersById`, `UsersByUserName`,
//! `UsersByEmail`) and owns three satellite partitions keyed by its id:
//! logins, claims and tokens. Two inverse indexes hold full user snapshots so
//! login and claim lookups resolve with one point read or one partition scan:
//!
//! | Table                | Partition          | Row                | Record         |
//! |----------------------|--------------------|--------------------|----------------|
//! | `UsersByLogin`       | login provider     | provider key       | `IdentityUser` |
//! | `UserLoginsByUserId` | user id            | login provider     | `UserLoginInfo`|
//! | `UserClaimsByUserId` | user id            | claim type + value | `Claim`        |
//! | `UsersByClaim`       | claim type + value | user id            | `IdentityUser` |
//! | `UserTokensByUserId` | user id            | provider:name      | `UserToken`    |
//!
//! Snapshot rows are refreshed by `update_user`.

use async_trait::async_trait;

use idtables_core::identity::{
    Claim, IdentityUser, UserAuthenticationTokenStore, UserAuthenticatorKeyStore,
    UserClaimStore, UserEmailStore, UserLockoutStore, UserLoginInfo, UserLoginStore,
    UserPasswordStore, UserPhoneNumberStore, UserSecurityStampStore, UserStore, UserToken,
    UserTwoFactorRecoveryCodeStore, UserTwoFactorStore,
};
use idtables_core::storage::keys::{
    claim_key, claim_owner_key, id_key, login_key, normalized_key, owner_claim_key, token_key,
    user_login_key,
};
use idtables_core::storage::{
    tables, Result, StoreError, TableStore, MAX_BATCH_OPERATIONS, USER_PROJECTIONS,
};

use super::projection::{
    delete_projections, ignore_missing, replace_projections, write_projections, WriteMode,
};
use crate::tables::TableAccess;

/// User store over a [`TableStore`].
///
/// Implements every user capability trait. None of the multi-row operations
/// are transactional across tables: a failure midway leaves the rows written
/// so far in place and is returned to the caller.
pub struct UserTableStore<S> {
    access: TableAccess<S>,
}

impl<S> Clone for UserTableStore<S> {
    fn clone(&self) -> Self {
        Self {
            access: self.access.clone(),
        }
    }
}

impl<S: TableStore> UserTableStore<S> {
    pub fn new(access: TableAccess<S>) -> Self {
        Self { access }
    }

    pub fn access(&self) -> &TableAccess<S> {
        &self.access
    }

    async fn user_tokens(&self, user: &IdentityUser) -> Result<Vec<UserToken>> {
        self.access
            .find_all_in_partition(tables::USER_TOKENS_BY_USER_ID, &user.id)
            .collect_all()
            .await
    }

    /// Rewrites the login and claim snapshot rows that embed `user`.
    async fn refresh_snapshots(&self, user: &IdentityUser) -> Result<()> {
        let logins = self.get_logins(user).await?;
        for login in &logins {
            self.access
                .insert_or_replace(
                    tables::USERS_BY_LOGIN,
                    user,
                    &login_key(&login.login_provider, &login.provider_key),
                )
                .await?;
        }

        let claims = self.get_claims(user).await?;
        for claim in &claims {
            self.access
                .insert_or_replace(tables::USERS_BY_CLAIM, user, &claim_owner_key(claim, &user.id))
                .await?;
        }

        tracing::debug!(
            user_id = %user.id,
            logins = logins.len(),
            claims = claims.len(),
            "Refreshed user snapshots"
        );
        Ok(())
    }

    /// Removes every satellite row of `user`, tolerating rows already gone.
    async fn remove_satellites(&self, user: &IdentityUser) -> Result<()> {
        for login in self.get_logins(user).await? {
            ignore_missing(
                self.access
                    .delete(
                        tables::USERS_BY_LOGIN,
                        &login_key(&login.login_provider, &login.provider_key),
                    )
                    .await,
            )?;
            ignore_missing(
                self.access
                    .delete(
                        tables::USER_LOGINS_BY_USER_ID,
                        &user_login_key(&user.id, &login.login_provider),
                    )
                    .await,
            )?;
        }

        for claim in self.get_claims(user).await? {
            ignore_missing(
                self.access
                    .delete(tables::USERS_BY_CLAIM, &claim_owner_key(&claim, &user.id))
                    .await,
            )?;
            ignore_missing(
                self.access
                    .delete(tables::USER_CLAIMS_BY_USER_ID, &owner_claim_key(&user.id, &claim))
                    .await,
            )?;
        }

        for token in self.user_tokens(user).await? {
            ignore_missing(
                self.access
                    .delete(
                        tables::USER_TOKENS_BY_USER_ID,
                        &token_key(&user.id, &token.login_provider, &token.name),
                    )
                    .await,
            )?;
        }

        Ok(())
    }
}

// ============================================================================
// Account lifecycle
// ============================================================================

#[async_trait]
impl<S: TableStore> UserStore for UserTableStore<S> {
    async fn create_user(&self, user: &IdentityUser) -> Result<()> {
        write_projections(&self.access, &USER_PROJECTIONS, user, WriteMode::Insert).await?;
        tracing::debug!(user_id = %user.id, "Created user");
        Ok(())
    }

    async fn update_user(&self, user: &IdentityUser) -> Result<()> {
        let previous = self.find_user_by_id(&user.id).await?;
        replace_projections(&self.access, &USER_PROJECTIONS, previous.as_ref(), user).await?;
        self.refresh_snapshots(user).await
    }

    async fn delete_user(&self, user: &IdentityUser) -> Result<()> {
        delete_projections(&self.access, &USER_PROJECTIONS, user).await?;
        self.remove_satellites(user).await?;
        tracing::debug!(user_id = %user.id, "Deleted user");
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<IdentityUser>> {
        self.access.find(tables::USERS_BY_ID, &id_key(user_id)).await
    }

    async fn find_user_by_name(&self, normalized_user_name: &str) -> Result<Option<IdentityUser>> {
        self.access
            .find(tables::USERS_BY_USER_NAME, &normalized_key(normalized_user_name))
            .await
    }
}

#[async_trait]
impl<S: TableStore> UserEmailStore for UserTableStore<S> {
    async fn find_user_by_email(&self, normalized_email: &str) -> Result<Option<IdentityUser>> {
        self.access
            .find(tables::USERS_BY_EMAIL, &normalized_key(normalized_email))
            .await
    }
}

impl<S: TableStore> UserPasswordStore for UserTableStore<S> {}
impl<S: TableStore> UserSecurityStampStore for UserTableStore<S> {}
impl<S: TableStore> UserLockoutStore for UserTableStore<S> {}
impl<S: TableStore> UserPhoneNumberStore for UserTableStore<S> {}
impl<S: TableStore> UserTwoFactorStore for UserTableStore<S> {}

// ============================================================================
// Logins
// ============================================================================

#[async_trait]
impl<S: TableStore> UserLoginStore for UserTableStore<S> {
    /// The forward row is written first so a login bound to another user
    /// fails before anything is written. If the per-user row then fails, the
    /// forward row is removed again.
    async fn add_login(&self, user: &IdentityUser, login: &UserLoginInfo) -> Result<()> {
        let forward = login_key(&login.login_provider, &login.provider_key);
        self.access.insert(tables::USERS_BY_LOGIN, user, &forward).await?;

        let result = self
            .access
            .insert(
                tables::USER_LOGINS_BY_USER_ID,
                login,
                &user_login_key(&user.id, &login.login_provider),
            )
            .await;

        if let Err(err) = result {
            let undo = self.access.delete(tables::USERS_BY_LOGIN, &forward).await;
            if let Err(undo) = ignore_missing(undo) {
                tracing::warn!(
                    user_id = %user.id,
                    key = %forward,
                    error = %undo,
                    "Failed to roll back login index row"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Fails with `NotFound` unless `user` holds exactly this login.
    async fn remove_login(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        provider_key: &str,
    ) -> Result<()> {
        let own = user_login_key(&user.id, login_provider);
        let bound = self
            .access
            .find::<UserLoginInfo>(tables::USER_LOGINS_BY_USER_ID, &own)
            .await?
            .is_some_and(|login| login.provider_key == provider_key);
        if !bound {
            return Err(StoreError::not_found(
                self.access.table_name(tables::USER_LOGINS_BY_USER_ID),
                &own,
            ));
        }

        let forward = login_key(login_provider, provider_key);
        let owner = self
            .access
            .find::<IdentityUser>(tables::USERS_BY_LOGIN, &forward)
            .await?;
        if owner.is_some_and(|owner| owner.id != user.id) {
            return Err(StoreError::not_found(
                self.access.table_name(tables::USERS_BY_LOGIN),
                &forward,
            ));
        }

        self.access.delete(tables::USER_LOGINS_BY_USER_ID, &own).await?;
        ignore_missing(self.access.delete(tables::USERS_BY_LOGIN, &forward).await)
    }

    async fn get_logins(&self, user: &IdentityUser) -> Result<Vec<UserLoginInfo>> {
        self.access
            .find_all_in_partition(tables::USER_LOGINS_BY_USER_ID, &user.id)
            .collect_all()
            .await
    }

    async fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> Result<Option<IdentityUser>> {
        self.access
            .find(tables::USERS_BY_LOGIN, &login_key(login_provider, provider_key))
            .await
    }
}

// ============================================================================
// Claims
// ============================================================================

#[async_trait]
impl<S: TableStore> UserClaimStore for UserTableStore<S> {
    async fn get_claims(&self, user: &IdentityUser) -> Result<Vec<Claim>> {
        self.access
            .find_all_in_partition(tables::USER_CLAIMS_BY_USER_ID, &user.id)
            .collect_all()
            .await
    }

    /// Each chunk of up to 100 claims lands atomically in the user's claims
    /// partition. The inverse rows share no partition and are written one by one.
    async fn add_claims(&self, user: &IdentityUser, claims: &[Claim]) -> Result<()> {
        for chunk in claims.chunks(MAX_BATCH_OPERATIONS) {
            self.access
                .insert_batch(
                    tables::USER_CLAIMS_BY_USER_ID,
                    chunk,
                    |_| user.id.clone(),
                    claim_key,
                )
                .await?;
        }

        for claim in claims {
            self.access
                .insert(tables::USERS_BY_CLAIM, user, &claim_owner_key(claim, &user.id))
                .await?;
        }
        Ok(())
    }

    async fn replace_claim(
        &self,
        user: &IdentityUser,
        claim: &Claim,
        new_claim: &Claim,
    ) -> Result<()> {
        let old_key = owner_claim_key(&user.id, claim);
        if self
            .access
            .find::<Claim>(tables::USER_CLAIMS_BY_USER_ID, &old_key)
            .await?
            .is_some()
        {
            self.access
                .delete(tables::USER_CLAIMS_BY_USER_ID, &old_key)
                .await?;
        }

        let old_inverse = claim_owner_key(claim, &user.id);
        if self
            .access
            .find::<IdentityUser>(tables::USERS_BY_CLAIM, &old_inverse)
            .await?
            .is_some()
        {
            self.access.delete(tables::USERS_BY_CLAIM, &old_inverse).await?;
        }

        self.access
            .insert_or_replace(
                tables::USER_CLAIMS_BY_USER_ID,
                new_claim,
                &owner_claim_key(&user.id, new_claim),
            )
            .await?;
        self.access
            .insert_or_replace(
                tables::USERS_BY_CLAIM,
                user,
                &claim_owner_key(new_claim, &user.id),
            )
            .await
    }

    async fn remove_claims(&self, user: &IdentityUser, claims: &[Claim]) -> Result<()> {
        for chunk in claims.chunks(MAX_BATCH_OPERATIONS) {
            self.access
                .delete_batch(tables::USER_CLAIMS_BY_USER_ID, chunk, &user.id, claim_key)
                .await?;
        }

        for claim in claims {
            self.access
                .delete(tables::USERS_BY_CLAIM, &claim_owner_key(claim, &user.id))
                .await?;
        }
        Ok(())
    }

    async fn get_users_for_claim(&self, claim: &Claim) -> Result<Vec<IdentityUser>> {
        self.access
            .find_all_in_partition(tables::USERS_BY_CLAIM, &claim_key(claim))
            .collect_all()
            .await
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[async_trait]
impl<S: TableStore> UserAuthenticationTokenStore for UserTableStore<S> {
    async fn set_token(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        name: &str,
        value: &str,
    ) -> Result<()> {
        let token = UserToken {
            login_provider: login_provider.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        };
        self.access
            .insert_or_replace(
                tables::USER_TOKENS_BY_USER_ID,
                &token,
                &token_key(&user.id, login_provider, name),
            )
            .await
    }

    async fn remove_token(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        name: &str,
    ) -> Result<()> {
        self.access
            .delete(
                tables::USER_TOKENS_BY_USER_ID,
                &token_key(&user.id, login_provider, name),
            )
            .await
    }

    async fn get_token(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        name: &str,
    ) -> Result<Option<String>> {
        let token: Option<UserToken> = self
            .access
            .find(
                tables::USER_TOKENS_BY_USER_ID,
                &token_key(&user.id, login_provider, name),
            )
            .await?;
        Ok(token.map(|t| t.value))
    }
}

impl<S: TableStore> UserAuthenticatorKeyStore for UserTableStore<S> {}
impl<S: TableStore> UserTwoFactorRecoveryCodeStore for UserTableStore<S> {}
