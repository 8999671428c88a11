//! Narrow store capabilities for identity records.
//!
//! Each trait is one capability group; a backend implements the groups it
//! supports. Field accessors are default methods since they never touch
//! storage, and mutations through them are only persisted by the next
//! `update_*` call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::Result;

use super::{Claim, IdentityRole, IdentityUser, RecoveryCodes, UserLoginInfo};

/// Login provider under which the store files its own tokens.
///
/// Brackets keep it distinct from any real external provider name.
pub const INTERNAL_LOGIN_PROVIDER: &str = "[AspNetUserStore]";
pub const AUTHENTICATOR_KEY_TOKEN_NAME: &str = "AuthenticatorKey";
pub const RECOVERY_CODES_TOKEN_NAME: &str = "RecoveryCodes";

// ============================================================================
// Roles
// ============================================================================

/// Role persistence and lookup.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Writes every projection of a new role.
    async fn create_role(&self, role: &IdentityRole) -> Result<()>;

    /// Rewrites every projection of an existing role.
    async fn update_role(&self, role: &IdentityRole) -> Result<()>;

    /// Removes every projection of a role.
    async fn delete_role(&self, role: &IdentityRole) -> Result<()>;

    async fn find_role_by_id(&self, role_id: &str) -> Result<Option<IdentityRole>>;

    async fn find_role_by_name(&self, normalized_name: &str) -> Result<Option<IdentityRole>>;

    fn role_id<'a>(&self, role: &'a IdentityRole) -> &'a str {
        &role.id
    }

    fn role_name<'a>(&self, role: &'a IdentityRole) -> Option<&'a str> {
        role.name.as_deref()
    }

    fn set_role_name(&self, role: &mut IdentityRole, name: Option<String>) {
        role.name = name;
    }

    fn normalized_role_name<'a>(&self, role: &'a IdentityRole) -> Option<&'a str> {
        role.normalized_name.as_deref()
    }

    fn set_normalized_role_name(&self, role: &mut IdentityRole, normalized_name: Option<String>) {
        role.normalized_name = normalized_name;
    }
}

/// Claims attached to roles.
#[async_trait]
pub trait RoleClaimStore: RoleStore {
    async fn get_role_claims(&self, role: &IdentityRole) -> Result<Vec<Claim>>;

    /// Fails with `Conflict` if the role already has this claim.
    async fn add_role_claim(&self, role: &IdentityRole, claim: &Claim) -> Result<()>;

    /// Fails with `NotFound` if the role does not have this claim.
    async fn remove_role_claim(&self, role: &IdentityRole, claim: &Claim) -> Result<()>;
}

// ============================================================================
// Users
// ============================================================================

/// User persistence and lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Writes every projection of a new user.
    async fn create_user(&self, user: &IdentityUser) -> Result<()>;

    /// Rewrites every projection of an existing user.
    async fn update_user(&self, user: &IdentityUser) -> Result<()>;

    /// Removes every projection of a user.
    async fn delete_user(&self, user: &IdentityUser) -> Result<()>;

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<IdentityUser>>;

    async fn find_user_by_name(&self, normalized_user_name: &str) -> Result<Option<IdentityUser>>;

    fn user_id<'a>(&self, user: &'a IdentityUser) -> &'a str {
        &user.id
    }

    fn user_name<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.user_name.as_deref()
    }

    fn set_user_name(&self, user: &mut IdentityUser, user_name: Option<String>) {
        user.user_name = user_name;
    }

    fn normalized_user_name<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.normalized_user_name.as_deref()
    }

    fn set_normalized_user_name(&self, user: &mut IdentityUser, normalized: Option<String>) {
        user.normalized_user_name = normalized;
    }
}

/// External login bindings.
#[async_trait]
pub trait UserLoginStore: UserStore {
    async fn add_login(&self, user: &IdentityUser, login: &UserLoginInfo) -> Result<()>;

    async fn remove_login(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        provider_key: &str,
    ) -> Result<()>;

    async fn get_logins(&self, user: &IdentityUser) -> Result<Vec<UserLoginInfo>>;

    async fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> Result<Option<IdentityUser>>;
}

/// Claims attached to users, indexed both ways.
#[async_trait]
pub trait UserClaimStore: UserStore {
    async fn get_claims(&self, user: &IdentityUser) -> Result<Vec<Claim>>;

    async fn add_claims(&self, user: &IdentityUser, claims: &[Claim]) -> Result<()>;

    async fn replace_claim(
        &self,
        user: &IdentityUser,
        claim: &Claim,
        new_claim: &Claim,
    ) -> Result<()>;

    async fn remove_claims(&self, user: &IdentityUser, claims: &[Claim]) -> Result<()>;

    async fn get_users_for_claim(&self, claim: &Claim) -> Result<Vec<IdentityUser>>;
}

pub trait UserPasswordStore: UserStore {
    fn set_password_hash(&self, user: &mut IdentityUser, password_hash: Option<String>) {
        user.password_hash = password_hash;
    }

    fn password_hash<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.password_hash.as_deref()
    }

    fn has_password(&self, user: &IdentityUser) -> bool {
        user.password_hash.is_some()
    }
}

pub trait UserSecurityStampStore: UserStore {
    fn set_security_stamp(&self, user: &mut IdentityUser, stamp: String) {
        user.security_stamp = Some(stamp);
    }

    fn security_stamp<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.security_stamp.as_deref()
    }
}

#[async_trait]
pub trait UserEmailStore: UserStore {
    async fn find_user_by_email(&self, normalized_email: &str) -> Result<Option<IdentityUser>>;

    fn email<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.email.as_deref()
    }

    fn set_email(&self, user: &mut IdentityUser, email: Option<String>) {
        user.email = email;
    }

    fn email_confirmed(&self, user: &IdentityUser) -> bool {
        user.email_confirmed
    }

    fn set_email_confirmed(&self, user: &mut IdentityUser, confirmed: bool) {
        user.email_confirmed = confirmed;
    }

    fn normalized_email<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.normalized_email.as_deref()
    }

    fn set_normalized_email(&self, user: &mut IdentityUser, normalized_email: Option<String>) {
        user.normalized_email = normalized_email;
    }
}

/// Lockout bookkeeping. Counters change the in-memory record only.
pub trait UserLockoutStore: UserStore {
    fn lockout_end(&self, user: &IdentityUser) -> Option<DateTime<Utc>> {
        user.lockout_end
    }

    fn set_lockout_end(&self, user: &mut IdentityUser, lockout_end: Option<DateTime<Utc>>) {
        user.lockout_end = lockout_end;
    }

    /// Increments and returns the failed-access count.
    fn increment_access_failed_count(&self, user: &mut IdentityUser) -> u32 {
        user.access_failed_count = user.access_failed_count.saturating_add(1);
        user.access_failed_count
    }

    fn reset_access_failed_count(&self, user: &mut IdentityUser) {
        user.access_failed_count = 0;
    }

    fn access_failed_count(&self, user: &IdentityUser) -> u32 {
        user.access_failed_count
    }

    fn lockout_enabled(&self, user: &IdentityUser) -> bool {
        user.lockout_enabled
    }

    fn set_lockout_enabled(&self, user: &mut IdentityUser, enabled: bool) {
        user.lockout_enabled = enabled;
    }
}

pub trait UserPhoneNumberStore: UserStore {
    fn phone_number<'a>(&self, user: &'a IdentityUser) -> Option<&'a str> {
        user.phone_number.as_deref()
    }

    fn set_phone_number(&self, user: &mut IdentityUser, phone_number: Option<String>) {
        user.phone_number = phone_number;
    }

    fn phone_number_confirmed(&self, user: &IdentityUser) -> bool {
        user.phone_number_confirmed
    }

    fn set_phone_number_confirmed(&self, user: &mut IdentityUser, confirmed: bool) {
        user.phone_number_confirmed = confirmed;
    }
}

pub trait UserTwoFactorStore: UserStore {
    fn two_factor_enabled(&self, user: &IdentityUser) -> bool {
        user.two_factor_enabled
    }

    fn set_two_factor_enabled(&self, user: &mut IdentityUser, enabled: bool) {
        user.two_factor_enabled = enabled;
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// One opaque value per `(login_provider, name)` slot per user.
#[async_trait]
pub trait UserAuthenticationTokenStore: UserStore {
    /// Upserts the token value.
    async fn set_token(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        name: &str,
        value: &str,
    ) -> Result<()>;

    /// Fails with `NotFound` if the slot is empty.
    async fn remove_token(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        name: &str,
    ) -> Result<()>;

    async fn get_token(
        &self,
        user: &IdentityUser,
        login_provider: &str,
        name: &str,
    ) -> Result<Option<String>>;
}

/// Authenticator key kept as a reserved token.
#[async_trait]
pub trait UserAuthenticatorKeyStore: UserAuthenticationTokenStore {
    async fn set_authenticator_key(&self, user: &IdentityUser, key: &str) -> Result<()> {
        self.set_token(
            user,
            INTERNAL_LOGIN_PROVIDER,
            AUTHENTICATOR_KEY_TOKEN_NAME,
            key,
        )
        .await
    }

    async fn get_authenticator_key(&self, user: &IdentityUser) -> Result<Option<String>> {
        self.get_token(user, INTERNAL_LOGIN_PROVIDER, AUTHENTICATOR_KEY_TOKEN_NAME)
            .await
    }
}

/// Recovery codes kept as one reserved token holding the merged code string.
#[async_trait]
pub trait UserTwoFactorRecoveryCodeStore: UserAuthenticationTokenStore {
    async fn replace_codes(&self, user: &IdentityUser, codes: &RecoveryCodes) -> Result<()> {
        self.set_token(
            user,
            INTERNAL_LOGIN_PROVIDER,
            RECOVERY_CODES_TOKEN_NAME,
            &codes.to_merged(),
        )
        .await
    }

    /// Consumes `code` if present. Returns whether it was.
    async fn redeem_code(&self, user: &IdentityUser, code: &str) -> Result<bool> {
        let mut codes = self.recovery_codes(user).await?;
        if !codes.redeem(code) {
            return Ok(false);
        }
        self.replace_codes(user, &codes).await?;
        Ok(true)
    }

    async fn count_codes(&self, user: &IdentityUser) -> Result<usize> {
        Ok(self.recovery_codes(user).await?.len())
    }

    /// The stored code set; empty if none was ever set.
    async fn recovery_codes(&self, user: &IdentityUser) -> Result<RecoveryCodes> {
        let merged = self
            .get_token(user, INTERNAL_LOGIN_PROVIDER, RECOVERY_CODES_TOKEN_NAME)
            .await?;
        Ok(RecoveryCodes::parse(merged.as_deref().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Token-only store used to exercise the default methods.
    #[derive(Default)]
    struct TokenMap {
        tokens: Mutex<HashMap<(String, String, String), String>>,
    }

    fn slot(user: &IdentityUser, provider: &str, name: &str) -> (String, String, String) {
        (user.id.clone(), provider.to_string(), name.to_string())
    }

    #[async_trait]
    impl UserStore for TokenMap {
        async fn create_user(&self, _user: &IdentityUser) -> Result<()> {
            Ok(())
        }
        async fn update_user(&self, _user: &IdentityUser) -> Result<()> {
            Ok(())
        }
        async fn delete_user(&self, _user: &IdentityUser) -> Result<()> {
            Ok(())
        }
        async fn find_user_by_id(&self, _user_id: &str) -> Result<Option<IdentityUser>> {
            Ok(None)
        }
        async fn find_user_by_name(&self, _name: &str) -> Result<Option<IdentityUser>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl UserAuthenticationTokenStore for TokenMap {
        async fn set_token(
            &self,
            user: &IdentityUser,
            login_provider: &str,
            name: &str,
            value: &str,
        ) -> Result<()> {
            self.tokens
                .lock()
                .unwrap()
                .insert(slot(user, login_provider, name), value.to_string());
            Ok(())
        }

        async fn remove_token(
            &self,
            user: &IdentityUser,
            login_provider: &str,
            name: &str,
        ) -> Result<()> {
            self.tokens
                .lock()
                .unwrap()
                .remove(&slot(user, login_provider, name));
            Ok(())
        }

        async fn get_token(
            &self,
            user: &IdentityUser,
            login_provider: &str,
            name: &str,
        ) -> Result<Option<String>> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .get(&slot(user, login_provider, name))
                .cloned())
        }
    }

    impl UserAuthenticatorKeyStore for TokenMap {}
    impl UserTwoFactorRecoveryCodeStore for TokenMap {}
    impl UserLockoutStore for TokenMap {}

    #[tokio::test]
    async fn test_redeem_code_decrements_count_once() {
        let store = TokenMap::default();
        let user = IdentityUser::new("alice").with_id("u1");
        let codes = RecoveryCodes::new(["aaa", "bbb", "ccc"]).unwrap();

        store.replace_codes(&user, &codes).await.unwrap();
        assert_eq!(store.count_codes(&user).await.unwrap(), 3);

        assert!(store.redeem_code(&user, "bbb").await.unwrap());
        assert_eq!(store.count_codes(&user).await.unwrap(), 2);

        assert!(!store.redeem_code(&user, "bbb").await.unwrap());
        assert_eq!(store.count_codes(&user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_codes_without_token_is_zero() {
        let store = TokenMap::default();
        let user = IdentityUser::new("alice").with_id("u1");

        assert_eq!(store.count_codes(&user).await.unwrap(), 0);
        assert!(!store.redeem_code(&user, "anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_codes_stored_under_internal_provider() {
        let store = TokenMap::default();
        let user = IdentityUser::new("alice").with_id("u1");
        let codes = RecoveryCodes::new(["x1", "x2"]).unwrap();

        store.replace_codes(&user, &codes).await.unwrap();

        let raw = store
            .get_token(&user, INTERNAL_LOGIN_PROVIDER, RECOVERY_CODES_TOKEN_NAME)
            .await
            .unwrap();
        assert_eq!(raw.as_deref(), Some("x1;x2"));
    }

    #[tokio::test]
    async fn test_authenticator_key_round_trip() {
        let store = TokenMap::default();
        let user = IdentityUser::new("alice").with_id("u1");

        assert_eq!(store.get_authenticator_key(&user).await.unwrap(), None);
        store.set_authenticator_key(&user, "KEY123").await.unwrap();
        assert_eq!(
            store.get_authenticator_key(&user).await.unwrap().as_deref(),
            Some("KEY123")
        );
    }

    #[test]
    fn test_increment_access_failed_count_is_in_memory() {
        let store = TokenMap::default();
        let mut user = IdentityUser::new("alice");

        assert_eq!(store.increment_access_failed_count(&mut user), 1);
        assert_eq!(store.increment_access_failed_count(&mut user), 2);
        assert_eq!(user.access_failed_count, 2);

        store.reset_access_failed_count(&mut user);
        assert_eq!(store.access_failed_count(&user), 0);
    }
}
