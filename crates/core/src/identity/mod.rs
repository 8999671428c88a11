mod recovery;
mod traits;
mod types;

pub use recovery::{RecoveryCodeError, RecoveryCodes, RECOVERY_CODE_DELIMITER};
pub use traits::{
    RoleClaimStore, RoleStore, UserAuthenticationTokenStore, UserAuthenticatorKeyStore,
    UserClaimStore, UserEmailStore, UserLockoutStore, UserLoginStore, UserPasswordStore,
    UserPhoneNumberStore, UserSecurityStampStore, UserStore, UserTwoFactorRecoveryCodeStore,
    UserTwoFactorStore, AUTHENTICATOR_KEY_TOKEN_NAME, INTERNAL_LOGIN_PROVIDER,
    RECOVERY_CODES_TOKEN_NAME,
};
pub use types::{Claim, IdentityRole, IdentityUser, UserLoginInfo, UserToken};
