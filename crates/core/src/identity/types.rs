use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named role users can be assigned to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentityRole {
    pub id: String,
    pub name: Option<String>,
    /// Case-folded name used for lookups. Set by the caller, never derived here.
    pub normalized_name: Option<String>,
}

impl IdentityRole {
    /// Creates a new role with a random id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(name.into()),
            normalized_name: None,
        }
    }

    /// Sets a specific ID for this role (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_normalized_name(mut self, normalized_name: impl Into<String>) -> Self {
        self.normalized_name = Some(normalized_name.into());
        self
    }
}

/// A user account and every scalar attribute the identity framework tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentityUser {
    pub id: String,
    pub user_name: Option<String>,
    pub normalized_user_name: Option<String>,
    pub email: Option<String>,
    pub normalized_email: Option<String>,
    pub email_confirmed: bool,
    /// Opaque hash produced by the framework's password hasher.
    pub password_hash: Option<String>,
    /// Opaque value rotated whenever credentials change.
    pub security_stamp: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub lockout_enabled: bool,
    pub access_failed_count: u32,
}

impl IdentityUser {
    /// Creates a new user with a random id and a fresh security stamp.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_name: Some(user_name.into()),
            security_stamp: Some(Uuid::new_v4().to_string()),
            ..Self::default()
        }
    }

    /// Sets a specific ID for this user (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_normalized_user_name(mut self, normalized_user_name: impl Into<String>) -> Self {
        self.normalized_user_name = Some(normalized_user_name.into());
        self
    }

    /// Sets both the email and its normalized form.
    pub fn with_email(
        mut self,
        email: impl Into<String>,
        normalized_email: impl Into<String>,
    ) -> Self {
        self.email = Some(email.into());
        self.normalized_email = Some(normalized_email.into());
        self
    }
}

/// A `(type, value)` assertion attached to a user or a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Binding between a user and an external identity provider account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserLoginInfo {
    pub login_provider: String,
    /// Provider's unique identifier for the account.
    pub provider_key: String,
    pub provider_display_name: Option<String>,
}

impl UserLoginInfo {
    pub fn new(login_provider: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self {
            login_provider: login_provider.into(),
            provider_key: provider_key.into(),
            provider_display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.provider_display_name = Some(display_name.into());
        self
    }
}

/// An opaque token value stored for one user under `(login_provider, name)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserToken {
    pub login_provider: String,
    pub name: String,
    pub value: String,
}
