//! Account records.
//!
//! A user is identified by a unique email. Accounts created through the
//! credentials flow carry an Argon2id password hash; accounts provisioned by
//! the external OAuth provider do not. The hash is never serialized.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ModelError;

/// Authorization role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(ModelError::InvalidRole(other.to_string())),
        }
    }
}

/// How the account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AuthProvider {
    Google,
    #[default]
    Credentials,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::Credentials => "credentials",
        }
    }
}

impl FromStr for AuthProvider {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(AuthProvider::Google),
            "credentials" => Ok(AuthProvider::Credentials),
            other => Err(ModelError::InvalidProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing, default))]
    pub password_hash: Option<String>,
    pub image: Option<String>,
    pub role: UserRole,
    pub provider: AuthProvider,
    /// Raw stored preference; normalize before use, older rows may hold a
    /// legacy numeric id.
    pub last_used_source: Option<String>,
    pub last_used_source_at: Option<DateTime<Utc>>,
    /// Whether the stored preference came from a direct user action.
    pub last_used_source_explicit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        username: Option<String>,
        password_hash: Option<String>,
        provider: AuthProvider,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            username,
            password_hash,
            image: None,
            role: UserRole::User,
            provider,
            last_used_source: None,
            last_used_source_at: None,
            last_used_source_explicit: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
