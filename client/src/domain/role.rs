//! Authorization roles and per-call token scopes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a first-party session is scoped to.
///
/// A browser may hold one session per role at the same time; the two slots
/// have independent lifecycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Scholarship seeker.
    User,
    /// Catalogue administrator.
    Admin,
}

impl Role {
    /// Both roles, user first.
    pub const ALL: [Self; 2] = [Self::User, Self::Admin];

    /// Durable storage key holding this role's session.
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::User => "userToken",
            Self::Admin => "adminToken",
        }
    }

    /// Login surface a denied navigation is redirected to.
    pub const fn login_path(self) -> &'static str {
        match self {
            Self::User => "/login",
            Self::Admin => "/admin/login",
        }
    }

    /// Landing page after a successful sign-in with no recorded destination.
    pub const fn default_landing(self) -> &'static str {
        match self {
            Self::User => "/dashboard",
            Self::Admin => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Admin => "admin",
        })
    }
}

/// Which session token, if any, a remote call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallScope {
    /// Requires the user session.
    User,
    /// Requires the admin session.
    Admin,
    /// Never carries a token.
    None,
    /// Carries the admin token if present, else the user token, else nothing.
    Optional,
}

impl CallScope {
    /// Role whose session this scope requires, if it requires one.
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::User => Some(Role::User),
            Self::Admin => Some(Role::Admin),
            Self::None | Self::Optional => None,
        }
    }
}

impl From<Role> for CallScope {
    fn from(value: Role) -> Self {
        match value {
            Role::User => Self::User,
            Role::Admin => Self::Admin,
        }
    }
}
