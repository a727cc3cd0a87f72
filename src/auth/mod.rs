//! Roles, signed-in users and the credentials used to reach the platform.

mod credentials;
mod provider;
mod store;

use serde::{Deserialize, Serialize};

pub use credentials::{
    BearerTokenResolver, CredentialResolver, CredentialSource, SessionTokenResolver,
    credential_resolver_for,
};
pub use provider::{AuthProvider, HelperSession, Session, sign_in_helper, sign_in_with_role};
pub use store::AuthStore;

/// The dashboards a user may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Owns the payment notifications and sees their full history.
    #[serde(rename = "admin")]
    Admin,
    /// Watches an administrator's notifications for the current day only.
    #[serde(rename = "ayudante")]
    Helper,
    /// Resells subscriptions and manages their clients.
    #[serde(rename = "distribuidor")]
    Distributor,
}

impl Role {
    /// The role's name as stored in the platform's profiles.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Helper => "ayudante",
            Role::Distributor => "distribuidor",
        }
    }

    /// Parse a role name as stored in the platform's profiles.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "admin" => Some(Role::Admin),
            "ayudante" => Some(Role::Helper),
            "distribuidor" => Some(Role::Distributor),
            _ => None,
        }
    }
}

/// The user the server is signed in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedInUser {
    /// A user authenticated by the platform's auth service.
    Platform {
        /// The user's ID.
        id: String,
        /// The user's email address.
        email: Option<String>,
    },
    /// A helper authenticated with a phone number and password.
    Helper(HelperSession),
}

impl SignedInUser {
    /// The ID of the viewer whose transactions this user may observe.
    ///
    /// Helpers observe the administrator they are scoped to.
    pub fn viewer_id(&self) -> &str {
        match self {
            SignedInUser::Platform { id, .. } => id,
            SignedInUser::Helper(session) => &session.admin_id,
        }
    }
}
