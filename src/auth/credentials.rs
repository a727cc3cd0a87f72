//! Chooses the token presented to the realtime transport.
//!
//! Administrators and distributors present the token of the platform session;
//! helpers present the bearer token issued by their phone login. The choice is
//! made once, when a subscription is set up.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{AuthProvider, SignedInUser};

/// Where a resolver takes its token from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSource {
    /// The access token of the platform's current session.
    SessionToken,
    /// A token issued to a single viewer, presented as a bearer credential.
    BearerToken,
}

/// Resolves the access token for a realtime subscription.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Where the token comes from.
    fn source(&self) -> CredentialSource;

    /// The token to present, or `None` if there is no credential to present.
    async fn access_token(&self) -> Option<String>;
}

/// Reads the token of the platform's current session.
pub struct SessionTokenResolver {
    auth: Arc<dyn AuthProvider>,
}

impl SessionTokenResolver {
    /// Create a resolver reading `auth`'s current session.
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl CredentialResolver for SessionTokenResolver {
    fn source(&self) -> CredentialSource {
        CredentialSource::SessionToken
    }

    async fn access_token(&self) -> Option<String> {
        self.auth
            .current_session()
            .await
            .map(|session| session.access_token)
            .filter(|token| !token.is_empty())
    }
}

/// Presents a fixed token issued to one viewer.
#[derive(Clone)]
pub struct BearerTokenResolver {
    token: String,
}

impl BearerTokenResolver {
    /// Create a resolver presenting `token`.
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_owned(),
        }
    }
}

impl std::fmt::Debug for BearerTokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenResolver")
            .field("token", &"********")
            .finish()
    }
}

#[async_trait]
impl CredentialResolver for BearerTokenResolver {
    fn source(&self) -> CredentialSource {
        CredentialSource::BearerToken
    }

    async fn access_token(&self) -> Option<String> {
        Some(self.token.clone()).filter(|token| !token.is_empty())
    }
}

/// Select the resolver for `user`: helpers use their issued token, everyone
/// else the platform session.
pub fn credential_resolver_for(
    user: &SignedInUser,
    auth: Arc<dyn AuthProvider>,
) -> Arc<dyn CredentialResolver> {
    match user {
        SignedInUser::Helper(session) => Arc::new(BearerTokenResolver::new(&session.token)),
        SignedInUser::Platform { .. } => Arc::new(SessionTokenResolver::new(auth)),
    }
}
