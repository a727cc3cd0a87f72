//! The platform's authentication service and the role check performed after signing in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::{Role, SignedInUser},
    profile::ProfileRepository,
};

/// A session issued by the platform's auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The bearer token for requests made on behalf of the user.
    pub access_token: String,
    /// The ID of the signed in user.
    pub user_id: String,
    /// The email address of the signed in user.
    pub email: Option<String>,
}

/// The result of a helper's phone and password login.
///
/// Field names on the wire follow the platform's `fn_login_ayudante` procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperSession {
    /// Whether the login was accepted.
    #[serde(default)]
    pub success: bool,
    /// A message from the platform, usually explaining a rejection.
    #[serde(default)]
    pub message: String,
    /// The bearer token issued for this helper.
    #[serde(default)]
    pub token: String,
    /// The helper's ID.
    #[serde(rename = "ayudante_id", default)]
    pub helper_id: String,
    /// The administrator the helper is scoped to.
    #[serde(rename = "id_admin", default)]
    pub admin_id: String,
    /// The helper's configured timezone.
    #[serde(rename = "zona_horaria", default)]
    pub timezone: String,
}

/// The platform's authentication service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Sign in with an email address and password, replacing any current session.
    ///
    /// # Errors
    /// Returns [Error::InvalidCredentials] if the platform rejects the credentials.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error>;

    /// Ask the platform to issue a token for a helper's phone number and password.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    async fn login_helper(&self, phone: &str, password: &str) -> Result<HelperSession, Error>;

    /// The current session, if signed in.
    async fn current_session(&self) -> Option<Session>;

    /// End the current session.
    ///
    /// # Errors
    /// Returns an error if the platform could not be told about the sign out.
    async fn sign_out(&self) -> Result<(), Error>;
}

/// Sign in with an email address and password and check the profile's role.
///
/// Administrators may use every dashboard; everyone else needs exactly
/// `required_role`. The session is ended again when the check fails.
///
/// # Errors
/// Returns:
/// - [Error::InvalidCredentials] if the platform rejects the credentials,
/// - [Error::ProfileUnavailable] if the profile's role cannot be read,
/// - [Error::MissingRole] if the profile does not grant `required_role`.
pub async fn sign_in_with_role(
    auth: &dyn AuthProvider,
    profiles: &dyn ProfileRepository,
    required_role: Role,
    email: &str,
    password: &str,
) -> Result<(SignedInUser, Role), Error> {
    let session = auth.sign_in_with_password(email, password).await?;

    let role = match profiles.get_role(&session.user_id).await {
        Ok(Some(role)) => role,
        Ok(None) | Err(_) => {
            tracing::warn!("could not read the role of user {}", session.user_id);
            sign_out_quietly(auth).await;
            return Err(Error::ProfileUnavailable);
        }
    };

    if role != required_role && role != Role::Admin {
        tracing::warn!(
            "user {} has role {} but tried to sign in as {}",
            session.user_id,
            role.as_str(),
            required_role.as_str()
        );
        sign_out_quietly(auth).await;
        return Err(Error::MissingRole(required_role.as_str().to_owned()));
    }

    let user = SignedInUser::Platform {
        id: session.user_id,
        email: session.email,
    };

    Ok((user, role))
}

/// Sign in as a helper with a phone number and password.
///
/// # Errors
/// Returns [Error::InvalidCredentials] if the platform does not accept the login.
pub async fn sign_in_helper(
    auth: &dyn AuthProvider,
    phone: &str,
    password: &str,
) -> Result<SignedInUser, Error> {
    let session = auth.login_helper(phone, password).await.map_err(|error| {
        tracing::warn!("helper login failed: {error}");
        Error::InvalidCredentials("Credenciales inválidas".to_owned())
    })?;

    if !session.success || session.token.is_empty() || session.admin_id.is_empty() {
        let message = if session.message.is_empty() {
            "Credenciales inválidas".to_owned()
        } else {
            session.message
        };

        return Err(Error::InvalidCredentials(message));
    }

    Ok(SignedInUser::Helper(session))
}

async fn sign_out_quietly(auth: &dyn AuthProvider) {
    if let Err(error) = auth.sign_out().await {
        tracing::warn!("could not sign out after a failed role check: {error}");
    }
}
