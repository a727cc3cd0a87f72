//! HTTP client for the hosted data platform: password auth, remote procedures
//! and table reads in the `notificacion` schema.

mod repositories;

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{
    Client as HttpClient, RequestBuilder, Response,
    header::{AUTHORIZATION, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    Error,
    auth::{AuthProvider, HelperSession, Session},
};

/// The schema holding the application's tables.
pub const APP_SCHEMA: &str = "notificacion";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// A client for one platform project.
///
/// Requests carry the project's public key, and the signed in user's access
/// token once [AuthProvider::sign_in_with_password] succeeds.
pub struct PlatformClient {
    http_client: HttpClient,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.to_owned(),
            session: RwLock::new(None),
        }
    }

    fn access_token(&self) -> Option<String> {
        match self.session.read() {
            Ok(session) => session.as_ref().map(|session| session.access_token.clone()),
            Err(error) => {
                tracing::error!("could not acquire the session lock: {error}");
                None
            }
        }
    }

    fn set_session(&self, session: Option<Session>) {
        match self.session.write() {
            Ok(mut current) => *current = session,
            Err(error) => tracing::error!("could not acquire the session lock: {error}"),
        }
    }

    /// Add the project key and the best available bearer token.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access_token().unwrap_or_else(|| self.anon_key.clone());

        let request = request.header("apikey", &self.anon_key);

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => request.header(AUTHORIZATION, value),
            Err(error) => {
                tracing::error!("could not build the authorization header: {error}");
                request
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Call the remote procedure `function` with named `arguments`.
    pub(crate) async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        arguments: Value,
    ) -> Result<T, Error> {
        let request = self
            .http_client
            .post(self.url(&format!("/rest/v1/rpc/{function}")))
            .json(&arguments);

        let response = self.authorize(request).send().await?;

        parse_json(response).await
    }

    /// Read rows of `table` in the application schema. `query` holds
    /// `select` and filter parameters in the platform's syntax.
    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, Error> {
        let request = self
            .http_client
            .get(self.url(&format!("/rest/v1/{table}")))
            .header("Accept-Profile", APP_SCHEMA)
            .query(query);

        let response = self.authorize(request).send().await?;

        parse_json(response).await
    }

    /// Update rows of `table` in the application schema matching `filter`.
    pub(crate) async fn update(
        &self,
        table: &str,
        filter: &[(&str, String)],
        changes: Value,
    ) -> Result<(), Error> {
        let request = self
            .http_client
            .patch(self.url(&format!("/rest/v1/{table}")))
            .header("Content-Profile", APP_SCHEMA)
            .header("Prefer", "return=minimal")
            .query(filter)
            .json(&changes);

        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}

/// The most helpful message in a platform error body.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_owned();
    };

    ["error_description", "message", "msg", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_owned())
}

async fn error_from_response(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    tracing::warn!("the platform returned {status}: {message}");

    Error::Platform(status, message)
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|error| Error::Http(format!("could not decode the platform's response: {error}")))
}

#[async_trait]
impl AuthProvider for PlatformClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        let request = self
            .http_client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let response = self.authorize(request).send().await?;

        let token: TokenResponse = match parse_json(response).await {
            Ok(token) => token,
            Err(Error::Platform(400, message)) => return Err(Error::InvalidCredentials(message)),
            Err(error) => return Err(error),
        };

        let session = Session {
            access_token: token.access_token,
            user_id: token.user.id,
            email: token.user.email,
        };
        self.set_session(Some(session.clone()));
        tracing::info!("signed in to the platform as {}", session.user_id);

        Ok(session)
    }

    async fn login_helper(&self, phone: &str, password: &str) -> Result<HelperSession, Error> {
        let value: Value = self
            .rpc(
                "fn_login_ayudante",
                json!({ "_telefono": phone, "_password": password }),
            )
            .await?;

        // The procedure may answer with a single row or a set of rows.
        let row = match value {
            Value::Array(rows) => rows.into_iter().next().unwrap_or(Value::Null),
            row => row,
        };

        if row.is_null() {
            return Err(Error::InvalidCredentials("Credenciales inválidas".to_owned()));
        }

        serde_json::from_value(row)
            .map_err(|error| Error::Http(format!("could not decode the helper session: {error}")))
    }

    async fn current_session(&self) -> Option<Session> {
        match self.session.read() {
            Ok(session) => session.clone(),
            Err(error) => {
                tracing::error!("could not acquire the session lock: {error}");
                None
            }
        }
    }

    async fn sign_out(&self) -> Result<(), Error> {
        if self.access_token().is_none() {
            return Ok(());
        }

        let request = self.http_client.post(self.url("/auth/v1/logout"));
        let response = self.authorize(request).send().await;
        self.set_session(None);

        let response = response?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        tracing::info!("signed out of the platform");

        Ok(())
    }
}
