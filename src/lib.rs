//! A payment-notification monitor for mobile-wallet transfers.
//!
//! The server signs in to the hosted data platform as a single viewer (an
//! administrator, a helper scoped to an administrator, or a distributor),
//! seeds a list of payment notifications from a historical range query and
//! keeps it current with a live subscription to newly inserted transactions.
//!
//! This library serves the monitor screens directly as HTML.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod auth;
mod config;
mod distributor;
mod endpoints;
mod export;
mod html;
mod log_out;
mod logging;
mod monitor;
mod navigation;
mod pagination;
mod platform;
mod preferences;
mod profile;
mod realtime;
mod routing;
mod timezone;
mod transaction;
mod webhook;

#[cfg(test)]
mod test_utils;

pub use alert::{Alert, AlertKind, AlertLog, Notifier};
pub use app_state::{AppState, Collaborators};
pub use auth::{
    AuthProvider, AuthStore, BearerTokenResolver, CredentialResolver, CredentialSource,
    HelperSession, Role, Session, SessionTokenResolver, SignedInUser, credential_resolver_for,
};
pub use config::{Config, Credentials, RawConfig};
pub use logging::logging_middleware;
pub use monitor::{FetchTicket, LiveOutcome, MergeBuffer, MonitorSession, MonitorSnapshot};
pub use platform::PlatformClient;
pub use realtime::{
    Channel, ChannelEvent, ChannelStatus, InsertFilter, MemoryTransport, RealtimeSubscriber,
    RealtimeTransport, TransactionHandler,
};
pub use routing::build_router;
pub use timezone::{Clock, ReferenceZone, SystemClock};
pub use transaction::{
    DateRange, DisplayItem, RangeError, TransactionRecord, TransactionRepository,
    historical_display_item, live_display_item,
};

use crate::{alert::alert_view, html::error_view};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("could not listen for ctrl+c: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("could not install the terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The platform rejected the email/phone and password combination.
    ///
    /// The string is the message reported by the platform.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The user signed in but their profile does not grant the required role.
    #[error("No tienes permisos de {0}")]
    MissingRole(String),

    /// The role stored in the user's profile could not be read.
    #[error("No se pudo verificar el perfil")]
    ProfileUnavailable,

    /// There is no current session, so no access token is available.
    #[error("there is no active session")]
    NoSession,

    /// The platform answered a request with an error status.
    ///
    /// Callers should pass in the HTTP status code and the platform's message.
    #[error("the platform returned {0}: {1}")]
    Platform(u16, String),

    /// The request to the platform could not be sent or its response could
    /// not be decoded.
    #[error("could not reach the platform: {0}")]
    Http(String),

    /// An error occurred while getting the timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// The date range entered by the user is not valid.
    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    /// The realtime transport refused or failed an operation.
    #[error("realtime transport error: {0}")]
    Transport(String),

    /// A live transaction could not be processed.
    #[error("could not process live transaction: {0}")]
    Handler(String),

    /// The user asked for an export while there were no transactions to export.
    #[error("No hay datos para exportar")]
    NoDataToExport,

    /// The export could not be written as CSV.
    #[error("could not write the CSV export: {0}")]
    Csv(String),

    /// A referral code was empty or contained whitespace.
    #[error("El código de referido no es válido")]
    InvalidReferralCode,

    /// The referral code is already taken by another distributor.
    #[error("El código {0} no está disponible")]
    ReferralCodeTaken(String),

    /// The server configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The requested resource was not found.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A lock guarding shared state was poisoned.
    #[error("could not acquire the state lock")]
    LockError,
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        tracing::error!("a request to the platform failed: {value}");
        Error::Http(value.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::Csv(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                error_view(
                    "Not Found",
                    "404",
                    "Página no encontrada.",
                    "Revise la dirección o vuelva al monitor.",
                ),
            )
                .into_response(),
            Error::NoSession => (
                StatusCode::UNAUTHORIZED,
                error_view(
                    "Unauthorized",
                    "401",
                    "Sesión cerrada",
                    "El monitor cerró sesión. Reinicie el servidor para volver a ingresar.",
                ),
            )
                .into_response(),
            Error::InvalidTimezone(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_view(
                    "Internal Server Error",
                    "500",
                    "Zona horaria inválida",
                    &format!(
                        "Could not get timezone \"{timezone}\". Check your server settings and \
                        ensure the timezone has been set to a valid, canonical timezone string"
                    ),
                ),
            )
                .into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_view(
                        "Internal Server Error",
                        "500",
                        "Algo salió mal",
                        "Ocurrió un error inesperado, revise los registros del servidor.",
                    ),
                )
                    .into_response()
            }
        }
    }
}

impl Error {
    /// Render the error as an alert fragment for HTMX requests.
    fn into_alert_response(self) -> Response {
        let status = match &self {
            Error::InvalidRange(_)
            | Error::InvalidReferralCode
            | Error::ReferralCodeTaken(_)
            | Error::NoDataToExport => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::NoSession => StatusCode::UNAUTHORIZED,
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Ocurrió un error inesperado.".to_owned(),
            StatusCode::UNAUTHORIZED => "Sesión cerrada".to_owned(),
            _ => self.to_string(),
        };

        (status, alert_view(&Alert::error(&message))).into_response()
    }
}
