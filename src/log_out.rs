//! Log-out route handler that ends the session and closes the monitor.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;

use crate::{AppState, endpoints};

/// Close the realtime channel, end the platform session and redirect the
/// client to the root page.
pub async fn post_log_out(State(state): State<AppState>) -> Response {
    if let Err(error) = state.sign_out().await {
        return error.into_alert_response();
    }

    (HxRedirect(endpoints::ROOT.to_owned()), StatusCode::SEE_OTHER).into_response()
}
