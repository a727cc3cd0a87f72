//! Application router configuration.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::{
    AppState, Error,
    auth::Role,
    distributor::{get_clients_page, update_referral_code_endpoint},
    endpoints,
    export::get_export,
    log_out::post_log_out,
    monitor::{get_monitor_page, get_monitor_table, post_refresh, post_search},
    preferences::{post_sidebar_preference, post_sound_preference},
    webhook::receive_transaction_webhook,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let page_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::MONITOR_VIEW, get(get_monitor_page))
        .route(endpoints::MONITOR_TABLE, get(get_monitor_table))
        .route(endpoints::MONITOR_EXPORT, get(get_export))
        .route(endpoints::DISTRIBUTOR_CLIENTS_VIEW, get(get_clients_page));

    // These POST routes answer HTMX requests, so they redirect with the HX-REDIRECT header.
    let api_routes = Router::new()
        .route(endpoints::MONITOR_SEARCH, post(post_search))
        .route(endpoints::MONITOR_REFRESH, post(post_refresh))
        .route(endpoints::SOUND_PREFERENCE, post(post_sound_preference))
        .route(endpoints::SIDEBAR_PREFERENCE, post(post_sidebar_preference))
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(
            endpoints::DISTRIBUTOR_REFERRAL_CODE,
            post(update_referral_code_endpoint),
        )
        .route(
            endpoints::TRANSACTION_WEBHOOK,
            post(receive_transaction_webhook),
        );

    page_routes
        .merge(api_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The home page of the role the server signed in as.
fn home_page(role: Role) -> &'static str {
    match role {
        Role::Admin | Role::Helper => endpoints::MONITOR_VIEW,
        Role::Distributor => endpoints::DISTRIBUTOR_CLIENTS_VIEW,
    }
}

/// The root path '/' redirects to the home page, or explains that the
/// session has ended.
async fn get_index_page(State(state): State<AppState>) -> Response {
    let signed_in = match state.auth_store.read() {
        Ok(store) => store.user().is_some(),
        Err(error) => {
            tracing::error!("could not acquire the auth store lock: {error}");
            return Error::LockError.into_response();
        }
    };

    if !signed_in {
        return Error::NoSession.into_response();
    }

    Redirect::to(home_page(state.configured_role)).into_response()
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
