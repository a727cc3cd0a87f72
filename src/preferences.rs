//! The signed in user's UI preferences: the new-transaction sound and the
//! sidebar width.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use axum::{
    Form,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::{AuthStore, Role},
    endpoints,
    html::BUTTON_SECONDARY_STYLE,
    navigation::Sidebar,
};

/// The state needed for changing preferences.
#[derive(Clone)]
pub struct PreferencesState {
    /// Where the preferences are kept.
    pub auth_store: Arc<RwLock<AuthStore>>,
    /// The role the server was started for, used when no one is signed in.
    pub configured_role: Role,
}

impl FromRef<AppState> for PreferencesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            auth_store: state.auth_store.clone(),
            configured_role: state.configured_role,
        }
    }
}

impl PreferencesState {
    fn store(&self) -> Result<RwLockWriteGuard<'_, AuthStore>, Error> {
        self.auth_store.write().map_err(|error| {
            tracing::error!("could not acquire the auth store lock: {error}");
            Error::LockError
        })
    }
}

/// The button that turns the new-transaction sound on or off.
pub fn sound_toggle_view(enabled: bool) -> Markup {
    html! {
        button
            id="sound-toggle"
            hx-post=(endpoints::SOUND_PREFERENCE)
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            aria-pressed=(enabled)
            class=(BUTTON_SECONDARY_STYLE)
        {
            @if enabled { "Sonido: activado" } @else { "Sonido: desactivado" }
        }
    }
}

/// Flip the sound preference and return the updated button.
pub async fn post_sound_preference(State(state): State<PreferencesState>) -> Response {
    let enabled = match state.store() {
        Ok(mut store) => {
            let enabled = !store.sound_enabled();
            store.set_sound_enabled(enabled);
            enabled
        }
        Err(error) => return error.into_alert_response(),
    };

    tracing::debug!("sound notifications {}", if enabled { "on" } else { "off" });

    sound_toggle_view(enabled).into_response()
}

/// The form data sent by the sidebar's toggle button.
#[derive(Debug, Default, Deserialize)]
pub struct SidebarForm {
    /// The page the sidebar is shown on.
    #[serde(default)]
    pub active: String,
}

/// Collapse or expand the sidebar and return it re-rendered.
pub async fn post_sidebar_preference(
    State(state): State<PreferencesState>,
    Form(form): Form<SidebarForm>,
) -> Response {
    let (collapsed, role) = match state.store() {
        Ok(mut store) => (
            store.toggle_sidebar(),
            store.role().unwrap_or(state.configured_role),
        ),
        Err(error) => return error.into_alert_response(),
    };

    Sidebar::new(&form.active, role)
        .collapsed(collapsed)
        .into_html()
        .into_response()
}
