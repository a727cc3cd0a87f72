//! User profiles stored by the platform.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, auth::Role};

/// The parts of an administrator's profile shown on the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdminProfile {
    /// The administrator's display name.
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    /// Whether the date filters are shown. Missing means shown.
    #[serde(rename = "filtro_busqueda_web", default)]
    pub search_filter: Option<bool>,
}

impl AdminProfile {
    /// Whether the monitor should show the date filters.
    pub fn show_search_filter(&self) -> bool {
        self.search_filter.unwrap_or(true)
    }

    /// The display name, if set and not blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.trim().is_empty())
    }
}

/// Reads user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Get the role stored in a user's profile.
    ///
    /// # Errors
    /// Returns an error if the query could not be completed.
    async fn get_role(&self, user_id: &str) -> Result<Option<Role>, Error>;

    /// Get an administrator's profile.
    ///
    /// # Errors
    /// Returns an error if the query could not be completed.
    async fn get_admin_profile(&self, admin_id: &str) -> Result<Option<AdminProfile>, Error>;
}
