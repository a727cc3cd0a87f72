//! The application's session state: who is signed in and their UI preferences.
//!
//! One store is created when the server starts and shared by reference with the
//! handlers that need it. [AuthStore::logout] returns it to the signed out state.

use crate::auth::{Role, SignedInUser};

/// Session state shared by the monitor's handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStore {
    user: Option<SignedInUser>,
    role: Option<Role>,
    is_loading: bool,
    sound_enabled: bool,
    sidebar_collapsed: bool,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self {
            user: None,
            role: None,
            is_loading: true,
            sound_enabled: false,
            sidebar_collapsed: false,
        }
    }
}

impl AuthStore {
    /// Create a store with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// The signed in user.
    pub fn user(&self) -> Option<&SignedInUser> {
        self.user.as_ref()
    }

    /// The signed in user's role.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Whether the session is still being established.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether new transactions should play a sound.
    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    /// Whether the navigation sidebar is collapsed.
    pub fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    /// The viewer identity whose transactions the signed in user may observe.
    pub fn viewer_id(&self) -> Option<&str> {
        self.user.as_ref().map(SignedInUser::viewer_id)
    }

    /// Replace the signed in user.
    pub fn set_user(&mut self, user: Option<SignedInUser>) {
        self.user = user;
    }

    /// Replace the signed in user's role.
    pub fn set_role(&mut self, role: Option<Role>) {
        self.role = role;
    }

    /// Mark the session as loading or settled.
    pub fn set_loading(&mut self, is_loading: bool) {
        self.is_loading = is_loading;
    }

    /// Turn the new-transaction sound on or off.
    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound_enabled = enabled;
    }

    /// Collapse or expand the sidebar, returning the new state.
    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        self.sidebar_collapsed
    }

    /// Forget the signed in user. UI preferences are kept.
    pub fn logout(&mut self) {
        self.user = None;
        self.role = None;
        self.is_loading = false;
    }
}
