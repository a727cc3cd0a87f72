//! Transient notifications ("toasts") for the user.
//!
//! Components report outcomes through the [Notifier] trait. The server keeps
//! them in an [AlertLog] until the next page render shows and discards them.

use std::{collections::VecDeque, sync::Mutex};

use maud::{Markup, html};

/// Alert message types for styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Something completed successfully.
    Success,
    /// Something needs the user's attention but nothing failed.
    Warning,
    /// Something failed.
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// How the alert should be styled.
    pub kind: AlertKind,
    /// The text to show.
    pub message: String,
}

impl Alert {
    /// Create a new success alert
    pub fn success(message: &str) -> Self {
        Self {
            kind: AlertKind::Success,
            message: message.to_owned(),
        }
    }

    /// Create a new warning alert
    pub fn warning(message: &str) -> Self {
        Self {
            kind: AlertKind::Warning,
            message: message.to_owned(),
        }
    }

    /// Create a new error alert
    pub fn error(message: &str) -> Self {
        Self {
            kind: AlertKind::Error,
            message: message.to_owned(),
        }
    }
}

/// Receives transient notifications.
pub trait Notifier: Send + Sync {
    /// Show `alert` to the user.
    fn notify(&self, alert: Alert);

    /// Show a success message.
    fn success(&self, message: &str) {
        self.notify(Alert::success(message));
    }

    /// Show a warning message.
    fn warning(&self, message: &str) {
        self.notify(Alert::warning(message));
    }

    /// Show an error message.
    fn error(&self, message: &str) {
        self.notify(Alert::error(message));
    }
}

/// The most recent alerts that have not been shown yet.
///
/// Only the newest [AlertLog::CAPACITY] alerts are kept.
#[derive(Debug, Default)]
pub struct AlertLog {
    alerts: Mutex<VecDeque<Alert>>,
}

impl AlertLog {
    /// The maximum number of pending alerts.
    pub const CAPACITY: usize = 5;

    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the pending alerts, oldest first.
    pub fn drain(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(mut alerts) => alerts.drain(..).collect(),
            Err(error) => {
                tracing::error!("could not acquire the alert lock: {error}");
                Vec::new()
            }
        }
    }
}

impl Notifier for AlertLog {
    fn notify(&self, alert: Alert) {
        tracing::debug!("alert: {:?} {}", alert.kind, alert.message);

        let Ok(mut alerts) = self.alerts.lock() else {
            tracing::error!("could not acquire the alert lock, dropping {alert:?}");
            return;
        };

        if alerts.len() == Self::CAPACITY {
            alerts.pop_front();
        }

        alerts.push_back(alert);
    }
}

/// Renders an alert with styling for its kind.
pub fn alert_view(alert: &Alert) -> Markup {
    let style = match alert.kind {
        AlertKind::Success => {
            "p-4 mb-2 text-sm text-green-800 rounded-lg bg-green-50 \
            dark:bg-gray-800 dark:text-green-400"
        }
        AlertKind::Warning => {
            "p-4 mb-2 text-sm text-amber-800 rounded-lg bg-amber-50 \
            dark:bg-gray-800 dark:text-amber-300"
        }
        AlertKind::Error => {
            "p-4 mb-2 text-sm text-red-800 rounded-lg bg-red-50 \
            dark:bg-gray-800 dark:text-red-400"
        }
    };

    html! {
        div class=(style) role="alert" { (alert.message) }
    }
}

/// Renders the pending alerts.
pub fn alerts_view(alerts: &[Alert]) -> Markup {
    html! {
        div id="alert-container" class="w-full max-w-md px-4 fixed bottom-4 left-1/2 -translate-x-1/2 z-50"
        {
            @for alert in alerts {
                (alert_view(alert))
            }
        }
    }
}
