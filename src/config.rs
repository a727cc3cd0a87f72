//! Server configuration, validated before anything connects to the platform.

use crate::{Error, auth::Role, timezone::ReferenceZone};

/// How the server signs in to the platform.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// An administrator's email and password.
    Admin {
        /// The account email.
        email: String,
        /// The account password.
        password: String,
    },
    /// A helper's phone number and password.
    Helper {
        /// The helper's registered phone number.
        phone: String,
        /// The helper's password.
        password: String,
    },
    /// A distributor's email and password.
    Distributor {
        /// The account email.
        email: String,
        /// The account password.
        password: String,
    },
}

impl Credentials {
    /// The role these credentials sign in as.
    pub fn role(&self) -> Role {
        match self {
            Credentials::Admin { .. } => Role::Admin,
            Credentials::Helper { .. } => Role::Helper,
            Credentials::Distributor { .. } => Role::Distributor,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Admin { email, .. } => f
                .debug_struct("Admin")
                .field("email", email)
                .field("password", &"********")
                .finish(),
            Credentials::Helper { phone, .. } => f
                .debug_struct("Helper")
                .field("phone", phone)
                .field("password", &"********")
                .finish(),
            Credentials::Distributor { email, .. } => f
                .debug_struct("Distributor")
                .field("email", email)
                .field("password", &"********")
                .finish(),
        }
    }
}

/// The unvalidated settings, as given on the command line or in the environment.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct RawConfig {
    pub platform_url: String,
    pub anon_key: String,
    /// One of "admin", "ayudante" or "distribuidor".
    pub role: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub webhook_secret: String,
    /// A canonical timezone name, e.g. "America/Lima".
    pub timezone: String,
    pub port: u16,
    pub page_size: usize,
}

/// The validated server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The platform's base URL, without a trailing slash.
    pub platform_url: String,
    /// The platform's public API key.
    pub anon_key: String,
    /// Who the server signs in as.
    pub credentials: Credentials,
    /// The shared secret expected on incoming webhooks.
    pub webhook_secret: String,
    /// The timezone dates are shown and searched in.
    pub zone: ReferenceZone,
    /// The port to serve the monitor from.
    pub port: u16,
    /// The number of transactions per page.
    pub page_size: usize,
}

fn required(value: &str, name: &str) -> Result<String, Error> {
    let value = value.trim();

    if value.is_empty() {
        return Err(Error::Config(format!("{name} must be set")));
    }

    Ok(value.to_owned())
}

impl TryFrom<RawConfig> for Config {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let platform_url = required(&raw.platform_url, "PLATFORM_URL")?;
        if !platform_url.starts_with("http://") && !platform_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "PLATFORM_URL must be an http(s) URL, got {platform_url:?}"
            )));
        }

        let anon_key = required(&raw.anon_key, "PLATFORM_ANON_KEY")?;
        let webhook_secret = required(&raw.webhook_secret, "WEBHOOK_SECRET")?;
        let password = required(&raw.password, "MONITOR_PASSWORD")?;

        let role = Role::parse(&raw.role).ok_or_else(|| {
            Error::Config(format!(
                "MONITOR_ROLE must be one of admin, ayudante or distribuidor, got {:?}",
                raw.role
            ))
        })?;

        let email = || required(raw.email.as_deref().unwrap_or_default(), "MONITOR_EMAIL");
        let credentials = match role {
            Role::Admin => Credentials::Admin {
                email: email()?,
                password,
            },
            Role::Distributor => Credentials::Distributor {
                email: email()?,
                password,
            },
            Role::Helper => Credentials::Helper {
                phone: required(raw.phone.as_deref().unwrap_or_default(), "MONITOR_PHONE")?,
                password,
            },
        };

        let zone = ReferenceZone::from_name(raw.timezone.trim())?;

        if raw.page_size == 0 {
            return Err(Error::Config("PAGE_SIZE must be at least 1".to_owned()));
        }

        Ok(Self {
            platform_url: platform_url.trim_end_matches('/').to_owned(),
            anon_key,
            credentials,
            webhook_secret,
            zone,
            port: raw.port,
            page_size: raw.page_size,
        })
    }
}
