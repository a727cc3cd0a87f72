//! The state shared by the server's handlers, created when the server signs
//! in and torn down when it signs out.

use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, watch};

use crate::{
    Error,
    alert::{AlertLog, Notifier},
    auth::{
        AuthProvider, AuthStore, Role, SignedInUser, credential_resolver_for, sign_in_helper,
        sign_in_with_role,
    },
    config::{Config, Credentials},
    distributor::DistributorRepository,
    monitor::MonitorSession,
    pagination::PaginationConfig,
    platform::PlatformClient,
    profile::{AdminProfile, ProfileRepository},
    realtime::{MemoryTransport, RealtimeSubscriber, TransactionHandler},
    timezone::{Clock, ReferenceZone},
    transaction::TransactionRepository,
};

/// The external services the server talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Signs the server in and out.
    pub auth: Arc<dyn AuthProvider>,
    /// Reads roles and the administrator's profile.
    pub profiles: Arc<dyn ProfileRepository>,
    /// Runs the historical transaction query.
    pub transactions: Arc<dyn TransactionRepository>,
    /// Reads and updates distributor data.
    pub distributors: Arc<dyn DistributorRepository>,
}

impl Collaborators {
    /// Use the hosted platform for everything.
    pub fn platform(client: Arc<PlatformClient>) -> Self {
        Self {
            auth: client.clone(),
            profiles: client.clone(),
            transactions: client.clone(),
            distributors: client,
        }
    }
}

/// The state of the server.
#[derive(Clone)]
pub struct AppState {
    /// Who is signed in and their UI preferences.
    pub auth_store: Arc<RwLock<AuthStore>>,

    /// The role the server was started for.
    pub configured_role: Role,

    /// Toasts waiting to be shown.
    pub alerts: Arc<AlertLog>,

    /// The payment monitor. `None` for distributors.
    pub monitor: Option<Arc<MonitorSession>>,

    /// The administrator whose notifications are shown.
    pub profile: AdminProfile,

    /// Whether the realtime channel is subscribed.
    pub connection: watch::Receiver<bool>,

    /// Delivers live inserts to the monitor.
    pub subscriber: Arc<Mutex<RealtimeSubscriber<MemoryTransport>>>,

    /// The transport the webhook publishes inserts to.
    pub transport: MemoryTransport,

    /// The secret expected on incoming webhooks.
    pub webhook_secret: String,

    /// Used to end the platform session on sign out.
    pub auth: Arc<dyn AuthProvider>,

    /// The distributor data source.
    pub distributors: Arc<dyn DistributorRepository>,

    /// The config that controls how to display pages of data.
    pub pagination_config: PaginationConfig,
}

/// Shown when the realtime channel could not be opened at sign in.
const SUBSCRIBE_ERROR_MESSAGE: &str = "No se pudo conectar a notificaciones en tiempo real";

fn ignore_live_inserts() -> TransactionHandler {
    Arc::new(|_| Ok(()))
}

impl AppState {
    /// Sign in with the configured credentials and start monitoring.
    ///
    /// Administrators and helpers get a monitor subscribed to their live
    /// inserts and seeded with today's transactions. Distributors only get
    /// their account pages.
    ///
    /// # Errors
    /// Returns an error if the sign in or the role check fails. A failed
    /// subscription or initial query is reported as an alert instead.
    pub async fn bootstrap(
        config: &Config,
        collaborators: Collaborators,
        transport: MemoryTransport,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let configured_role = config.credentials.role();
        let auth = collaborators.auth.clone();
        let mut store = AuthStore::new();

        let user = match &config.credentials {
            Credentials::Admin { email, password } | Credentials::Distributor { email, password } => {
                let (user, profile_role) = sign_in_with_role(
                    auth.as_ref(),
                    collaborators.profiles.as_ref(),
                    configured_role,
                    email,
                    password,
                )
                .await?;

                tracing::info!(
                    "signed in as {} with role {}",
                    user.viewer_id(),
                    profile_role.as_str()
                );
                user
            }
            Credentials::Helper { phone, password } => {
                let user = sign_in_helper(auth.as_ref(), phone, password).await?;
                tracing::info!("signed in as a helper of {}", user.viewer_id());
                user
            }
        };

        let viewer_id = user.viewer_id().to_owned();
        store.set_user(Some(user.clone()));
        store.set_role(Some(configured_role));

        let alerts = Arc::new(AlertLog::new());
        let subscriber = RealtimeSubscriber::new(
            Arc::new(transport.clone()),
            alerts.clone(),
            ignore_live_inserts(),
        );
        let connection = subscriber.connection();
        let subscriber = Arc::new(Mutex::new(subscriber));

        let (profile, monitor) = if configured_role == Role::Distributor {
            (AdminProfile::default(), None)
        } else {
            let profile = match collaborators.profiles.get_admin_profile(&viewer_id).await {
                Ok(profile) => profile.unwrap_or_default(),
                Err(error) => {
                    tracing::warn!("Error fetching profile config: {error}");
                    AdminProfile::default()
                }
            };

            let session = MonitorSession::new(
                &viewer_id,
                configured_role,
                monitor_zone(&user, config.zone),
                clock,
                collaborators.transactions.clone(),
                alerts.clone(),
                config.page_size,
            );

            let credentials = credential_resolver_for(&user, auth.clone());
            {
                let mut subscriber = subscriber.lock().await;
                subscriber.set_handler(session.live_handler());

                if let Err(error) = subscriber
                    .subscribe(Some(viewer_id.as_str()), credentials.as_ref())
                    .await
                {
                    tracing::error!("could not subscribe to the transactions of {viewer_id}: {error}");
                    alerts.error(SUBSCRIBE_ERROR_MESSAGE);
                }
            }

            session.refresh_today().await;

            (profile, Some(session))
        };

        store.set_loading(false);

        Ok(Self {
            auth_store: Arc::new(RwLock::new(store)),
            configured_role,
            alerts,
            monitor,
            profile,
            connection,
            subscriber,
            transport,
            webhook_secret: config.webhook_secret.clone(),
            auth,
            distributors: collaborators.distributors,
            pagination_config: PaginationConfig {
                page_size: config.page_size,
                ..Default::default()
            },
        })
    }

    /// Stop monitoring and end the session.
    ///
    /// The local state is cleared even if the platform could not be told.
    ///
    /// # Errors
    /// Returns [Error::LockError] if the auth store could not be locked.
    pub async fn sign_out(&self) -> Result<(), Error> {
        if let Some(monitor) = &self.monitor {
            monitor.close();
        }

        self.subscriber.lock().await.unsubscribe().await;

        if let Err(error) = self.auth.sign_out().await {
            tracing::warn!("could not end the platform session: {error}");
        }

        let mut store = self.auth_store.write().map_err(|error| {
            tracing::error!("could not acquire the auth store lock: {error}");
            Error::LockError
        })?;
        store.logout();
        tracing::info!("signed out");

        Ok(())
    }
}

/// Helpers see dates in their own timezone when the platform reports a valid one.
fn monitor_zone(user: &SignedInUser, configured: ReferenceZone) -> ReferenceZone {
    match user {
        SignedInUser::Helper(session) if !session.timezone.is_empty() => {
            ReferenceZone::from_name(&session.timezone).unwrap_or_else(|error| {
                tracing::warn!("ignoring the helper's timezone: {error}");
                configured
            })
        }
        _ => configured,
    }
}
