use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use payment_monitor::{
    AppState, Collaborators, Config, MemoryTransport, PlatformClient, RawConfig, SystemClock,
    build_router, graceful_shutdown,
};

/// Serves the payment monitor for one signed in viewer.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The base URL of the hosted platform, e.g. "https://xyz.supabase.co".
    #[arg(long, env = "PLATFORM_URL")]
    platform_url: String,

    /// The platform's public API key.
    #[arg(long, env = "PLATFORM_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    /// The dashboard to serve: "admin", "ayudante" or "distribuidor".
    #[arg(long, env = "MONITOR_ROLE", default_value = "admin")]
    role: String,

    /// The email to sign in with. Required for administrators and distributors.
    #[arg(long, env = "MONITOR_EMAIL")]
    email: Option<String>,

    /// The phone number to sign in with. Required for helpers.
    #[arg(long, env = "MONITOR_PHONE")]
    phone: Option<String>,

    /// The password to sign in with.
    #[arg(long, env = "MONITOR_PASSWORD", hide_env_values = true)]
    password: String,

    /// The secret the platform sends with its database webhooks.
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: String,

    /// The timezone dates are shown and searched in.
    #[arg(long, env = "TIMEZONE", default_value = "America/Lima")]
    timezone: String,

    /// The port to serve the monitor from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The number of transactions per page.
    #[arg(long, env = "PAGE_SIZE", default_value_t = 10)]
    page_size: usize,

    /// Log the headers and bodies of every request and response.
    #[arg(long, default_value_t = false)]
    log_bodies: bool,
}

impl From<Args> for RawConfig {
    fn from(args: Args) -> Self {
        Self {
            platform_url: args.platform_url,
            anon_key: args.anon_key,
            role: args.role,
            email: args.email,
            phone: args.phone,
            password: args.password,
            webhook_secret: args.webhook_secret,
            timezone: args.timezone,
            port: args.port,
            page_size: args.page_size,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();
    let log_bodies = args.log_bodies;

    let config = match Config::try_from(RawConfig::from(args)) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "starting the {} monitor with {:?}",
        config.credentials.role().as_str(),
        config.credentials
    );

    let platform = Arc::new(PlatformClient::new(&config.platform_url, &config.anon_key));
    let state = match AppState::bootstrap(
        &config,
        Collaborators::platform(platform),
        MemoryTransport::new(),
        Arc::new(SystemClock),
    )
    .await
    {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("could not sign in: {error}");
            return ExitCode::FAILURE;
        }
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state.clone());
    let router = if log_bodies {
        router.layer(axum::middleware::from_fn(payment_monitor::logging_middleware))
    } else {
        router
    };
    let router = add_tracing_layer(router);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("HTTP server listening on {}", addr);

    let result = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await;

    if let Err(error) = state.sign_out().await {
        tracing::error!("could not sign out cleanly: {error}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("the server stopped with an error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
