use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use allowance_rs::{
    AppState, NotificationDispatcher, VapidConfig, WebPushGateway, build_router,
    graceful_shutdown, logging_middleware,
};

/// The JSON API server for the allowance tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "ALLOWANCE_DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The secret used to sign access tokens.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,

    /// The base64url encoded VAPID public key handed to browsers.
    #[arg(long, env = "VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,

    /// File path to the PEM encoded VAPID private key.
    #[arg(long, env = "VAPID_PRIVATE_KEY_PATH")]
    vapid_private_key_path: Option<PathBuf>,

    /// The contact address sent to push services, e.g. "mailto:admin@example.com".
    #[arg(long, env = "VAPID_SUBJECT", default_value = "mailto:admin@localhost")]
    vapid_subject: String,

    /// Write debug logs to this file in addition to stdout.
    #[arg(long)]
    log_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(args.log_path.as_ref());

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let state = AppState::new(conn, &args.secret).expect("Could not initialize the database.");
    let state = enable_push(state, &args);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");
}

/// Start the notification worker if both VAPID keys were given.
fn enable_push(state: AppState, args: &Args) -> AppState {
    let (Some(public_key), Some(private_key_path)) =
        (&args.vapid_public_key, &args.vapid_private_key_path)
    else {
        tracing::warn!("VAPID keys not set, push notifications are disabled");
        return state;
    };

    let config = match VapidConfig::from_key_file(public_key, private_key_path, &args.vapid_subject)
    {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(
                "could not read VAPID private key {}: {error}, push notifications are disabled",
                private_key_path.display()
            );
            return state;
        }
    };

    let gateway = match WebPushGateway::new(&config) {
        Ok(gateway) => gateway,
        Err(error) => {
            tracing::error!("invalid VAPID configuration: {error}, push notifications are disabled");
            return state;
        }
    };

    let (dispatcher, _worker) = NotificationDispatcher::spawn(gateway, state.db_connection.clone());
    tracing::info!("push notifications are enabled");

    state.with_push(dispatcher, &config.public_key)
}

fn setup_logging(log_path: Option<&PathBuf>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(env_filter);

    let debug_log = log_path.map(|log_path| {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .expect("Could not create log file");

        tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(false)
            .with_writer(Arc::new(log_file))
            .with_filter(filter::LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
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
