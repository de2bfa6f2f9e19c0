mod args;
mod auth;
mod contract;
mod domain;
mod error;
mod handlers;
mod logging;
mod routes;
mod services;
mod store;

use std::{error::Error, sync::Arc, time::Duration};

use args::{Args, parse_args};
use auth::Auth;
use axum::http::HeaderValue;
use logging::setup_logging;
use services::users::ensure_admin;
use store::{PgStore, SqliteStore, Store};
use tokio::signal::ctrl_c;

pub struct AppState<S> {
    pub store: S,
    pub auth: Arc<Auth>,
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    setup_logging(args.base_log_dir.as_deref());

    if let Err(err) = run(args).await {
        tracing::error!("Server stopped: {}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let auth = Arc::new(Auth::new(
        &args.jwt_secret_key,
        Duration::from_secs(args.token_ttl_secs),
        args.password_hash_cost,
    ));
    let cors_origin = args.cors_origin()?;

    tracing::info!("Starting in {} environment", args.node_env);
    match args.database_url()? {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            tracing::info!("Connected to PostgreSQL and applied migrations");
            serve(&args, store, auth, cors_origin).await
        }
        None => {
            let store = SqliteStore::in_memory().await?;
            tracing::warn!("Using an in-memory SQLite database, nothing will be persisted");
            serve(&args, store, auth, cors_origin).await
        }
    }
}

async fn serve<S: Store>(
    args: &Args,
    store: S,
    auth: Arc<Auth>,
    cors_origin: HeaderValue,
) -> Result<(), Box<dyn Error>> {
    if let Some((email, password)) = args.admin()? {
        if ensure_admin(&store, &auth, email, password).await? {
            tracing::info!("Created administrator account {}", email);
        }
    }

    let app_state = Arc::new(AppState { store, auth });
    let app = routes::router(app_state, cors_origin);

    let bind_address = format!("0.0.0.0:{}", args.port);
    tracing::info!("Server listening on {}...", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        match ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
