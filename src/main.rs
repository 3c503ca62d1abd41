//! Review Assigner
//!
//! A REST service that assigns pull-request reviewers from the author's team,
//! rotates them on request or on bulk deactivation, and tracks merges. State
//! lives in SQLite.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod metrics;
mod models;
mod services;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::SqliteStore;
use metrics::ReviewerLoad;
use services::{CandidateSelector, Services};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services<SqliteStore>>,
    pub load: Arc<ReviewerLoad>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services over an opened store.
    pub fn new(store: SqliteStore, config: Config) -> Self {
        let selector = match config.selection_seed {
            Some(seed) => CandidateSelector::seeded(seed),
            None => CandidateSelector::from_entropy(),
        };
        let load = Arc::new(ReviewerLoad::new());
        let services = Services::new(Arc::new(store), Arc::new(selector), load.clone());

        Self {
            services: Arc::new(services),
            load,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!("Starting Review Assigner");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.auth_token.is_none() {
        tracing::warn!(
            "No auth token configured (REVIEW_AUTH_TOKEN). Any Authorization header is accepted!"
        );
    }
    if let Some(seed) = config.selection_seed {
        tracing::info!(seed, "Reviewer selection is seeded");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path, config.db_max_connections).await?;
    let store = SqliteStore::new(pool.clone());

    let bind_addr = config.bind_addr;
    let state = AppState::new(store, config);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone token for the auth layer
    let token = state.config.auth_token.clone();
    let request_timeout = state.config.request_timeout;

    // API routes
    let api_routes = Router::new()
        // Teams
        .route("/team/add", post(api::add_team))
        .route("/team/get", get(api::get_team))
        .route("/team/addMember", post(api::add_team_member))
        .route("/team/delete", post(api::delete_team))
        // Users
        .route("/users/setIsActive", post(api::set_is_active))
        .route("/users/getReview", get(api::get_user_reviews))
        .route(
            "/users/deactivateTeamMembers",
            post(api::deactivate_team_members),
        )
        // Pull requests
        .route("/pullRequest/create", post(api::create_pull_request))
        .route("/pullRequest/merge", post(api::merge_pull_request))
        .route("/pullRequest/get", get(api::get_pull_request))
        .route("/pullRequest/reassign", post(api::reassign_reviewer))
        // Apply auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::auth_layer(token.clone(), req, next)
        }));

    // Health check and metrics (no auth required)
    let open_routes = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(api::metrics));

    Router::new()
        .merge(api_routes)
        .merge(open_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
