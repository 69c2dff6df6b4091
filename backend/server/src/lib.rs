//! Documentation of a real-time mood voting platform.
//!
//! Visitors answer one question, good day or bad day. Each vote is attributed to a
//! country and added to that country's tally, a world map colors countries by the
//! tallies, and every vote is announced to everyone watching.
//!
//!
//!
//! # General Infrastructure
//! - Frontend calls `POST /api/vote` and `GET /api/stats`
//! - Frontend subscribes to `GET /live` for vote toasts
//! - Tallies live in Redis, so any number of server instances can take votes
//! - Server instances share nothing in memory
//!
//!
//!
//! # Vote Flow
//!
//! 1. Parse `{"mood": ...}`, anything other than good/bad (any case) is rejected with `Invalid mood`
//! 2. Resolve the country from platform geo headers, CDN geo headers, the client IP, then `DEFAULT_COUNTRY`
//! 3. Atomic upsert-increment of that country's counter
//! 4. Respond with the updated tally
//! 5. Announce `Someone from <country> is feeling <mood> today` on the live feed
//!
//! Country resolution never fails a vote, unresolved votes count for `UN`.
//!
//!
//!
//! # Notes
//!
//! ## Why Redis
//! All shared state is two counters per country. `HINCRBY` gives the atomic
//! upsert-increment for free, so concurrent votes for the same country can never
//! lose an update, even across instances.
//!
//! ## Stats caching
//! Exact real-time numbers are not needed for the map. Stats responses carry
//! `Cache-Control: public, max-age=10` so CDNs can absorb most reads.
//!
//! ## Retries
//! A vote is counted at most once per request. A client retrying after an internal
//! error may double count if the first increment did land.
//!
//!
//!
//! # Setup
//!
//! Run locally without Redis.
//! ```sh
//! TALLY_BACKEND=memory DEFAULT_COUNTRY=IN RUST_LOG=info cargo run
//! ```
//!
//! Cast a vote.
//! ```sh
//! curl -X POST localhost:1111/api/vote -H 'content-type: application/json' -H 'cf-ipcountry: JP' -d '{"mood":"good"}'
//! ```
//!
//! Watch the live feed.
//! ```sh
//! curl -N localhost:1111/live
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod geo;
pub mod live;
pub mod models;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod store;
pub mod votes;

use config::Config;
use live::live_handler;
use routes::{health_handler, stats_handler, vote_handler};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/vote", post(vote_handler))
        .route("/api/stats", get(stats_handler))
        .route("/live", get(live_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
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
}
