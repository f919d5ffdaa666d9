//! Profile picture changer for a messaging account, gated by a pair code.
//!
//!
//!
//! # Flow
//!
//! - Client posts a phone number to `/generate-pair`
//! - Backend stores a 6-digit code for that phone, valid 15 minutes, and answers with the
//!   code, a `wa.me` deep link prefilled with it and a QR image of that link
//! - User sends the code to the service account from that phone
//! - Gateway forwards the message to `/webhook/messages`, the listener matches it and marks
//!   the phone as verified, then replies with a confirmation
//! - Client posts the phone and a base64 image to `/update-dp`
//! - Backend consumes the verified session, squares the image to 640x640 JPEG and asks the
//!   gateway to set it as the account's profile picture
//!
//!
//!
//! # Pair Codes
//!
//! - Single use, consumed by the first correct message
//! - A new request for the same phone replaces the old code
//! - Wrong guesses are counted, the code is dropped after `MAX_VERIFY_ATTEMPTS`
//! - Expired codes and sessions are purged every `PURGE_INTERVAL_SECS`
//!
//!
//!
//! # Sessions
//!
//! - Valid for `SESSION_TTL_SECS` after verification
//! - One update attempt per session, success or not
//! - A failed update means pairing again
//!
//!
//!
//! # Gateway
//!
//! The messaging network connection is owned by a separate gateway process, including its
//! credential file (`AUTH_STATE_PATH`). See [`messaging`] for the calls made to it.
//!
//! Run locally.
//! ```sh
//! BRIDGE_URL=http://127.0.0.1:8080 RUST_LOG=info cargo run --bin dpchanger
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use chrono::Utc;
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal, time::interval};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod listener;
pub mod messaging;
pub mod pairing;
pub mod picture;
pub mod routes;
pub mod state;
pub mod store;
pub mod update;
pub mod utils;

use routes::{generate_pair_handler, health_handler, inbound_handler, update_dp_handler};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let (state, inbound) = State::new().await;

    info!("Connecting to messaging gateway...");
    if let Err(e) = state.messenger.connect().await {
        warn!("Gateway not ready, continuing without it: {e}");
    }

    tokio::spawn(listener::run(state.clone(), inbound));
    tokio::spawn(purge_expired(state.clone()));

    info!("Starting server...");

    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutting down...");
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/generate-pair", post(generate_pair_handler))
        .route("/update-dp", post(update_dp_handler))
        .route("/webhook/messages", post(inbound_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(&state.config.public_dir))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .with_state(state)
}

async fn purge_expired(state: Arc<State>) {
    let mut ticker = interval(state.config.purge_interval.max(Duration::from_secs(1)));

    loop {
        ticker.tick().await;

        let purged = state.store.purge_expired(Utc::now()).await;
        if purged.pairings > 0 || purged.sessions > 0 {
            info!(
                "Purged {} expired pairings and {} expired sessions",
                purged.pairings, purged.sessions
            );
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
