//! Narrowfin web server: shared state, router construction, and startup.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use narrowfin_core::{JellyfinClient, NarrowfinConfig, StreamRelay};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{
    browse_items, libraries_index, login_form, login_submit, play_item, proxy_stream, search_items,
};
use crate::session::SessionStore;

/// Shared application state. Everything inside is cheap to clone; each
/// request gets its own handle with no cross-request locking beyond the
/// session map.
#[derive(Clone)]
pub struct AppState {
    pub api: JellyfinClient,
    pub relay: StreamRelay,
    pub sessions: SessionStore,
    pub config: NarrowfinConfig,
}

impl AppState {
    pub fn new(config: NarrowfinConfig) -> Self {
        Self {
            api: JellyfinClient::new(config.upstream.clone(), config.identity.clone()),
            relay: StreamRelay::new(config.upstream.clone(), config.identity.clone()),
            sessions: SessionStore::new(),
            config,
        }
    }
}

/// Builds the application router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(login_form).post(login_submit))
        .route("/libraries", get(libraries_index))
        .route("/items/{parent_id}", get(browse_items))
        .route("/search", get(search_items))
        .route("/play/{item_id}/{item_type}", get(play_item))
        .route("/proxy_stream/{item_id}/{mode}/{item_type}", get(proxy_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener and serves until the process exits.
///
/// # Errors
/// - `Box<dyn std::error::Error>` - Listener could not bind or the server
///   loop failed
pub async fn run_server(
    config: NarrowfinConfig,
    listen: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let upstream = config.upstream.base_url.clone();
    let state = AppState::new(config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Narrowfin listening on http://{listen}, upstream {upstream}");
    axum::serve(listener, app).await?;

    Ok(())
}
