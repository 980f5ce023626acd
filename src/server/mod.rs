//! HTTP server for the Parlor agent.
//!
//! - `/api/conversations/*`: JSON endpoints over [`crate::conversations::ConversationStore`]
//! - `/api/chat`: one user message in, transcript snapshots out as server-sent events
//! - anything else: files from [`AppState::static_dir`], `index.html` being the chat page
//!
//! Every `/api` request is scoped to the [`crate::conversations::Owner`] taken from
//! the identity headers in [`identity`].

pub mod identity;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Start the HTTP server with graceful shutdown support.
///
/// The server will stop accepting new connections when `shutdown_signal` completes.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let static_dir = state.static_dir.clone();
    let app: Router = create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Parlor Agent listening on http://{addr}");
    if !static_dir.join("index.html").is_file() {
        tracing::warn!("No chat page at {}; only the API is served", static_dir.display());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}
