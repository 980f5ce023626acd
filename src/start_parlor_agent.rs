//! Startup helpers for the Parlor agent server.

use std::process::ExitCode;

use crate::conversations::core::config::AppConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl+C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Parlor Agent v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env();
    tracing::info!("Ollama endpoint: {}", config.llm.base_url);
    tracing::info!("Conversation store: {}", config.storage.sqlite_path.display());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = rt.block_on(async {
        let state = AppState::from_config(&config).await?;
        server::run_server_with_shutdown(state, config.server.port, shutdown_signal()).await
    });

    if let Err(e) = result {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
