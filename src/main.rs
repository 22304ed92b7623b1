use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use ocp_gateway::{
    auth::{AuthManager, RevokeOutcome},
    config::Config,
    http_client::OcpHttpClient,
    middleware,
    routes::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("OCP Gateway starting...");
    tracing::info!("OCP host: {}", config.ocp_host);

    let auth_manager = Arc::new(AuthManager::new(
        config.auth_settings(),
        Duration::from_secs(config.http_request_timeout),
    )?);

    // Test authentication by getting a token
    match auth_manager.get_token().await {
        Some(token) => {
            tracing::info!(
                "Authentication successful (token: {}...)",
                token_preview(&token)
            );
        }
        None => {
            tracing::warn!(
                "Authentication failed, server will start but API requests will fail until OCP accepts the credentials"
            );
        }
    }

    let http_client = Arc::new(OcpHttpClient::new(
        auth_manager.clone(),
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);

    let app_state = AppState {
        proxy_api_key: config.proxy_api_key.clone(),
        auth_manager: auth_manager.clone(),
        http_client,
    };

    let app = build_app(app_state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match auth_manager.revoke().await {
        RevokeOutcome::Revoked => tracing::info!("OCP session closed"),
        RevokeOutcome::NothingToRevoke => {}
        RevokeOutcome::Failed { reason } => {
            tracing::warn!("Could not close OCP session: {}", reason)
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// First characters of a token, safe for any UTF-8 content
fn token_preview(token: &str) -> String {
    token.chars().take(12).collect()
}

/// Build the application with all routes and middleware
fn build_app(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::proxy_routes(state))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn print_startup_banner(config: &Config) {
    println!();
    println!("  OCP Gateway {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:      http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  OCP host:    {}", config.ocp_host);
    println!("  OCP user:    {}", config.ocp_username);
    println!("  Log Level:   {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
