//! Messmate Backend Service
//!
//! Entry point for the shared-living meal and cost backend:
//! - JSON HTTP API
//! - WebSocket server for live room updates and notifications
//! - Background housekeeping (sessions, invitations, votes, rate buckets)

use messmate_backend::config::AppConfig;
use messmate_backend::database::{create_pool, run_migrations};
use messmate_backend::error::{AppError, AppResult};
use messmate_backend::routes::router;
use messmate_backend::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "messmate_backend={},sqlx=warn,tower_http=info",
            config.log_level
        )
        .into()
    });

    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Messmate Backend Starting                       ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);
    if let Some(ws_port) = config.ws_port {
        info!("WebSocket port: {}", ws_port);
    }

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;
    info!("Database pool ready (max {} connections)", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;
    info!("Database migrations completed");

    // =========================================================================
    // SERVICES
    // =========================================================================
    let http_port = config.http_port;
    let ws_port = config.ws_port;
    let environment = config.environment.clone();

    let state = AppState::new(pool, config)?;
    info!("✓ Services initialized");

    let housekeeper = state.housekeeper();
    let housekeeping_handle = tokio::spawn(async move {
        housekeeper.start().await;
    });
    info!("✓ Housekeeping task started");

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let ws_handle = if let Some(ws_port) = ws_port {
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));
        let listener = TcpListener::bind(ws_addr).await.map_err(|e| {
            AppError::Message(format!("Failed to bind WebSocket server: {}", e))
        })?;
        let ws_server = state.ws_server.clone();

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from {}", addr);
                        let ws = ws_server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = ws.handle_connection(stream).await {
                                error!("WebSocket connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("WebSocket accept error: {}", e);
                    }
                }
            }
        });

        info!("✓ WebSocket server started on {}", ws_addr);
        Some(handle)
    } else {
        warn!("WS_PORT not configured - WebSocket server not started");
        None
    };

    let http_addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(http_addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;
    let app = router(state);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            error!("HTTP server error: {}", e);
        }
    });
    info!("✓ HTTP server started on {}", http_addr);

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Messmate Backend Ready!                         ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  HTTP API:     0.0.0.0:{}                              ║", http_port);
    if let Some(ws_port) = ws_port {
        info!("║  WebSocket:    0.0.0.0:{}                              ║", ws_port);
    }
    info!("║  Environment:  {}                                    ║", environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = http_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = housekeeping_handle => {
            error!("Housekeeping task exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = ws_handle {
                handle.await.ok();
            } else {
                futures::future::pending::<()>().await;
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    info!("Messmate backend shutdown complete");
    Ok(())
}
