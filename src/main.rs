use college_erp::{
    AppState,
    config::AppConfig,
    create_router, handlers,
    rate_limit::{MemoryWindowStore, RateLimits},
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    telemetry,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

/// main
///
/// The asynchronous entry point: loads configuration, installs logging, connects the
/// document store, seeds the bootstrap admin and serves the API.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: console and <LOG_DIR>/server.log. The guard flushes the file on exit.
    let _log_guard = telemetry::init_tracing(&config)
        .expect("FATAL: Failed to open the log directory. Check LOG_DIR.");

    tracing::info!("Application starting in {} mode", config.env.as_str());

    // 3. Document Store
    // Postgres when DATABASE_URL is set (always in production), in-memory otherwise.
    let repo: RepositoryState = match config.db_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(config.persistence_timeout)
                .connect(url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.migrate()
                .await
                .expect("FATAL: Failed to apply database migrations.");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory only");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Rate Windows
    // One in-process store for both classifications, swept once per window.
    let window_store = Arc::new(MemoryWindowStore::new());
    let limits = RateLimits::new(window_store.clone(), &config.rate_limit);
    let window = config.rate_limit.window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            ticker.tick().await;
            window_store.purge_expired(window);
        }
    });

    // 5. Unified State Assembly
    let port = config.port;
    let app_state = AppState::with_limits(repo, config, limits);

    if let Err(err) = handlers::bootstrap_admin(&app_state).await {
        tracing::error!("Failed to create the seed admin: {err}");
    }

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .expect("FATAL: Failed to bind the HTTP port. Check PORT.");

    tracing::info!("Listening on {addr}");
    tracing::info!("OpenAPI document available at: http://localhost:{port}/api-docs/openapi.json");

    // Connect info feeds the per-client rate windows and the access log.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("FATAL: HTTP server terminated unexpectedly.");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
