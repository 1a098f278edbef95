use blogicum::{
    AppState,
    clock::{ClockState, SystemClock},
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the database and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible development defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blogicum=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database pool and schema.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;
    let clock = Arc::new(SystemClock) as ClockState;
    let bind_addr = config.bind_addr.clone();

    // 4. Unified state and router.
    let app = create_router(AppState { repo, clock, config });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}
