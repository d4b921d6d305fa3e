//! # TeamTask API Server
//!
//! HTTP/JSON server for TeamTask: personal tasks, groups with
//! leader/deputy/member roles, and group tasks that close once every
//! assignee has confirmed.
//!
//! ## Storage
//!
//! With `DATABASE_URL` set the server connects to PostgreSQL and applies
//! migrations on startup. Without it, everything lives in memory and is lost
//! on exit.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p teamtask-api
//! ```

use std::sync::Arc;
use teamtask_api::{
    app::{build_router, AppState},
    config::Config,
};
use teamtask_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use teamtask_shared::notify::TracingNotifier;
use teamtask_shared::store::{memory::MemoryStore, postgres::PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "teamtask_api=debug,teamtask_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "TeamTask API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let bind_address = config.bind_address();
    let notifier = Arc::new(TracingNotifier::new());

    let (state, pool) = match config.database.clone() {
        Some(database) => {
            let pool = create_pool(DatabaseConfig {
                url: database.url,
                max_connections: database.max_connections,
                ..Default::default()
            })
            .await?;
            run_migrations(&pool).await?;

            let store = Arc::new(PgStore::new(pool.clone()));
            (AppState::from_store(config, store, notifier), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            let store = Arc::new(MemoryStore::new());
            (AppState::from_store(config, store, notifier), None)
        }
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
