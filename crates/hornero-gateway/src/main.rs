//! Hornero Gateway - entry point

use std::sync::Arc;

use clap::Parser;
use hornero_core::memory::MemoryStore;
use hornero_gateway::db::{MemoryPrincipalDirectory, MemoryTenantRegistry};
use hornero_gateway::{build_routes, metrics, AppState, GatewayConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "hornero_gateway=debug,hornero_core=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    init_tracing(config.log_json);

    tracing::info!("Starting Hornero Gateway v{}", env!("CARGO_PKG_VERSION"));
    metrics::init_metrics();

    let addr = config.bind_addr;
    let state = build_state(config).await?;

    let app = build_routes(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn memory_state(config: GatewayConfig) -> anyhow::Result<AppState> {
    tracing::warn!("no database configured; tenants, users and records are kept in memory");
    Ok(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryTenantRegistry::new()),
        Arc::new(MemoryPrincipalDirectory::new()),
    )?)
}

#[cfg(feature = "persistence-sqlx")]
async fn build_state(config: GatewayConfig) -> anyhow::Result<AppState> {
    use hornero_gateway::db::{self, SqlxPrincipalDirectory, SqlxStore, SqlxTenantRegistry};

    let Some(url) = config.database_url.clone() else {
        return memory_state(config);
    };
    let pool = db::init_pool(&url).await?;
    db::initialize_schema(&pool).await?;
    tracing::info!("connected to PostgreSQL");

    Ok(AppState::new(
        config,
        Arc::new(SqlxStore::new(pool.clone())),
        Arc::new(SqlxTenantRegistry::new(pool.clone())),
        Arc::new(SqlxPrincipalDirectory::new(pool)),
    )?)
}

#[cfg(not(feature = "persistence-sqlx"))]
async fn build_state(config: GatewayConfig) -> anyhow::Result<AppState> {
    if config.database_url.is_some() {
        tracing::warn!("HORNERO_DATABASE_URL is set but this build lacks the persistence-sqlx feature");
    }
    memory_state(config)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
