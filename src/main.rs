use anyhow::Context;
use axum::Router;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;
use ticketserver::config::AppConfig;
use ticketserver::escalation::{EscalationEngine, EscalationPolicy, EscalationScheduler};
use ticketserver::shared::state::AppState;
use ticketserver::shared::utils::create_conn;
use ticketserver::tickets::api::configure_ticket_routes;
use ticketserver::tickets::{TicketService, TicketStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database_url());
    let pool = create_conn(&database_url).context("failed to create database pool")?;

    {
        let mut conn = pool.get().context("failed to get database connection")?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("migrations failed: {e}"))?;
    }

    let store = TicketStore::new(pool);
    let service = Arc::new(TicketService::new(
        store.clone(),
        config.escalation.allow_reopen,
    ));

    let policy = EscalationPolicy::from_config(&config.escalation);
    let engine = Arc::new(EscalationEngine::new(store, policy));
    let scheduler = Arc::new(EscalationScheduler::new(
        engine,
        config.escalation.scan_interval_minutes,
    ));
    scheduler.start().await;

    let state = Arc::new(AppState {
        tickets: service,
        scheduler: scheduler.clone(),
    });

    let app = Router::new()
        .merge(configure_ticket_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("starting HTTP server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.stop().await;

    if let Err(e) = serve_result {
        error!("server error: {e}");
        return Err(e.into());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}
