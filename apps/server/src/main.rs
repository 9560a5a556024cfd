mod config;
mod error;
mod routes;
mod session;
mod state;

use diesel::pg::PgConnection;
use diesel::Connection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(node_env = %config.node_env, "starting sync log server");

    {
        let mut conn = PgConnection::establish(&config.database_url)
            .map_err(|e| anyhow::anyhow!("failed to connect for migrations: {e}"))?;
        eventsync_server_store::run_pending_migrations(&mut conn)
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;

    let app = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
