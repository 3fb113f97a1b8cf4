use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qwitter::auth::session;
use qwitter::config::{Cli, Config};
use qwitter::social::users;
use qwitter::state::AppState;
use qwitter::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    if let Some(username) = cli.promote.as_deref() {
        let conn = pool.get()?;
        users::set_staff(&conn, username, true)?;
        tracing::info!(%username, "Granted staff rights");
        return Ok(());
    }

    {
        let conn = pool.get()?;
        let purged = session::purge_expired(&conn)?;
        if purged > 0 {
            tracing::info!(purged, "Removed expired sessions");
        }
    }

    let state = AppState::new(pool, config.clone());
    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
