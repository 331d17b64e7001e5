mod auth;
mod config;
mod draft;
mod error;
mod handlers;
mod request_context;
mod routes;
mod scheduler;
mod state;
mod upload;

use std::time::Duration;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env();
    tracing::info!("starting newsdesk backend");
    tracing::info!("database: {}", config.db_path);
    tracing::info!("media directory: {}", config.media_dir.display());
    tracing::info!("public domain: {}", config.public_domain);

    let bind = format!("{}:{}", config.bind_addr, config.port);
    let interval = Duration::from_secs(config.scheduler_interval_secs);
    let app_state = state::AppState::new(config).await?;

    scheduler::spawn_publish_scheduler(app_state.articles.clone(), interval);

    let app = routes::create_router(app_state);
    tracing::info!("listening on {bind}");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
