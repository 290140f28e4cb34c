use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use foerderportal_backend::{
    config::{init_config, LogFormat},
    database::pool::{create_pool, run_migrations},
    routes, AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = init_config()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(pool, Arc::new(config.clone()));

    match app_state.application_service.migrate_legacy_answers().await {
        Ok(0) => {}
        Ok(count) => info!(count, "migrated legacy answer maps"),
        Err(e) => tracing::error!(error = ?e, "legacy answer migration failed"),
    }

    {
        let drafts = app_state.draft_service.clone();
        let retention_days = config.draft_retention_days;
        tokio::spawn(async move {
            loop {
                match drafts.purge_older_than(retention_days).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, retention_days, "purged stale form drafts"),
                    Err(e) => tracing::error!(error = ?e, "draft sweeper error"),
                }
                tokio::time::sleep(Duration::from_secs(60 * 60)).await;
            }
        });
    }

    let app = routes::router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
