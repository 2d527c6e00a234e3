use std::{net::SocketAddr, sync::Arc};
use sugar_log::{kv::JsonFileKv, router, state::SharedKv, AppConfig, AppState, RecordStore, Session};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env();
    let kv: SharedKv = Arc::new(JsonFileKv::open(&config.data_path).await?);
    let mut session = Session::new(RecordStore::new(kv));
    if let Err(err) = session.load().await {
        error!("failed to load records: {err}");
    }

    let app = router(AppState::new(session));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
