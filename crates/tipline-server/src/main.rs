use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use tipline_api::{AppStateInner, router};
use tipline_db::Database;
use tipline_store::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tipline=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("TIPLINE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TIPLINE_PORT")
        .unwrap_or_else(|_| "8081".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("TIPLINE_DB_PATH")
        .unwrap_or_else(|_| "tipline.db".into())
        .into();
    let store_dir: PathBuf = std::env::var("TIPLINE_STORE_DIR")
        .unwrap_or_else(|_| "./store".into())
        .into();

    let db = Database::open(&db_path)?;
    let storage = Storage::new(store_dir)?;
    let state = Arc::new(AppStateInner { db, storage });

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Tipline journalist API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
