use anyhow::Result;
use quill_axum::{router, QuillState};
use quill_core::QuillConfig;
use quill_drafts::DraftsConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = QuillConfig::new();
    let loaded = config.load_env("QUILL__");
    let snapshot = config.snapshot();

    let host = snapshot
        .get_string("http.host")
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = snapshot
        .get_string("http.port")
        .unwrap_or_else(|| "3030".to_string());
    let addr = format!("{host}:{port}");
    let public_base_url = snapshot
        .get_string("blobs.public_base_url")
        .unwrap_or_else(|| format!("http://{addr}/blobs"));

    let state = QuillState::in_memory(DraftsConfig::from_snapshot(&snapshot), public_base_url);

    let (stop_reaper, reaper_stopped) = tokio::sync::oneshot::channel::<()>();
    let reaper = tokio::spawn(state.drafts.reaper().run_until(async move {
        let _ = reaper_stopped.await;
    }));

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, overrides = loaded, "quill-server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;

    let _ = stop_reaper.send(());
    reaper.await?;
    info!("quill-server stopped");
    Ok(())
}
