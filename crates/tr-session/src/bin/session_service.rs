use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tr_evaluator::sim::SimEvaluator;
use tr_session::{EventSink, SessionOrchestrator};
use tr_store::SnapshotStore;
use tr_suggest::HttpSuggestClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("TUNERIG_SESSION_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8088".to_string());
    let suggest_url = std::env::var("TUNERIG_SUGGEST_URL")
        .unwrap_or_else(|_| "http://localhost:9090".to_string());

    let store = match std::env::var("TUNERIG_DATA_DIR") {
        Ok(dir) => SnapshotStore::new(dir)?,
        Err(_) => SnapshotStore::at_default_location()?,
    };
    info!(root = %store.root.display(), "snapshot store opened");

    // Sandbox evaluator by default; a real target adapter plugs in through
    // the library API.
    let orchestrator = Arc::new(
        SessionOrchestrator::new(
            HttpSuggestClient::new(&suggest_url),
            SimEvaluator::with_defaults(),
            EventSink::detached(),
        )
        .with_store(store),
    );

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, suggest = %suggest_url, "TuneRig session service listening");

    loop {
        let (mut socket, _) = listener.accept().await?;
        let orchestrator = orchestrator.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let _ = socket.read(&mut buffer).await;

            let body = serde_json::to_string(&orchestrator.snapshot())
                .unwrap_or_else(|_| "{}".to_string());
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}
