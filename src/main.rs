use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use workout_tracker::{Config, build_state, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let state = build_state(&config).await;
    let app = router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(tracker) = state.tracker() {
        info!("flushing pending saves");
        tracker.shutdown().await;
    }

    Ok(())
}
