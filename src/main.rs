use axum::extract::DefaultBodyLimit;
use quiz_backend::{
    config::{get_config, init_config},
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let default_level = match std::env::var("EV_DEBUG")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "1" | "true" | "debug" => "debug",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    init_config()?;
    let config = get_config();

    let app_state = AppState::new(config.clone())?;
    let health = app_state.dispatcher.health();
    info!(
        "Quiz backend ready | demo_mode={} quiz_ready={} analysis_ready={}",
        health.demo_mode, health.quiz_ready, health.analysis_ready
    );
    info!(
        "Generation timeout {:?}, slot wait timeout {:?}, fallback root {}",
        config.dispatch.generation_timeout,
        config.dispatch.slot_wait_timeout,
        config.fallback.root.display()
    );

    let app = routes::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
