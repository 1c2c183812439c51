mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;

use leptos::prelude::get_configuration;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env().expect("server configuration");
    let leptos_options = get_configuration(None)
        .expect("leptos configuration")
        .leptos_options;

    if config.dev_login {
        tracing::warn!("DEV_LOGIN enabled: /api/auth/login signs in any email without verification");
    }

    let pool = db::init_pool(&config).await.expect("database init failed");
    let port = config.port;
    let state = state::AppState::new(pool, config);

    // Spawn background persistence task.
    let _persistence = services::persistence::spawn_persistence_task(state.clone());

    let app = routes::app(state.clone(), leptos_options);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "chatroom listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    // Flush whatever the last cycle did not reach.
    services::persistence::flush_all_dirty(&state).await;
    tracing::info!("chatroom stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
