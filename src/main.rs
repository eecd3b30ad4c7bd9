mod config;
mod protocol;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("invalid configuration");
    let port = config.port;
    let state = state::AppState::new(config);

    // Relay upstream domain events to connected clients for the process
    // lifetime.
    let _relay = services::relay::spawn_relay_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "railboard coordinator listening");
    axum::serve(listener, app).await.expect("server failed");
}
