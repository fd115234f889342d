pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::{AppState, DriverFactory};

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(routes::events::receive_event))
        .route("/event", post(routes::events::receive_event))
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the event receiver on `0.0.0.0:<port>`.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(state, listener).await
}

/// Start the event receiver on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding port 0.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    tracing::info!(
        service = %state.settings.service_name,
        namespace = %state.settings.namespace,
        "job executor listening on http://0.0.0.0:{port}"
    );
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
