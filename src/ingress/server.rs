use crate::ingress::api::{create_log, health_check, ApiError, IngressState};
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Routes for the ingress API
pub fn router(state: Arc<IngressState>) -> Router {
    Router::new()
        .route("/log", post(create_log))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response)),
        )
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked");
    ApiError::InternalError("Server error".to_string()).into_response()
}

/// Serve the ingress API until `shutdown_rx` flips to true, then drain
/// in-flight requests.
pub async fn start_server(
    listen_addr: SocketAddr,
    state: Arc<IngressState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "Logging server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            info!("Logging server shutting down gracefully");
        })
        .await
}
