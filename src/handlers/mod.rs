//! HTTP surface for the relay, view subscribers and the thread service.

pub mod error;
pub mod errmsg;
pub mod relay;
pub mod threads;
pub mod view;

use std::future::Future;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// CORS and request tracing shared by every router.
pub(crate) fn with_layers(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Bind `address` and serve `app` until `shutdown` resolves.
///
/// When the port is 0, the OS assigns an ephemeral port. The actual bound
/// address is always logged so it can be discovered.
pub async fn serve(
    app: Router,
    address: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
