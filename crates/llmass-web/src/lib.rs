pub mod auth;
pub mod config;
pub mod links;
pub mod render;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

pub use routes::{AppState, router};

/// Serve until `shutdown` resolves. In-flight requests finish first.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
