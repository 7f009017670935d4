//! HTTP API
//!
//! JSON endpoints over the application context: discovery, device
//! membership, control and totals.

mod error;
mod handlers;
mod router;
mod state;

use std::future::Future;

use tokio::net::TcpListener;

pub use router::create_router;
pub use state::ApiState;

/// Serve the API on `listener` until `shutdown` resolves, then drain
/// in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: ApiState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
