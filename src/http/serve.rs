//! Manual accept loop, used instead of `axum::serve` so each accepted connection gets a distinct
//! [`ConnectionId`] injected into its requests and a hook that runs when the connection actually
//! closes — the mechanism §4.5/§4.6 need for producer-session teardown on connection close.
//! Modeled on the upstream `hyper_util`/`axum` graceful-shutdown pattern (`TokioIo` +
//! `hyper_util::server::conn::auto::Builder` + `hyper_util::server::graceful::GracefulShutdown`).

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tower::Service;

use super::handlers::ConnectionId;
use crate::kafka::KafkaHandleFactory;
use crate::registry::SessionRegistry;

/// Binds `listener`, serves `router` with per-connection [`ConnectionId`] injection, and shuts
/// down gracefully (draining in-flight connections) once `shutdown_signal` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    registry: Arc<SessionRegistry<F>>,
    shutdown_signal: impl std::future::Future<Output = ()>,
) -> std::io::Result<()>
where
    F: KafkaHandleFactory + Clone,
{
    let next_connection_id = AtomicU64::new(0);
    let graceful = GracefulShutdown::new();

    tokio::pin!(shutdown_signal);

    loop {
        let accept = listener.accept();

        tokio::select! {
            result = accept => {
                let (stream, _peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("failed to accept connection: {e}");
                        continue;
                    }
                };

                let connection_id = ConnectionId(next_connection_id.fetch_add(1, Ordering::Relaxed));
                let io = TokioIo::new(stream);
                let svc = with_connection_id(router.clone(), connection_id);
                let registry = Arc::clone(&registry);

                let conn = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection_with_upgrades(io, TowerToHyperService::new(svc));
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!("connection error: {e}");
                    }
                    registry.remove_producer(connection_id.0);
                });
            }
            _ = &mut shutdown_signal => {
                tracing::info!("shutdown signal received, draining connections");
                break;
            }
        }
    }

    graceful.shutdown().await;
    registry.shutdown().await;

    Ok(())
}

/// Wraps `router` in a tiny service that stamps every request with `connection_id` as an
/// extension before dispatching into the router, the per-connection analogue of
/// `axum::Extension` as a global layer.
fn with_connection_id(
    router: Router,
    connection_id: ConnectionId,
) -> impl Service<Request, Response = Response, Error = Infallible, Future = impl Send> + Clone {
    tower::service_fn(move |mut req: Request| {
        let mut router = router.clone();
        req.extensions_mut().insert(connection_id);
        async move { router.call(req).await }
    })
}
