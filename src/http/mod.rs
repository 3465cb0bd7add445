//! BridgeFrontend: binds the [`crate::registry::SessionRegistry`] to an axum [`Router`] (§4's
//! `BridgeFrontend`), plus the connection-aware serve loop that keys producer sessions by HTTP
//! connection and tears them down when the connection closes (§4.5, §4.6).

pub mod dto;
pub mod handlers;
mod serve;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::kafka::KafkaHandleFactory;
use crate::registry::SessionRegistry;

pub use serve::serve;

/// Builds the bridge's axum [`Router`], wiring every operation from §6's HTTP surface table plus
/// the ambient `/healthz` probe (§10.5).
pub fn router<F>(registry: Arc<SessionRegistry<F>>, cors: &CorsConfig) -> Router
where
    F: KafkaHandleFactory + Clone,
{
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/consumers/{group}",
            post(handlers::create_consumer::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}",
            delete(handlers::delete_consumer::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/subscription",
            post(handlers::subscribe::<F>).delete(handlers::unsubscribe::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/assignments",
            post(handlers::assign::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/records",
            get(handlers::poll::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/offsets",
            post(handlers::commit::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/positions",
            post(handlers::seek::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/positions/beginning",
            post(handlers::seek_to_beginning::<F>),
        )
        .route(
            "/consumers/{group}/instances/{name}/positions/end",
            post(handlers::seek_to_end::<F>),
        )
        .route("/topics/{topic}", post(handlers::produce::<F>))
        .fallback(handlers::classifier_fallback)
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any);
    }

    let origins: Vec<_> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Idle timeout used by [`SessionRegistry::spawn_idle_expiry`], exposed here so `main.rs` doesn't
/// need to know the registry's internal field layout.
pub fn idle_timeout_from_seconds(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
