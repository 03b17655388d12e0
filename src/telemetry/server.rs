//! HTTP exposition of the Prometheus sink.
//!
//! ```text
//! GET /metrics   → exposition-format text
//! ```
//!
//! Every other path is a 404.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::AppError;

use super::registry::MetricsRegistry;

pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Bind `localhost:<port>`. Port `0` picks an ephemeral port.
pub(crate) async fn bind(port: u16) -> Result<TcpListener, AppError> {
    let addr = format!("localhost:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })
}

pub(crate) fn build_router(registry: MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(registry)
}

async fn metrics(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        registry.render_prometheus(),
    )
}

/// Serve `/metrics` on `listener` until `shutdown` is cancelled.
pub(crate) fn spawn(
    listener: TcpListener,
    registry: MetricsRegistry,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let addr = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();
        info!(%addr, "metrics endpoint listening");

        let served = axum::serve(listener, build_router(registry))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        match served {
            Ok(()) => info!(%addr, "metrics endpoint shut down"),
            Err(e) => error!(%addr, error = %e, "metrics endpoint failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::inmem::InmemSink;
    use crate::telemetry::registry::METRICS_NAMESPACE;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::Duration;
    use tower::ServiceExt;

    fn registry() -> MetricsRegistry {
        let inmem = InmemSink::new(Duration::from_secs(10), Duration::from_secs(60));
        MetricsRegistry::new(METRICS_NAMESPACE, inmem, PrometheusBuilder::new().build_recorder())
    }

    #[tokio::test]
    async fn metrics_route_renders_registry() {
        let registry = registry();
        registry.counter("state.txn_exceed_period", &[]).increment(2);

        let resp = build_router(registry)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            EXPOSITION_CONTENT_TYPE
        );
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("minimal_state_txn_exceed_period 2"), "{text}");
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let resp = build_router(registry())
            .oneshot(Request::get("/debug/vars").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        // `localhost` may resolve to both loopback families; hold the port on each.
        let v4 = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = v4.local_addr().unwrap().port();
        let _v6 = TcpListener::bind(("::1", port)).await;

        let err = bind(port).await.unwrap_err();
        assert!(matches!(err, AppError::Bind { .. }), "got {err}");
    }
}
