use crate::collector::Collect;
use axum::{
    Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serves `/metrics`, polling the batteries on every scrape.
pub struct MetricsServer {
    registry: Arc<Registry>,
    collector: Arc<dyn Collect>,
    listen: SocketAddr,
    cancel: CancellationToken,
}

impl MetricsServer {
    pub fn new(
        registry: Arc<Registry>,
        collector: Arc<dyn Collect>,
        listen: SocketAddr,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            collector,
            listen,
            cancel,
        }
    }

    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        let collector = self.collector.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                let collector = collector.clone();
                async move { metrics_handler(registry, collector).await }
            }),
        )
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.router();

        let listener = TcpListener::bind(self.listen).await?;
        tracing::info!("Metrics server listening on http://{}/metrics", self.listen);

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

async fn metrics_handler(
    registry: Arc<Registry>,
    collector: Arc<dyn Collect>,
) -> axum::response::Response {
    // Device queries block, keep them off the async workers.
    if let Err(e) = tokio::task::spawn_blocking(move || collector.collect()).await {
        tracing::error!("Battery collection panicked: {}", e);
    }

    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &registry) {
        tracing::error!("Failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        buffer,
    )
        .into_response()
}
