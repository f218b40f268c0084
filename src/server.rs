//! HTTP listeners for the metrics and health endpoints.
//!
//! Metrics and health checks are served on separate listeners so the health
//! port can stay private. When either server stops, the other one is shut
//! down as well.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::collector::AlertsCollector;
use crate::errors::{ExporterError, Result};
use crate::health::{healthz, HealthCheck};

/// Router exposing `/metrics`
pub fn metrics_router(collector: AlertsCollector) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(collector)
}

/// Router exposing `/healthz`
pub fn health_router(health: HealthCheck) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(health)
}

/// Handler for the `/metrics` endpoint
async fn metrics(State(collector): State<AlertsCollector>) -> Response {
    match collector.render().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An error has occurred while serving metrics:\n\n{e}"),
        )
            .into_response(),
    }
}

/// Both listeners, bound and ready to serve
pub struct Server {
    metrics: (TcpListener, Router),
    health: (TcpListener, Router),
}

impl Server {
    /// Bind both listeners
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::Serve`] if either address cannot be bound.
    pub async fn bind(
        metrics_addr: &str,
        health_addr: &str,
        collector: AlertsCollector,
        health: HealthCheck,
    ) -> Result<Self> {
        Ok(Self {
            metrics: (bind(metrics_addr).await?, metrics_router(collector)),
            health: (bind(health_addr).await?, health_router(health)),
        })
    }

    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics.0.local_addr().ok()
    }

    pub fn health_addr(&self) -> Option<std::net::SocketAddr> {
        self.health.0.local_addr().ok()
    }

    /// Serve until `shutdown` resolves or one of the servers fails
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop, _) = watch::channel(false);

        let signal = stop.clone();
        tokio::spawn(async move {
            shutdown.await;
            signal.send_replace(true);
        });

        let (metrics, health) = tokio::join!(
            serve_until("Metrics", self.metrics, stop.clone()),
            serve_until("Healthz", self.health, stop),
        );

        metrics.and(health)
    }
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Serve {
            addr: addr.to_string(),
            source,
        })
}

async fn serve_until(
    name: &'static str,
    (listener, router): (TcpListener, Router),
    stop: watch::Sender<bool>,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();
    info!("{name}: Listening on `{addr}`");

    let mut stopped = stop.subscribe();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = stopped.wait_for(|stop| *stop).await;
        })
        .await;

    stop.send_replace(true);

    match result {
        Ok(()) => {
            info!("{name}: Server stopped");
            Ok(())
        }
        Err(source) => {
            error!(error = %source, "{name}: Server failed");
            Err(ExporterError::Serve { addr, source })
        }
    }
}
