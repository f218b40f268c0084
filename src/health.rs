use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, instrument};

use crate::client::AlertmanagerClient;
use crate::types::{ClusterStatus, VersionInfo};

pub const NIL_RESPONSE: &str = "Nil response from Alertmanager";

/// Health check backed by the Alertmanager status API
#[derive(Clone)]
pub struct HealthCheck {
    client: AlertmanagerClient,
}

/// Body of a successful health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub alertmanager_cluster: Option<ClusterStatus>,
    pub alertmanager_version: Option<VersionInfo>,
    pub alertmanager_uptime: Option<String>,
}

impl HealthCheck {
    pub fn new(client: AlertmanagerClient) -> Self {
        Self { client }
    }

    /// Query Alertmanager once and report whether it is reachable
    ///
    /// Answers 500 with the error text if the query fails or returns no
    /// payload, 200 with a [`HealthResponse`] otherwise.
    #[instrument(name = "HealthCheck::check", skip_all)]
    pub async fn check(&self) -> Response {
        let status = match self.client.get_status().await {
            Ok(Some(status)) => status,
            Ok(None) => {
                error!("Alertmanager status response had no payload");
                return (StatusCode::INTERNAL_SERVER_ERROR, NIL_RESPONSE).into_response();
            }
            Err(e) => {
                error!(error = %e, "Health check failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
            }
        };

        let body = HealthResponse {
            status: "connected",
            alertmanager_cluster: status.cluster,
            alertmanager_version: status.version_info,
            alertmanager_uptime: status.uptime,
        };

        match serde_json::to_vec(&body) {
            Ok(json) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Encoding error: {e}"),
            )
                .into_response(),
        }
    }
}

/// Handler for the `/healthz` endpoint
pub async fn healthz(State(health): State<HealthCheck>) -> Response {
    health.check().await
}
