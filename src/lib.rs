//! # Alerts Exporter
//!
//! Exposes the alerts of a [Prometheus Alertmanager](https://prometheus.io/docs/alerting/latest/alertmanager/)
//! as Prometheus metrics.
//!
//! ## Features
//!
//! - One `alerts_exporter_alerts` gauge per alert, queried fresh on every scrape
//! - Alert state, inhibitions and silences exposed as `_alerts_exporter_*` labels
//! - Health endpoint reporting Alertmanager reachability and version
//! - Static bearer token or refreshing Kubernetes service account token auth
//!
//! ## Example
//!
//! ```rust,no_run
//! use alerts_exporter::{AlertFilter, AlertmanagerClient, AlertsCollector, HealthCheck, Server};
//! use url::Url;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AlertmanagerClient::new(
//!         Url::parse("http://localhost:9093")?,
//!         Duration::from_secs(10),
//!     )?;
//!
//!     let collector = AlertsCollector::new(client.clone(), AlertFilter::default());
//!     let server = Server::bind(
//!         "0.0.0.0:8080",
//!         "0.0.0.0:8081",
//!         collector,
//!         HealthCheck::new(client),
//!     )
//!     .await?;
//!
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
mod client;
pub mod collector;
pub mod config;
mod errors;
pub mod health;
pub mod server;
mod types;

pub use auth::{AuthInfoWriter, Authenticate, BearerToken, ServiceAccountToken};
pub use client::AlertmanagerClient;
pub use collector::{AlertSample, AlertsCollector};
pub use config::{Config, Upstream};
pub use errors::{ExporterError, Result};
pub use health::HealthCheck;
pub use server::Server;
pub use types::{
    AlertFilter, AlertStatus, AlertmanagerStatus, ClusterStatus, GettableAlert, PeerStatus,
    Receiver, VersionInfo,
};
