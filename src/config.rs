//! Process configuration and upstream client construction.

use clap::{ArgAction, Parser};
use reqwest_middleware::ClientBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::auth::{Authenticate, BearerToken, ServiceAccountToken, DEFAULT_TOKEN_PATH};
use crate::client::AlertmanagerClient;
use crate::errors::{ExporterError, Result};
use crate::types::AlertFilter;

/// Exposes Alertmanager alerts as Prometheus metrics
#[derive(Debug, Clone, Parser)]
#[command(name = "alerts-exporter", version, about, long_about = None)]
pub struct Config {
    /// The addr to listen on
    #[arg(long, env = "ALERTS_EXPORTER_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// The addr to listen on for the health check endpoint
    #[arg(
        long,
        env = "ALERTS_EXPORTER_HEALTH_LISTEN_ADDR",
        default_value = "0.0.0.0:8081"
    )]
    pub health_listen_addr: String,

    /// The host of the Alertmanager
    #[arg(long, env = "ALERTS_EXPORTER_HOST", default_value = "localhost:9093")]
    pub host: String,

    /// Use TLS when connecting to Alertmanager
    #[arg(long, env = "ALERTS_EXPORTER_TLS")]
    pub tls: bool,

    /// Path to client certificate for TLS authentication
    #[arg(long, env = "ALERTS_EXPORTER_TLS_CERT", requires = "tls_cert_key")]
    pub tls_cert: Option<PathBuf>,

    /// Path to client certificate key for TLS authentication. The default
    /// native-tls build needs a PKCS#8 key (`BEGIN PRIVATE KEY`); rustls-tls
    /// builds also accept PKCS#1 and SEC1 keys
    #[arg(long, env = "ALERTS_EXPORTER_TLS_CERT_KEY", requires = "tls_cert")]
    pub tls_cert_key: Option<PathBuf>,

    /// Path to CA certificate. System certificates are used if not provided
    #[arg(long, env = "ALERTS_EXPORTER_TLS_CA_CERT")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Disable TLS certificate verification
    #[arg(long, env = "ALERTS_EXPORTER_INSECURE")]
    pub insecure: bool,

    /// Bearer token to use for authentication
    #[arg(long, env = "ALERTS_EXPORTER_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Use Kubernetes service account bearer token for authentication
    #[arg(long, env = "ALERTS_EXPORTER_K8S_BEARER_TOKEN_AUTH")]
    pub k8s_bearer_token_auth: bool,

    /// Service account token file
    #[arg(long, env = "ALERTS_EXPORTER_K8S_TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH)]
    pub k8s_token_path: PathBuf,

    /// Seconds between service account token reloads
    #[arg(long, env = "ALERTS_EXPORTER_K8S_TOKEN_REFRESH_INTERVAL", default_value_t = 300)]
    pub k8s_token_refresh_interval: u64,

    /// Query for active alerts
    #[arg(long, env = "ALERTS_EXPORTER_WITH_ACTIVE", default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub with_active: bool,

    /// Query for inhibited alerts
    #[arg(long, env = "ALERTS_EXPORTER_WITH_INHIBITED", default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub with_inhibited: bool,

    /// Query for silenced alerts
    #[arg(long, env = "ALERTS_EXPORTER_WITH_SILENCED", default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub with_silenced: bool,

    /// Query for unprocessed alerts
    #[arg(long, env = "ALERTS_EXPORTER_WITH_UNPROCESSED", default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub with_unprocessed: bool,

    /// Alertmanager matcher to filter alerts by. Repeat to AND several,
    /// e.g. `--filter 'slo="true"' --filter 'severity="critical"'`
    #[arg(long = "filter", value_name = "MATCHER")]
    pub filters: Vec<String>,

    /// Upstream request timeout in seconds
    #[arg(long, env = "ALERTS_EXPORTER_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, env = "ALERTS_EXPORTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "ALERTS_EXPORTER_LOG_JSON")]
    pub log_json: bool,
}

/// Alertmanager client together with the token cache authenticating it
pub struct Upstream {
    pub client: AlertmanagerClient,
    /// Present with `--k8s-bearer-token-auth`; stop it on shutdown
    pub service_account: Option<Arc<ServiceAccountToken>>,
}

impl Config {
    /// Base URL of the Alertmanager API
    pub fn alertmanager_url(&self) -> Result<Url> {
        let scheme = if self.tls { "https" } else { "http" };
        Ok(Url::parse(&format!("{scheme}://{}", self.host))?)
    }

    /// Query filter used for every scrape
    pub fn alert_filter(&self) -> AlertFilter {
        AlertFilter {
            active: self.with_active,
            inhibited: self.with_inhibited,
            silenced: self.with_silenced,
            unprocessed: self.with_unprocessed,
            matchers: self.filters.clone(),
        }
    }

    /// Build the authenticated Alertmanager client
    ///
    /// The service account token takes precedence over `--bearer-token`.
    /// Must be called inside a Tokio runtime when service account auth is on.
    pub fn connect(&self) -> Result<Upstream> {
        let mut builder = ClientBuilder::new(self.http_client()?);
        let mut service_account = None;

        if self.k8s_bearer_token_auth {
            let token = Arc::new(ServiceAccountToken::new(
                &self.k8s_token_path,
                Duration::from_secs(self.k8s_token_refresh_interval),
            )?);
            builder = builder.with(Authenticate::new(Arc::clone(&token)));
            service_account = Some(token);
            debug!("Using service account token authentication");
        } else if let Some(token) = &self.bearer_token {
            builder = builder.with(Authenticate::new(Arc::new(BearerToken::new(token)?)));
            debug!("Using bearer token authentication");
        }

        Ok(Upstream {
            client: AlertmanagerClient::with_client(builder.build(), self.alertmanager_url()?),
            service_account,
        })
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        let builder = reqwest::Client::builder().timeout(Duration::from_secs(self.timeout));
        self.configure_tls(builder)?
            .build()
            .map_err(ExporterError::BuildHttpClient)
    }

    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    fn configure_tls(&self, mut builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        #[cfg(feature = "rustls-tls")]
        {
            builder = builder.use_rustls_tls();
        }

        if let Some(ca) = &self.tls_ca_cert {
            let cert = reqwest::Certificate::from_pem(&read_tls_file(ca)?)
                .map_err(|e| ExporterError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        match (&self.tls_cert, &self.tls_cert_key) {
            (Some(cert), Some(key)) => builder = builder.identity(load_identity(cert, key)?),
            (None, None) => {}
            _ => {
                return Err(ExporterError::Tls(
                    "--tls-cert and --tls-cert-key must be given together".to_string(),
                ))
            }
        }

        if self.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(builder)
    }

    #[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
    fn configure_tls(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        if self.tls || self.tls_ca_cert.is_some() || self.tls_cert.is_some() {
            return Err(ExporterError::Tls(
                "built without a TLS backend; enable `native-tls` or `rustls-tls`".to_string(),
            ));
        }
        Ok(builder)
    }
}

#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
fn read_tls_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ExporterError::TlsFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "rustls-tls")]
fn load_identity(cert: &Path, key: &Path) -> Result<reqwest::Identity> {
    let mut pem = read_tls_file(cert)?;
    pem.push(b'\n');
    pem.extend(read_tls_file(key)?);
    reqwest::Identity::from_pem(&pem).map_err(|e| ExporterError::Tls(e.to_string()))
}

#[cfg(all(feature = "native-tls", not(feature = "rustls-tls")))]
fn load_identity(cert: &Path, key: &Path) -> Result<reqwest::Identity> {
    reqwest::Identity::from_pkcs8_pem(&read_tls_file(cert)?, &read_tls_file(key)?)
        .map_err(|e| ExporterError::Tls(e.to_string()))
}
