//! Bearer authentication for outgoing Alertmanager requests.
//!
//! [`ServiceAccountToken`] implements Kubernetes service account
//! authentication: the token is read from a file once at construction and
//! re-read on a fixed interval by a background task. Requests always see the
//! last token that was read successfully.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::header::{HeaderValue, AUTHORIZATION};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::errors::{ExporterError, Result};

/// Token mounted into every pod by Kubernetes
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Writes authentication info into an outgoing request
pub trait AuthInfoWriter: Send + Sync + 'static {
    fn authenticate(&self, request: &mut Request);
}

/// Fixed bearer token given on the command line
#[derive(Debug, Clone)]
pub struct BearerToken {
    header: HeaderValue,
}

impl BearerToken {
    pub fn new(token: &str) -> Result<Self> {
        let header = bearer_header(token, Path::new("<static>"))?;
        Ok(Self { header })
    }
}

impl AuthInfoWriter for BearerToken {
    fn authenticate(&self, request: &mut Request) {
        request
            .headers_mut()
            .insert(AUTHORIZATION, self.header.clone());
    }
}

/// Kubernetes service account token, refreshed from a file
///
/// Must be created inside a Tokio runtime. The refresh task ends when
/// [`stop`](Self::stop) is called or the value is dropped.
#[derive(Debug)]
pub struct ServiceAccountToken {
    path: PathBuf,
    token: Arc<ArcSwap<HeaderValue>>,
    shutdown: watch::Sender<bool>,
}

impl ServiceAccountToken {
    /// Read the token at `path` and start refreshing it every `refresh_interval`
    ///
    /// A zero interval falls back to [`DEFAULT_REFRESH_INTERVAL`].
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::TokenRead`] if the initial read fails and
    /// [`ExporterError::InvalidToken`] if the token cannot be sent as a header.
    /// Later read failures are logged and the previous token is kept.
    pub fn new(path: impl Into<PathBuf>, refresh_interval: Duration) -> Result<Self> {
        let path = path.into();
        let refresh_interval = if refresh_interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            refresh_interval
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ExporterError::TokenRead {
            path: path.clone(),
            source,
        })?;
        let token = Arc::new(ArcSwap::from_pointee(bearer_header(&raw, &path)?));

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(refresh_loop(
            path.clone(),
            Arc::clone(&token),
            refresh_interval,
            shutdown_rx,
        ));

        debug!(
            path = %path.display(),
            interval_secs = refresh_interval.as_secs(),
            "Service account token loaded"
        );

        Ok(Self {
            path,
            token,
            shutdown,
        })
    }

    /// Stop refreshing the token
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthInfoWriter for ServiceAccountToken {
    fn authenticate(&self, request: &mut Request) {
        let header = self.token.load();
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::clone(&header));
    }
}

/// Middleware applying an [`AuthInfoWriter`] to every request
pub struct Authenticate<A> {
    writer: Arc<A>,
}

impl<A: AuthInfoWriter> Authenticate<A> {
    pub fn new(writer: Arc<A>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<A: AuthInfoWriter> Middleware for Authenticate<A> {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.writer.authenticate(&mut req);
        next.run(req, extensions).await
    }
}

async fn refresh_loop(
    path: PathBuf,
    token: Arc<ArcSwap<HeaderValue>>,
    refresh_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + refresh_interval, refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Stop requested or the owner was dropped
            _ = shutdown.changed() => break,

            _ = ticker.tick() => {
                match read_token(&path).await {
                    Ok(header) => {
                        if *shutdown.borrow() {
                            break;
                        }
                        token.store(Arc::new(header));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to refresh service account token");
                    }
                }
            }
        }
    }

    debug!(path = %path.display(), "Service account token refresh stopped");
}

async fn read_token(path: &Path) -> Result<HeaderValue> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ExporterError::TokenRead {
            path: path.to_path_buf(),
            source,
        })?;
    bearer_header(&raw, path)
}

fn bearer_header(token: &str, path: &Path) -> Result<HeaderValue> {
    // Token files written by hand usually end with a newline
    let mut header = HeaderValue::from_str(&format!("Bearer {}", token.trim_end())).map_err(
        |_| ExporterError::InvalidToken {
            path: path.to_path_buf(),
        },
    )?;
    header.set_sensitive(true);
    Ok(header)
}
