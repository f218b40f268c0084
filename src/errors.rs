use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Errors that can occur while querying Alertmanager or serving its alerts
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Failed to build HTTP client
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest_middleware::Error),

    /// Failed to read the response body
    #[error("Failed to read response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    /// Failed to decode the response body
    #[error("Failed to decode Alertmanager response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Alertmanager API returned an error response
    #[error("Alertmanager API error: HTTP {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from Alertmanager
        message: String,
    },

    /// Alertmanager URL could not be built
    #[error("Invalid Alertmanager URL: {0}")]
    Url(#[from] url::ParseError),

    /// Service account token could not be read
    #[error("failed to read token from file {}: {source}", path.display())]
    TokenRead {
        /// Token file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Token contains bytes that are not allowed in an HTTP header
    #[error("token from {} is not a valid header value", path.display())]
    InvalidToken {
        /// Token file path, or `<static>` for a bearer token given on the command line
        path: PathBuf,
    },

    /// TLS material could not be read
    #[error("failed to read TLS file {}: {source}", path.display())]
    TlsFile {
        /// Certificate, key or CA file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TLS material could not be parsed or is not supported by the build
    #[error("invalid TLS configuration: {0}")]
    Tls(
        /// What was rejected
        String,
    ),

    /// Alert carried a label name the exposition format cannot represent
    #[error("invalid label name {name:?} on alert")]
    InvalidLabelName {
        /// The offending label name
        name: String,
    },

    /// Metrics could not be encoded
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    /// Listener could not be bound or the server failed
    #[error("server error on {addr}: {source}")]
    Serve {
        /// Listen address
        addr: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ExporterError {
    /// Returns the I/O error kind for token read failures
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::TokenRead { source, .. }
            | Self::TlsFile { source, .. }
            | Self::Serve { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
