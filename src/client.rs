use reqwest::{Client, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::errors::{ExporterError, Result};
use crate::types::{AlertFilter, AlertmanagerStatus, GettableAlert};

const ALERTS_PATH: &str = "/api/v2/alerts";
const STATUS_PATH: &str = "/api/v2/status";

/// Client for reading alerts and status from Alertmanager
///
/// # Example
///
/// ```rust,no_run
/// use alerts_exporter::{AlertFilter, AlertmanagerClient};
/// use url::Url;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AlertmanagerClient::new(
///         Url::parse("http://localhost:9093")?,
///         Duration::from_secs(10),
///     )?;
///
///     let alerts = client.get_alerts(&AlertFilter::default()).await?;
///     println!("{} alerts", alerts.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AlertmanagerClient {
    client: ClientWithMiddleware,
    api_url: Url,
}

impl AlertmanagerClient {
    /// Create a new Alertmanager client
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the Alertmanager instance (e.g., `http://localhost:9093`)
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ExporterError::BuildHttpClient)?;

        let client = ClientBuilder::new(client).build();

        Ok(Self { client, api_url })
    }

    /// Create a new client with a custom reqwest middleware client
    ///
    /// This is how authentication and TLS settings are plugged in.
    pub fn with_client(client: ClientWithMiddleware, api_url: Url) -> Self {
        Self { client, api_url }
    }

    /// Query the alerts matching `filter`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP request fails
    /// - Alertmanager returns a non-success status code
    /// - The response body is not a list of alerts
    #[instrument(
        name = "AlertmanagerClient::get_alerts",
        skip_all,
        fields(matchers = filter.matchers.len())
    )]
    pub async fn get_alerts(&self, filter: &AlertFilter) -> Result<Vec<GettableAlert>> {
        let url = self.api_url.join(ALERTS_PATH)?;

        debug!(url = %url, "Querying alerts from Alertmanager");

        let response = self
            .client
            .get(url)
            .query(&filter.query_pairs())
            .send()
            .await
            .map_err(ExporterError::Request)?;

        let body = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(ExporterError::ReadBody)?;
        let alerts: Vec<GettableAlert> =
            serde_json::from_slice(&body).map_err(ExporterError::Decode)?;

        debug!(alert_count = alerts.len(), "Alerts received");
        Ok(alerts)
    }

    /// Query the Alertmanager status
    ///
    /// Returns `Ok(None)` when Alertmanager answers successfully without a
    /// payload (empty body or JSON `null`).
    #[instrument(name = "AlertmanagerClient::get_status", skip_all)]
    pub async fn get_status(&self) -> Result<Option<AlertmanagerStatus>> {
        let url = self.api_url.join(STATUS_PATH)?;

        debug!(url = %url, "Querying Alertmanager status");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ExporterError::Request)?;

        let body = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(ExporterError::ReadBody)?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body).map_err(ExporterError::Decode)
    }

    /// Get the base API URL
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ExporterError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> AlertmanagerClient {
        AlertmanagerClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(10))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_alerts_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/alerts"))
            .and(query_param("active", "true"))
            .and(query_param("silenced", "false"))
            .and(query_param("filter", "severity=\"critical\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"labels": {"alertname": "A"}, "status": {"state": "active", "inhibitedBy": [], "silencedBy": []}},
                {"labels": {"alertname": "B"}}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let filter = AlertFilter {
            silenced: false,
            ..AlertFilter::default()
        }
        .with_matcher("severity=\"critical\"");

        let alerts = test_client(&mock_server).get_alerts(&filter).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].alertname(), Some("A"));
        assert_eq!(alerts[1].alertname(), Some("B"));
    }

    #[tokio::test]
    async fn test_get_alerts_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad matcher"))
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .get_alerts(&AlertFilter::default())
            .await;

        if let Err(ExporterError::Api { status, message }) = result {
            assert_eq!(status, 400);
            assert_eq!(message, "bad matcher");
        } else {
            panic!("Expected Api error");
        }
    }

    #[tokio::test]
    async fn test_get_alerts_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let result = test_client(&mock_server)
            .get_alerts(&AlertFilter::default())
            .await;
        assert!(matches!(result, Err(ExporterError::Decode(_))));
    }

    #[tokio::test]
    async fn test_get_status_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cluster": {"status": "ready", "peers": []},
                "versionInfo": {"version": "v0.22.2"},
                "uptime": "2024-01-01T00:00:00Z"
            })))
            .mount(&mock_server)
            .await;

        let status = test_client(&mock_server).get_status().await.unwrap().unwrap();
        assert_eq!(
            status.version_info.unwrap().version.as_deref(),
            Some("v0.22.2")
        );
    }

    #[tokio::test]
    async fn test_get_status_null_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        let status = test_client(&mock_server).get_status().await.unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_get_status_empty_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let status = test_client(&mock_server).get_status().await.unwrap();
        assert!(status.is_none());
    }

    #[test]
    fn test_api_url_getter() {
        let url = Url::parse("http://localhost:9093").unwrap();
        let client = AlertmanagerClient::new(url.clone(), Duration::from_secs(10)).unwrap();
        assert_eq!(client.api_url(), &url);
    }
}
