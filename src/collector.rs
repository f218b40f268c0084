//! Projection of Alertmanager alerts into a Prometheus gauge family.
//!
//! Every alert becomes one `alerts_exporter_alerts` sample with value 1. The
//! label set is the alert's own labels plus synthetic labels describing its
//! status. Label names are not declared up front since they differ per
//! alert; they are validated when a sample is built instead.

use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::HashMap;
use tracing::{debug, error, instrument};

use crate::client::AlertmanagerClient;
use crate::errors::{ExporterError, Result};
use crate::types::{AlertFilter, GettableAlert};

pub const METRIC_NAME: &str = "alerts_exporter_alerts";

pub const METRIC_HELP: &str = "Alerts queried from the Alertmanager API. Alert state can be found in the '_alerts_exporter_alert_state' label.";

/// Prefix shared by all synthetic labels
///
/// Alertmanager label names never use it, so synthetic labels cannot shadow
/// real ones.
pub const SYNTHETIC_LABEL_PREFIX: &str = "_alerts_exporter_";

pub const STATE_LABEL: &str = "_alerts_exporter_alert_state";
pub const INHIBITED_BY_LABEL: &str = "_alerts_exporter_alert_inhibited_by";
pub const SILENCED_BY_LABEL: &str = "_alerts_exporter_alert_silenced_by";

/// One gauge observation derived from an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSample {
    labels: Vec<(String, String)>,
}

impl AlertSample {
    /// Project an alert into a sample
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::InvalidLabelName`] if a label name cannot be
    /// written in the Prometheus text format.
    pub fn from_alert(alert: &GettableAlert) -> Result<Self> {
        let mut merged: HashMap<&str, String> = alert
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();

        let status = &alert.status;
        if let Some(state) = &status.state {
            merged.insert(STATE_LABEL, state.clone());
        }
        if !status.inhibited_by.is_empty() {
            merged.insert(INHIBITED_BY_LABEL, status.inhibited_by.join(","));
        }
        if !status.silenced_by.is_empty() {
            merged.insert(SILENCED_BY_LABEL, status.silenced_by.join(","));
        }

        let mut labels = Vec::with_capacity(merged.len());
        for (name, value) in merged {
            if !is_valid_label_name(name) {
                return Err(ExporterError::InvalidLabelName {
                    name: name.to_string(),
                });
            }
            labels.push((name.to_string(), value));
        }
        labels.sort();

        Ok(Self { labels })
    }

    /// Label pairs sorted by name, then value
    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    pub fn value(&self) -> f64 {
        1.0
    }

    fn to_metric(&self) -> Metric {
        let labels: Vec<LabelPair> = self
            .labels
            .iter()
            .map(|(name, value)| {
                let mut pair = LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();

        let mut gauge = Gauge::default();
        gauge.set_value(self.value());

        let mut metric = Metric::default();
        metric.set_label(labels.into());
        metric.set_gauge(gauge);
        metric
    }
}

/// Collector answering each scrape with a fresh Alertmanager query
///
/// # Example
///
/// ```rust,no_run
/// use alerts_exporter::{AlertFilter, AlertmanagerClient, AlertsCollector};
/// use url::Url;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AlertmanagerClient::new(
///         Url::parse("http://localhost:9093")?,
///         Duration::from_secs(10),
///     )?;
///     let collector = AlertsCollector::new(
///         client,
///         AlertFilter::default().with_matcher("severity=\"critical\""),
///     );
///
///     print!("{}", collector.render().await?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AlertsCollector {
    client: AlertmanagerClient,
    filter: AlertFilter,
}

impl AlertsCollector {
    pub fn new(client: AlertmanagerClient, filter: AlertFilter) -> Self {
        Self { client, filter }
    }

    /// Query Alertmanager once and project every returned alert
    ///
    /// # Errors
    ///
    /// A failed query or an unrepresentable alert fails the whole scrape;
    /// no samples are returned in that case.
    #[instrument(name = "AlertsCollector::collect", skip_all)]
    pub async fn collect(&self) -> Result<Vec<AlertSample>> {
        let alerts = match self.client.get_alerts(&self.filter).await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(error = %e, "Error querying Alertmanager");
                return Err(e);
            }
        };

        let samples = alerts
            .iter()
            .map(AlertSample::from_alert)
            .collect::<Result<Vec<_>>>();

        match samples {
            Ok(samples) => {
                debug!(sample_count = samples.len(), "Alerts projected");
                Ok(samples)
            }
            Err(e) => {
                error!(error = %e, "Error projecting alerts");
                Err(e)
            }
        }
    }

    /// Collect and encode in the Prometheus text format
    pub async fn render(&self) -> Result<String> {
        let samples = self.collect().await?;
        encode_text(&samples)
    }
}

/// Build the metric family for `samples`
///
/// Returns `None` for an empty scrape; the text format has no way to expose
/// a family without samples.
pub fn metric_family(samples: &[AlertSample]) -> Option<MetricFamily> {
    if samples.is_empty() {
        return None;
    }

    let metrics: Vec<Metric> = samples.iter().map(AlertSample::to_metric).collect();

    let mut family = MetricFamily::default();
    family.set_name(METRIC_NAME.to_string());
    family.set_help(METRIC_HELP.to_string());
    family.set_field_type(MetricType::GAUGE);
    family.set_metric(metrics.into());
    Some(family)
}

/// Encode `samples` in the Prometheus text exposition format
pub fn encode_text(samples: &[AlertSample]) -> Result<String> {
    let families: Vec<MetricFamily> = metric_family(samples).into_iter().collect();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| ExporterError::Encode(prometheus::Error::Msg(e.to_string())))
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
