use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert as returned by `GET /api/v2/alerts`
///
/// Only `labels` and `status` are projected into metrics; the remaining
/// fields are decoded so the type mirrors the upstream payload.
///
/// See: <https://github.com/prometheus/alertmanager/blob/main/api/v2/openapi.yaml>
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GettableAlert {
    /// Labels identify the alert
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Annotations contain additional information
    #[serde(default)]
    pub annotations: HashMap<String, String>,

    /// Processing state of the alert inside Alertmanager
    #[serde(default)]
    pub status: AlertStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<Receiver>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Generator URL (link back to source)
    #[serde(
        rename = "generatorURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub generator_url: Option<String>,
}

impl GettableAlert {
    /// Create an alert with the given name
    ///
    /// The `alertname` label is automatically set.
    pub fn new(alertname: &str) -> Self {
        Self::default().with_label("alertname", alertname)
    }

    /// Add a label to the alert
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Replace the alert status
    pub fn with_status(mut self, status: AlertStatus) -> Self {
        self.status = status;
        self
    }

    /// Get the alertname label
    pub fn alertname(&self) -> Option<&str> {
        self.labels.get("alertname").map(|s| s.as_str())
    }
}

/// Status sub-record of an alert
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    /// `active`, `suppressed` or `unprocessed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Ids of the alerts inhibiting this one, in upstream order
    #[serde(default)]
    pub inhibited_by: Vec<String>,

    /// Ids of the silences muting this alert, in upstream order
    #[serde(default)]
    pub silenced_by: Vec<String>,
}

impl AlertStatus {
    pub fn with_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    pub fn with_inhibited_by(mut self, id: &str) -> Self {
        self.inhibited_by.push(id.to_string());
        self
    }

    pub fn with_silenced_by(mut self, id: &str) -> Self {
        self.silenced_by.push(id.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receiver {
    #[serde(default)]
    pub name: Option<String>,
}

/// Query parameters for `GET /api/v2/alerts`
///
/// Built once at start-up and reused for every scrape. Matchers are sent
/// verbatim; Alertmanager ANDs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFilter {
    pub active: bool,
    pub inhibited: bool,
    pub silenced: bool,
    pub unprocessed: bool,
    pub matchers: Vec<String>,
}

impl AlertFilter {
    /// Add a matcher expression such as `severity="critical"`
    pub fn with_matcher(mut self, matcher: &str) -> Self {
        self.matchers.push(matcher.to_string());
        self
    }

    /// Query string pairs, one `filter` pair per matcher
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("active", self.active.to_string()),
            ("silenced", self.silenced.to_string()),
            ("inhibited", self.inhibited.to_string()),
            ("unprocessed", self.unprocessed.to_string()),
        ];
        pairs.extend(self.matchers.iter().map(|m| ("filter", m.clone())));
        pairs
    }
}

impl Default for AlertFilter {
    fn default() -> Self {
        Self {
            active: true,
            inhibited: true,
            silenced: true,
            unprocessed: true,
            matchers: Vec::new(),
        }
    }
}

/// Payload of `GET /api/v2/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerStatus {
    #[serde(default)]
    pub cluster: Option<ClusterStatus>,

    #[serde(default)]
    pub version_info: Option<VersionInfo>,

    /// Time the Alertmanager process started, kept as sent
    #[serde(default)]
    pub uptime: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `ready`, `settling` or `disabled`
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub peers: Vec<PeerStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerStatus {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_deserialization() {
        let json = r#"{
            "labels": {"alertname": "ImportantAlert", "severity": "critical"},
            "annotations": {"summary": "Something broke"},
            "status": {
                "state": "active",
                "inhibitedBy": ["22a8bdd0"],
                "silencedBy": ["d505b8d4", "e1f2"]
            },
            "fingerprint": "0123abcd",
            "receivers": [{"name": "team-x"}],
            "startsAt": "2024-01-01T00:00:00Z",
            "endsAt": "2024-01-01T01:00:00Z",
            "updatedAt": "2024-01-01T00:05:00Z",
            "generatorURL": "http://prometheus/graph"
        }"#;

        let alert: GettableAlert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.alertname(), Some("ImportantAlert"));
        assert_eq!(alert.status.state.as_deref(), Some("active"));
        assert_eq!(alert.status.inhibited_by, vec!["22a8bdd0"]);
        assert_eq!(alert.status.silenced_by, vec!["d505b8d4", "e1f2"]);
        assert_eq!(alert.receivers[0].name.as_deref(), Some("team-x"));
        assert_eq!(
            alert.generator_url.as_deref(),
            Some("http://prometheus/graph")
        );
    }

    #[test]
    fn test_alert_without_status() {
        let alert: GettableAlert =
            serde_json::from_str(r#"{"labels": {"alertname": "Bare"}}"#).unwrap();
        assert_eq!(alert.status, AlertStatus::default());
        assert!(alert.annotations.is_empty());
    }

    #[test]
    fn test_filter_defaults_query_everything() {
        let filter = AlertFilter::default();
        assert!(filter.active && filter.inhibited && filter.silenced && filter.unprocessed);
        assert!(filter.matchers.is_empty());
    }

    #[test]
    fn test_filter_query_pairs_keep_matchers_verbatim() {
        let filter = AlertFilter {
            silenced: false,
            ..AlertFilter::default()
        }
        .with_matcher("slo=\"true\"")
        .with_matcher("severity=~\"crit.*\"");

        let pairs = filter.query_pairs();
        assert!(pairs.contains(&("silenced", "false".to_string())));
        assert!(pairs.contains(&("active", "true".to_string())));
        let filters: Vec<_> = pairs
            .iter()
            .filter(|(k, _)| *k == "filter")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(filters, vec!["slo=\"true\"", "severity=~\"crit.*\""]);
    }

    #[test]
    fn test_status_deserialization() {
        let json = r#"{
            "cluster": {"name": "01H", "status": "ready", "peers": [{"address": "10.0.0.1:9094", "name": "01H"}]},
            "versionInfo": {"version": "v0.27.0", "branch": "HEAD", "goVersion": "go1.21"},
            "uptime": "2024-01-01T00:00:00Z",
            "config": {"original": "route: {}"}
        }"#;

        let status: AlertmanagerStatus = serde_json::from_str(json).unwrap();
        assert_eq!(
            status.cluster.as_ref().unwrap().status.as_deref(),
            Some("ready")
        );
        assert_eq!(
            status.version_info.as_ref().unwrap().version.as_deref(),
            Some("v0.27.0")
        );
        assert_eq!(status.uptime.as_deref(), Some("2024-01-01T00:00:00Z"));

        let out = serde_json::to_string(&status.version_info).unwrap();
        assert!(out.contains("\"goVersion\":\"go1.21\""));
    }
}
