use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::energy::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Danger,
}

impl Severity {
    /// Map the detector's severity label; unknown labels are informational
    pub fn from_detector(label: &str) -> Self {
        match label {
            "High" => Severity::Danger,
            "Medium" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// One entry of `GET /detect-anomalies`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAnomaly {
    #[serde(default)]
    pub is_anomaly: bool,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub anomaly_type: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub timestamp: String,
    pub affected_appliance: Option<String>,
    pub power_value: Option<f64>,
    pub confidence: Option<f64>,
}

/// Response envelope of `GET /detect-anomalies`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub anomalies: Vec<RawAnomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appliance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Alert {
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

impl From<&RawAnomaly> for Alert {
    fn from(raw: &RawAnomaly) -> Self {
        let id = match parse_timestamp(&raw.timestamp) {
            Some(ts) => format!("anomaly_{}", ts.timestamp_millis()),
            None => format!("anomaly_{}", raw.timestamp),
        };

        Self {
            id,
            severity: Severity::from_detector(&raw.severity),
            message: format!("{}: {}", raw.anomaly_type, raw.details),
            timestamp: raw.timestamp.clone(),
            appliance: raw.affected_appliance.clone(),
            power_value: raw.power_value,
            confidence: raw.confidence,
        }
    }
}
