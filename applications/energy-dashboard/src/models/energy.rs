use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nominal mains voltage assumed for every reading
pub const NOMINAL_VOLTAGE: f64 = 220.0;

/// One data point as reported by `/live-data` and the live stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub i1: Option<f64>,
    pub i2: Option<f64>,
    pub p1: Option<f64>,
    pub p2: Option<f64>,
    pub total_power: Option<f64>,
    pub energy_kwh: Option<f64>,
    pub cost_inr: Option<f64>,
}

/// Response envelope of `GET /live-data`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveDataResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<RawReading>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub total_cost: Option<f64>,
    pub total_energy: Option<f64>,
}

/// Response envelope of `GET /monthly-summary`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlySummaryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub summary: Option<MonthlySummary>,
}

/// Latest reading, normalized for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyReading {
    pub current_usage: f64,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub cost: f64,
    pub appliance_current: Vec<f64>,
    pub appliance_power: Vec<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&RawReading> for EnergyReading {
    fn from(raw: &RawReading) -> Self {
        let i1 = raw.i1.unwrap_or(0.0);
        let i2 = raw.i2.unwrap_or(0.0);
        let total_power = raw.total_power.unwrap_or(0.0);

        Self {
            current_usage: total_power,
            voltage: NOMINAL_VOLTAGE,
            current: i1 + i2,
            power: total_power,
            energy: raw.energy_kwh.unwrap_or(0.0),
            cost: raw.cost_inr.unwrap_or(0.0),
            appliance_current: vec![i1, i2],
            appliance_power: vec![raw.p1.unwrap_or(0.0), raw.p2.unwrap_or(0.0)],
            timestamp: raw.timestamp.as_deref().and_then(parse_timestamp),
        }
    }
}

impl EnergyReading {
    /// Overlay the fields present in `raw`, keeping the rest, and recompute the totals
    pub fn merge(&mut self, raw: &RawReading) {
        let channels = [(raw.i1, raw.p1), (raw.i2, raw.p2)];
        for (idx, (current, power)) in channels.into_iter().enumerate() {
            if let Some(current) = current {
                set_channel(&mut self.appliance_current, idx, current);
            }
            if let Some(power) = power {
                set_channel(&mut self.appliance_power, idx, power);
            }
        }
        if raw.i1.is_some() || raw.i2.is_some() {
            self.current = self.appliance_current.iter().sum();
        }

        if let Some(total_power) = raw.total_power {
            self.current_usage = total_power;
            self.power = total_power;
        }
        if let Some(energy) = raw.energy_kwh {
            self.energy = energy;
        }
        if let Some(cost) = raw.cost_inr {
            self.cost = cost;
        }
        if let Some(ts) = raw.timestamp.as_deref().and_then(parse_timestamp) {
            self.timestamp = Some(ts);
        }
    }
}

fn set_channel(values: &mut Vec<f64>, idx: usize, value: f64) {
    if values.len() <= idx {
        values.resize(idx + 1, 0.0);
    }
    values[idx] = value;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBill {
    pub amount: f64,
    pub daily_average: f64,
    pub total_energy: f64,
    /// True when extrapolated from the live reading instead of the billing summary
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Clock label, e.g. "03:45 PM"
    pub time: String,
    pub usage: f64,
    pub energy: f64,
    pub cost: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&RawReading> for HistoryPoint {
    fn from(raw: &RawReading) -> Self {
        let timestamp = raw.timestamp.as_deref().and_then(parse_timestamp);
        Self {
            time: timestamp
                .map(|ts| ts.format("%I:%M %p").to_string())
                .unwrap_or_default(),
            usage: raw.total_power.unwrap_or(0.0),
            energy: raw.energy_kwh.unwrap_or(0.0),
            cost: raw.cost_inr.unwrap_or(0.0),
            timestamp,
        }
    }
}

/// Per-appliance share of total power and cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageShare {
    pub appliance_id: u32,
    pub name: String,
    /// Whole percent; all shares of one breakdown sum to 100
    pub usage: u32,
    pub cost: f64,
    pub color: String,
    pub power: f64,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Downloaded monthly report file
#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MonthlyReport {
    pub fn filename_for(month: u32, year: i32) -> String {
        format!("energy_report_{}_{:02}.pdf", year, month)
    }
}

/// Parse backend timestamps: RFC 3339, or naive "YYYY-MM-DD HH:MM:SS" taken as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
