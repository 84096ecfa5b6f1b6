use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::energy::{EnergyReading, NOMINAL_VOLTAGE};

/// Server-assigned appliance identifier (1-based channel number)
pub type ApplianceId = u32;

/// Draw above this many watts counts as switched on
pub const ON_THRESHOLD_W: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerStatus {
    On,
    Off,
}

impl PowerStatus {
    pub fn toggled(self) -> Self {
        match self {
            PowerStatus::On => PowerStatus::Off,
            PowerStatus::Off => PowerStatus::On,
        }
    }

    /// Control action verb sent to the backend
    pub fn action(self) -> &'static str {
        match self {
            PowerStatus::On => "on",
            PowerStatus::Off => "off",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    pub id: ApplianceId,
    /// Empty when the sender did not name it
    #[serde(default)]
    pub name: String,
    pub status: PowerStatus,
    #[serde(default)]
    pub current_power: f64,
    #[serde(default)]
    pub current_amps: f64,
    #[serde(default = "nominal_voltage")]
    pub voltage: f64,
    #[serde(default)]
    pub efficiency: f64,
    /// Set while an optimistic toggle awaits the backend
    #[serde(default)]
    pub pending: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

fn nominal_voltage() -> f64 {
    NOMINAL_VOLTAGE
}

impl Appliance {
    pub fn placeholder_name(id: ApplianceId) -> String {
        format!("Appliance {}", id)
    }

    /// Build one appliance per metered channel of the reading
    pub fn from_reading(reading: &EnergyReading) -> Vec<Appliance> {
        reading
            .appliance_power
            .iter()
            .zip(reading.appliance_current.iter())
            .enumerate()
            .map(|(idx, (&power, &amps))| {
                let id = idx as ApplianceId + 1;
                Appliance {
                    id,
                    name: Self::placeholder_name(id),
                    status: if power > ON_THRESHOLD_W {
                        PowerStatus::On
                    } else {
                        PowerStatus::Off
                    },
                    current_power: power,
                    current_amps: amps,
                    voltage: NOMINAL_VOLTAGE,
                    efficiency: efficiency(power, amps),
                    pending: false,
                    last_updated: reading.timestamp,
                }
            })
            .collect()
    }
}

/// Power factor estimate: real power over apparent power at nominal voltage, capped at 1
pub fn efficiency(power: f64, current: f64) -> f64 {
    if current <= 0.0 {
        return 0.0;
    }
    let apparent = current * NOMINAL_VOLTAGE;
    (power / apparent).clamp(0.0, 1.0)
}

/// Acknowledgement of an appliance control request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlAck {
    pub success: bool,
    pub appliance_id: ApplianceId,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement of an appliance rename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameAck {
    pub success: bool,
    pub appliance_id: ApplianceId,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}
