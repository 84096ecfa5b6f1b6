//! Per-appliance share of total power and cost.

use crate::models::{Appliance, EnergyReading, UsageShare};

const PALETTE: [&str; 6] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#06b6d4",
];

/// Split the reading's power between its metered appliances.
///
/// Percentages are whole numbers summing to exactly 100: every entry but the
/// last is rounded, the last absorbs the remainder. With no power drawn the
/// split is even and every cost is zero.
pub fn compute_breakdown(reading: &EnergyReading) -> Vec<UsageShare> {
    let count = reading.appliance_power.len();
    if count == 0 {
        return Vec::new();
    }

    let powers: Vec<f64> = reading
        .appliance_power
        .iter()
        .map(|p| p.max(0.0))
        .collect();
    let total_power: f64 = powers.iter().sum();

    let percents = if total_power > 0.0 {
        let mut remaining = 100u32;
        let mut percents: Vec<u32> = powers[..count - 1]
            .iter()
            .map(|p| {
                let pct = (((p / total_power) * 100.0).round() as u32).min(remaining);
                remaining -= pct;
                pct
            })
            .collect();
        percents.push(remaining);
        percents
    } else {
        let even = 100 / count as u32;
        let mut percents = vec![even; count - 1];
        percents.push(100 - even * (count as u32 - 1));
        percents
    };

    powers
        .iter()
        .zip(percents)
        .enumerate()
        .map(|(idx, (&power, usage))| {
            let id = idx as u32 + 1;
            let cost = if total_power > 0.0 {
                (reading.cost * (power / total_power)).round()
            } else {
                0.0
            };
            UsageShare {
                appliance_id: id,
                name: Appliance::placeholder_name(id),
                usage,
                cost,
                color: PALETTE[idx % PALETTE.len()].to_string(),
                power,
                current: reading.appliance_current.get(idx).copied().unwrap_or(0.0),
            }
        })
        .collect()
}
