use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::client::{compute_breakdown, BatchData, PollSnapshot};
use crate::models::{
    Alert, Appliance, ApplianceId, EnergyReading, HealthStatus, HistoryPoint, MonthlyBill,
    NewsItem, PowerStatus, UsageShare,
};
use crate::source::FeedUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Live,
    Polling,
    Disconnected,
}

/// First phase of an optimistic toggle, resolved by `confirm_toggle` or `revert_toggle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingToggle {
    pub id: ApplianceId,
    pub previous: PowerStatus,
    pub requested: PowerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleRejection {
    UnknownAppliance,
    /// A toggle of the same appliance is still awaiting the backend
    InFlight,
}

/// Everything the dashboard displays
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub connection: ConnectionState,
    pub reading: Option<EnergyReading>,
    pub appliances: Vec<Appliance>,
    pub bill: Option<MonthlyBill>,
    pub alerts: Vec<Alert>,
    pub history: Vec<HistoryPoint>,
    pub usage: Vec<UsageShare>,
    pub news: Vec<NewsItem>,
    pub health: Option<HealthStatus>,
    /// Whether the most recent fetch carried a reading
    pub backend_reachable: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    #[serde(skip)]
    names: HashMap<ApplianceId, String>,
    #[serde(skip)]
    retained_alerts: usize,
}

impl DashboardState {
    pub fn new(retained_alerts: usize) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            reading: None,
            appliances: Vec::new(),
            bill: None,
            alerts: Vec::new(),
            history: Vec::new(),
            usage: Vec::new(),
            news: Vec::new(),
            health: None,
            backend_reachable: false,
            last_refresh: None,
            names: HashMap::new(),
            retained_alerts,
        }
    }

    pub fn appliance(&self, id: ApplianceId) -> Option<&Appliance> {
        self.appliances.iter().find(|a| a.id == id)
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            debug!("Connection state {:?} -> {:?}", self.connection, connection);
            self.connection = connection;
        }
    }

    /// Apply a full refresh. Slices that failed to fetch keep their previous value.
    pub fn apply_batch(&mut self, batch: BatchData) {
        self.backend_reachable = batch.energy.is_some();
        if let Some(reading) = batch.energy {
            self.reading = Some(reading);
        }
        if let Some(appliances) = batch.appliances {
            self.set_appliances(appliances);
        }
        if let Some(bill) = batch.bill {
            self.bill = Some(bill);
        }
        if let Some(alerts) = batch.alerts {
            self.replace_alerts(alerts);
        }
        if let Some(history) = batch.history {
            self.history = history;
        }
        if let Some(usage) = batch.usage {
            self.set_usage(usage);
        }
        if let Some(news) = batch.news {
            self.news = news;
        }
        if let Some(health) = batch.health {
            self.health = Some(health);
        }
        self.last_refresh = Some(batch.timestamp);
    }

    /// Merge one poll cycle; while polling, an unreachable backend shows as disconnected
    pub fn apply_snapshot(&mut self, snapshot: PollSnapshot) {
        self.backend_reachable = snapshot.is_connected;
        if matches!(
            self.connection,
            ConnectionState::Polling | ConnectionState::Disconnected
        ) {
            self.set_connection(if snapshot.is_connected {
                ConnectionState::Polling
            } else {
                ConnectionState::Disconnected
            });
        }
        if let Some(reading) = snapshot.energy {
            self.set_usage(compute_breakdown(&reading));
            self.reading = Some(reading);
        }
        if let Some(appliances) = snapshot.appliances {
            self.set_appliances(appliances);
        }
        if let Some(alerts) = snapshot.alerts {
            self.replace_alerts(alerts);
        }
        if let Some(health) = snapshot.health {
            self.health = Some(health);
        }
        self.last_refresh = Some(snapshot.timestamp);
    }

    pub fn apply_feed_update(&mut self, update: FeedUpdate) {
        match update {
            FeedUpdate::EnergyUpdate(raw) => {
                let reading = match self.reading.take() {
                    Some(mut reading) => {
                        reading.merge(&raw);
                        reading
                    }
                    None => EnergyReading::from(&raw),
                };
                self.set_usage(compute_breakdown(&reading));
                self.reading = Some(reading);
                self.backend_reachable = true;
            }
            FeedUpdate::ApplianceUpdate(appliances) => self.set_appliances(appliances),
            FeedUpdate::AlertUpdate(alert) => {
                self.alerts.push(alert);
                self.cap_alerts();
            }
        }
        self.last_refresh = Some(Utc::now());
    }

    /// Flip the appliance locally before the backend confirms
    pub fn begin_toggle(&mut self, id: ApplianceId) -> Result<PendingToggle, ToggleRejection> {
        let appliance = self
            .appliances
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(ToggleRejection::UnknownAppliance)?;
        if appliance.pending {
            return Err(ToggleRejection::InFlight);
        }

        let pending = PendingToggle {
            id,
            previous: appliance.status,
            requested: appliance.status.toggled(),
        };
        appliance.status = pending.requested;
        appliance.pending = true;
        Ok(pending)
    }

    pub fn confirm_toggle(&mut self, pending: &PendingToggle) -> Option<&Appliance> {
        let appliance = self.appliances.iter_mut().find(|a| a.id == pending.id)?;
        appliance.pending = false;
        Some(&*appliance)
    }

    /// Undo the flip, unless a newer update already moved the appliance away from it
    pub fn revert_toggle(&mut self, pending: &PendingToggle) -> Option<&Appliance> {
        let appliance = self.appliances.iter_mut().find(|a| a.id == pending.id)?;
        if appliance.status == pending.requested {
            appliance.status = pending.previous;
        }
        appliance.pending = false;
        Some(&*appliance)
    }

    /// Record display names; they stick across later appliance and usage updates
    pub fn apply_names(&mut self, names: &BTreeMap<ApplianceId, String>) {
        for (id, name) in names {
            self.names.insert(*id, name.clone());
        }
        for appliance in &mut self.appliances {
            if let Some(name) = self.names.get(&appliance.id) {
                appliance.name = name.clone();
            }
        }
        for share in &mut self.usage {
            if let Some(name) = self.names.get(&share.appliance_id) {
                share.name = name.clone();
            }
        }
    }

    fn set_appliances(&mut self, incoming: Vec<Appliance>) {
        // Appliances awaiting a control ack keep their optimistic status
        let pending: HashMap<ApplianceId, PowerStatus> = self
            .appliances
            .iter()
            .filter(|a| a.pending)
            .map(|a| (a.id, a.status))
            .collect();

        let names = &self.names;
        self.appliances = incoming
            .into_iter()
            .map(|mut appliance| {
                appliance.name = display_name(names, appliance.id, appliance.name);
                appliance.pending = false;
                if let Some(status) = pending.get(&appliance.id) {
                    appliance.status = *status;
                    appliance.pending = true;
                }
                appliance
            })
            .collect();
    }

    fn set_usage(&mut self, usage: Vec<UsageShare>) {
        let names = &self.names;
        self.usage = usage
            .into_iter()
            .map(|mut share| {
                share.name = display_name(names, share.appliance_id, share.name);
                share
            })
            .collect();
    }

    fn replace_alerts(&mut self, alerts: Vec<Alert>) {
        self.alerts = alerts;
        self.cap_alerts();
    }

    fn cap_alerts(&mut self) {
        if self.alerts.len() > self.retained_alerts {
            let excess = self.alerts.len() - self.retained_alerts;
            self.alerts.drain(..excess);
        }
    }
}

fn display_name(names: &HashMap<ApplianceId, String>, id: ApplianceId, current: String) -> String {
    match names.get(&id) {
        Some(name) => name.clone(),
        None if current.trim().is_empty() => Appliance::placeholder_name(id),
        None => current,
    }
}
