use chrono::{DateTime, Datelike, Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::EnergyApi;
use super::breakdown::compute_breakdown;
use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::models::{
    news, Alert, AnomalyResponse, Appliance, ApplianceId, ControlAck, EnergyReading,
    HealthStatus, HistoryPoint, LiveDataResponse, MonthlyBill, MonthlyReport,
    MonthlySummaryResponse, NameAck, NewsItem, NotificationOutcome, PowerStatus, UsageShare,
};

const DAYS_PER_BILLING_MONTH: f64 = 30.0;

/// Every dashboard slice from one refresh. `None` marks a slice whose fetch
/// failed; applying the batch leaves that slice of state untouched.
#[derive(Debug, Clone, Serialize)]
pub struct BatchData {
    pub energy: Option<EnergyReading>,
    pub appliances: Option<Vec<Appliance>>,
    pub bill: Option<MonthlyBill>,
    pub alerts: Option<Vec<Alert>>,
    pub history: Option<Vec<HistoryPoint>>,
    pub usage: Option<Vec<UsageShare>>,
    pub news: Option<Vec<NewsItem>>,
    pub health: Option<HealthStatus>,
    pub timestamp: DateTime<Utc>,
}

/// Merged result of one poll cycle
#[derive(Debug, Clone, Serialize)]
pub struct PollSnapshot {
    pub energy: Option<EnergyReading>,
    pub appliances: Option<Vec<Appliance>>,
    pub alerts: Option<Vec<Alert>>,
    pub health: Option<HealthStatus>,
    pub timestamp: DateTime<Utc>,
    pub is_connected: bool,
}

/// Typed, normalized access to the energy backend.
///
/// Accessors never return transport failures: they log and fall back to
/// `None`, an empty list or a default record. The exceptions are the report
/// download, appliance control and appliance naming, which return `ApiError`
/// so the caller can react.
#[derive(Clone)]
pub struct DataClient {
    api: Arc<dyn EnergyApi>,
    anomaly_limit: u32,
    max_alerts: usize,
}

impl DataClient {
    pub fn new(api: Arc<dyn EnergyApi>, config: &DashboardConfig) -> Self {
        Self {
            api,
            anomaly_limit: config.anomaly_limit,
            max_alerts: config.max_alerts,
        }
    }

    pub async fn get_live_energy_data(&self) -> Option<EnergyReading> {
        match self.api.live_data().await {
            Ok(response) => latest_reading(&response),
            Err(e) => {
                warn!("Error fetching live energy data: {}", e);
                None
            }
        }
    }

    pub async fn get_appliance_data(&self) -> Vec<Appliance> {
        self.get_live_energy_data()
            .await
            .map(|reading| Appliance::from_reading(&reading))
            .unwrap_or_default()
    }

    /// Bill for the current calendar month
    pub async fn get_monthly_bill(&self) -> MonthlyBill {
        let now = Local::now();
        self.get_monthly_bill_for(now.month(), now.year()).await
    }

    pub async fn get_monthly_bill_for(&self, month: u32, year: i32) -> MonthlyBill {
        let summary = self.api.monthly_summary(month, year).await;
        if let Err(e) = &summary {
            warn!("Error fetching monthly bill: {}", e);
        }
        if let Some(bill) = summary.ok().as_ref().and_then(bill_from_summary) {
            return bill;
        }

        self.get_live_energy_data()
            .await
            .map(|reading| estimate_bill(&reading))
            .unwrap_or_default()
    }

    pub async fn get_anomaly_alerts(&self) -> Vec<Alert> {
        match self.api.anomalies(self.anomaly_limit).await {
            Ok(response) => alerts_from(&response, self.max_alerts),
            Err(e) => {
                warn!("Error fetching anomaly alerts: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get_energy_history(&self, hours: u32) -> Vec<HistoryPoint> {
        match self.api.live_data().await {
            Ok(response) => history_from(&response, hours),
            Err(e) => {
                warn!("Error fetching energy history: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get_appliance_usage_breakdown(&self) -> Vec<UsageShare> {
        self.get_live_energy_data()
            .await
            .map(|reading| compute_breakdown(&reading))
            .unwrap_or_default()
    }

    pub fn get_electricity_news(&self) -> Vec<NewsItem> {
        news::curated()
    }

    pub async fn get_system_health(&self) -> HealthStatus {
        self.api.health().await.unwrap_or_else(|e| {
            warn!("Error fetching system health: {}", e);
            HealthStatus::unhealthy(e.to_string())
        })
    }

    pub async fn send_test_notification(&self, message: &str) -> NotificationOutcome {
        self.api
            .test_notification(message)
            .await
            .unwrap_or_else(|e| {
                warn!("Error sending test notification: {}", e);
                NotificationOutcome {
                    success: false,
                    message: None,
                    error: Some(e.to_string()),
                }
            })
    }

    pub async fn download_monthly_report(
        &self,
        month: u32,
        year: i32,
    ) -> Result<MonthlyReport, ApiError> {
        self.api.monthly_report(month, year).await.map_err(|e| {
            warn!("Error downloading monthly report {}/{}: {}", month, year, e);
            e
        })
    }

    pub async fn control_appliance(
        &self,
        id: ApplianceId,
        status: PowerStatus,
    ) -> Result<ControlAck, ApiError> {
        let ack = self.api.control_appliance(id, status).await?;
        if !ack.success {
            return Err(ApiError::Rejected(format!(
                "control {} for appliance {}",
                status.action(),
                id
            )));
        }
        Ok(ack)
    }

    pub async fn update_appliance_name(
        &self,
        id: ApplianceId,
        name: &str,
    ) -> Result<NameAck, ApiError> {
        let ack = self.api.update_appliance_name(id, name).await?;
        if !ack.success {
            return Err(ApiError::Rejected(format!("rename of appliance {}", id)));
        }
        Ok(ack)
    }

    /// Fetch every dashboard slice concurrently.
    ///
    /// `/live-data` is requested once and feeds the reading, appliances,
    /// history and breakdown slices.
    pub async fn fetch_all(&self, history_hours: u32) -> BatchData {
        let now = Local::now();
        let (live, summary, anomalies, health) = tokio::join!(
            self.api.live_data(),
            self.api.monthly_summary(now.month(), now.year()),
            self.api.anomalies(self.anomaly_limit),
            self.api.health(),
        );

        let live = live
            .map_err(|e| warn!("Error fetching live energy data: {}", e))
            .ok();
        let energy = live.as_ref().and_then(latest_reading);

        let bill = match summary {
            Ok(ref response) => bill_from_summary(response),
            Err(e) => {
                warn!("Error fetching monthly bill: {}", e);
                None
            }
        }
        .or_else(|| energy.as_ref().map(estimate_bill));

        let alerts = anomalies
            .map(|response| alerts_from(&response, self.max_alerts))
            .map_err(|e| warn!("Error fetching anomaly alerts: {}", e))
            .ok();

        let health = health
            .map_err(|e| warn!("Error fetching system health: {}", e))
            .ok();

        debug!(
            "Batch fetch complete: energy={}, alerts={}, health={}",
            energy.is_some(),
            alerts.is_some(),
            health.is_some()
        );

        BatchData {
            appliances: energy.as_ref().map(Appliance::from_reading),
            usage: energy.as_ref().map(compute_breakdown),
            history: live.as_ref().map(|r| history_from(r, history_hours)),
            energy,
            bill,
            alerts,
            news: Some(self.get_electricity_news()),
            health,
            timestamp: Utc::now(),
        }
    }

    /// One poll cycle: reading, appliances, alerts and health, fetched concurrently.
    pub async fn poll_cycle(&self) -> PollSnapshot {
        let (live, anomalies, health) = tokio::join!(
            self.api.live_data(),
            self.api.anomalies(self.anomaly_limit),
            self.api.health(),
        );

        let energy = match live {
            Ok(ref response) => latest_reading(response),
            Err(e) => {
                warn!("Poll: error fetching live energy data: {}", e);
                None
            }
        };
        let alerts = anomalies
            .map(|response| alerts_from(&response, self.max_alerts))
            .map_err(|e| warn!("Poll: error fetching anomaly alerts: {}", e))
            .ok();
        let health = health
            .map_err(|e| warn!("Poll: error fetching system health: {}", e))
            .ok();

        PollSnapshot {
            is_connected: energy.is_some(),
            appliances: energy.as_ref().map(Appliance::from_reading),
            energy,
            alerts,
            health,
            timestamp: Utc::now(),
        }
    }
}

fn latest_reading(response: &LiveDataResponse) -> Option<EnergyReading> {
    if !response.success {
        return None;
    }
    response.data.last().map(EnergyReading::from)
}

fn history_from(response: &LiveDataResponse, hours: u32) -> Vec<HistoryPoint> {
    if !response.success {
        return Vec::new();
    }
    let keep = (hours as usize).min(response.data.len());
    response.data[response.data.len() - keep..]
        .iter()
        .map(HistoryPoint::from)
        .collect()
}

fn alerts_from(response: &AnomalyResponse, max_alerts: usize) -> Vec<Alert> {
    if !response.success {
        return Vec::new();
    }
    response
        .anomalies
        .iter()
        .filter(|anomaly| anomaly.is_anomaly)
        .map(Alert::from)
        .take(max_alerts)
        .collect()
}

fn bill_from_summary(response: &MonthlySummaryResponse) -> Option<MonthlyBill> {
    if !response.success {
        return None;
    }
    let summary = response.summary.as_ref()?;
    let total_cost = summary.total_cost.unwrap_or(0.0);

    Some(MonthlyBill {
        amount: total_cost.round(),
        daily_average: (total_cost / DAYS_PER_BILLING_MONTH).round(),
        total_energy: summary.total_energy.unwrap_or(0.0),
        estimated: false,
    })
}

/// Extrapolate a month from the latest reading's daily figures
fn estimate_bill(reading: &EnergyReading) -> MonthlyBill {
    let monthly = reading.cost * DAYS_PER_BILLING_MONTH;
    MonthlyBill {
        amount: monthly.round(),
        daily_average: (monthly / DAYS_PER_BILLING_MONTH).round(),
        total_energy: reading.energy * DAYS_PER_BILLING_MONTH,
        estimated: true,
    }
}
