use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::BackendConfig;
use crate::error::ApiError;
use crate::models::{
    AnomalyResponse, ApplianceId, ControlAck, HealthStatus, LiveDataResponse, MonthlyReport,
    MonthlySummaryResponse, NameAck, NotificationOutcome, PowerStatus,
};

/// Raw backend calls. Implementations surface every transport failure as `ApiError`;
/// normalization and error swallowing happen in `DataClient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnergyApi: Send + Sync {
    async fn live_data(&self) -> Result<LiveDataResponse, ApiError>;

    async fn monthly_summary(
        &self,
        month: u32,
        year: i32,
    ) -> Result<MonthlySummaryResponse, ApiError>;

    async fn anomalies(&self, limit: u32) -> Result<AnomalyResponse, ApiError>;

    async fn monthly_report(&self, month: u32, year: i32) -> Result<MonthlyReport, ApiError>;

    async fn test_notification(&self, message: &str) -> Result<NotificationOutcome, ApiError>;

    async fn health(&self) -> Result<HealthStatus, ApiError>;

    async fn control_appliance(
        &self,
        id: ApplianceId,
        status: PowerStatus,
    ) -> Result<ControlAck, ApiError>;

    async fn update_appliance_name(&self, id: ApplianceId, name: &str)
        -> Result<NameAck, ApiError>;
}

/// reqwest-backed transport for the energy backend
#[derive(Clone)]
pub struct HttpEnergyApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEnergyApi {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn stream_url(&self) -> String {
        self.url("/stream/live-data")
    }

    /// Make a GET request and deserialize the response
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with a JSON body
    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl EnergyApi for HttpEnergyApi {
    async fn live_data(&self) -> Result<LiveDataResponse, ApiError> {
        self.get("/live-data").await
    }

    async fn monthly_summary(
        &self,
        month: u32,
        year: i32,
    ) -> Result<MonthlySummaryResponse, ApiError> {
        self.get(&format!("/monthly-summary?month={}&year={}", month, year))
            .await
    }

    async fn anomalies(&self, limit: u32) -> Result<AnomalyResponse, ApiError> {
        self.get(&format!("/detect-anomalies?limit={}", limit)).await
    }

    async fn monthly_report(&self, month: u32, year: i32) -> Result<MonthlyReport, ApiError> {
        let path = format!("/monthly-report?month={}&year={}", month, year);
        let response = self.http.get(self.url(&path)).send().await?;
        let response = Self::check_status(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/pdf")
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(MonthlyReport {
            filename: MonthlyReport::filename_for(month, year),
            content_type,
            bytes,
        })
    }

    async fn test_notification(&self, message: &str) -> Result<NotificationOutcome, ApiError> {
        self.post("/test-notification", &serde_json::json!({ "message": message }))
            .await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get("/health").await
    }

    // TODO: call the backend once it exposes an appliance control route
    async fn control_appliance(
        &self,
        id: ApplianceId,
        status: PowerStatus,
    ) -> Result<ControlAck, ApiError> {
        info!("Control appliance {}: {}", id, status.action());
        Ok(ControlAck {
            success: true,
            appliance_id: id,
            action: status.action().to_string(),
            timestamp: Utc::now(),
        })
    }

    // TODO: call the backend once it exposes an appliance naming route
    async fn update_appliance_name(
        &self,
        id: ApplianceId,
        name: &str,
    ) -> Result<NameAck, ApiError> {
        info!("Update appliance {} name to: {}", id, name);
        Ok(NameAck {
            success: true,
            appliance_id: id,
            name: name.to_string(),
            timestamp: Utc::now(),
        })
    }
}
