use crate::dashboard::{Dashboard, DashboardState, ToggleOutcome};
use crate::error::ApiError;
use crate::models::{ApplianceId, MonthlyReport, NotificationOutcome};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_TEST_MESSAGE: &str = "Test notification from Energy Dashboard";

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub names: BTreeMap<ApplianceId, String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationRequest {
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn get_dashboard(State(dashboard): State<Arc<Dashboard>>) -> Json<DashboardState> {
    Json(dashboard.snapshot().await)
}

pub async fn refresh(State(dashboard): State<Arc<Dashboard>>) -> Json<DashboardState> {
    Json(dashboard.refresh().await)
}

pub async fn toggle_appliance(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<ApplianceId>,
) -> Response {
    match dashboard.toggle_appliance(id).await {
        ToggleOutcome::Confirmed(appliance) => Json(appliance).into_response(),
        ToggleOutcome::Reverted(appliance) => (StatusCode::CONFLICT, Json(appliance)).into_response(),
        ToggleOutcome::UnknownAppliance => StatusCode::NOT_FOUND.into_response(),
        ToggleOutcome::InFlight => StatusCode::CONFLICT.into_response(),
    }
}

pub async fn rename_appliances(
    State(dashboard): State<Arc<Dashboard>>,
    Json(request): Json<RenameRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    dashboard
        .rename_appliances(request.names)
        .await
        .map_err(bad_gateway)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn monthly_report(
    State(dashboard): State<Arc<Dashboard>>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, (StatusCode, String)> {
    if !(1..=12).contains(&query.month) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("month must be between 1 and 12, got {}", query.month),
        ));
    }

    let report = dashboard
        .client()
        .download_monthly_report(query.month, query.year)
        .await
        .map_err(bad_gateway)?;

    Ok(report_response(report))
}

pub async fn test_notification(
    State(dashboard): State<Arc<Dashboard>>,
    body: Bytes,
) -> Result<Json<NotificationOutcome>, StatusCode> {
    let request: NotificationRequest = if body.is_empty() {
        NotificationRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?
    };
    let message = request
        .message
        .unwrap_or_else(|| DEFAULT_TEST_MESSAGE.to_string());

    Ok(Json(dashboard.client().send_test_notification(&message).await))
}

fn report_response(report: MonthlyReport) -> Response {
    (
        [
            (header::CONTENT_TYPE, report.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.filename),
            ),
        ],
        report.bytes,
    )
        .into_response()
}

fn bad_gateway(err: ApiError) -> (StatusCode, String) {
    (StatusCode::BAD_GATEWAY, err.to_string())
}
