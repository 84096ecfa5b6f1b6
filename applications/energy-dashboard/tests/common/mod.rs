#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use energy_dashboard::client::EnergyApi;
use energy_dashboard::dashboard::{Dashboard, DashboardState};
use energy_dashboard::error::ApiError;
use energy_dashboard::models::{
    AnomalyResponse, ApplianceId, ControlAck, HealthStatus, LiveDataResponse, MonthlyReport,
    MonthlySummaryResponse, NameAck, NotificationOutcome, PowerStatus, RawAnomaly, RawReading,
};
use energy_dashboard::source::{SourceEvent, SourceKind, SourceSink, UpdateSource};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory backend with switchable failures
#[derive(Default)]
pub struct FakeApi {
    pub live: Mutex<Option<LiveDataResponse>>,
    pub live_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
    pub fail_control: AtomicBool,
    pub control_gate: Option<Arc<Notify>>,
    pub fail_rename_for: Mutex<Option<ApplianceId>>,
    pub renamed: Mutex<Vec<(ApplianceId, String)>>,
}

impl FakeApi {
    /// Two appliances: #1 drawing 75 W (on), #2 idle (off)
    pub fn with_reading() -> Self {
        let api = FakeApi::default();
        *api.live.lock().unwrap() = Some(LiveDataResponse {
            success: true,
            data: vec![RawReading {
                timestamp: Some("2025-03-01T10:00:00Z".to_string()),
                i1: Some(0.4),
                i2: Some(0.0),
                p1: Some(75.0),
                p2: Some(0.0),
                total_power: Some(75.0),
                energy_kwh: Some(1.2),
                cost_inr: Some(9.0),
            }],
        });
        api
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnergyApi for FakeApi {
    async fn live_data(&self) -> Result<LiveDataResponse, ApiError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Network("connection refused".to_string()))
    }

    async fn monthly_summary(
        &self,
        _month: u32,
        _year: i32,
    ) -> Result<MonthlySummaryResponse, ApiError> {
        Err(ApiError::Http {
            status: 404,
            message: "no summary".to_string(),
        })
    }

    async fn anomalies(&self, _limit: u32) -> Result<AnomalyResponse, ApiError> {
        Ok(AnomalyResponse {
            success: true,
            anomalies: vec![RawAnomaly {
                is_anomaly: true,
                severity: "High".to_string(),
                anomaly_type: "Spike".to_string(),
                details: "Sudden draw".to_string(),
                timestamp: "2025-03-01T10:00:00Z".to_string(),
                ..Default::default()
            }],
        })
    }

    async fn monthly_report(&self, month: u32, year: i32) -> Result<MonthlyReport, ApiError> {
        Ok(MonthlyReport {
            filename: MonthlyReport::filename_for(month, year),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        })
    }

    async fn test_notification(&self, message: &str) -> Result<NotificationOutcome, ApiError> {
        Ok(NotificationOutcome {
            success: true,
            message: Some(message.to_string()),
            error: None,
        })
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        Ok(HealthStatus {
            status: "healthy".to_string(),
            error: None,
        })
    }

    async fn control_appliance(
        &self,
        id: ApplianceId,
        status: PowerStatus,
    ) -> Result<ControlAck, ApiError> {
        if let Some(gate) = &self.control_gate {
            gate.notified().await;
        }
        if self.fail_control.load(Ordering::SeqCst) {
            return Err(ApiError::Network("control unreachable".to_string()));
        }
        Ok(ControlAck {
            success: true,
            appliance_id: id,
            action: status.action().to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn update_appliance_name(
        &self,
        id: ApplianceId,
        name: &str,
    ) -> Result<NameAck, ApiError> {
        if *self.fail_rename_for.lock().unwrap() == Some(id) {
            return Err(ApiError::Http {
                status: 500,
                message: format!("cannot rename {}", id),
            });
        }
        self.renamed.lock().unwrap().push((id, name.to_string()));
        Ok(NameAck {
            success: true,
            appliance_id: id,
            name: name.to_string(),
            timestamp: Utc::now(),
        })
    }
}

/// Update source that replays a fixed script on start and exposes its sink
pub struct ScriptedSource {
    kind: SourceKind,
    script: Vec<SourceEvent>,
    pub handle: SourceHandle,
}

#[derive(Clone, Default)]
pub struct SourceHandle {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub sink: Arc<Mutex<Option<SourceSink>>>,
}

impl SourceHandle {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Send through the most recently issued sink
    pub fn send(&self, event: SourceEvent) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send(event),
            None => false,
        }
    }
}

impl ScriptedSource {
    pub fn new(kind: SourceKind, script: Vec<SourceEvent>) -> Self {
        Self {
            kind,
            script,
            handle: SourceHandle::default(),
        }
    }
}

impl UpdateSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn start(&mut self, sink: SourceSink) {
        self.handle.starts.fetch_add(1, Ordering::SeqCst);
        for event in &self.script {
            sink.send(event.clone());
        }
        *self.handle.sink.lock().unwrap() = Some(sink);
    }

    fn stop(&mut self) {
        self.handle.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `check` until it holds, panicking after ~10s (virtual time under a paused clock)
pub async fn wait_for(check: impl Fn() -> bool) {
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

/// Wait until the dashboard state satisfies `predicate` and return that state
pub async fn wait_for_state(
    dashboard: &Dashboard,
    predicate: impl Fn(&DashboardState) -> bool,
) -> DashboardState {
    for _ in 0..1000 {
        let state = dashboard.snapshot().await;
        if predicate(&state) {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dashboard state not reached in time");
}
