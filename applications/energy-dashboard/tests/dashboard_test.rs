mod common;

use common::{wait_for, wait_for_state, FakeApi, ScriptedSource, SourceHandle};
use energy_dashboard::client::DataClient;
use energy_dashboard::config::DashboardConfig;
use energy_dashboard::dashboard::{ConnectionState, Dashboard, ToggleOutcome};
use energy_dashboard::error::ApiError;
use energy_dashboard::models::{Alert, PowerStatus, RawReading, Severity};
use energy_dashboard::source::{FeedUpdate, PollFallback, SourceEvent, SourceKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};

fn build(api: Arc<FakeApi>, feed_script: Vec<SourceEvent>) -> (Arc<Dashboard>, SourceHandle) {
    let config = DashboardConfig::default();
    let client = DataClient::new(api, &config);
    let feed = ScriptedSource::new(SourceKind::Feed, feed_script);
    let handle = feed.handle.clone();
    let poll = PollFallback::new(client.clone(), config.poll_interval());

    let dashboard = Dashboard::new(client, Box::new(feed), Box::new(poll), config);
    (Arc::new(dashboard), handle)
}

fn energy_update(total_power: f64) -> SourceEvent {
    SourceEvent::Update(FeedUpdate::EnergyUpdate(RawReading {
        total_power: Some(total_power),
        p1: Some(total_power),
        p2: Some(0.0),
        ..Default::default()
    }))
}

fn stray_alert() -> SourceEvent {
    SourceEvent::Update(FeedUpdate::AlertUpdate(Alert {
        id: "stray".to_string(),
        severity: Severity::Danger,
        message: "late event".to_string(),
        timestamp: "2025-03-01T10:00:00Z".to_string(),
        appliance: None,
        power_value: None,
        confidence: None,
    }))
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_expiry_starts_polling() {
    let api = Arc::new(FakeApi::with_reading());
    let (dashboard, feed) = build(api.clone(), Vec::new());

    dashboard.initialize().await;
    assert_eq!(dashboard.connection().await, ConnectionState::Connecting);
    assert_eq!(dashboard.active_source().await, Some(SourceKind::Feed));

    sleep(Duration::from_millis(2900)).await;
    assert_eq!(dashboard.connection().await, ConnectionState::Connecting);

    sleep(Duration::from_millis(200)).await;
    wait_for_state(&dashboard, |s| s.connection == ConnectionState::Polling).await;
    assert_eq!(dashboard.active_source().await, Some(SourceKind::Poll));
    assert_eq!(feed.stops(), 1);

    // Eager fetch plus the immediate first poll cycle
    wait_for(|| api.live_calls() >= 2).await;
    let state = wait_for_state(&dashboard, |s| s.backend_reachable).await;
    assert_eq!(state.appliances.len(), 2);
    assert_eq!(state.alerts.len(), 1);

    // Polling repeats on the interval
    let calls = api.live_calls();
    sleep(Duration::from_millis(5100)).await;
    wait_for(|| api.live_calls() > calls).await;

    dashboard.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_live_feed_keeps_polling_off() {
    // No live data over HTTP, so the reading can only come from the feed
    let api = Arc::new(FakeApi::default());
    let (dashboard, feed) = build(api.clone(), vec![SourceEvent::Connected, energy_update(640.0)]);

    dashboard.initialize().await;
    let state = wait_for_state(&dashboard, |s| s.reading.is_some()).await;
    assert_eq!(state.connection, ConnectionState::Live);
    assert_eq!(state.reading.unwrap().current_usage, 640.0);
    assert_eq!(state.usage[0].usage, 100);

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(dashboard.connection().await, ConnectionState::Live);
    assert_eq!(dashboard.active_source().await, Some(SourceKind::Feed));
    assert_eq!(feed.stops(), 0);
    // Only the eager fetch reached the backend
    assert_eq!(api.live_calls(), 1);

    dashboard.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_feed_failure_falls_back_before_grace_period() {
    let api = Arc::new(FakeApi::with_reading());
    let (dashboard, feed) = build(
        api,
        vec![SourceEvent::Failed(ApiError::Stream("closed".to_string()))],
    );
    let started = Instant::now();

    dashboard.initialize().await;
    wait_for_state(&dashboard, |s| s.connection == ConnectionState::Polling).await;

    assert!(started.elapsed() < Duration::from_millis(3000));
    assert_eq!(feed.stops(), 1);

    // Grace expiry afterwards does not restart the poller
    sleep(Duration::from_millis(3500)).await;
    assert_eq!(dashboard.connection().await, ConnectionState::Polling);

    dashboard.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_polling_reports_disconnected_until_backend_answers() {
    let api = Arc::new(FakeApi::default());
    let (dashboard, _feed) = build(
        api.clone(),
        vec![SourceEvent::Failed(ApiError::Stream("closed".to_string()))],
    );

    dashboard.initialize().await;
    let state = wait_for_state(&dashboard, |s| s.connection == ConnectionState::Disconnected).await;
    assert!(!state.backend_reachable);
    assert_eq!(dashboard.active_source().await, Some(SourceKind::Poll));

    let reading = FakeApi::with_reading().live.into_inner().unwrap();
    *api.live.lock().unwrap() = reading;
    sleep(Duration::from_millis(5100)).await;
    let state = wait_for_state(&dashboard, |s| s.connection == ConnectionState::Polling).await;
    assert!(state.backend_reachable);
    assert_eq!(state.appliances.len(), 2);

    dashboard.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_events_from_stopped_source_are_dropped() {
    let api = Arc::new(FakeApi::with_reading());
    let (dashboard, feed) = build(
        api,
        vec![SourceEvent::Failed(ApiError::Stream("closed".to_string()))],
    );

    dashboard.initialize().await;
    wait_for_state(&dashboard, |s| s.connection == ConnectionState::Polling).await;

    assert!(feed.send(SourceEvent::Connected));
    assert!(feed.send(stray_alert()));
    sleep(Duration::from_millis(100)).await;

    let state = dashboard.snapshot().await;
    assert_eq!(state.connection, ConnectionState::Polling);
    assert!(state.alerts.iter().all(|a| a.id != "stray"));

    dashboard.teardown().await;
}

#[tokio::test]
async fn test_toggle_reverts_when_control_fails() {
    let api = Arc::new(FakeApi::with_reading());
    api.fail_control
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (dashboard, _feed) = build(api, Vec::new());
    dashboard.refresh().await;

    let outcome = dashboard.toggle_appliance(1).await;

    match outcome {
        ToggleOutcome::Reverted(appliance) => {
            assert_eq!(appliance.status, PowerStatus::On);
            assert!(!appliance.pending);
        }
        other => panic!("Expected Reverted, got {:?}", other),
    }
    let state = dashboard.snapshot().await;
    assert_eq!(state.appliance(1).unwrap().status, PowerStatus::On);
}

#[tokio::test]
async fn test_toggle_applies_before_confirmation() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(FakeApi {
        control_gate: Some(gate.clone()),
        ..FakeApi::with_reading()
    });
    let (dashboard, _feed) = build(api, Vec::new());
    dashboard.refresh().await;

    let toggle = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.toggle_appliance(2).await }
    });

    let state = wait_for_state(&dashboard, |s| {
        s.appliance(2).is_some_and(|a| a.pending)
    })
    .await;
    assert_eq!(state.appliance(2).unwrap().status, PowerStatus::On);
    assert_eq!(dashboard.toggle_appliance(2).await, ToggleOutcome::InFlight);

    gate.notify_one();
    match toggle.await.unwrap() {
        ToggleOutcome::Confirmed(appliance) => {
            assert_eq!(appliance.status, PowerStatus::On);
            assert!(!appliance.pending);
        }
        other => panic!("Expected Confirmed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_toggle_unknown_appliance() {
    let (dashboard, _feed) = build(Arc::new(FakeApi::with_reading()), Vec::new());
    dashboard.refresh().await;

    assert_eq!(
        dashboard.toggle_appliance(42).await,
        ToggleOutcome::UnknownAppliance
    );
}

#[tokio::test]
async fn test_rename_failure_keeps_earlier_names() {
    let api = Arc::new(FakeApi::with_reading());
    *api.fail_rename_for.lock().unwrap() = Some(2);
    let (dashboard, _feed) = build(api.clone(), Vec::new());
    dashboard.refresh().await;

    let names = BTreeMap::from([(1, "Fan".to_string()), (2, "Heater".to_string())]);
    let err = dashboard.rename_appliances(names).await.unwrap_err();

    assert!(matches!(err, ApiError::Http { status: 500, .. }));
    assert_eq!(*api.renamed.lock().unwrap(), vec![(1, "Fan".to_string())]);

    // No rollback: both names stay applied locally
    let state = dashboard.snapshot().await;
    assert_eq!(state.appliance(1).unwrap().name, "Fan");
    assert_eq!(state.appliance(2).unwrap().name, "Heater");
}

#[tokio::test]
async fn test_names_survive_refresh() {
    let (dashboard, _feed) = build(Arc::new(FakeApi::with_reading()), Vec::new());
    dashboard.refresh().await;

    dashboard
        .rename_appliances(BTreeMap::from([(1, "Fan".to_string())]))
        .await
        .unwrap();
    let state = dashboard.refresh().await;

    assert_eq!(state.appliance(1).unwrap().name, "Fan");
    assert_eq!(state.usage[0].name, "Fan");
    assert_eq!(state.appliance(2).unwrap().name, "Appliance 2");
}

#[tokio::test]
async fn test_refresh_failure_keeps_previous_state() {
    let api = Arc::new(FakeApi::with_reading());
    let (dashboard, _feed) = build(api.clone(), Vec::new());
    dashboard.refresh().await;

    *api.live.lock().unwrap() = None;
    let state = dashboard.refresh().await;

    assert!(!state.backend_reachable);
    assert_eq!(state.appliances.len(), 2);
    assert_eq!(state.reading.unwrap().current_usage, 75.0);
    // Bill estimated from the earlier reading survives the failed summary
    assert!(state.bill.unwrap().estimated);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_twice_stops_all_updates() {
    let api = Arc::new(FakeApi::default());
    let (dashboard, feed) = build(api.clone(), Vec::new());

    dashboard.initialize().await;
    dashboard.teardown().await;
    dashboard.teardown().await;

    assert_eq!(feed.stops(), 1);
    assert_eq!(dashboard.active_source().await, None);

    feed.send(energy_update(500.0));
    sleep(Duration::from_millis(6000)).await;

    let state = dashboard.snapshot().await;
    assert_eq!(state.connection, ConnectionState::Disconnected);
    assert!(state.reading.is_none());
    // Grace timer was cancelled, so the poller never ran
    assert!(api.live_calls() <= 1);
}

#[tokio::test]
async fn test_teardown_without_initialize() {
    let (dashboard, feed) = build(Arc::new(FakeApi::default()), Vec::new());

    dashboard.teardown().await;
    dashboard.teardown().await;
    assert_eq!(feed.stops(), 0);

    dashboard.initialize().await;
    assert_eq!(feed.starts(), 0);
    assert_eq!(dashboard.connection().await, ConnectionState::Disconnected);
}
