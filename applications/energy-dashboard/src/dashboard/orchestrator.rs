use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{ConnectionState, DashboardState, ToggleRejection};
use crate::client::{DataClient, HttpEnergyApi};
use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::models::{Appliance, ApplianceId};
use crate::source::{
    LiveFeed, PollFallback, SourceEvent, SourceKind, SourceReceiver, SourceSender, SourceSink,
    UpdateSource,
};

/// Result of an appliance toggle
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Confirmed(Appliance),
    /// The control request failed and the flip was undone
    Reverted(Appliance),
    UnknownAppliance,
    InFlight,
}

/// Owns the update sources and the strategy slot selecting between them.
///
/// Lock order is slot, then state. Events are applied while the slot lock is
/// held so a source stopped under that lock can never write afterwards.
struct SourceSlot {
    feed: Box<dyn UpdateSource>,
    poll: Box<dyn UpdateSource>,
    active: Option<SourceKind>,
    epoch: u64,
    tx: Option<SourceSender>,
    initialized: bool,
    torn_down: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl SourceSlot {
    fn source_mut(&mut self, kind: SourceKind) -> &mut Box<dyn UpdateSource> {
        match kind {
            SourceKind::Feed => &mut self.feed,
            SourceKind::Poll => &mut self.poll,
        }
    }

    /// Stop the active source, if any, and invalidate its sink
    fn deactivate(&mut self) {
        if let Some(kind) = self.active.take() {
            self.source_mut(kind).stop();
        }
        self.epoch += 1;
    }

    fn activate(&mut self, kind: SourceKind) {
        self.deactivate();
        let Some(tx) = self.tx.clone() else {
            warn!("No event channel, not starting {:?} source", kind);
            return;
        };

        let sink = SourceSink::new(self.epoch, tx);
        self.source_mut(kind).start(sink);
        self.active = Some(kind);
    }

    fn fall_back_to_polling(&mut self, state: &mut DashboardState) {
        if self.active == Some(SourceKind::Poll) {
            return;
        }
        self.activate(SourceKind::Poll);
        state.set_connection(ConnectionState::Polling);
    }
}

/// Single owner of the connection state and every displayed entity
pub struct Dashboard {
    client: DataClient,
    config: DashboardConfig,
    state: Arc<Mutex<DashboardState>>,
    slot: Arc<Mutex<SourceSlot>>,
}

impl Dashboard {
    pub fn new(
        client: DataClient,
        feed: Box<dyn UpdateSource>,
        poll: Box<dyn UpdateSource>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(DashboardState::new(config.retained_alerts))),
            slot: Arc::new(Mutex::new(SourceSlot {
                feed,
                poll,
                active: None,
                epoch: 0,
                tx: None,
                initialized: false,
                torn_down: false,
                tasks: Vec::new(),
            })),
            config,
        }
    }

    /// Wire the HTTP backend, its live stream and a poll fallback
    pub fn connect(api: HttpEnergyApi, config: DashboardConfig) -> Self {
        let feed = LiveFeed::from_api(&api);
        let client = DataClient::new(Arc::new(api), &config);
        let poll = PollFallback::new(client.clone(), config.poll_interval());
        Self::new(client, Box::new(feed), Box::new(poll), config)
    }

    pub fn client(&self) -> &DataClient {
        &self.client
    }

    /// Start the live feed, arm the grace-period fallback and kick off one full fetch.
    pub async fn initialize(&self) {
        let mut slot = self.slot.lock().await;
        if slot.torn_down {
            warn!("Dashboard already torn down, not initializing");
            return;
        }
        if slot.initialized {
            debug!("Dashboard already initialized");
            return;
        }
        slot.initialized = true;

        let (tx, rx) = mpsc::unbounded_channel();
        slot.tx = Some(tx);
        self.state
            .lock()
            .await
            .set_connection(ConnectionState::Connecting);
        slot.activate(SourceKind::Feed);

        let pump = tokio::spawn(pump_events(rx, self.slot.clone(), self.state.clone()));
        let grace = tokio::spawn(grace_period_check(
            self.config.clone(),
            self.slot.clone(),
            self.state.clone(),
        ));
        let eager = tokio::spawn(eager_fetch(
            self.client.clone(),
            self.config.history_hours,
            self.slot.clone(),
            self.state.clone(),
        ));
        slot.tasks.extend([pump, grace, eager]);

        info!(
            "Dashboard initialized, grace period {:?}",
            self.config.grace_period()
        );
    }

    /// Fetch every slice now and apply it
    pub async fn refresh(&self) -> DashboardState {
        let batch = self.client.fetch_all(self.config.history_hours).await;

        let slot = self.slot.lock().await;
        let mut state = self.state.lock().await;
        if slot.torn_down {
            debug!("Dashboard torn down, discarding refresh");
        } else {
            state.apply_batch(batch);
        }
        state.clone()
    }

    /// Optimistically flip an appliance, reverting if the control request fails
    pub async fn toggle_appliance(&self, id: ApplianceId) -> ToggleOutcome {
        let pending = match self.state.lock().await.begin_toggle(id) {
            Ok(pending) => pending,
            Err(ToggleRejection::UnknownAppliance) => return ToggleOutcome::UnknownAppliance,
            Err(ToggleRejection::InFlight) => return ToggleOutcome::InFlight,
        };

        let result = self.client.control_appliance(id, pending.requested).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(_) => match state.confirm_toggle(&pending) {
                Some(appliance) => ToggleOutcome::Confirmed(appliance.clone()),
                None => ToggleOutcome::UnknownAppliance,
            },
            Err(e) => {
                warn!("Failed to toggle appliance {}: {}", id, e);
                match state.revert_toggle(&pending) {
                    Some(appliance) => ToggleOutcome::Reverted(appliance.clone()),
                    None => ToggleOutcome::UnknownAppliance,
                }
            }
        }
    }

    /// Apply names locally, then push each one to the backend in id order.
    ///
    /// The first failed update is returned. Names already applied locally,
    /// including the failed one, are not rolled back.
    pub async fn rename_appliances(
        &self,
        names: BTreeMap<ApplianceId, String>,
    ) -> Result<(), ApiError> {
        self.state.lock().await.apply_names(&names);

        for (id, name) in &names {
            self.client.update_appliance_name(*id, name).await?;
        }
        info!("Renamed {} appliance(s)", names.len());
        Ok(())
    }

    /// Stop the active source and background tasks. Idempotent.
    pub async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        if slot.torn_down {
            debug!("Dashboard already torn down");
            return;
        }
        slot.torn_down = true;
        slot.deactivate();
        slot.tx = None;
        for task in slot.tasks.drain(..) {
            task.abort();
        }

        self.state
            .lock()
            .await
            .set_connection(ConnectionState::Disconnected);
        info!("Dashboard torn down");
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    pub async fn connection(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn active_source(&self) -> Option<SourceKind> {
        self.slot.lock().await.active
    }
}

async fn pump_events(
    mut rx: SourceReceiver,
    slot: Arc<Mutex<SourceSlot>>,
    state: Arc<Mutex<DashboardState>>,
) {
    while let Some(message) = rx.recv().await {
        let mut slot = slot.lock().await;
        if slot.torn_down {
            break;
        }
        if message.epoch != slot.epoch {
            debug!("Dropping event from stopped source (epoch {})", message.epoch);
            continue;
        }

        let mut state = state.lock().await;
        match message.event {
            SourceEvent::Connected => {
                if slot.active == Some(SourceKind::Feed) {
                    state.set_connection(ConnectionState::Live);
                }
            }
            SourceEvent::Update(update) => state.apply_feed_update(update),
            SourceEvent::Snapshot(snapshot) => state.apply_snapshot(snapshot),
            SourceEvent::Failed(e) => {
                warn!("Update source failed: {}, falling back to polling", e);
                slot.fall_back_to_polling(&mut state);
            }
        }
    }
    debug!("Event pump stopped");
}

async fn grace_period_check(
    config: DashboardConfig,
    slot: Arc<Mutex<SourceSlot>>,
    state: Arc<Mutex<DashboardState>>,
) {
    tokio::time::sleep(config.grace_period()).await;

    let mut slot = slot.lock().await;
    if slot.torn_down {
        return;
    }
    let mut state = state.lock().await;
    if state.connection != ConnectionState::Live {
        info!(
            "Live feed not ready after {:?}, falling back to polling",
            config.grace_period()
        );
        slot.fall_back_to_polling(&mut state);
    }
}

async fn eager_fetch(
    client: DataClient,
    history_hours: u32,
    slot: Arc<Mutex<SourceSlot>>,
    state: Arc<Mutex<DashboardState>>,
) {
    let batch = client.fetch_all(history_hours).await;

    let slot = slot.lock().await;
    if slot.torn_down {
        return;
    }
    state.lock().await.apply_batch(batch);
    debug!("Initial dashboard fetch applied");
}
