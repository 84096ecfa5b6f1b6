use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::{SourceEvent, SourceKind, SourceSink, UpdateSource};
use crate::client::DataClient;

/// Periodic refresh used while no live feed is available.
///
/// The first cycle runs immediately on start, then once per interval. A
/// cycle never overlaps the next: slow cycles delay the schedule.
pub struct PollFallback {
    client: DataClient,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl PollFallback {
    pub fn new(client: DataClient, interval: Duration) -> Self {
        Self {
            client,
            interval,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn abort_task(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl UpdateSource for PollFallback {
    fn kind(&self) -> SourceKind {
        SourceKind::Poll
    }

    fn start(&mut self, sink: SourceSink) {
        self.abort_task();
        info!("Starting poll fallback every {:?}", self.interval);

        let client = self.client.clone();
        let period = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let snapshot = client.poll_cycle().await;
                debug!("Poll cycle complete, connected={}", snapshot.is_connected);
                if !sink.send(SourceEvent::Snapshot(snapshot)) {
                    break;
                }
            }
        }));
    }

    fn stop(&mut self) {
        if self.abort_task() {
            info!("Poll fallback stopped");
        }
    }
}

impl Drop for PollFallback {
    fn drop(&mut self) {
        self.abort_task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpEnergyApi;
    use crate::config::{BackendConfig, DashboardConfig};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn unreachable_client() -> DataClient {
        let api = HttpEnergyApi::new(&BackendConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            request_timeout_secs: Some(2),
        })
        .unwrap();
        DataClient::new(Arc::new(api), &DashboardConfig::default())
    }

    #[tokio::test]
    async fn test_stop_is_safe_before_start() {
        let mut poll = PollFallback::new(unreachable_client(), Duration::from_secs(5));

        poll.stop();
        poll.stop();
        assert!(!poll.is_running());
        assert_eq!(poll.kind(), SourceKind::Poll);
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately() {
        let mut poll = PollFallback::new(unreachable_client(), Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        poll.start(SourceSink::new(4, tx));
        let message = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(message.epoch, 4);
        match message.event {
            // Failed sub-fetches still produce a snapshot
            SourceEvent::Snapshot(snapshot) => {
                assert!(!snapshot.is_connected);
                assert!(snapshot.energy.is_none());
                assert!(snapshot.alerts.is_none());
            }
            other => panic!("Expected Snapshot, got {:?}", other),
        }
        assert!(poll.is_running());

        poll.stop();
        assert!(!poll.is_running());
    }
}
