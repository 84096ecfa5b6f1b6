//! Update sources feeding the dashboard.
//!
//! A source runs in its own task once started and reports through a
//! `SourceSink`. Every sink is stamped with the epoch it was issued under, so
//! the dashboard can drop late events from a source it already stopped.

mod live;
mod poll;
mod sse;

pub use live::{FeedState, LiveFeed};
pub use poll::PollFallback;
pub use sse::SseDecoder;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::client::PollSnapshot;
use crate::error::ApiError;
use crate::models::{Alert, Appliance, RawReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Feed,
    Poll,
}

/// Incremental update pushed by the live feed
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FeedUpdate {
    EnergyUpdate(RawReading),
    ApplianceUpdate(Vec<Appliance>),
    AlertUpdate(Alert),
}

#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// The source confirmed a working connection
    Connected,
    Update(FeedUpdate),
    Snapshot(PollSnapshot),
    /// The source cannot deliver further updates
    Failed(ApiError),
}

#[derive(Debug)]
pub struct SourceMessage {
    pub epoch: u64,
    pub event: SourceEvent,
}

pub type SourceSender = mpsc::UnboundedSender<SourceMessage>;
pub type SourceReceiver = mpsc::UnboundedReceiver<SourceMessage>;

/// Epoch-stamped handle a source reports through
#[derive(Debug, Clone)]
pub struct SourceSink {
    epoch: u64,
    tx: SourceSender,
}

impl SourceSink {
    pub fn new(epoch: u64, tx: SourceSender) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns false once the receiving side is gone
    pub fn send(&self, event: SourceEvent) -> bool {
        self.tx
            .send(SourceMessage {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}

/// A start/stop-able producer of dashboard updates
pub trait UpdateSource: Send {
    fn kind(&self) -> SourceKind;

    /// Begin delivering events to `sink`. Restarts the source if already running.
    fn start(&mut self, sink: SourceSink);

    /// Stop delivering events. Safe to call repeatedly or before `start`.
    fn stop(&mut self);
}
