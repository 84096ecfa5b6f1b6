use futures::StreamExt;
use reqwest::header::ACCEPT;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{FeedUpdate, SourceEvent, SourceKind, SourceSink, SseDecoder, UpdateSource};
use crate::client::HttpEnergyApi;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Connecting,
    Live,
    Disconnected,
}

/// Streaming subscription to the backend's live-data endpoint.
///
/// The feed is only considered live once the first message parses. Any
/// transport error, non-success status or end of stream is reported once as
/// `SourceEvent::Failed`; the feed does not reconnect on its own.
pub struct LiveFeed {
    http: reqwest::Client,
    url: String,
    state: Arc<watch::Sender<FeedState>>,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(FeedState::Idle);
        Self {
            http,
            url: url.into(),
            state: Arc::new(state),
            task: None,
        }
    }

    /// Subscribe to the stream endpoint of `api`. The stream stays open
    /// indefinitely, so it does not inherit the API's request timeout.
    pub fn from_api(api: &HttpEnergyApi) -> Self {
        Self::new(reqwest::Client::new(), api.stream_url())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
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

impl UpdateSource for LiveFeed {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    fn start(&mut self, sink: SourceSink) {
        self.abort_task();
        self.state.send_replace(FeedState::Connecting);
        info!("Connecting to live feed at {}", self.url);

        let http = self.http.clone();
        let url = self.url.clone();
        let state = self.state.clone();
        self.task = Some(tokio::spawn(async move {
            match stream_events(&http, &url, &sink, &state).await {
                Ok(()) => debug!("Live feed receiver dropped, stopping"),
                Err(e) => {
                    error!("Live feed error: {}", e);
                    state.send_replace(FeedState::Disconnected);
                    sink.send(SourceEvent::Failed(e));
                }
            }
        }));
    }

    fn stop(&mut self) {
        if self.abort_task() {
            info!("Live feed closed");
        }
        self.state.send_replace(FeedState::Idle);
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Read the stream until it fails. Returns `Ok` only when the sink is gone.
async fn stream_events(
    http: &reqwest::Client,
    url: &str,
    sink: &SourceSink,
    state: &watch::Sender<FeedState>,
) -> Result<(), ApiError> {
    let response = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            message: format!("live feed rejected with {}", status),
        });
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ApiError::Stream(e.to_string()))?;
        for message in decoder.push(&chunk)? {
            if !dispatch(&message, sink, state) {
                return Ok(());
            }
        }
    }

    Err(ApiError::Stream("live feed closed by server".to_string()))
}

/// Returns false once the sink is gone
fn dispatch(message: &str, sink: &SourceSink, state: &watch::Sender<FeedState>) -> bool {
    let value: serde_json::Value = match serde_json::from_str(message) {
        Ok(value) => value,
        Err(e) => {
            warn!("Error parsing live feed message: {}", e);
            return true;
        }
    };

    if *state.borrow() != FeedState::Live {
        state.send_replace(FeedState::Live);
        info!("Live feed connected");
        if !sink.send(SourceEvent::Connected) {
            return false;
        }
    }

    match serde_json::from_value::<FeedUpdate>(value) {
        Ok(update) => sink.send(SourceEvent::Update(update)),
        Err(e) => {
            debug!("Ignoring live feed message: {}", e);
            true
        }
    }
}
