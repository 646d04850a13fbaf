//! Resilient newline-delimited JSON stream from one peer.
//!
//! ```text
//! Connecting ──response──► Streaming ──error / end──► BackingOff
//!     ▲                                                   │
//!     └────────────────── backoff elapsed ────────────────┘
//!            any state ──stop()──► Stopped (terminal)
//! ```
//!
//! The driver task owns the HTTP request; `stop()` cancels a single token
//! that aborts the in-flight request and any pending backoff sleep. After
//! `stop()` returns no further event is delivered, even if a retry was
//! already scheduled.
//!
//! Lines that fail to parse as JSON are logged and skipped; the connection
//! stays up. Transport failures (including an over-long line) reconnect.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use uncorded_common::constants::MAX_RECORD_LINE_BYTES;
use uncorded_common::constants::wire::SERVER_ENDED_REQUEST;

use super::backoff::{BackoffConfig, FibonacciBackoff};

/// Signals emitted by a resilient stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The peer answered; records will follow
    Connected,
    /// The connection failed or ended; a reconnect is scheduled
    ConnectionError(String),
    /// One parsed line
    Data(serde_json::Value),
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    BackingOff,
    Stopped,
}

/// Long-lived client for one peer endpoint
#[derive(Debug)]
pub struct ResilientStream {
    url: String,
    token: CancellationToken,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    state: Arc<watch::Sender<StreamState>>,
    task: Option<JoinHandle<()>>,
}

impl ResilientStream {
    /// Start streaming from `url`; must be called inside a tokio runtime
    pub fn connect(url: impl Into<String>, client: reqwest::Client, backoff: BackoffConfig) -> Self {
        let url = url.into();
        let token = CancellationToken::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(StreamState::Connecting);
        let state = Arc::new(state);

        let driver = StreamDriver {
            url: url.clone(),
            client,
            backoff: FibonacciBackoff::new(backoff),
            events: events_tx,
            state: state.clone(),
            token: token.clone(),
        };
        let task = tokio::spawn(driver.run());

        Self {
            url,
            token,
            events,
            state,
            task: Some(task),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Next event, or `None` once stopped
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Stop for good: abort the request, cancel any pending retry, and drop
    /// undelivered events
    pub fn stop(&mut self) {
        if self.token.is_cancelled() && self.task.is_none() {
            return;
        }
        self.token.cancel();
        self.events.close();
        while self.events.try_recv().is_ok() {}
        set_state(&self.state, StreamState::Stopped);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::debug!(url = %self.url, "Peer stream stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ResilientStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Moves the state forward unless the stream is already stopped
fn set_state(state: &watch::Sender<StreamState>, next: StreamState) {
    state.send_if_modified(|current| {
        if *current == StreamState::Stopped || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

struct StreamDriver {
    url: String,
    client: reqwest::Client,
    backoff: FibonacciBackoff,
    events: mpsc::UnboundedSender<StreamEvent>,
    state: Arc<watch::Sender<StreamState>>,
    token: CancellationToken,
}

impl StreamDriver {
    async fn run(mut self) {
        loop {
            self.transition(StreamState::Connecting);

            let token = self.token.clone();
            let reason = tokio::select! {
                biased;
                () = token.cancelled() => break,
                reason = self.run_connection() => reason,
            };

            if !self.emit(StreamEvent::ConnectionError(reason)) {
                break;
            }

            self.transition(StreamState::BackingOff);
            let delay = self.backoff.next_delay();
            tracing::debug!(
                url = %self.url,
                delay_ms = delay.as_millis() as u64,
                attempt = self.backoff.attempts(),
                "Reconnecting to peer"
            );

            tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(StreamState::Stopped);
    }

    /// One connection attempt; returns why it ended
    async fn run_connection(&mut self) -> String {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => return e.to_string(),
        };
        if !response.status().is_success() {
            return format!("unexpected status {}", response.status());
        }

        self.transition(StreamState::Streaming);
        self.backoff.reset();
        if !self.emit(StreamEvent::Connected) {
            return "stream stopped".to_string();
        }

        let body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let mut lines = std::pin::pin!(FramedRead::new(
            body,
            LinesCodec::new_with_max_length(MAX_RECORD_LINE_BYTES)
        ));

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => return e.to_string(),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => {
                    if !self.emit(StreamEvent::Data(record)) {
                        return "stream stopped".to_string();
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Skipping malformed record");
                }
            }
        }

        SERVER_ENDED_REQUEST.to_string()
    }

    /// Deliver an event; false once the consumer is gone or stopped
    fn emit(&self, event: StreamEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        if self.events.send(event).is_err() {
            self.token.cancel();
            return false;
        }
        true
    }

    fn transition(&self, next: StreamState) {
        set_state(&self.state, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::testing::{LineServer, fast_backoff};
    use serde_json::json;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next(stream: &mut ResilientStream) -> StreamEvent {
        tokio::time::timeout(WAIT, stream.next_event())
            .await
            .expect("timed out waiting for stream event")
            .expect("stream ended")
    }

    #[tokio::test]
    async fn test_emits_connect_then_records() {
        let mut server = LineServer::start().await;
        let mut stream =
            ResilientStream::connect(server.url("/sets/a,b"), reqwest::Client::new(), fast_backoff());

        let conn = server.accept().await;
        assert_eq!(conn.path, "/sets/a,b");
        assert_eq!(next(&mut stream).await, StreamEvent::Connected);
        assert_eq!(stream.state(), StreamState::Streaming);

        conn.send(&json!({ "a": 1 }));
        assert_eq!(next(&mut stream).await, StreamEvent::Data(json!({ "a": 1 })));

        conn.send(&json!({ "a": 2 }));
        assert_eq!(next(&mut stream).await, StreamEvent::Data(json!({ "a": 2 })));

        stream.stop();
    }

    #[tokio::test]
    async fn test_reconnects_after_server_ends_request() {
        let mut server = LineServer::start().await;
        let mut stream =
            ResilientStream::connect(server.url("/sets/a"), reqwest::Client::new(), fast_backoff());

        let first = server.accept().await;
        assert_eq!(next(&mut stream).await, StreamEvent::Connected);
        first.end();

        assert_eq!(
            next(&mut stream).await,
            StreamEvent::ConnectionError(SERVER_ENDED_REQUEST.to_string())
        );

        let second = server.accept().await;
        assert_eq!(next(&mut stream).await, StreamEvent::Connected);
        second.send(&json!({ "a": "again" }));
        assert_eq!(
            next(&mut stream).await,
            StreamEvent::Data(json!({ "a": "again" }))
        );

        stream.stop();
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let mut server = LineServer::start().await;
        let mut stream =
            ResilientStream::connect(server.url("/sets/a"), reqwest::Client::new(), fast_backoff());

        let conn = server.accept().await;
        assert_eq!(next(&mut stream).await, StreamEvent::Connected);

        conn.send_raw("{not json");
        conn.send_raw("");
        conn.send(&json!({ "a": "ok" }));

        assert_eq!(next(&mut stream).await, StreamEvent::Data(json!({ "a": "ok" })));
        stream.stop();
    }

    #[tokio::test]
    async fn test_unreachable_peer_reports_errors_and_retries() {
        let url = LineServer::unused_url().await;
        let mut stream = ResilientStream::connect(url, reqwest::Client::new(), fast_backoff());

        for _ in 0..3 {
            assert!(matches!(
                next(&mut stream).await,
                StreamEvent::ConnectionError(_)
            ));
        }
        stream.stop();
        assert_eq!(stream.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn test_no_events_after_stop() {
        let mut server = LineServer::start().await;
        let mut stream =
            ResilientStream::connect(server.url("/sets/a"), reqwest::Client::new(), fast_backoff());

        let conn = server.accept().await;
        assert_eq!(next(&mut stream).await, StreamEvent::Connected);

        // Queue up a record and a retry, then stop before reading them.
        conn.send(&json!({ "a": 1 }));
        conn.end();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream.stop();

        assert!(stream.is_stopped());
        assert_eq!(stream.next_event().await, None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stream.next_event().await, None);
        assert_eq!(stream.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_backoff() {
        let url = LineServer::unused_url().await;
        let slow = BackoffConfig {
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        };
        let mut stream = ResilientStream::connect(url, reqwest::Client::new(), slow);
        let mut state = stream.watch_state();

        assert!(matches!(
            next(&mut stream).await,
            StreamEvent::ConnectionError(_)
        ));
        tokio::time::timeout(WAIT, state.wait_for(|s| *s == StreamState::BackingOff))
            .await
            .unwrap()
            .unwrap();

        stream.stop();
        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(stream.next_event().await, None);
    }
}
