//! Test doubles for peer streams.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::backoff::BackoffConfig;
use super::peer::{PeerConnector, PeerStream};
use super::stream::StreamEvent;

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff short enough to keep reconnect tests fast
pub fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        min_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: 0.0,
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(ACCEPT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// HTTP server handing every incoming request to the test as a `Conn`
pub struct LineServer {
    addr: std::net::SocketAddr,
    conns: mpsc::UnboundedReceiver<Conn>,
}

/// One open streaming response
pub struct Conn {
    pub path: String,
    lines: mpsc::UnboundedSender<String>,
}

impl LineServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, conns) = mpsc::unbounded_channel();

        let app = Router::new().fallback(move |req: Request| {
            let tx = tx.clone();
            async move {
                let (lines, rx) = mpsc::unbounded_channel::<String>();
                let _ = tx.send(Conn {
                    path: req.uri().path().to_string(),
                    lines,
                });
                let body = UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);
                Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from_stream(body))
                    .unwrap()
            }
        });

        tokio::spawn(async move { axum::serve(listener, app).await });
        Self { addr, conns }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn accept(&mut self) -> Conn {
        tokio::time::timeout(ACCEPT_TIMEOUT, self.conns.recv())
            .await
            .expect("no connection arrived")
            .expect("server stopped")
    }

    /// A URL nothing is listening on
    pub async fn unused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/sets/a", port)
    }
}

impl Conn {
    pub fn send(&self, record: &Value) {
        self.send_raw(&record.to_string());
    }

    pub fn send_raw(&self, line: &str) {
        let _ = self.lines.send(format!("{}\r\n", line));
    }

    /// Finish the response body
    pub fn end(self) {}
}

struct StubEntry {
    url: String,
    feed: mpsc::UnboundedSender<StreamEvent>,
    stopped: Arc<AtomicBool>,
}

/// Connector whose streams are fed by hand
#[derive(Default)]
pub struct StubConnector {
    entries: Mutex<Vec<StubEntry>>,
}

impl StubConnector {
    /// URLs connected to, in order
    pub fn urls(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.url.clone()).collect()
    }

    pub fn feed(&self, url: &str) -> mpsc::UnboundedSender<StreamEvent> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|e| e.url == url)
            .map(|e| e.feed.clone())
            .expect("url was never connected")
    }

    pub fn stopped(&self, url: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .find(|e| e.url == url)
            .is_some_and(|e| e.stopped.load(Ordering::SeqCst))
    }
}

impl PeerConnector for StubConnector {
    fn connect(&self, url: &str) -> Box<dyn PeerStream> {
        let (feed, events) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        self.entries.lock().push(StubEntry {
            url: url.to_string(),
            feed,
            stopped: stopped.clone(),
        });
        Box::new(StubStream { events, stopped })
    }
}

struct StubStream {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl PeerStream for StubStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        self.events.recv().await
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.events.close();
    }
}
