#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use crossbeam::channel::Receiver;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use upload_monitor::{Notification, NotificationKind};

#[derive(Debug, Clone)]
pub struct Received {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Received {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct EndpointState {
    status: AtomicU16,
    received: Mutex<Vec<Received>>,
}

/// Local stand-in for the collection endpoint.
#[derive(Clone)]
pub struct TestEndpoint {
    pub url: String,
    state: Arc<EndpointState>,
}

impl TestEndpoint {
    pub async fn spawn(status: u16) -> TestEndpoint {
        let state = Arc::new(EndpointState {
            status: AtomicU16::new(status),
            received: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/upload", post(receive))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestEndpoint {
            url: format!("http://{}/upload", addr),
            state,
        }
    }

    pub fn respond_with(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn receive(
    State(state): State<Arc<EndpointState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.received.lock().unwrap().push(Received {
        content_type,
        body: body.to_vec(),
    });

    let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap();
    let text = if status.is_success() { "stored" } else { "storage unavailable" };
    (status, text)
}

/// Collects notifications until `done` matches one of them or `timeout` passes.
pub async fn collect_until(
    rx: &Receiver<Notification>,
    seen: &mut Vec<Notification>,
    timeout: Duration,
    done: impl Fn(&Notification) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        for n in rx.try_iter() {
            let hit = done(&n);
            seen.push(n);
            if hit {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Drains everything that arrives within `window`.
pub async fn collect_for(rx: &Receiver<Notification>, seen: &mut Vec<Notification>, window: Duration) {
    collect_until(rx, seen, window, |_| false).await;
}

pub fn count(seen: &[Notification], kind: NotificationKind, filename: &str) -> usize {
    seen.iter()
        .filter(|n| n.kind == kind && n.filename.as_deref() == Some(filename))
        .count()
}
