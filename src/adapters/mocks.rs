//! In-memory fakes for the submission collaborators.
//!
//! Available in test builds and with the `test-helpers` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::Messages;
use crate::error::{Result, SubmitError};
use crate::submission::ports::{Clock, FormTransport, Notifier, TokenProvider};
use crate::submission::FormRequest;

/// Controllable clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a clock starting at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        *self.current_time.lock() += duration;
    }

    /// Set the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current_time.lock() = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current_time.lock()
    }
}

/// A notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Notifier that records every notice, with default texts resolved.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    defaults: Messages,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all notices so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_success(&self, message: Option<&str>) {
        let text = message.unwrap_or(&self.defaults.success).to_string();
        self.notices.lock().push(Notice::Success(text));
    }

    fn show_error(&self, message: Option<&str>) {
        let text = message.unwrap_or(&self.defaults.error).to_string();
        self.notices.lock().push(Notice::Error(text));
    }
}

/// Transport that records requests instead of sending them.
#[derive(Debug, Default)]
pub struct FakeTransport {
    fail: bool,
    sent: Mutex<Vec<FormRequest>>,
}

impl FakeTransport {
    /// A transport that accepts every request.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A transport that rejects every request.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of send attempts.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<FormRequest> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl FormTransport for FakeTransport {
    async fn send(&self, request: &FormRequest) -> Result<()> {
        self.sent.lock().push(request.clone());
        if self.fail {
            return Err(SubmitError::Transport("simulated failure".to_string()).into());
        }
        Ok(())
    }
}

/// Token provider with a fixed answer that records requested actions.
#[derive(Debug, Default)]
pub struct FakeTokenProvider {
    token: Option<String>,
    actions: Mutex<Vec<String>>,
}

impl FakeTokenProvider {
    /// A provider issuing `token` every time.
    pub fn issuing(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..Self::default()
        }
    }

    /// A provider that never issues a token.
    pub fn refusing() -> Self {
        Self::default()
    }

    /// Actions tokens were requested for, oldest first.
    pub fn requested_actions(&self) -> Vec<String> {
        self.actions.lock().clone()
    }
}

#[async_trait]
impl TokenProvider for FakeTokenProvider {
    async fn token(&self, action: &str) -> Option<String> {
        self.actions.lock().push(action.to_string());
        self.token.clone()
    }
}

/// A request received by [`serve_once`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers
    pub head: String,
    /// Raw body
    pub body: Vec<u8>,
}

/// Serve exactly one HTTP request on a local port with a canned response.
///
/// Returns the base URL and a channel yielding the captured request.
pub async fn serve_once(
    status: u16,
    body: &'static str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener address");
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < head_end + content_length {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }

        let reason = if (200..300).contains(&status) { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        let _ = tx.send(CapturedRequest {
            head,
            body: buf[head_end..].to_vec(),
        });
    });

    (format!("http://{}", addr), rx)
}
