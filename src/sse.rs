//! Streaming session manager.
//!
//! Every connected stream client gets its own task. The task announces the
//! connection, then emits a heartbeat on a fixed interval until the client
//! goes away. Disconnect is observed through the event channel: once the
//! receiving half (owned by the HTTP response body) is dropped, the task ends
//! and its timer goes with it. Sessions share nothing but the active-session
//! counter.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Interval between heartbeats when none is configured.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Events buffered per session before sending waits on the client.
const EVENT_BUFFER: usize = 16;

/// An event pushed to a stream client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Sent once, right after the stream is established.
    Connection {
        /// Always "connected"
        status: String,
    },
    /// Sent on every tick of the session's keepalive timer.
    Heartbeat {
        /// RFC 3339 send time
        timestamp: String,
    },
}

impl StreamEvent {
    /// The handshake event.
    pub fn connected() -> Self {
        StreamEvent::Connection {
            status: "connected".to_string(),
        }
    }

    /// A heartbeat stamped with the current time.
    pub fn heartbeat() -> Self {
        StreamEvent::Heartbeat {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// JSON payload for the event's `data:` line.
    pub fn to_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Task started, handshake not yet delivered.
    Connecting,
    /// Handshake delivered, heartbeats flowing.
    Open,
    /// Client gone; the task is finishing.
    Closed,
}

/// Decrements the active-session count when the session task ends, however
/// it ends.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns and counts streaming sessions.
pub struct SessionManager {
    heartbeat_interval: Duration,
    next_id: AtomicU64,
    active: Arc<AtomicUsize>,
}

impl SessionManager {
    /// Create a manager whose sessions beat every `heartbeat_interval`.
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            heartbeat_interval,
            next_id: AtomicU64::new(1),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The configured heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Number of sessions whose task is still running.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a new session and return its event stream.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// stream disconnects the session.
    pub fn open(&self) -> SessionStream {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let guard = ActiveGuard::new(Arc::clone(&self.active));

        tokio::spawn(run_session(id, tx, self.heartbeat_interval, guard));

        SessionStream {
            id,
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

fn transition(id: u64, state: &mut SessionState, next: SessionState) {
    debug!(session = id, from = ?state, to = ?next, "Session state change");
    *state = next;
}

async fn run_session(
    id: u64,
    tx: mpsc::Sender<StreamEvent>,
    period: Duration,
    _guard: ActiveGuard,
) {
    let mut state = SessionState::Connecting;

    if tx.send(StreamEvent::connected()).await.is_err() {
        transition(id, &mut state, SessionState::Closed);
        return;
    }
    transition(id, &mut state, SessionState::Open);

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while state == SessionState::Open {
        tokio::select! {
            _ = tx.closed() => {
                debug!(session = id, "Client disconnected");
                transition(id, &mut state, SessionState::Closed);
            }
            _ = ticker.tick() => {
                if tx.send(StreamEvent::heartbeat()).await.is_err() {
                    debug!(session = id, "Heartbeat send failed");
                    transition(id, &mut state, SessionState::Closed);
                }
            }
        }
    }
}

/// Receiving end of one session.
pub struct SessionStream {
    id: u64,
    inner: ReceiverStream<StreamEvent>,
}

impl SessionStream {
    /// Session id, unique within a manager.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for SessionStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn wait_for_active(manager: &SessionManager, expected: usize) {
        while manager.active_sessions() != expected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[test]
    fn test_event_wire_shape() {
        assert_eq!(
            StreamEvent::connected().to_data(),
            r#"{"type":"connection","status":"connected"}"#
        );

        let data = StreamEvent::heartbeat().to_data();
        let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed["type"], "heartbeat");
        let ts = parsed["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_then_heartbeat() {
        let manager = SessionManager::new(Duration::from_secs(30));
        let mut stream = manager.open();

        assert_eq!(stream.next().await, Some(StreamEvent::connected()));

        let start = Instant::now();
        let event = stream.next().await.unwrap();
        assert!(matches!(event, StreamEvent::Heartbeat { .. }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(29) && elapsed <= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_releases_session() {
        let manager = SessionManager::new(Duration::from_secs(30));
        let stream = manager.open();
        wait_for_active(&manager, 1).await;

        drop(stream);
        wait_for_active(&manager, 0).await;
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_one_of_many() {
        let interval = Duration::from_secs(30);
        let manager = SessionManager::new(interval);
        let mut streams: Vec<SessionStream> = (0..4).map(|_| manager.open()).collect();

        for stream in streams.iter_mut() {
            assert_eq!(stream.next().await, Some(StreamEvent::connected()));
        }
        assert_eq!(manager.active_sessions(), 4);

        let dropped = streams.remove(1);
        let dropped_id = dropped.id();
        drop(dropped);
        wait_for_active(&manager, 3).await;

        for _ in 0..3 {
            let start = Instant::now();
            for stream in streams.iter_mut() {
                assert_ne!(stream.id(), dropped_id);
                let event = stream.next().await.unwrap();
                assert!(matches!(event, StreamEvent::Heartbeat { .. }));
            }
            assert!(start.elapsed() <= interval);
        }
        assert_eq!(manager.active_sessions(), 3);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let manager = SessionManager::default();
        let a = manager.open();
        let b = manager.open();
        assert_ne!(a.id(), b.id());
        assert_eq!(manager.heartbeat_interval(), DEFAULT_HEARTBEAT_INTERVAL);
    }
}
