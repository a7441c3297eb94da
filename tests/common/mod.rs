#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the werewolf client integration tests.
//!
//! Provides a channel-driven [`MockTransport`], a scripted [`MockConnector`]
//! and builders for the server frames used across the tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;
use werewolf_client::{ClientError, Connector, Transport};

// ── MockTransport ───────────────────────────────────────────────────

type Incoming = Option<Result<String, ClientError>>;

/// A mock transport driven by a [`Remote`].
///
/// Frames pushed on the remote are yielded by `recv()` in order; once the
/// remote is dropped `recv()` hangs forever, like an idle socket.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    loopback: mpsc::UnboundedSender<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    replies: Replies,
    closed: Arc<AtomicBool>,
}

/// Frames the server answers with as soon as a sent frame contains a trigger.
type Replies = Arc<StdMutex<Vec<(String, String)>>>;

/// The server side of a [`MockTransport`].
#[derive(Clone)]
pub struct Remote {
    incoming: mpsc::UnboundedSender<Incoming>,
    sent: Arc<StdMutex<Vec<String>>>,
    replies: Replies,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn pair() -> (Self, Remote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let replies: Replies = Arc::new(StdMutex::new(Vec::new()));
        let transport = Self {
            incoming: rx,
            loopback: tx.clone(),
            sent: Arc::clone(&sent),
            replies: Arc::clone(&replies),
            closed: Arc::clone(&closed),
        };
        let remote = Remote {
            incoming: tx,
            sent,
            replies,
            closed,
        };
        (transport, remote)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .iter()
            .find(|(trigger, _)| message.contains(trigger.as_str()))
            .map(|(_, reply)| reply.clone());
        self.sent.lock().unwrap().push(message);
        if let Some(reply) = reply {
            let _ = self.loopback.send(Some(Ok(reply)));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl Remote {
    /// Deliver one raw text frame.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.incoming.send(Some(Ok(frame.into())));
    }

    /// Deliver a frame built from `kind` and `data`.
    pub fn event(&self, kind: &str, data: Value) {
        self.push(frame(kind, data));
    }

    /// Answer with `reply` the moment a sent frame contains `trigger`.
    pub fn reply_on(&self, trigger: &str, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push((trigger.to_owned(), reply.into()));
    }

    /// Close the connection cleanly from the server side.
    pub fn hang_up(&self) {
        let _ = self.incoming.send(None);
    }

    /// Fail the connection with a receive error.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .incoming
            .send(Some(Err(ClientError::TransportReceive(reason.into()))));
    }

    /// Every frame the client sent, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent frames parsed as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    /// Number of sent frames with the given `type`.
    pub fn sent_count(&self, kind: &str) -> usize {
        self.sent_json()
            .iter()
            .filter(|v| v["type"] == kind)
            .count()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Outcome of one scripted connect attempt.
pub enum Dial {
    Accept(MockTransport),
    Refuse,
    /// Never resolve, to exercise connect timeouts.
    Hang,
    /// Accept, but only after the given delay.
    Delayed(std::time::Duration, MockTransport),
}

/// A connector that plays back scripted [`Dial`] outcomes in order and
/// records when each attempt was made. Refuses once the script runs out.
#[derive(Clone)]
pub struct MockConnector {
    script: Arc<StdMutex<VecDeque<Dial>>>,
    attempts: Arc<StdMutex<Vec<Instant>>>,
}

impl MockConnector {
    pub fn new(script: Vec<Dial>) -> Self {
        Self {
            script: Arc::new(StdMutex::new(VecDeque::from(script))),
            attempts: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// Connector that accepts once and hands back the remote end.
    pub fn accepting() -> (Self, Remote) {
        let (transport, remote) = MockTransport::pair();
        (Self::new(vec![Dial::Accept(transport)]), remote)
    }

    /// Append another outcome to the script.
    pub fn then(&self, dial: Dial) {
        self.script.lock().unwrap().push_back(dial);
    }

    /// Instants at which `connect` was called.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _url: &str) -> Result<MockTransport, ClientError> {
        self.attempts.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Dial::Accept(transport)) => Ok(transport),
            Some(Dial::Hang) => std::future::pending().await,
            Some(Dial::Delayed(after, transport)) => {
                tokio::time::sleep(after).await;
                Ok(transport)
            }
            Some(Dial::Refuse) | None => Err(ClientError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
        }
    }
}

// ── Frame builders ──────────────────────────────────────────────────

/// A `{type, data}` frame as the server would send it.
pub fn frame(kind: &str, data: Value) -> String {
    json!({ "type": kind, "data": data }).to_string()
}

pub fn pong_frame() -> String {
    json!({ "type": "pong" }).to_string()
}

/// `game_created` with seats `1..=n`; seat 1 is the human.
pub fn game_created(n: u32) -> Value {
    let players: Vec<Value> = (1..=n)
        .map(|id| json!({ "id": id, "name": format!("P{id}"), "is_human": id == 1 }))
        .collect();
    json!({ "game_id": "game-1", "players": players })
}

pub fn role_assigned(role: &str, teammates: &[u32]) -> Value {
    json!({
        "player_id": 1,
        "role": role,
        "role_name": role,
        "role_description": format!("You are the {role}"),
        "teammates": teammates,
    })
}

pub fn targets_requirement(action: &str, targets: &[u32]) -> Value {
    json!({ "action": action, "valid_targets": targets, "message": format!("{action}?") })
}

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
