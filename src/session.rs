//! The session: connection, event history, reducer and commands wired together.
//!
//! A [`Session`] runs two background tasks: the connection driver (see
//! [`crate::connection`]) and one reducer task. The reducer task is the only
//! writer of the [`GameState`] and the [`EventQueue`]. It consumes a single
//! channel that carries server events from the connection alongside local
//! inputs (the optimistic clear after a command, a local reset), so local and
//! remote mutations are applied one at a time in one total order.
//!
//! Readers get snapshots: [`Session::state`] clones the latest state and
//! [`Session::state_changes`] yields a `watch` receiver for reactive
//! rendering. Seer inspection results are additionally broadcast on
//! [`Session::subscribe_seer_results`].
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), werewolf_client::ClientError> {
//! use werewolf_client::{ConnectionConfig, Session, WebSocketConnector};
//!
//! let mut session = Session::start(
//!     WebSocketConnector::new(),
//!     ConnectionConfig::new("ws://localhost:8000/ws"),
//! );
//! session.connect()?;
//! session.wait_connected().await?;
//!
//! let commands = session.commands();
//! commands.create_game("Alice")?;
//!
//! let mut changes = session.state_changes();
//! while changes.changed().await.is_ok() {
//!     let state = changes.borrow_and_update().clone();
//!     println!("{} round {}", state.phase, state.round);
//!     if state.is_over() {
//!         break;
//!     }
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, warn};

use crate::command::CommandSender;
use crate::connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState};
use crate::error::{ClientError, Result};
use crate::event::{EventQueue, GameEvent};
use crate::reducer;
use crate::state::{GameState, SeerReveal};
use crate::transport::Connector;

/// Capacity of the seer reveal broadcast. Reveals happen at most once a night.
const SEER_REVEAL_CAPACITY: usize = 16;

/// Everything the reducer task consumes, in one ordered stream.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Server(GameEvent),
    ClearActionRequired,
    Reset,
    /// Drain marker sent by [`Session::shutdown`].
    Stop,
}

impl From<GameEvent> for SessionInput {
    fn from(event: GameEvent) -> Self {
        Self::Server(event)
    }
}

/// A running client session.
///
/// Created with [`Session::start`]; the connection starts `disconnected`.
/// Dropping the session aborts both background tasks.
pub struct Session {
    connection: ConnectionManager,
    inputs: mpsc::UnboundedSender<SessionInput>,
    state_rx: watch::Receiver<GameState>,
    history: Arc<RwLock<EventQueue>>,
    reveals: broadcast::Sender<SeerReveal>,
    reducer_task: Option<tokio::task::JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Session {
    /// Spawn the connection driver and the reducer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<C: Connector>(connector: C, config: ConnectionConfig) -> Self {
        let (inputs, inputs_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(GameState::default());
        let (reveals, _) = broadcast::channel(SEER_REVEAL_CAPACITY);
        let history = Arc::new(RwLock::new(EventQueue::new()));
        let shutdown_timeout = config.shutdown_timeout;

        let reducer_task = tokio::spawn(reduce_loop(
            inputs_rx,
            state_tx,
            Arc::clone(&history),
            reveals.clone(),
        ));
        let connection = ConnectionManager::start(connector, config, inputs.clone());

        Self {
            connection,
            inputs,
            state_rx,
            history,
            reveals,
            reducer_task: Some(reducer_task),
            shutdown_timeout,
        }
    }

    // ── Connection ──────────────────────────────────────────────────

    /// See [`ConnectionHandle::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] after shutdown.
    pub fn connect(&self) -> Result<()> {
        self.connection.connect()
    }

    /// See [`ConnectionHandle::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] after shutdown.
    pub fn disconnect(&self) -> Result<()> {
        self.connection.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection_changes(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_changes()
    }

    /// A cloneable handle onto the underlying connection.
    pub fn connection(&self) -> ConnectionHandle {
        self.connection.handle()
    }

    /// Resolve once the connection is `connected`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the session shuts down first.
    pub async fn wait_connected(&self) -> Result<()> {
        self.connection.wait_connected().await
    }

    // ── Game state ──────────────────────────────────────────────────

    /// Snapshot of the current game state.
    pub fn state(&self) -> GameState {
        self.state_rx.borrow().clone()
    }

    /// A receiver notified after every state change.
    pub fn state_changes(&self) -> watch::Receiver<GameState> {
        self.state_rx.clone()
    }

    /// Subscribe to seer inspection results.
    ///
    /// Only reveals received after subscribing are delivered.
    pub fn subscribe_seer_results(&self) -> broadcast::Receiver<SeerReveal> {
        self.reveals.subscribe()
    }

    /// Return the game state to its initial value.
    ///
    /// The connection and the event history are left as they are. The reset
    /// is ordered with respect to server events like any other input.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] after shutdown.
    pub fn reset_local_state(&self) -> Result<()> {
        self.inputs
            .send(SessionInput::Reset)
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Sender for player commands.
    pub fn commands(&self) -> CommandSender {
        CommandSender::new(self.connection.handle(), self.inputs.clone())
    }

    // ── Event history ───────────────────────────────────────────────

    /// Every event received so far, in arrival order.
    pub async fn event_history(&self) -> Vec<GameEvent> {
        self.history.read().await.as_slice().to_vec()
    }

    /// Events at positions `cursor..` of the history.
    pub async fn events_since(&self, cursor: usize) -> Vec<GameEvent> {
        self.history.read().await.since(cursor).to_vec()
    }

    pub async fn latest_event(&self) -> Option<GameEvent> {
        self.history.read().await.latest().cloned()
    }

    pub async fn event_count(&self) -> usize {
        self.history.read().await.len()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Close the connection and stop both background tasks.
    ///
    /// Events already received are applied before the reducer task exits.
    pub async fn shutdown(&mut self) {
        debug!("Session: shutdown requested");
        self.connection.shutdown().await;

        let _ = self.inputs.send(SessionInput::Stop);
        if let Some(mut task) = self.reducer_task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("reducer task terminated with join error: {join_err}"),
                Err(_) => {
                    warn!("reducer task did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("reducer task aborted: {join_err}");
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection_state())
            .field("has_reducer_task", &self.reducer_task.is_some())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.reducer_task.take() {
            task.abort();
        }
    }
}

// ── Reducer task ────────────────────────────────────────────────────

async fn reduce_loop(
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
    state_tx: watch::Sender<GameState>,
    history: Arc<RwLock<EventQueue>>,
    reveals: broadcast::Sender<SeerReveal>,
) {
    debug!("reducer task started");
    let mut state = GameState::default();

    while let Some(input) = inputs.recv().await {
        state = match input {
            SessionInput::Server(event) => {
                let position = history.write().await.push(event.clone());
                debug!(kind = %event.kind, position, "applying server event");
                let (next, reveal) = reducer::apply_with_reveal(state, &event);
                if let Some(reveal) = reveal {
                    // No subscribers is not an error.
                    let _ = reveals.send(reveal);
                }
                next
            }
            SessionInput::ClearActionRequired => reducer::clear_action_required(state),
            SessionInput::Reset => {
                debug!("resetting local game state");
                GameState::default()
            }
            SessionInput::Stop => break,
        };

        if *state_tx.borrow() != state {
            state_tx.send_replace(state.clone());
        }
    }

    debug!("reducer task exited");
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use serde_json::json;

    /// Connector that is never dialed in these tests.
    struct Idle;

    struct Silent;

    #[async_trait]
    impl Transport for Silent {
        async fn send(&mut self, _message: String) -> Result<()> {
            Ok(())
        }
        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for Idle {
        type Transport = Silent;

        async fn connect(&self, _url: &str) -> Result<Silent> {
            std::future::pending().await
        }
    }

    fn spawn_reducer() -> (
        mpsc::UnboundedSender<SessionInput>,
        watch::Receiver<GameState>,
        Arc<RwLock<EventQueue>>,
        broadcast::Receiver<SeerReveal>,
        tokio::task::JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(GameState::default());
        let (reveals, reveal_rx) = broadcast::channel(4);
        let history = Arc::new(RwLock::new(EventQueue::new()));
        let task = tokio::spawn(reduce_loop(rx, state_tx, Arc::clone(&history), reveals));
        (tx, state_rx, history, reveal_rx, task)
    }

    fn server(kind: &str, data: serde_json::Value) -> SessionInput {
        SessionInput::Server(GameEvent::from_parts(kind, data).unwrap())
    }

    #[tokio::test]
    async fn local_and_server_inputs_share_one_order() {
        let (tx, state_rx, history, _reveals, task) = spawn_reducer();

        tx.send(server("action_required", json!({"action": "vote", "valid_targets": [2]})))
            .unwrap();
        tx.send(SessionInput::ClearActionRequired).unwrap();
        tx.send(server("action_required", json!({"action": "speak"})))
            .unwrap();
        tx.send(SessionInput::Stop).unwrap();
        task.await.unwrap();

        let state = state_rx.borrow().clone();
        assert_eq!(
            state.action_kind(),
            Some(crate::protocol::ActionKind::Speak)
        );
        assert_eq!(history.read().await.len(), 2);
    }

    #[tokio::test]
    async fn reset_keeps_history() {
        let (tx, state_rx, history, _reveals, task) = spawn_reducer();

        tx.send(server("game_created", json!({"game_id": "g", "players": [{"id": 1}]})))
            .unwrap();
        tx.send(SessionInput::Reset).unwrap();
        tx.send(SessionInput::Stop).unwrap();
        task.await.unwrap();

        assert_eq!(*state_rx.borrow(), GameState::default());
        assert_eq!(history.read().await.latest().unwrap().kind, "game_created");
    }

    #[tokio::test]
    async fn seer_results_are_broadcast() {
        let (tx, _state_rx, _history, mut reveals, task) = spawn_reducer();

        tx.send(server(
            "seer_result",
            json!({"target_id": 5, "target_name": "P5", "is_good": true}),
        ))
        .unwrap();
        tx.send(SessionInput::Stop).unwrap();
        task.await.unwrap();

        let reveal = reveals.recv().await.unwrap();
        assert_eq!(reveal.target_id, Some(5));
        assert_eq!(reveal.is_good, Some(true));
    }

    #[tokio::test]
    async fn unknown_events_are_recorded_without_state_change() {
        let (tx, state_rx, history, _reveals, task) = spawn_reducer();

        tx.send(server("sheriff_elected", json!({"player_id": 3})))
            .unwrap();
        tx.send(SessionInput::Stop).unwrap();
        task.await.unwrap();

        assert_eq!(*state_rx.borrow(), GameState::default());
        assert_eq!(history.read().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reaps_a_stuck_reducer_task() {
        let mut session = Session::start(
            Idle,
            ConnectionConfig::new("ws://unused").with_shutdown_timeout(Duration::from_millis(50)),
        );
        let mut changes = session.state_changes();

        // Holding a read guard parks the reducer on its history write.
        let history = Arc::clone(&session.history);
        let guard = history.read().await;
        session
            .inputs
            .send(server("game_created", json!({"game_id": "g", "players": []})))
            .unwrap();
        tokio::task::yield_now().await;

        session.shutdown().await;

        assert!(session.reducer_task.is_none());
        // The state sender lives in the reducer task, so a closed channel
        // means the aborted task has been dropped by the time shutdown returns.
        assert!(changes.has_changed().is_err());
        drop(guard);
    }
}
