//! Connection lifecycle: connect, heartbeat, reconnect and the outbound gate.
//!
//! [`ConnectionManager::start`] spawns one background driver task that owns
//! the [`Transport`], the heartbeat interval and the reconnect deadline. Handle
//! methods only enqueue commands onto an unbounded channel, so they never block
//! and can be called from any task. The driver multiplexes those commands,
//! inbound frames and both timers with `tokio::select!`.
//!
//! Inbound frames are decoded into [`GameEvent`]s and forwarded in arrival
//! order on the event channel supplied at start. Heartbeat acknowledgments
//! (`pong`) are consumed here and never forwarded; malformed frames are logged
//! and dropped without touching the connection.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), werewolf_client::ClientError> {
//! use werewolf_client::connection::{ConnectionConfig, ConnectionManager};
//! use werewolf_client::event::GameEvent;
//! use werewolf_client::protocol::ClientMessage;
//! use werewolf_client::WebSocketConnector;
//!
//! let (events_tx, mut events) = tokio::sync::mpsc::unbounded_channel::<GameEvent>();
//! let mut manager = ConnectionManager::start(
//!     WebSocketConnector::new(),
//!     ConnectionConfig::new("ws://localhost:8000/ws"),
//!     events_tx,
//! );
//! manager.connect()?;
//! manager.wait_connected().await?;
//! manager.send(ClientMessage::StartGame)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.kind);
//! }
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::event::GameEvent;
use crate::protocol::ClientMessage;
use crate::reconnect::{FixedDelay, ReconnectPolicy};
use crate::transport::{Connector, Transport};

/// Default period between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Connection state ────────────────────────────────────────────────

/// Lifecycle of the transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ConnectionManager`].
///
/// ```
/// use std::time::Duration;
/// use werewolf_client::connection::ConnectionConfig;
/// use werewolf_client::reconnect::ExponentialBackoff;
///
/// let config = ConnectionConfig::new("ws://localhost:8000/ws")
///     .with_heartbeat_interval(Duration::from_secs(15))
///     .with_reconnect_policy(ExponentialBackoff::default().with_max_attempts(10))
///     .with_connect_timeout(Duration::from_secs(5));
/// assert_eq!(config.url, "ws://localhost:8000/ws");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Endpoint handed to the [`Connector`] on every attempt.
    pub url: String,
    /// Period between heartbeat pings. The first ping goes out one full
    /// period after the connection opens. Defaults to **30 seconds**.
    pub heartbeat_interval: Duration,
    /// Decides the wait before each automatic reconnect attempt.
    /// Defaults to [`FixedDelay::default`]: every 5 seconds, forever.
    pub reconnect_policy: Arc<dyn ReconnectPolicy>,
    /// Upper bound on a single connect attempt. Defaults to none.
    pub connect_timeout: Option<Duration>,
    /// How long [`ConnectionManager::shutdown`] waits for the driver to close
    /// the transport before aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_policy: Arc::new(FixedDelay::default()),
            connect_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the heartbeat period. A zero period is raised to one millisecond.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: impl ReconnectPolicy) -> Self {
        self.reconnect_policy = Arc::new(policy);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Handle ──────────────────────────────────────────────────────────

enum Command {
    Connect,
    Disconnect,
    Send(ClientMessage),
}

/// Cloneable, non-owning view of a [`ConnectionManager`].
///
/// Every method returns immediately once the request is queued. Dropping all
/// handles does not stop the driver; only the manager owns it.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Open the connection unless it is already open or opening.
    ///
    /// A failure of this attempt is logged and leaves the state
    /// `disconnected`; it does not schedule a retry.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the driver has exited.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Tear the connection down and cancel any pending reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the driver has exited.
    pub fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect)
    }

    /// Queue one outbound message.
    ///
    /// The message is dropped, not buffered, while the connection is not
    /// `connected`. Acceptance only means the frame was handed to the driver;
    /// there is no delivery acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while the gate is shut and
    /// [`ClientError::SessionClosed`] if the driver has exited.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        if !self.is_connected() {
            warn!(kind = message.kind(), "dropping command while not connected");
            return Err(ClientError::NotConnected);
        }
        self.command(Command::Send(message))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// A receiver that observes every published state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Resolve once the connection is `connected`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the driver exits first.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|state| state.is_connected())
            .await
            .map(|_| ())
            .map_err(|_| ClientError::SessionClosed)
    }

    fn command(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("state", &self.state())
            .finish()
    }
}

// ── Manager ─────────────────────────────────────────────────────────

/// Owns the background connection driver.
///
/// The driver starts `disconnected`; call [`connect`](Self::connect) to open
/// the first session. Dropping the manager aborts the driver.
pub struct ConnectionManager {
    handle: ConnectionHandle,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ConnectionManager {
    /// Spawn the driver. Decoded events are forwarded on `events`, converted
    /// into whatever input type the consumer multiplexes them with.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<C, T>(
        connector: C,
        config: ConnectionConfig,
        events: mpsc::UnboundedSender<T>,
    ) -> Self
    where
        C: Connector,
        T: From<GameEvent> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shutdown_timeout = config.shutdown_timeout;

        let driver = Driver {
            connector,
            url: config.url,
            policy: config.reconnect_policy,
            heartbeat_interval: config.heartbeat_interval,
            connect_timeout: config.connect_timeout,
            state_tx,
            events,
            transport: None,
            heartbeat: None,
            reconnect_at: None,
            attempt: 0,
            cmd_rx,
            shutdown_rx,
            stopping: false,
        };
        let task = tokio::spawn(driver.run());

        Self {
            handle: ConnectionHandle { cmd_tx, state_rx },
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        }
    }

    /// A cloneable handle onto this manager.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// See [`ConnectionHandle::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the driver has exited.
    pub fn connect(&self) -> Result<()> {
        self.handle.connect()
    }

    /// See [`ConnectionHandle::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the driver has exited.
    pub fn disconnect(&self) -> Result<()> {
        self.handle.disconnect()
    }

    /// See [`ConnectionHandle::send`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while the gate is shut.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        self.handle.send(message)
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.handle.state_changes()
    }

    /// See [`ConnectionHandle::wait_connected`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionClosed`] if the driver exits first.
    pub async fn wait_connected(&self) -> Result<()> {
        self.handle.wait_connected().await
    }

    /// Close the transport and stop the driver.
    ///
    /// The driver gets `shutdown_timeout` to close the transport gracefully
    /// before it is aborted. Calling this twice is harmless.
    pub async fn shutdown(&mut self) {
        debug!("ConnectionManager: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection driver terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection driver did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection driver aborted: {join_err}");
                    }
                }
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // A graceful close needs an executor; all Drop can do is abort.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Driver ──────────────────────────────────────────────────────────

/// Why an open session ended without being asked to.
enum Loss {
    Closed,
    Failed(ClientError),
}

/// How a single dial ended.
enum Dialed {
    Connected,
    Failed(ClientError),
    /// A disconnect or shutdown arrived first and the dial was dropped.
    Cancelled,
}

/// What interrupted a dial in flight.
enum Interrupt {
    Disconnect,
    Stop,
}

struct Driver<C: Connector, T> {
    connector: C,
    url: String,
    policy: Arc<dyn ReconnectPolicy>,
    heartbeat_interval: Duration,
    connect_timeout: Option<Duration>,
    state_tx: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<T>,
    transport: Option<C::Transport>,
    heartbeat: Option<Interval>,
    reconnect_at: Option<Instant>,
    /// Automatic attempts since the last successful connect.
    attempt: u32,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    shutdown_rx: oneshot::Receiver<()>,
    /// Set once shutdown (or the loss of every handle) was seen mid-dial.
    stopping: bool,
}

impl<C, T> Driver<C, T>
where
    C: Connector,
    T: From<GameEvent> + Send + 'static,
{
    /// Exits when the command channel closes (manager dropped) or on shutdown.
    async fn run(mut self) {
        debug!("connection driver started");

        while !self.stopping {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Connect) => self.connect_explicit().await,
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::Send(message)) => self.send(&message).await,
                    None => {
                        debug!("command channel closed, stopping connection driver");
                        self.disconnect().await;
                        break;
                    }
                },

                _ = &mut self.shutdown_rx => {
                    debug!("shutdown signal received");
                    self.disconnect().await;
                    break;
                }

                incoming = recv_frame(&mut self.transport) => match incoming {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(e)) => self.lost(Loss::Failed(e)),
                    None => self.lost(Loss::Closed),
                },

                () = tick(&mut self.heartbeat) => {
                    debug!("sending heartbeat ping");
                    self.send(&ClientMessage::Ping).await;
                }

                () = deadline(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.reconnect().await;
                }
            }
        }

        if self.stopping {
            self.disconnect().await;
        }
        debug!("connection driver exited");
    }

    fn publish(&self, next: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
    }

    /// Dial once, bounded by the configured timeout.
    ///
    /// Commands are still served while the dial is in flight: a disconnect or
    /// a shutdown drops the dial, so a late success never publishes
    /// `connected` over a deliberate teardown.
    async fn open(&mut self) -> Dialed {
        self.publish(ConnectionState::Connecting);
        info!(url = %self.url, "connecting to game server");

        let outcome = {
            let Self {
                connector,
                url,
                connect_timeout,
                cmd_rx,
                shutdown_rx,
                ..
            } = self;
            let dial = async {
                match *connect_timeout {
                    Some(limit) => tokio::time::timeout(limit, connector.connect(url.as_str()))
                        .await
                        .unwrap_or(Err(ClientError::Timeout)),
                    None => connector.connect(url.as_str()).await,
                }
            };
            tokio::pin!(dial);

            loop {
                tokio::select! {
                    result = &mut dial => break Ok(result),
                    _ = &mut *shutdown_rx => break Err(Interrupt::Stop),
                    cmd = cmd_rx.recv() => match cmd {
                        Some(Command::Connect) => debug!("connect ignored, dial in progress"),
                        Some(Command::Send(message)) => {
                            warn!(kind = message.kind(), "dropping command, not connected yet");
                        }
                        Some(Command::Disconnect) => break Err(Interrupt::Disconnect),
                        None => break Err(Interrupt::Stop),
                    },
                }
            }
        };

        match outcome {
            Ok(Ok(transport)) => {
                self.transport = Some(transport);
                self.attempt = 0;
                let period = self.heartbeat_interval;
                let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
                heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(heartbeat);
                self.publish(ConnectionState::Connected);
                info!(url = %self.url, "connected to game server");
                Dialed::Connected
            }
            Ok(Err(e)) => {
                self.publish(ConnectionState::Disconnected);
                Dialed::Failed(e)
            }
            Err(Interrupt::Disconnect) => {
                info!(url = %self.url, "dial cancelled by disconnect");
                self.disconnect().await;
                Dialed::Cancelled
            }
            Err(Interrupt::Stop) => {
                debug!("shutdown during dial");
                self.stopping = true;
                self.publish(ConnectionState::Disconnected);
                Dialed::Cancelled
            }
        }
    }

    async fn connect_explicit(&mut self) {
        if self.transport.is_some() {
            debug!("connect ignored, already connected");
            return;
        }
        // An explicit connect supersedes a pending automatic one.
        self.reconnect_at = None;
        self.attempt = 0;
        if let Dialed::Failed(e) = self.open().await {
            error!(url = %self.url, "connect failed: {e}");
        }
    }

    async fn reconnect(&mut self) {
        if self.transport.is_some() {
            return;
        }
        info!(attempt = self.attempt, "reconnecting");
        if let Dialed::Failed(e) = self.open().await {
            warn!(attempt = self.attempt, "reconnect failed: {e}");
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
        match self.policy.delay(self.attempt) {
            Some(delay) => {
                info!(attempt = self.attempt, ?delay, "scheduling reconnect");
                self.reconnect_at = Some(Instant::now() + delay);
            }
            None => {
                warn!(
                    attempts = self.attempt - 1,
                    "reconnect policy exhausted, staying disconnected"
                );
                self.reconnect_at = None;
            }
        }
    }

    async fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.heartbeat = None;
        self.attempt = 0;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("error while closing transport: {e}");
            }
            info!("disconnected from game server");
        }
        self.publish(ConnectionState::Disconnected);
    }

    /// The open session ended on its own; schedule a reconnect.
    fn lost(&mut self, why: Loss) {
        match why {
            Loss::Closed => info!("connection closed by server"),
            Loss::Failed(e) => error!("connection lost: {e}"),
        }
        self.transport = None;
        self.heartbeat = None;
        self.publish(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }

    async fn send(&mut self, message: &ClientMessage) {
        let Some(transport) = self.transport.as_mut() else {
            warn!(kind = message.kind(), "dropping command, connection went away");
            return;
        };
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to serialize {}: {e}", message.kind());
                return;
            }
        };
        if let Err(e) = transport.send(json).await {
            self.lost(Loss::Failed(e));
        }
    }

    fn dispatch(&self, text: &str) {
        let event = match GameEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(raw = %text, "dropping malformed frame: {e}");
                return;
            }
        };
        if event.is_pong() {
            debug!("heartbeat acknowledged");
            return;
        }
        if self.events.send(T::from(event)).is_err() {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Next frame of the open session, or never while there is none.
async fn recv_frame<T: Transport>(transport: &mut Option<T>) -> Option<Result<String>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::reconnect::ExponentialBackoff;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Connector whose every attempt is refused.
    #[derive(Default)]
    struct Refusing {
        attempts: Arc<AtomicU32>,
    }

    struct Never;

    #[async_trait]
    impl Transport for Never {
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
    impl Connector for Refusing {
        type Transport = Never;

        async fn connect(&self, _url: &str) -> Result<Never> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )))
        }
    }

    #[test]
    fn config_defaults() {
        let config = ConnectionConfig::new("ws://localhost:8000/ws");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect_policy.delay(1), Some(Duration::from_secs(5)));
        assert_eq!(config.reconnect_policy.delay(500), Some(Duration::from_secs(5)));
        assert!(config.connect_timeout.is_none());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builder_methods() {
        let config = ConnectionConfig::new("ws://game")
            .with_heartbeat_interval(Duration::ZERO)
            .with_reconnect_policy(ExponentialBackoff::default().with_max_attempts(1))
            .with_connect_timeout(Duration::from_secs(3))
            .with_shutdown_timeout(Duration::from_millis(10));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(1));
        assert!(config.reconnect_policy.delay(2).is_none());
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.shutdown_timeout, Duration::from_millis(10));
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert!(ConnectionState::Connected.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn starts_disconnected_and_gates_sends() {
        let (tx, _rx) = mpsc::unbounded_channel::<GameEvent>();
        let mut manager =
            ConnectionManager::start(Refusing::default(), ConnectionConfig::new("ws://x"), tx);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(matches!(
            manager.send(ClientMessage::StartGame),
            Err(ClientError::NotConnected)
        ));
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_connect_failure_does_not_retry() {
        let connector = Refusing::default();
        let attempts = Arc::clone(&connector.attempts);
        let (tx, _rx) = mpsc::unbounded_channel::<GameEvent>();
        let mut manager = ConnectionManager::start(connector, ConnectionConfig::new("ws://x"), tx);
        let mut changes = manager.state_changes();

        manager.connect().unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        // Connecting then back to disconnected.
        assert!(changes.has_changed().unwrap());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn commands_after_shutdown_report_closed_session() {
        let (tx, _rx) = mpsc::unbounded_channel::<GameEvent>();
        let mut manager =
            ConnectionManager::start(Refusing::default(), ConnectionConfig::new("ws://x"), tx);
        manager.shutdown().await;
        assert!(matches!(manager.connect(), Err(ClientError::SessionClosed)));
        assert!(matches!(
            manager.wait_connected().await,
            Err(ClientError::SessionClosed)
        ));
        // Second shutdown is a no-op.
        manager.shutdown().await;
    }
}
