//! # Werewolf Client
//!
//! Client-side synchronization engine for a server-authoritative werewolf
//! (social deduction) game played over a persistent WebSocket.
//!
//! The server pushes typed events (`{"type": ..., "data": ...}` JSON frames);
//! this crate keeps a local mirror of the game consistent with that stream and
//! sends the human player's commands back.
//!
//! ## Components
//!
//! - [`ConnectionManager`]: connect, 30 s heartbeat, automatic reconnect and
//!   the outbound send gate, all driven by one background task
//! - [`EventQueue`]: append-only history of every inbound event
//! - [`reducer::apply`]: the pure `(state, event) -> state` function
//! - [`CommandSender`]: the game commands, refused while disconnected
//! - [`Session`]: wires the above together around a single reducer task
//!
//! The transport is pluggable through [`Transport`] and [`Connector`]; the
//! default `transport-websocket` feature provides [`WebSocketConnector`].
//!
//! ## Quick Start
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
//! session.commands().create_game("Alice")?;
//!
//! let state = session.state();
//! println!("{} players seated", state.players.len());
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod connection;
pub mod error;
pub mod event;
pub mod protocol;
pub mod reconnect;
pub mod reducer;
pub mod session;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use command::CommandSender;
pub use connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState};
pub use error::{ClientError, Result};
pub use event::{EventQueue, GameEvent};
pub use protocol::{ActionKind, ActionRequirement, ClientMessage, GameResult, Phase, PlayerId, Role};
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectPolicy};
pub use session::Session;
pub use state::{GameState, Player, SeerReveal, SpeechRecord};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
