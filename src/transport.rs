//! Transport abstraction for the werewolf game protocol.
//!
//! The [`Transport`] trait is a bidirectional text message channel between the
//! client and the game server. Every frame is one JSON text message, so
//! implementations handle framing internally.
//!
//! Because the connection manager has to re-open the channel on its own after
//! a drop, opening a transport is modelled separately by [`Connector`]: a
//! reusable factory that dials the configured URL and yields a fresh
//! [`Transport`] each time.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use werewolf_client::error::ClientError;
//! use werewolf_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ClientError> {
//!         // Send the JSON text frame
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         // Return None when the connection is closed cleanly
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         unimplemented!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, url: &str) -> Result<MyTransport, ClientError> {
//!         unimplemented!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ClientError;

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON frame and
/// each call to [`recv`](Transport::recv) returns one.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the connection
/// driver polls it inside `tokio::select!` next to the heartbeat timer and the
/// command channel. A cancelled `recv` must not lose a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportSend`] if the frame could not be written.
    async fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Receive the next JSON text frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the transport gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens a new [`Transport`] to a URL.
///
/// A connector is kept for the lifetime of a connection manager and invoked
/// once per connect or reconnect attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Dial `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] or [`ClientError::Timeout`] when the
    /// connection cannot be established.
    async fn connect(&self, url: &str) -> Result<Self::Transport, ClientError>;
}
