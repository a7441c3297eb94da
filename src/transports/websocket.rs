//! WebSocket transport using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the game's JSON text frames over a WebSocket;
//! [`WebSocketConnector`] is the [`Connector`] the connection manager uses to
//! dial (and re-dial) the server. Both `ws://` and `wss://` URLs work.
//!
//! Only available with the `transport-websocket` feature (on by default).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ClientError;
use crate::transport::{Connector, Transport};

/// The underlying WebSocket stream, public so callers can wrap a stream they
/// opened themselves via [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// Control frames are handled by tungstenite and binary frames are skipped,
/// so [`recv`](Transport::recv) only ever yields text frames.
///
/// # Cancel Safety
///
/// `recv` is cancel-safe: dropping its future before completion does not
/// consume a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the URL is invalid or the server cannot
    /// be reached. The [`ErrorKind`](std::io::ErrorKind) of an underlying I/O
    /// error is preserved.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        tracing::debug!(url = %url, "connecting to game server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            ClientError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// [`connect`](Self::connect) with a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if the deadline elapses first.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| ClientError::Timeout)?
    }
}

/// What a single WebSocket message means to the game protocol.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Frame(String),
    Closed,
    Skip,
}

impl Inbound {
    fn classify(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Self::Frame(text.to_string()),
            Message::Close(frame) => {
                tracing::debug!(?frame, "server closed the WebSocket");
                Self::Closed
            }
            // tungstenite answers pings itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Self::Skip,
            Message::Binary(data) => {
                tracing::warn!(len = data.len(), "skipping binary WebSocket frame");
                Self::Skip
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        while let Some(next) = self.stream.next().await {
            let msg = match next {
                Ok(msg) => msg,
                Err(e) => return Some(Err(ClientError::TransportReceive(e.to_string()))),
            };
            match Inbound::classify(msg) {
                Inbound::Frame(text) => return Some(Ok(text)),
                Inbound::Closed => return None,
                Inbound::Skip => {}
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }
}

/// [`Connector`] that opens a [`WebSocketTransport`] per attempt.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    timeout: Option<Duration>,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every dial by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, url: &str) -> Result<WebSocketTransport, ClientError> {
        match self.timeout {
            Some(timeout) => WebSocketTransport::connect_with_timeout(url, timeout).await,
            None => WebSocketTransport::connect(url).await,
        }
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn websocket_types_are_send_and_debug() {
        fn assert_send_debug<T: Send + std::fmt::Debug>() {}
        assert_send_debug::<WebSocketTransport>();
        assert_send_debug::<WebSocketConnector>();
    }

    #[test]
    fn only_text_frames_reach_the_protocol() {
        assert_eq!(
            Inbound::classify(Message::Text(r#"{"type":"pong"}"#.into())),
            Inbound::Frame(r#"{"type":"pong"}"#.to_owned())
        );
        assert_eq!(Inbound::classify(Message::Close(None)), Inbound::Closed);
        assert_eq!(
            Inbound::classify(Message::Ping(vec![1].into())),
            Inbound::Skip
        );
        assert_eq!(
            Inbound::classify(Message::Binary(vec![0xDE, 0xAD].into())),
            Inbound::Skip
        );
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[tokio::test]
    async fn connector_reports_unreachable_host() {
        let err = WebSocketConnector::new()
            .connect("ws://127.0.0.1:1/ws")
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn connector_timeout_elapses() {
        // TEST-NET-1 is never routable.
        let err = WebSocketConnector::new()
            .with_timeout(Duration::from_millis(50))
            .connect("ws://192.0.2.1:1/ws")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }

    /// Run `handler` on the first accepted connection of a local server.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn recv_yields_text_and_skips_binary() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"type":"pong"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new().connect(&url).await.unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"type":"pong"}"#);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"type":"start_game"}"#.to_string())
            .await
            .unwrap();
        let echoed = transport.recv().await.unwrap().unwrap();
        assert_eq!(echoed, r#"{"type":"start_game"}"#);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_send() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, ClientError::TransportClosed));
    }
}
