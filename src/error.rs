//! Error types for the werewolf client.

use thiserror::Error;

/// Errors that can occur when using the werewolf client.
///
/// Protocol mismatches (unknown event kinds, payloads missing expected fields)
/// are deliberately absent: the reducer absorbs them and logs instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a JSON frame.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound frame decoded as JSON but did not have the `{type, data}` shape.
    #[error("malformed frame: {0}")]
    Decode(String),

    /// A command was issued while the connection gate was shut.
    #[error("not connected to server")]
    NotConnected,

    /// The session's background tasks have exited.
    #[error("session closed")]
    SessionClosed,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred while opening a connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns `true` for errors raised by the transport layer.
    ///
    /// These are the failures that move the connection to `disconnected` and
    /// feed the reconnect path.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportSend(_)
                | Self::TransportReceive(_)
                | Self::TransportClosed
                | Self::Timeout
                | Self::Io(_)
        )
    }
}

/// A specialized [`Result`] type for werewolf client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_family_is_classified() {
        assert!(ClientError::TransportClosed.is_transport());
        assert!(ClientError::TransportSend("broken pipe".into()).is_transport());
        assert!(ClientError::Timeout.is_transport());
        assert!(!ClientError::NotConnected.is_transport());
        assert!(!ClientError::Decode("not an object".into()).is_transport());
    }

    #[test]
    fn serde_errors_convert() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ClientError = err.into();
        assert!(matches!(err, ClientError::Serialization(_)));
        assert!(err.to_string().starts_with("serialization error"));
    }
}
