//! Shared error type across fieldlink crates.

use thiserror::Error;

/// Stable error codes (suitable for logs and UI banners).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The environment cannot open the transport at all.
    TransportUnavailable,
    /// A connect attempt did not complete.
    HandshakeFailed,
    /// The live connection dropped.
    UnexpectedDisconnect,
    /// Inbound data was not a valid envelope.
    MalformedFrame,
    /// A send was attempted while the connection was not open.
    SendWhileNotOpen,
    /// A registered consumer handler failed.
    HandlerFailure,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal failure.
    Internal,
}

impl ErrorKind {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransportUnavailable => "TRANSPORT_UNAVAILABLE",
            ErrorKind::HandshakeFailed => "HANDSHAKE_FAILED",
            ErrorKind::UnexpectedDisconnect => "UNEXPECTED_DISCONNECT",
            ErrorKind::MalformedFrame => "MALFORMED_FRAME",
            ErrorKind::SendWhileNotOpen => "SEND_WHILE_NOT_OPEN",
            ErrorKind::HandlerFailure => "HANDLER_FAILURE",
            ErrorKind::BadConfig => "BAD_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Whether the connection manager answers this failure with a reconnect.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::HandshakeFailed | ErrorKind::UnexpectedDisconnect
        )
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FieldLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum FieldLinkError {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("unexpected disconnect: {0}")]
    UnexpectedDisconnect(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("send while connection is {state}")]
    SendWhileNotOpen { state: &'static str },
    #[error("handler failure: {0}")]
    HandlerFailure(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl FieldLinkError {
    /// Map the error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FieldLinkError::TransportUnavailable(_) => ErrorKind::TransportUnavailable,
            FieldLinkError::HandshakeFailed(_) => ErrorKind::HandshakeFailed,
            FieldLinkError::UnexpectedDisconnect(_) => ErrorKind::UnexpectedDisconnect,
            FieldLinkError::MalformedFrame(_) => ErrorKind::MalformedFrame,
            FieldLinkError::SendWhileNotOpen { .. } => ErrorKind::SendWhileNotOpen,
            FieldLinkError::HandlerFailure(_) => ErrorKind::HandlerFailure,
            FieldLinkError::BadConfig(_) => ErrorKind::BadConfig,
            FieldLinkError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            FieldLinkError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(FieldLinkError::HandshakeFailed("refused".into()).kind().is_retryable());
        assert!(FieldLinkError::UnexpectedDisconnect("eof".into()).kind().is_retryable());
        assert!(!FieldLinkError::TransportUnavailable("no tls".into()).kind().is_retryable());
        assert!(!FieldLinkError::MalformedFrame("x".into()).kind().is_retryable());
    }

    #[test]
    fn send_while_not_open_names_state() {
        let e = FieldLinkError::SendWhileNotOpen { state: "closed" };
        assert_eq!(e.to_string(), "send while connection is closed");
        assert_eq!(e.kind().as_str(), "SEND_WHILE_NOT_OPEN");
    }
}
