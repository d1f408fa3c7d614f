use std::fmt;

use fieldlink_core::ErrorKind;

/// Connection lifecycle. The only connectivity flag consumers may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published connection status.
///
/// `epoch` counts how many times the connection reached `Open`; outbound
/// commands are tagged with it so nothing crosses a reconnection boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub epoch: u64,
    /// Cause of the most recent drop, cleared on `Open`.
    pub last_error: Option<ErrorKind>,
}

impl LinkStatus {
    pub(crate) fn initial() -> Self {
        Self {
            state: ConnectionState::Connecting,
            epoch: 0,
            last_error: None,
        }
    }
}
