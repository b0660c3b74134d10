#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process-wide connection state of the driver.
///
/// Transitions:
/// `Disconnected -> Connecting -> Connected -> Scanning`, and from
/// `Scanning` either back to `Disconnected` (stop, link loss with
/// auto-reconnect disabled) or through `Reconnecting -> Connecting` while
/// the acquisition thread re-establishes the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Scanning,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Scanning | ConnectionState::Reconnecting
        )
    }
}
