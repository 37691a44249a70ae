//! Sensor connection lifecycle.

/// Connection state for a tire sensor.
///
/// Sensors move `Discovered -> Connecting -> Connected -> Subscribed`, and
/// drop to `Disconnected` on explicit disconnect or cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Seen during a scan, never connected.
    #[default]
    Discovered,
    /// Currently attempting to connect.
    Connecting,
    /// Connected and services discovered.
    Connected,
    /// Connected and receiving tire data notifications.
    Subscribed,
    /// Not connected.
    Disconnected,
}

impl ConnectionState {
    /// Check if the link is up (connected or subscribed).
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Subscribed)
    }

    /// Check if notifications are flowing.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "Discovered"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Event for connection state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// The sensor's peripheral identifier.
    pub sensor_id: String,
    /// The new connection state.
    pub state: ConnectionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Discovered.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Subscribed.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());

        assert!(ConnectionState::Subscribed.is_subscribed());
        assert!(!ConnectionState::Connected.is_subscribed());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Subscribed), "Subscribed");
        assert_eq!(format!("{}", ConnectionState::Discovered), "Discovered");
        assert_eq!(ConnectionState::default(), ConnectionState::Discovered);
    }
}
