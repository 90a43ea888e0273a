//! Connection lifecycle state machine
//!
//! `disconnected → connecting → handshaking → ready`, with every state able to
//! fall back to `disconnected`. Transitions are a pure table so they can be
//! checked without a transport.

use serde::Serialize;

/// Lifecycle state of a gateway connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket; the resting state
    #[default]
    Disconnected,
    /// Transport is being opened
    Connecting,
    /// Transport is open, `connect` handshake outstanding
    Handshaking,
    /// Handshake accepted; ordinary calls may flow
    Ready,
}

/// Things that happen to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A caller asked for a connection
    ConnectRequested,
    /// The transport finished opening
    TransportOpened,
    /// The gateway accepted the handshake
    HandshakeAccepted,
    /// The handshake was rejected or timed out
    HandshakeFailed,
    /// The transport closed or errored (including failing to open)
    TransportClosed,
    /// The owner closed the connection
    DisconnectRequested,
}

/// Outcome of applying an event to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub next: ConnectionState,
    /// Whether outstanding calls must be failed with connection-closed
    pub fail_pending: bool,
    /// Whether the socket reference must be dropped
    pub release_socket: bool,
}

impl Transition {
    fn to(next: ConnectionState) -> Self {
        Self {
            next,
            fail_pending: false,
            release_socket: false,
        }
    }

    fn teardown() -> Self {
        Self {
            next: ConnectionState::Disconnected,
            fail_pending: true,
            release_socket: true,
        }
    }
}

impl ConnectionState {
    /// Apply `event`, returning `None` when the event has no meaning in this state
    pub fn on(self, event: LifecycleEvent) -> Option<Transition> {
        use ConnectionState::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Some(Transition::to(Connecting)),
            (Connecting, TransportOpened) => Some(Transition::to(Handshaking)),
            (Handshaking, HandshakeAccepted) => Some(Transition::to(Ready)),
            (Handshaking, HandshakeFailed) => Some(Transition::teardown()),
            (Connecting | Handshaking | Ready, TransportClosed | DisconnectRequested) => {
                Some(Transition::teardown())
            }
            (Disconnected, TransportClosed | DisconnectRequested) => {
                Some(Transition::to(Disconnected))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;
    use LifecycleEvent::*;

    #[test]
    fn test_happy_path() {
        let mut state = Disconnected;
        for event in [ConnectRequested, TransportOpened, HandshakeAccepted] {
            state = state.on(event).unwrap().next;
        }
        assert_eq!(state, Ready);
    }

    #[test]
    fn test_every_live_state_tears_down_on_close() {
        for state in [Connecting, Handshaking, Ready] {
            let transition = state.on(TransportClosed).unwrap();
            assert_eq!(transition.next, Disconnected);
            assert!(transition.fail_pending);
            assert!(transition.release_socket);

            let transition = state.on(DisconnectRequested).unwrap();
            assert_eq!(transition.next, Disconnected);
            assert!(transition.fail_pending);
        }
    }

    #[test]
    fn test_handshake_failure_returns_to_disconnected() {
        let transition = Handshaking.on(HandshakeFailed).unwrap();
        assert_eq!(transition.next, Disconnected);
        assert!(transition.release_socket);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let transition = Disconnected.on(DisconnectRequested).unwrap();
        assert_eq!(transition.next, Disconnected);
        assert!(!transition.fail_pending);
    }

    #[test]
    fn test_out_of_order_events_are_rejected() {
        assert!(Disconnected.on(TransportOpened).is_none());
        assert!(Disconnected.on(HandshakeAccepted).is_none());
        assert!(Connecting.on(HandshakeAccepted).is_none());
        assert!(Ready.on(ConnectRequested).is_none());
        assert!(Ready.on(HandshakeAccepted).is_none());
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Handshaking).unwrap(), "\"handshaking\"");
    }
}
