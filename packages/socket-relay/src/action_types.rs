//! Namespaced constants shared by the client and server relays
//!
//! Every action type the relays synthesize lives under the
//! [`NAMESPACE`] prefix so it cannot collide with application actions.

use std::fmt;
use std::str::FromStr;

/// Prefix for every action type and channel name owned by the relay
pub const NAMESPACE: &str = "@@socket-relay";

/// Default channel used for envelope traffic in both directions
pub const DISPATCH_EVENT: &str = "@@socket-relay/DISPATCH_ACTION";

/// Provenance stamp written by the client relay
pub const CLIENT_TAG: &str = "@socket-relay/client";

/// Provenance stamp written by the server relay
pub const SERVER_TAG: &str = "@socket-relay/server";

pub const CONNECT: &str = "@@socket-relay/CONNECT";
pub const CONNECT_ERROR: &str = "@@socket-relay/CONNECT_ERROR";
pub const CONNECT_TIMEOUT: &str = "@@socket-relay/CONNECT_TIMEOUT";
pub const RECONNECT: &str = "@@socket-relay/RECONNECT";
pub const RECONNECTING: &str = "@@socket-relay/RECONNECTING";
pub const RECONNECT_ERROR: &str = "@@socket-relay/RECONNECT_ERROR";
pub const RECONNECT_FAILED: &str = "@@socket-relay/RECONNECT_FAILED";

/// Reserved for hosts that report a confirmed (re)connection; never
/// dispatched by the relay itself
pub const CONNECT_SUCCESS: &str = "@@socket-relay/CONNECT_SUCCESS";
pub const RECONNECT_SUCCESS: &str = "@@socket-relay/RECONNECT_SUCCESS";

/// Connection lifecycle events delivered by the client transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Connect,
    ConnectError,
    ConnectTimeout,
    Reconnect,
    Reconnecting,
    ReconnectError,
    ReconnectFailed,
}

impl LifecycleEvent {
    /// All lifecycle events, in registration order
    pub const ALL: [LifecycleEvent; 7] = [
        LifecycleEvent::Connect,
        LifecycleEvent::ConnectError,
        LifecycleEvent::ConnectTimeout,
        LifecycleEvent::Reconnect,
        LifecycleEvent::Reconnecting,
        LifecycleEvent::ReconnectError,
        LifecycleEvent::ReconnectFailed,
    ];

    /// Transport event name, as emitted by the underlying socket
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::ConnectError => "connect_error",
            Self::ConnectTimeout => "connect_timeout",
            Self::Reconnect => "reconnect",
            Self::Reconnecting => "reconnecting",
            Self::ReconnectError => "reconnect_error",
            Self::ReconnectFailed => "reconnect_failed",
        }
    }

    /// Action type dispatched into the store when this event fires
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Connect => CONNECT,
            Self::ConnectError => CONNECT_ERROR,
            Self::ConnectTimeout => CONNECT_TIMEOUT,
            Self::Reconnect => RECONNECT,
            Self::Reconnecting => RECONNECTING,
            Self::ReconnectError => RECONNECT_ERROR,
            Self::ReconnectFailed => RECONNECT_FAILED,
        }
    }

    /// Initial-connection events fire at most once per transport
    pub fn is_once(&self) -> bool {
        matches!(
            self,
            Self::Connect | Self::ConnectError | Self::ConnectTimeout
        )
    }
}

impl FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.event_name() == s)
            .ok_or_else(|| format!("unknown lifecycle event: {}", s))
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_types_are_namespaced() {
        for event in LifecycleEvent::ALL {
            assert!(event.action_type().starts_with(NAMESPACE));
        }
        assert!(DISPATCH_EVENT.starts_with(NAMESPACE));
        assert!(CONNECT_SUCCESS.starts_with(NAMESPACE));
        assert!(RECONNECT_SUCCESS.starts_with(NAMESPACE));
    }

    #[test]
    fn test_success_types_are_not_lifecycle_events() {
        for event in LifecycleEvent::ALL {
            assert_ne!(event.action_type(), CONNECT_SUCCESS);
            assert_ne!(event.action_type(), RECONNECT_SUCCESS);
        }
    }

    #[test]
    fn test_once_events() {
        assert!(LifecycleEvent::Connect.is_once());
        assert!(LifecycleEvent::ConnectError.is_once());
        assert!(LifecycleEvent::ConnectTimeout.is_once());
        assert!(!LifecycleEvent::Reconnect.is_once());
        assert!(!LifecycleEvent::Reconnecting.is_once());
        assert!(!LifecycleEvent::ReconnectError.is_once());
        assert!(!LifecycleEvent::ReconnectFailed.is_once());
    }

    #[test]
    fn test_lifecycle_event_parsing() {
        assert_eq!(
            "reconnect_failed".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::ReconnectFailed
        );
        assert_eq!(
            "connect".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::Connect
        );
        assert!("disconnect".parse::<LifecycleEvent>().is_err());
    }

    #[test]
    fn test_display_matches_event_name() {
        assert_eq!(LifecycleEvent::ConnectTimeout.to_string(), "connect_timeout");
    }
}
