//! Error types for the Aware engine
//!
//! Failures inside handler flow are reported on the originating app callback
//! with a [`Reason`](crate::reason::Reason) code; these error types cover the
//! structural surface instead, where an API can fail before a callback is
//! even in play.

use crate::types::{ClientId, PeerId, SessionId};

/// Convenience result alias used throughout the workspace.
pub type AwareResult<T> = Result<T, AwareError>;

/// Errors surfaced by the engine's structural APIs.
#[derive(Debug, thiserror::Error)]
pub enum AwareError {
    #[error("unknown client {client_id}")]
    UnknownClient { client_id: ClientId },

    #[error("unknown session {session_id} for client {client_id}")]
    UnknownSession {
        client_id: ClientId,
        session_id: SessionId,
    },

    #[error("peer {peer_id} not found in session {session_id}")]
    PeerNotFound {
        session_id: SessionId,
        peer_id: PeerId,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("service is not running")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AwareError::UnknownClient {
            client_id: ClientId(12341),
        };
        assert_eq!(err.to_string(), "unknown client 12341");

        let err = AwareError::InvalidConfiguration {
            reason: "service name too long".to_string(),
        };
        assert!(err.to_string().contains("service name too long"));
    }
}
