//! Per-session discovery state
//!
//! A session exists only once the driver has confirmed creation, so every
//! [`SessionState`] carries a valid driver pub/sub id from birth. The peer
//! table maps driver-assigned requestor ids to their current over-the-air
//! address; both match and inbound-message events refresh the address, which
//! keeps messaging transparent when a peer rotates its identity.

use std::collections::HashMap;
use std::sync::Arc;

use crate::callbacks::SessionListener;
use crate::types::{MacAddr, PeerId, PubSubId, SessionId};

// ----------------------------------------------------------------------------
// Session Kind
// ----------------------------------------------------------------------------

/// The two discovery session kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Publish,
    Subscribe,
}

impl SessionKind {
    /// Map the driver's `is_publish` flag.
    pub fn from_is_publish(is_publish: bool) -> Self {
        if is_publish {
            SessionKind::Publish
        } else {
            SessionKind::Subscribe
        }
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// State of one active publish or subscribe session.
pub struct SessionState {
    session_id: SessionId,
    pub_sub_id: PubSubId,
    kind: SessionKind,
    listener: Arc<dyn SessionListener>,
    peers: HashMap<PeerId, MacAddr>,
}

impl SessionState {
    pub fn new(
        session_id: SessionId,
        pub_sub_id: PubSubId,
        kind: SessionKind,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            session_id,
            pub_sub_id,
            kind,
            listener,
            peers: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn pub_sub_id(&self) -> PubSubId {
        self.pub_sub_id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn listener(&self) -> &Arc<dyn SessionListener> {
        &self.listener
    }

    /// Record or refresh a peer's current address.
    pub fn record_peer(&mut self, peer_id: PeerId, mac: MacAddr) {
        self.peers.insert(peer_id, mac);
    }

    /// Resolve the current address of a known peer.
    pub fn peer_mac(&self, peer_id: PeerId) -> Option<MacAddr> {
        self.peers.get(&peer_id).copied()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::Reason;
    use crate::types::MessageId;

    struct NoopListener;

    impl SessionListener for NoopListener {
        fn on_session_started(&self, _session_id: SessionId) {}
        fn on_session_config_success(&self) {}
        fn on_session_config_fail(&self, _reason: Reason) {}
        fn on_session_terminated(&self, _reason: Reason) {}
        fn on_match(&self, _peer_id: PeerId, _ssi: &[u8], _match_filter: &[u8]) {}
        fn on_message_received(&self, _peer_id: PeerId, _message: &[u8]) {}
        fn on_message_send_success(&self, _message_id: MessageId) {}
        fn on_message_send_fail(&self, _message_id: MessageId, _reason: Reason) {}
    }

    fn session() -> SessionState {
        SessionState::new(
            SessionId(1),
            PubSubId(15),
            SessionKind::Subscribe,
            Arc::new(NoopListener),
        )
    }

    #[test]
    fn test_peer_address_refresh() {
        let mut session = session();
        let peer = PeerId(568);
        let original = MacAddr::new([0, 1, 2, 3, 4, 5]);
        let later = MacAddr::new([6, 7, 8, 9, 10, 11]);

        assert_eq!(session.peer_mac(peer), None);

        session.record_peer(peer, original);
        assert_eq!(session.peer_mac(peer), Some(original));

        // Same requestor id, new address: entry is refreshed, not duplicated
        session.record_peer(peer, later);
        assert_eq!(session.peer_mac(peer), Some(later));
        assert_eq!(session.peer_count(), 1);
    }

    #[test]
    fn test_kind_from_is_publish() {
        assert_eq!(SessionKind::from_is_publish(true), SessionKind::Publish);
        assert_eq!(SessionKind::from_is_publish(false), SessionKind::Subscribe);
    }
}
