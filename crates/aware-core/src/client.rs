//! Per-client state
//!
//! One record per connected application. A client owns its sessions; deleting
//! the client deletes every session with it, which is what the cleanup law in
//! the teardown paths relies on.

use std::collections::HashMap;
use std::sync::Arc;

use crate::callbacks::ClientListener;
use crate::config::ConfigRequest;
use crate::session::{SessionKind, SessionState};
use crate::types::{ClientId, PubSubId, SessionId};

/// State of one connected application.
pub struct ClientState {
    client_id: ClientId,
    uid: u32,
    listener: Arc<dyn ClientListener>,
    request: ConfigRequest,
    sessions: HashMap<SessionId, SessionState>,
}

impl ClientState {
    pub fn new(
        client_id: ClientId,
        uid: u32,
        listener: Arc<dyn ClientListener>,
        request: ConfigRequest,
    ) -> Self {
        Self {
            client_id,
            uid,
            listener,
            request,
            sessions: HashMap::new(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn listener(&self) -> &Arc<dyn ClientListener> {
        &self.listener
    }

    pub fn request(&self) -> &ConfigRequest {
        &self.request
    }

    /// Whether this client asked for identity-change notifications.
    pub fn wants_identity_notifications(&self) -> bool {
        self.request.enable_identity_change_callback
    }

    pub fn add_session(&mut self, session: SessionState) {
        self.sessions.insert(session.session_id(), session);
    }

    pub fn remove_session(&mut self, session_id: SessionId) -> Option<SessionState> {
        self.sessions.remove(&session_id)
    }

    pub fn session(&self, session_id: SessionId) -> Option<&SessionState> {
        self.sessions.get(&session_id)
    }

    pub fn session_mut(&mut self, session_id: SessionId) -> Option<&mut SessionState> {
        self.sessions.get_mut(&session_id)
    }

    /// Find the session the driver addresses by a pub/sub id, if its kind
    /// matches.
    pub fn session_by_pub_sub_mut(
        &mut self,
        pub_sub_id: PubSubId,
        kind: Option<SessionKind>,
    ) -> Option<&mut SessionState> {
        self.sessions.values_mut().find(|session| {
            session.pub_sub_id() == pub_sub_id && kind.map_or(true, |k| session.kind() == k)
        })
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionState> {
        self.sessions.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::Reason;
    use crate::types::{MessageId, PeerId};

    struct NoopClientListener;

    impl ClientListener for NoopClientListener {
        fn on_connect_success(&self) {}
        fn on_connect_fail(&self, _reason: Reason) {}
        fn on_identity_changed(&self) {}
        fn on_down(&self, _reason: Reason) {}
    }

    struct NoopSessionListener;

    impl crate::callbacks::SessionListener for NoopSessionListener {
        fn on_session_started(&self, _session_id: SessionId) {}
        fn on_session_config_success(&self) {}
        fn on_session_config_fail(&self, _reason: Reason) {}
        fn on_session_terminated(&self, _reason: Reason) {}
        fn on_match(&self, _peer_id: PeerId, _ssi: &[u8], _match_filter: &[u8]) {}
        fn on_message_received(&self, _peer_id: PeerId, _message: &[u8]) {}
        fn on_message_send_success(&self, _message_id: MessageId) {}
        fn on_message_send_fail(&self, _message_id: MessageId, _reason: Reason) {}
    }

    fn client() -> ClientState {
        ClientState::new(
            ClientId(12341),
            1000,
            Arc::new(NoopClientListener),
            ConfigRequest::default(),
        )
    }

    #[test]
    fn test_session_ownership() {
        let mut client = client();
        client.add_session(SessionState::new(
            SessionId(1),
            PubSubId(15),
            SessionKind::Publish,
            Arc::new(NoopSessionListener),
        ));
        client.add_session(SessionState::new(
            SessionId(2),
            PubSubId(16),
            SessionKind::Subscribe,
            Arc::new(NoopSessionListener),
        ));

        assert_eq!(client.session_count(), 2);
        assert_eq!(client.session_ids(), vec![SessionId(1), SessionId(2)]);

        let removed = client.remove_session(SessionId(1)).unwrap();
        assert_eq!(removed.pub_sub_id(), PubSubId(15));
        assert!(client.session(SessionId(1)).is_none());
    }

    #[test]
    fn test_lookup_by_pub_sub_id_checks_kind() {
        let mut client = client();
        client.add_session(SessionState::new(
            SessionId(1),
            PubSubId(15),
            SessionKind::Publish,
            Arc::new(NoopSessionListener),
        ));

        assert!(client
            .session_by_pub_sub_mut(PubSubId(15), Some(SessionKind::Publish))
            .is_some());
        assert!(client
            .session_by_pub_sub_mut(PubSubId(15), Some(SessionKind::Subscribe))
            .is_none());
        assert!(client.session_by_pub_sub_mut(PubSubId(15), None).is_some());
        assert!(client.session_by_pub_sub_mut(PubSubId(99), None).is_none());
    }
}
