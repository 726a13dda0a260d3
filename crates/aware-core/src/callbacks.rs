//! Application-facing callback traits
//!
//! Each connected client registers a [`ClientListener`]; each discovery
//! session carries its own [`SessionListener`]. The engine invokes these from
//! its single dispatch thread, in the order the causing events were
//! processed, and never again for a session after its termination callback.

use crate::types::{MessageId, PeerId, SessionId};
use crate::reason::Reason;

// ----------------------------------------------------------------------------
// Client Listener
// ----------------------------------------------------------------------------

/// Per-client event callback.
pub trait ClientListener: Send + Sync {
    /// The connect request was accepted and the radio is configured.
    fn on_connect_success(&self);

    /// The connect request was rejected.
    fn on_connect_fail(&self, reason: Reason);

    /// The device's discovery identity changed.
    fn on_identity_changed(&self);

    /// The radio went down underneath the service.
    fn on_down(&self, reason: Reason);
}

// ----------------------------------------------------------------------------
// Session Listener
// ----------------------------------------------------------------------------

/// Per-session event callback.
///
/// `on_session_started` always precedes any match, message, or send result
/// for the session, and nothing follows `on_session_terminated`.
pub trait SessionListener: Send + Sync {
    /// The driver confirmed session creation. The id is the engine-assigned
    /// session id, never the driver's.
    fn on_session_started(&self, session_id: SessionId);

    /// A configuration update was applied.
    fn on_session_config_success(&self);

    /// Session creation or a configuration update failed. The session, if it
    /// already existed, stays alive.
    fn on_session_config_fail(&self, reason: Reason);

    /// The driver terminated the session.
    fn on_session_terminated(&self, reason: Reason);

    /// A peer matching the discovery criteria was seen.
    fn on_match(&self, peer_id: PeerId, service_specific_info: &[u8], match_filter: &[u8]);

    /// A peer sent us a message.
    fn on_message_received(&self, peer_id: PeerId, message: &[u8]);

    /// Terminal result for a queued message: delivered on air.
    fn on_message_send_success(&self, message_id: MessageId);

    /// Terminal result for a queued message: gave up.
    fn on_message_send_fail(&self, message_id: MessageId, reason: Reason);
}
