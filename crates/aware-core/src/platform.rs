//! Seams to the external collaborators
//!
//! The data-path interface manager, the RTT ranging subsystem, and the
//! usage-state broadcast are all outside the engine; it only drives them
//! through these traits. Tests substitute recording implementations.

use serde::{Deserialize, Serialize};

use crate::types::{ClientId, MacAddr, PeerId, RangingId};

// ----------------------------------------------------------------------------
// Data-Path Manager
// ----------------------------------------------------------------------------

/// Lifecycle sink for the data-path interface manager.
pub trait DataPathManager: Send {
    /// Bring up all data-path interfaces, once capabilities are known.
    fn create_all_interfaces(&mut self);

    /// Remove all data-path interfaces on usage disable.
    fn delete_all_interfaces(&mut self);

    /// The radio went down; drop any active data paths.
    fn cleanup_data_paths(&mut self);
}

// ----------------------------------------------------------------------------
// RTT Ranging
// ----------------------------------------------------------------------------

/// A ranging target. The engine resolves `peer_mac` from the session's peer
/// table; peers it does not know pass through unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RttParams {
    pub peer_id: PeerId,
    pub peer_mac: Option<MacAddr>,
}

impl RttParams {
    /// A target with no resolved address yet.
    pub fn for_peer(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            peer_mac: None,
        }
    }
}

/// Entry point into the RTT subsystem.
pub trait RttRanging: Send {
    /// Start a ranging operation against the given targets.
    fn start_ranging(&mut self, ranging_id: RangingId, client_id: ClientId, params: Vec<RttParams>);
}

// ----------------------------------------------------------------------------
// Usage Broadcast
// ----------------------------------------------------------------------------

/// Fan-out for the usage state-change announcement sent to all users on
/// every enable/disable transition.
pub trait UsageBroadcast: Send {
    fn usage_changed(&mut self, enabled: bool);
}
