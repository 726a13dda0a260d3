//! Core identifier types for the Aware engine
//!
//! Every entity the engine tracks is addressed by a small integer handle
//! rather than a reference, using newtype patterns for type safety. Handles
//! stay valid across the callback graph without creating ownership cycles.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Client Identifier
// ----------------------------------------------------------------------------

/// Identifier an application chooses for itself when connecting.
///
/// Unique among currently-connected clients; the engine never generates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Get the raw value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Session Identifier
// ----------------------------------------------------------------------------

/// Engine-assigned identifier for a publish or subscribe session.
///
/// Strictly monotonically increasing for the life of the process. This is the
/// id exposed to applications; the driver's pub/sub id never leaves the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Driver-assigned requestor instance id for a discovered peer.
///
/// Stable for the life of the peer's presence in a session even if the peer
/// changes its over-the-air address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Publish/Subscribe Identifier
// ----------------------------------------------------------------------------

/// Driver-assigned id for an active publish or subscribe in the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PubSubId(pub u32);

impl PubSubId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PubSubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Application-chosen id for an outbound message.
///
/// Preserved across retransmissions so the terminal send callback always
/// refers to the id the application supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u32);

impl MessageId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Ranging Identifier
// ----------------------------------------------------------------------------

/// Application-chosen correlator for a ranging request handed to the RTT layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangingId(pub u32);

impl RangingId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Transaction Identifier
// ----------------------------------------------------------------------------

/// 16-bit correlator between an outbound driver command and its response.
///
/// Zero is reserved for fire-and-forget driver calls which expect no
/// response; the registry only allocates nonzero values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u16);

impl TransactionId {
    /// Reserved id for driver calls that do not expect a response.
    pub const NONE: TransactionId = TransactionId(0);

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Whether this id corresponds to a trackable transaction.
    pub fn is_tracked(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Over-the-Air Address
// ----------------------------------------------------------------------------

/// 6-byte over-the-air address of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_addr_display() {
        let mac = MacAddr::new([0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B]);
        assert_eq!(mac.to_string(), "06:07:08:09:0A:0B");
        assert_eq!(mac.as_bytes(), &[0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B]);
    }

    #[test]
    fn test_transaction_id_none() {
        assert!(!TransactionId::NONE.is_tracked());
        assert!(TransactionId(1).is_tracked());
    }

    #[test]
    fn test_session_id_ordering() {
        assert!(SessionId(2) > SessionId(1));
        assert!(SessionId(100) > SessionId(99));
    }
}
