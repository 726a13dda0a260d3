//! Transaction registry
//!
//! Allocates the 16-bit correlator attached to every tracked driver command
//! and maps responses back to the operation context that issued them. Ids
//! wrap around, skip zero (reserved for fire-and-forget calls), and skip any
//! id still outstanding. Entries for queued sends persist past the queued
//! response, until the final on-air callback, so late firmware traffic can be
//! told apart from garbage.

use std::collections::HashMap;
use std::sync::Arc;

use crate::callbacks::{ClientListener, SessionListener};
use crate::config::ConfigRequest;
use crate::queue::HostQueuedSend;
use crate::session::SessionKind;
use crate::types::{ClientId, MessageId, SessionId, TransactionId};

// ----------------------------------------------------------------------------
// Operation Context
// ----------------------------------------------------------------------------

/// The pending operation a transaction id refers to.
pub enum OpContext {
    /// Capability query issued on first enable
    Capabilities,
    /// enableAndConfigure on behalf of a connecting client
    Connect {
        client_id: ClientId,
        uid: u32,
        listener: Arc<dyn ClientListener>,
        request: ConfigRequest,
        merged: ConfigRequest,
    },
    /// enableAndConfigure re-programming a changed merge result
    Reconfigure { merged: ConfigRequest },
    /// Initial publish or subscribe, session not yet created
    StartSession {
        client_id: ClientId,
        kind: SessionKind,
        listener: Arc<dyn SessionListener>,
    },
    /// Configuration update on an existing session
    UpdateSession {
        client_id: ClientId,
        session_id: SessionId,
    },
    /// sendMessage awaiting the firmware queued response
    Send { message: HostQueuedSend },
    /// sendMessage accepted by the firmware, awaiting the on-air result
    SendInFlight {
        client_id: ClientId,
        session_id: SessionId,
        message_id: MessageId,
    },
}

impl OpContext {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            OpContext::Capabilities => "capabilities",
            OpContext::Connect { .. } => "connect",
            OpContext::Reconfigure { .. } => "reconfigure",
            OpContext::StartSession { .. } => "start-session",
            OpContext::UpdateSession { .. } => "update-session",
            OpContext::Send { .. } => "send",
            OpContext::SendInFlight { .. } => "send-in-flight",
        }
    }
}

// ----------------------------------------------------------------------------
// Transaction Registry
// ----------------------------------------------------------------------------

/// Outstanding transactions keyed by id.
#[derive(Default)]
pub struct TransactionRegistry {
    next_id: u16,
    entries: HashMap<TransactionId, OpContext>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: HashMap::new(),
        }
    }

    /// Allocate the next free nonzero id.
    pub fn allocate(&mut self) -> TransactionId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if self.next_id == 0 {
                continue;
            }
            let candidate = TransactionId(self.next_id);
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Record the operation behind an allocated id.
    pub fn register(&mut self, transaction_id: TransactionId, context: OpContext) {
        debug_assert!(transaction_id.is_tracked());
        self.entries.insert(transaction_id, context);
    }

    /// Claim a transaction unconditionally.
    pub fn take(&mut self, transaction_id: TransactionId) -> Option<OpContext> {
        self.entries.remove(&transaction_id)
    }

    /// Claim a transaction only if its context satisfies the predicate;
    /// otherwise the entry stays registered. This is how a response of the
    /// wrong kind is rejected without disturbing the pending operation.
    pub fn take_if<F>(&mut self, transaction_id: TransactionId, pred: F) -> Option<OpContext>
    where
        F: FnOnce(&OpContext) -> bool,
    {
        if self.entries.get(&transaction_id).is_some_and(|ctx| pred(ctx)) {
            self.entries.remove(&transaction_id)
        } else {
            None
        }
    }

    pub fn get(&self, transaction_id: TransactionId) -> Option<&OpContext> {
        self.entries.get(&transaction_id)
    }

    pub fn contains(&self, transaction_id: TransactionId) -> bool {
        self.entries.contains_key(&transaction_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_nonzero_and_increasing() {
        let mut registry = TransactionRegistry::new();
        let first = registry.allocate();
        let second = registry.allocate();
        assert!(first.is_tracked());
        assert!(second.is_tracked());
        assert_ne!(first, second);
    }

    #[test]
    fn test_allocation_wraps_and_skips_zero() {
        let mut registry = TransactionRegistry::new();
        registry.next_id = u16::MAX - 1;
        assert_eq!(registry.allocate(), TransactionId(u16::MAX));
        // Wrap skips 0
        assert_eq!(registry.allocate(), TransactionId(1));
    }

    #[test]
    fn test_allocation_skips_outstanding_ids() {
        let mut registry = TransactionRegistry::new();
        registry.next_id = u16::MAX;
        registry.register(TransactionId(1), OpContext::Capabilities);
        registry.register(TransactionId(2), OpContext::Capabilities);
        assert_eq!(registry.allocate(), TransactionId(3));
    }

    #[test]
    fn test_take_removes_entry() {
        let mut registry = TransactionRegistry::new();
        let tid = registry.allocate();
        registry.register(tid, OpContext::Capabilities);

        assert!(registry.take(tid).is_some());
        assert!(registry.take(tid).is_none());
    }

    #[test]
    fn test_take_if_leaves_mismatches_in_place() {
        let mut registry = TransactionRegistry::new();
        let tid = registry.allocate();
        registry.register(tid, OpContext::Capabilities);

        let claimed = registry.take_if(tid, |ctx| matches!(ctx, OpContext::Reconfigure { .. }));
        assert!(claimed.is_none());
        assert!(registry.contains(tid));

        let claimed = registry.take_if(tid, |ctx| matches!(ctx, OpContext::Capabilities));
        assert!(claimed.is_some());
        assert!(!registry.contains(tid));
    }
}
