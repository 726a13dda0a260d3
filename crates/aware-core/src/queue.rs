//! Outbound message queue
//!
//! Two structures back the send path: a host-side FIFO of messages waiting
//! for a firmware slot, and the bounded in-flight set of messages the
//! firmware has accepted but not yet resolved on air. The in-flight set never
//! exceeds the capability-reported window. Retries re-enter at the front of
//! the host FIFO so a retransmission keeps the slot it already earned.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::types::{ClientId, MessageId, PeerId, SessionId, TransactionId};

// ----------------------------------------------------------------------------
// Queued Message
// ----------------------------------------------------------------------------

/// A message accepted from an application, waiting in the host queue or in
/// flight in the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostQueuedSend {
    pub client_id: ClientId,
    pub session_id: SessionId,
    pub peer_id: PeerId,
    pub payload: Vec<u8>,
    pub message_id: MessageId,
    /// Retransmissions still allowed after the next on-air failure
    pub retries_left: u32,
}

// ----------------------------------------------------------------------------
// Send Message Queue
// ----------------------------------------------------------------------------

/// Host FIFO plus firmware in-flight set.
pub struct SendMessageQueue {
    host: VecDeque<HostQueuedSend>,
    in_flight: HashMap<TransactionId, HostQueuedSend>,
    capacity: usize,
}

impl SendMessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            host: VecDeque::new(),
            in_flight: HashMap::new(),
            capacity,
        }
    }

    /// Resize the firmware window once capabilities are known. Messages
    /// already in flight are unaffected.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a new message to the host queue.
    pub fn enqueue(&mut self, message: HostQueuedSend) {
        self.host.push_back(message);
    }

    /// Put a retransmission back at the head of the host queue.
    pub fn requeue_front(&mut self, message: HostQueuedSend) {
        self.host.push_front(message);
    }

    /// Pop the next message eligible for submission, if the firmware window
    /// has room.
    pub fn pop_ready(&mut self) -> Option<HostQueuedSend> {
        if self.in_flight.len() < self.capacity {
            self.host.pop_front()
        } else {
            None
        }
    }

    /// Move a message into the firmware in-flight set after a queued-success
    /// response.
    pub fn mark_in_flight(&mut self, transaction_id: TransactionId, message: HostQueuedSend) {
        self.in_flight.insert(transaction_id, message);
    }

    /// Claim an in-flight message on its terminal callback. Returns None for
    /// transaction ids that were already flushed, which is how late firmware
    /// notifications get discarded.
    pub fn take_in_flight(&mut self, transaction_id: TransactionId) -> Option<HostQueuedSend> {
        self.in_flight.remove(&transaction_id)
    }

    /// Empty the in-flight set, returning everything that was pending.
    pub fn drain_in_flight(&mut self) -> Vec<(TransactionId, HostQueuedSend)> {
        self.in_flight.drain().collect()
    }

    pub fn in_flight_is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn host_len(&self) -> usize {
        self.host.len()
    }

    /// Drop every queued and in-flight message belonging to a session.
    /// Returns the transaction ids of removed in-flight entries; their
    /// pending callbacks are exactly the ones that must be suppressed.
    pub fn purge_session(&mut self, session_id: SessionId) -> Vec<TransactionId> {
        self.host.retain(|message| message.session_id != session_id);
        let stale: Vec<TransactionId> = self
            .in_flight
            .iter()
            .filter(|(_, message)| message.session_id == session_id)
            .map(|(tid, _)| *tid)
            .collect();
        for tid in &stale {
            self.in_flight.remove(tid);
        }
        if !stale.is_empty() {
            debug!(%session_id, flushed = stale.len(), "flushed in-flight sends for session");
        }
        stale
    }

    /// Drop every queued and in-flight message belonging to a client.
    pub fn purge_client(&mut self, client_id: ClientId) -> Vec<TransactionId> {
        self.host.retain(|message| message.client_id != client_id);
        let stale: Vec<TransactionId> = self
            .in_flight
            .iter()
            .filter(|(_, message)| message.client_id == client_id)
            .map(|(tid, _)| *tid)
            .collect();
        for tid in &stale {
            self.in_flight.remove(tid);
        }
        if !stale.is_empty() {
            debug!(%client_id, flushed = stale.len(), "flushed in-flight sends for client");
        }
        stale
    }

    /// Drop everything.
    pub fn clear(&mut self) -> Vec<TransactionId> {
        self.host.clear();
        self.in_flight.drain().map(|(tid, _)| tid).collect()
    }

    /// Message ids currently known to either queue, for invariant checks.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.host
            .iter()
            .map(|message| message.message_id)
            .chain(self.in_flight.values().map(|message| message.message_id))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message(message_id: u32, session_id: u32) -> HostQueuedSend {
        HostQueuedSend {
            client_id: ClientId(1005),
            session_id: SessionId(session_id),
            peer_id: PeerId(22),
            payload: b"some payload".to_vec(),
            message_id: MessageId(message_id),
            retries_left: 0,
        }
    }

    #[test]
    fn test_window_is_bounded() {
        let mut queue = SendMessageQueue::new(2);
        for i in 0..5 {
            queue.enqueue(message(i, 1));
        }

        let first = queue.pop_ready().unwrap();
        queue.mark_in_flight(TransactionId(1), first);
        let second = queue.pop_ready().unwrap();
        queue.mark_in_flight(TransactionId(2), second);

        // Window full, nothing more comes out
        assert!(queue.pop_ready().is_none());
        assert_eq!(queue.in_flight_len(), 2);
        assert_eq!(queue.host_len(), 3);

        // Completing one frees a slot
        assert!(queue.take_in_flight(TransactionId(1)).is_some());
        assert!(queue.pop_ready().is_some());
    }

    #[test]
    fn test_fifo_order_and_retry_priority() {
        let mut queue = SendMessageQueue::new(4);
        queue.enqueue(message(1, 1));
        queue.enqueue(message(2, 1));

        let first = queue.pop_ready().unwrap();
        assert_eq!(first.message_id, MessageId(1));

        // A retransmission goes back to the front, ahead of message 2
        queue.requeue_front(first);
        assert_eq!(queue.pop_ready().unwrap().message_id, MessageId(1));
        assert_eq!(queue.pop_ready().unwrap().message_id, MessageId(2));
    }

    #[test]
    fn test_late_callbacks_find_nothing() {
        let mut queue = SendMessageQueue::new(2);
        queue.mark_in_flight(TransactionId(7), message(1, 1));

        let flushed = queue.drain_in_flight();
        assert_eq!(flushed.len(), 1);
        assert!(queue.take_in_flight(TransactionId(7)).is_none());
    }

    #[test]
    fn test_purge_session_spans_both_queues() {
        let mut queue = SendMessageQueue::new(2);
        queue.enqueue(message(1, 1));
        queue.enqueue(message(2, 2));
        queue.mark_in_flight(TransactionId(3), message(3, 1));
        queue.mark_in_flight(TransactionId(4), message(4, 2));

        let stale = queue.purge_session(SessionId(1));
        assert_eq!(stale, vec![TransactionId(3)]);
        assert_eq!(queue.host_len(), 1);
        assert_eq!(queue.in_flight_len(), 1);

        let ids = queue.message_ids();
        assert!(ids.contains(&MessageId(2)));
        assert!(ids.contains(&MessageId(4)));
        assert!(!ids.contains(&MessageId(1)));
        assert!(!ids.contains(&MessageId(3)));
    }

    #[test]
    fn test_purge_client_clears_everything_for_client() {
        let mut queue = SendMessageQueue::new(4);
        queue.enqueue(message(1, 1));
        let mut other = message(2, 9);
        other.client_id = ClientId(55);
        queue.enqueue(other);
        queue.mark_in_flight(TransactionId(5), message(3, 1));

        let stale = queue.purge_client(ClientId(1005));
        assert_eq!(stale, vec![TransactionId(5)]);
        assert_eq!(queue.host_len(), 1);
        assert!(queue.in_flight_is_empty());
    }
}
