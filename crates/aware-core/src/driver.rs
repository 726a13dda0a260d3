//! Driver command sink
//!
//! The engine's only contended resource. All methods return whether the
//! command was accepted for dispatch, not whether it succeeded; results
//! arrive asynchronously as responses carrying the transaction id back, or
//! as unsolicited notifications.

use crate::config::{ConfigRequest, PublishConfig, SubscribeConfig};
use crate::types::{MacAddr, MessageId, PeerId, PubSubId, TransactionId};

// ----------------------------------------------------------------------------
// Driver Trait
// ----------------------------------------------------------------------------

/// Synchronous command interface to the radio driver.
pub trait AwareDriver: Send {
    /// Query firmware capabilities; answered by a capabilities-update response.
    fn get_capabilities(&mut self, transaction_id: TransactionId) -> bool;

    /// Program the merged cluster configuration. `notify_identity_change`
    /// distinguishes the first enable (true) from a merge update (false).
    fn enable_and_configure(
        &mut self,
        transaction_id: TransactionId,
        config: &ConfigRequest,
        notify_identity_change: bool,
    ) -> bool;

    /// Disable the radio. Fire-and-forget when called with
    /// [`TransactionId::NONE`].
    fn disable(&mut self, transaction_id: TransactionId) -> bool;

    /// Release the driver; no response.
    fn deinit(&mut self);

    /// Start or update a publish. `publish_id` is None for a new session.
    fn publish(
        &mut self,
        transaction_id: TransactionId,
        publish_id: Option<PubSubId>,
        config: &PublishConfig,
    ) -> bool;

    /// Start or update a subscribe. `subscribe_id` is None for a new session.
    fn subscribe(
        &mut self,
        transaction_id: TransactionId,
        subscribe_id: Option<PubSubId>,
        config: &SubscribeConfig,
    ) -> bool;

    fn stop_publish(&mut self, transaction_id: TransactionId, publish_id: PubSubId) -> bool;

    fn stop_subscribe(&mut self, transaction_id: TransactionId, subscribe_id: PubSubId) -> bool;

    /// Queue a message toward a peer. Acknowledged in two stages: a queued
    /// response for the transaction, then an on-air result notification.
    fn send_message(
        &mut self,
        transaction_id: TransactionId,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        dest: MacAddr,
        payload: &[u8],
        message_id: MessageId,
    ) -> bool;
}

// ----------------------------------------------------------------------------
// Cluster Events
// ----------------------------------------------------------------------------

/// Discriminant carried by a cluster-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterEvent {
    /// We started a new cluster
    Started,
    /// We joined an existing cluster
    Joined,
}
