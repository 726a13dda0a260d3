//! Dispatch-loop message types
//!
//! Everything that can happen to the engine arrives as one
//! [`ServiceMessage`]: an application command, a driver response correlated
//! by transaction id, an unsolicited driver notification, or a timer firing.
//! Handlers run to completion on a single loop, so no other synchronization
//! exists anywhere in the engine.

use std::sync::Arc;

use aware_core::{
    Capabilities, ClientId, ClientListener, ClusterEvent, ConfigRequest, MacAddr, MessageId,
    PeerId, PubSubId, PublishConfig, RangingId, Reason, RttParams, SessionId, SessionListener,
    SubscribeConfig, TransactionId,
};

use crate::timer::TimerTag;

// ----------------------------------------------------------------------------
// Command: Application -> Engine
// ----------------------------------------------------------------------------

/// Commands submitted by client applications and the platform.
pub enum Command {
    /// Make the service usable; broadcasts the state change
    EnableUsage,
    /// Tear the whole service down; broadcasts the state change
    DisableUsage,
    /// Register an application with its requested configuration
    Connect {
        client_id: ClientId,
        uid: u32,
        listener: Arc<dyn ClientListener>,
        request: ConfigRequest,
    },
    /// Remove an application and everything it owns
    Disconnect { client_id: ClientId },
    /// Start a publish discovery session
    Publish {
        client_id: ClientId,
        config: PublishConfig,
        listener: Arc<dyn SessionListener>,
    },
    /// Reconfigure an existing publish session
    UpdatePublish {
        client_id: ClientId,
        session_id: SessionId,
        config: PublishConfig,
    },
    /// Start a subscribe discovery session
    Subscribe {
        client_id: ClientId,
        config: SubscribeConfig,
        listener: Arc<dyn SessionListener>,
    },
    /// Reconfigure an existing subscribe session
    UpdateSubscribe {
        client_id: ClientId,
        session_id: SessionId,
        config: SubscribeConfig,
    },
    /// Stop a session on application request
    TerminateSession {
        client_id: ClientId,
        session_id: SessionId,
    },
    /// Queue a message toward a discovered peer
    SendMessage {
        client_id: ClientId,
        session_id: SessionId,
        peer_id: PeerId,
        payload: Vec<u8>,
        message_id: MessageId,
        retry_count: u32,
    },
    /// Resolve peer addresses and hand a ranging request to the RTT layer
    StartRanging {
        client_id: ClientId,
        session_id: SessionId,
        params: Vec<RttParams>,
        ranging_id: RangingId,
    },
}

impl Command {
    /// Variant name for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Command::EnableUsage => "enable-usage",
            Command::DisableUsage => "disable-usage",
            Command::Connect { .. } => "connect",
            Command::Disconnect { .. } => "disconnect",
            Command::Publish { .. } => "publish",
            Command::UpdatePublish { .. } => "update-publish",
            Command::Subscribe { .. } => "subscribe",
            Command::UpdateSubscribe { .. } => "update-subscribe",
            Command::TerminateSession { .. } => "terminate-session",
            Command::SendMessage { .. } => "send-message",
            Command::StartRanging { .. } => "start-ranging",
        }
    }
}

// ----------------------------------------------------------------------------
// Driver Responses: correlated by transaction id
// ----------------------------------------------------------------------------

/// Responses to commands previously issued to the driver.
#[derive(Debug, Clone)]
pub enum DriverResponse {
    CapabilitiesUpdate {
        transaction_id: TransactionId,
        capabilities: Capabilities,
    },
    ConfigSuccess {
        transaction_id: TransactionId,
    },
    ConfigFailed {
        transaction_id: TransactionId,
        reason: Reason,
    },
    SessionConfigSuccess {
        transaction_id: TransactionId,
        is_publish: bool,
        pub_sub_id: PubSubId,
    },
    SessionConfigFail {
        transaction_id: TransactionId,
        is_publish: bool,
        reason: Reason,
    },
    MessageSendQueuedSuccess {
        transaction_id: TransactionId,
    },
    MessageSendQueuedFail {
        transaction_id: TransactionId,
        reason: Reason,
    },
}

// ----------------------------------------------------------------------------
// Driver Notifications: unsolicited
// ----------------------------------------------------------------------------

/// Asynchronous events originating in the firmware.
#[derive(Debug, Clone)]
pub enum DriverNotification {
    /// On-air result for a message the firmware had queued
    MessageSendSuccess { transaction_id: TransactionId },
    /// On-air failure for a message the firmware had queued
    MessageSendFail {
        transaction_id: TransactionId,
        reason: Reason,
    },
    /// A peer matched one of our discovery sessions
    Match {
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
        service_specific_info: Vec<u8>,
        match_filter: Vec<u8>,
    },
    /// A peer sent us a message on a session
    MessageReceived {
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
        payload: Vec<u8>,
    },
    /// The firmware ended a session on its own
    SessionTerminated {
        pub_sub_id: PubSubId,
        reason: Reason,
        is_publish: bool,
    },
    /// Cluster membership changed
    ClusterChange {
        event: ClusterEvent,
        mac: MacAddr,
    },
    /// Our discovery interface address rotated
    InterfaceAddressChange { mac: MacAddr },
    /// The radio went down
    NanDown { reason: Reason },
}

// ----------------------------------------------------------------------------
// Service Message
// ----------------------------------------------------------------------------

/// The single input type of the dispatch loop.
pub enum ServiceMessage {
    Command(Command),
    Response(DriverResponse),
    Notification(DriverNotification),
    TimerFired { tag: TimerTag, generation: u64 },
}
