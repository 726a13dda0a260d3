//! Engine state owned by the dispatch loop
//!
//! A single [`StateManager`] value holds every piece of mutable state plus
//! the seams to the driver and the platform. Nothing outside the dispatch
//! loop ever touches it, so there is no locking anywhere in the engine.

use std::collections::{HashMap, HashSet, VecDeque};

use aware_core::{
    AwareDriver, Capabilities, ClientId, ClientState, ConfigRequest, DataPathManager, RttRanging,
    SendMessageQueue, SessionId, TransactionId, TransactionRegistry, UsageBroadcast,
};
#[cfg(any(test, feature = "test-utils"))]
use aware_core::MessageId;

use crate::channel::Command;
use crate::timer::TimerScheduler;

/// Firmware window used until capabilities have been fetched.
pub(crate) const DEFAULT_SEND_WINDOW: usize = 1;

// ----------------------------------------------------------------------------
// State Manager
// ----------------------------------------------------------------------------

/// The engine: all state, all policy, one thread.
pub struct StateManager {
    pub(crate) driver: Box<dyn AwareDriver>,
    pub(crate) data_path: Box<dyn DataPathManager>,
    pub(crate) rtt: Box<dyn RttRanging>,
    pub(crate) broadcast: Box<dyn UsageBroadcast>,
    pub(crate) timers: Box<dyn TimerScheduler>,

    /// Policy bit flipped by enableUsage/disableUsage
    pub(crate) usage_enabled: bool,
    /// Fetched once after the first enable, immutable afterwards
    pub(crate) capabilities: Option<Capabilities>,
    /// Connected applications
    pub(crate) clients: HashMap<ClientId, ClientState>,
    /// Outstanding driver transactions
    pub(crate) registry: TransactionRegistry,
    /// Host FIFO plus firmware send window
    pub(crate) queue: SendMessageQueue,
    /// Configuration currently programmed into the radio
    pub(crate) current_config: Option<ConfigRequest>,
    /// The one transaction allowed in flight; set means WaitForResponse
    pub(crate) pending: Option<TransactionId>,
    /// Commands parked while a transaction is in flight
    pub(crate) parked: VecDeque<Command>,
    /// Clients whose disconnect arrived while their command was pending;
    /// responses for them complete silently
    pub(crate) pending_disconnects: HashSet<ClientId>,
    /// Next engine-assigned session id, strictly increasing for the process
    pub(crate) next_session_id: u32,

    pub(crate) command_timer_generation: u64,
    pub(crate) command_timer_armed: bool,
    pub(crate) send_timer_generation: u64,
    pub(crate) send_timer_armed: bool,
}

impl StateManager {
    pub fn new(
        driver: Box<dyn AwareDriver>,
        data_path: Box<dyn DataPathManager>,
        rtt: Box<dyn RttRanging>,
        broadcast: Box<dyn UsageBroadcast>,
        timers: Box<dyn TimerScheduler>,
    ) -> Self {
        Self {
            driver,
            data_path,
            rtt,
            broadcast,
            timers,
            usage_enabled: false,
            capabilities: None,
            clients: HashMap::new(),
            registry: TransactionRegistry::new(),
            queue: SendMessageQueue::new(DEFAULT_SEND_WINDOW),
            current_config: None,
            pending: None,
            parked: VecDeque::new(),
            pending_disconnects: HashSet::new(),
            next_session_id: 1,
            command_timer_generation: 0,
            command_timer_armed: false,
            send_timer_generation: 0,
            send_timer_armed: false,
        }
    }

    /// Whether the service is currently usable by applications.
    pub fn is_usage_enabled(&self) -> bool {
        self.usage_enabled
    }

    pub(crate) fn is_marked_for_disconnect(&self, client_id: ClientId) -> bool {
        self.pending_disconnects.contains(&client_id)
    }

    /// Hand out the next session id; strictly increasing for the process.
    pub(crate) fn allocate_session_id(&mut self) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        id
    }
}

// ----------------------------------------------------------------------------
// Introspection (test builds only)
// ----------------------------------------------------------------------------

#[cfg(any(test, feature = "test-utils"))]
impl StateManager {
    /// Snapshot of connected client ids.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn has_client(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Snapshot of a client's session ids.
    pub fn session_ids(&self, client_id: ClientId) -> Vec<SessionId> {
        self.clients
            .get(&client_id)
            .map(|client| client.session_ids())
            .unwrap_or_default()
    }

    pub fn has_session(&self, client_id: ClientId, session_id: SessionId) -> bool {
        self.clients
            .get(&client_id)
            .is_some_and(|client| client.session(session_id).is_some())
    }

    /// Snapshot of message ids anywhere in the send path.
    pub fn queued_message_ids(&self) -> Vec<MessageId> {
        self.queue.message_ids()
    }

    /// Number of messages currently sitting in the firmware window.
    pub fn in_flight_message_count(&self) -> usize {
        self.queue.in_flight_len()
    }

    /// Number of messages waiting on the host side.
    pub fn host_queued_message_count(&self) -> usize {
        self.queue.host_len()
    }

    /// Number of outstanding registry entries, including in-flight sends.
    pub fn outstanding_transactions(&self) -> usize {
        self.registry.len()
    }

    /// Whether the engine is idle with nothing parked.
    pub fn is_quiescent(&self) -> bool {
        self.pending.is_none() && self.parked.is_empty()
    }
}
