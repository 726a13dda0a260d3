//! Recording test doubles
//!
//! Substitutes for every external seam of the engine, each one logging what
//! was asked of it into shared state a test can inspect. Together with the
//! manual timer scheduler these make the whole engine drivable synchronously:
//! post a message, look at the recorded driver calls, post the scripted
//! response.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aware_core::{
    AwareDriver, ClientId, ClientListener, ConfigRequest, DataPathManager, MacAddr, MessageId,
    PeerId, PubSubId, PublishConfig, RangingId, Reason, RttParams, RttRanging, SessionId,
    SessionListener, SubscribeConfig, TransactionId, UsageBroadcast,
};

use crate::channel::ServiceMessage;
use crate::timer::{TimerScheduler, TimerTag};

// ----------------------------------------------------------------------------
// Recording Driver
// ----------------------------------------------------------------------------

/// One recorded driver invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    GetCapabilities {
        transaction_id: TransactionId,
    },
    EnableAndConfigure {
        transaction_id: TransactionId,
        config: ConfigRequest,
        notify_identity_change: bool,
    },
    Disable {
        transaction_id: TransactionId,
    },
    Deinit,
    Publish {
        transaction_id: TransactionId,
        publish_id: Option<PubSubId>,
        config: PublishConfig,
    },
    Subscribe {
        transaction_id: TransactionId,
        subscribe_id: Option<PubSubId>,
        config: SubscribeConfig,
    },
    StopPublish {
        transaction_id: TransactionId,
        publish_id: PubSubId,
    },
    StopSubscribe {
        transaction_id: TransactionId,
        subscribe_id: PubSubId,
    },
    SendMessage {
        transaction_id: TransactionId,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        dest: MacAddr,
        payload: Vec<u8>,
        message_id: MessageId,
    },
}

/// Shared view onto the calls a [`RecordingDriver`] has seen.
#[derive(Clone)]
pub struct DriverLog {
    calls: Arc<Mutex<Vec<DriverCall>>>,
    accept: Arc<AtomicBool>,
}

impl DriverLog {
    /// Drain and return everything recorded since the last take.
    pub fn take(&self) -> Vec<DriverCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Number of recorded calls without draining them.
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().unwrap().is_empty()
    }

    /// Make every subsequent driver call report refusal.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }
}

/// Driver double that records every command and answers with a configurable
/// accept flag (true unless changed).
pub struct RecordingDriver {
    log: DriverLog,
}

impl RecordingDriver {
    pub fn new() -> (Self, DriverLog) {
        let log = DriverLog {
            calls: Arc::new(Mutex::new(Vec::new())),
            accept: Arc::new(AtomicBool::new(true)),
        };
        (Self { log: log.clone() }, log)
    }

    fn record(&mut self, call: DriverCall) -> bool {
        self.log.calls.lock().unwrap().push(call);
        self.log.accept.load(Ordering::SeqCst)
    }
}

impl AwareDriver for RecordingDriver {
    fn get_capabilities(&mut self, transaction_id: TransactionId) -> bool {
        self.record(DriverCall::GetCapabilities { transaction_id })
    }

    fn enable_and_configure(
        &mut self,
        transaction_id: TransactionId,
        config: &ConfigRequest,
        notify_identity_change: bool,
    ) -> bool {
        self.record(DriverCall::EnableAndConfigure {
            transaction_id,
            config: config.clone(),
            notify_identity_change,
        })
    }

    fn disable(&mut self, transaction_id: TransactionId) -> bool {
        self.record(DriverCall::Disable { transaction_id })
    }

    fn deinit(&mut self) {
        self.record(DriverCall::Deinit);
    }

    fn publish(
        &mut self,
        transaction_id: TransactionId,
        publish_id: Option<PubSubId>,
        config: &PublishConfig,
    ) -> bool {
        self.record(DriverCall::Publish {
            transaction_id,
            publish_id,
            config: config.clone(),
        })
    }

    fn subscribe(
        &mut self,
        transaction_id: TransactionId,
        subscribe_id: Option<PubSubId>,
        config: &SubscribeConfig,
    ) -> bool {
        self.record(DriverCall::Subscribe {
            transaction_id,
            subscribe_id,
            config: config.clone(),
        })
    }

    fn stop_publish(&mut self, transaction_id: TransactionId, publish_id: PubSubId) -> bool {
        self.record(DriverCall::StopPublish {
            transaction_id,
            publish_id,
        })
    }

    fn stop_subscribe(&mut self, transaction_id: TransactionId, subscribe_id: PubSubId) -> bool {
        self.record(DriverCall::StopSubscribe {
            transaction_id,
            subscribe_id,
        })
    }

    fn send_message(
        &mut self,
        transaction_id: TransactionId,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        dest: MacAddr,
        payload: &[u8],
        message_id: MessageId,
    ) -> bool {
        self.record(DriverCall::SendMessage {
            transaction_id,
            pub_sub_id,
            requestor_id,
            dest,
            payload: payload.to_vec(),
            message_id,
        })
    }
}

// ----------------------------------------------------------------------------
// Recording Listeners
// ----------------------------------------------------------------------------

/// Events a client listener observed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ConnectSuccess,
    ConnectFail(Reason),
    IdentityChanged,
    Down(Reason),
}

/// Client listener that appends every callback to a shared list.
#[derive(Default)]
pub struct RecordingClientListener {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingClientListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain and return everything recorded since the last take.
    pub fn take_events(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl ClientListener for RecordingClientListener {
    fn on_connect_success(&self) {
        self.events.lock().unwrap().push(ClientEvent::ConnectSuccess);
    }

    fn on_connect_fail(&self, reason: Reason) {
        self.events
            .lock()
            .unwrap()
            .push(ClientEvent::ConnectFail(reason));
    }

    fn on_identity_changed(&self) {
        self.events
            .lock()
            .unwrap()
            .push(ClientEvent::IdentityChanged);
    }

    fn on_down(&self, reason: Reason) {
        self.events.lock().unwrap().push(ClientEvent::Down(reason));
    }
}

/// Events a session listener observed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started(SessionId),
    ConfigSuccess,
    ConfigFail(Reason),
    Terminated(Reason),
    Match {
        peer_id: PeerId,
        service_specific_info: Vec<u8>,
        match_filter: Vec<u8>,
    },
    MessageReceived {
        peer_id: PeerId,
        payload: Vec<u8>,
    },
    SendSuccess(MessageId),
    SendFail(MessageId, Reason),
}

/// Session listener that appends every callback to a shared list.
#[derive(Default)]
pub struct RecordingSessionListener {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSessionListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain and return everything recorded since the last take.
    pub fn take_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// The session id from a recorded `Started` event, consuming nothing.
    pub fn started_session_id(&self) -> Option<SessionId> {
        self.events.lock().unwrap().iter().find_map(|event| {
            if let SessionEvent::Started(id) = event {
                Some(*id)
            } else {
                None
            }
        })
    }
}

impl SessionListener for RecordingSessionListener {
    fn on_session_started(&self, session_id: SessionId) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::Started(session_id));
    }

    fn on_session_config_success(&self) {
        self.events.lock().unwrap().push(SessionEvent::ConfigSuccess);
    }

    fn on_session_config_fail(&self, reason: Reason) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::ConfigFail(reason));
    }

    fn on_session_terminated(&self, reason: Reason) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::Terminated(reason));
    }

    fn on_match(&self, peer_id: PeerId, service_specific_info: &[u8], match_filter: &[u8]) {
        self.events.lock().unwrap().push(SessionEvent::Match {
            peer_id,
            service_specific_info: service_specific_info.to_vec(),
            match_filter: match_filter.to_vec(),
        });
    }

    fn on_message_received(&self, peer_id: PeerId, message: &[u8]) {
        self.events.lock().unwrap().push(SessionEvent::MessageReceived {
            peer_id,
            payload: message.to_vec(),
        });
    }

    fn on_message_send_success(&self, message_id: MessageId) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::SendSuccess(message_id));
    }

    fn on_message_send_fail(&self, message_id: MessageId, reason: Reason) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::SendFail(message_id, reason));
    }
}

// ----------------------------------------------------------------------------
// Recording Platform Seams
// ----------------------------------------------------------------------------

/// One recorded data-path manager invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPathCall {
    CreateAllInterfaces,
    DeleteAllInterfaces,
    CleanupDataPaths,
}

/// Shared view onto recorded data-path calls.
#[derive(Clone, Default)]
pub struct DataPathLog {
    calls: Arc<Mutex<Vec<DataPathCall>>>,
}

impl DataPathLog {
    pub fn take(&self) -> Vec<DataPathCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

/// Data-path manager double.
#[derive(Default)]
pub struct RecordingDataPath {
    log: DataPathLog,
}

impl RecordingDataPath {
    pub fn new() -> (Self, DataPathLog) {
        let log = DataPathLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl DataPathManager for RecordingDataPath {
    fn create_all_interfaces(&mut self) {
        self.log
            .calls
            .lock()
            .unwrap()
            .push(DataPathCall::CreateAllInterfaces);
    }

    fn delete_all_interfaces(&mut self) {
        self.log
            .calls
            .lock()
            .unwrap()
            .push(DataPathCall::DeleteAllInterfaces);
    }

    fn cleanup_data_paths(&mut self) {
        self.log
            .calls
            .lock()
            .unwrap()
            .push(DataPathCall::CleanupDataPaths);
    }
}

/// Shared view onto recorded ranging requests.
#[derive(Clone, Default)]
pub struct RttLog {
    calls: Arc<Mutex<Vec<(RangingId, ClientId, Vec<RttParams>)>>>,
}

impl RttLog {
    pub fn take(&self) -> Vec<(RangingId, ClientId, Vec<RttParams>)> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

/// RTT seam double.
#[derive(Default)]
pub struct RecordingRtt {
    log: RttLog,
}

impl RecordingRtt {
    pub fn new() -> (Self, RttLog) {
        let log = RttLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl RttRanging for RecordingRtt {
    fn start_ranging(&mut self, ranging_id: RangingId, client_id: ClientId, params: Vec<RttParams>) {
        self.log
            .calls
            .lock()
            .unwrap()
            .push((ranging_id, client_id, params));
    }
}

/// Shared view onto recorded usage broadcasts.
#[derive(Clone, Default)]
pub struct BroadcastLog {
    events: Arc<Mutex<Vec<bool>>>,
}

impl BroadcastLog {
    pub fn take(&self) -> Vec<bool> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

/// Usage broadcast double.
#[derive(Default)]
pub struct RecordingBroadcast {
    log: BroadcastLog,
}

impl RecordingBroadcast {
    pub fn new() -> (Self, BroadcastLog) {
        let log = BroadcastLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl UsageBroadcast for RecordingBroadcast {
    fn usage_changed(&mut self, enabled: bool) {
        self.log.events.lock().unwrap().push(enabled);
    }
}

// ----------------------------------------------------------------------------
// Manual Timers
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    generation: u64,
    after: Duration,
}

/// Shared view onto the manually-driven timers; the test's alarm manager.
#[derive(Clone, Default)]
pub struct TimerLog {
    armed: Arc<Mutex<HashMap<TimerTag, ArmedTimer>>>,
}

impl TimerLog {
    /// Whether a timer is currently armed.
    pub fn is_armed(&self, tag: TimerTag) -> bool {
        self.armed.lock().unwrap().contains_key(&tag)
    }

    /// The delay the engine requested when arming, if armed.
    pub fn armed_after(&self, tag: TimerTag) -> Option<Duration> {
        self.armed.lock().unwrap().get(&tag).map(|timer| timer.after)
    }

    /// Fire an armed timer: consumes it and returns the message the real
    /// scheduler would have posted, or None if nothing was armed.
    pub fn fire(&self, tag: TimerTag) -> Option<ServiceMessage> {
        self.armed
            .lock()
            .unwrap()
            .remove(&tag)
            .map(|timer| ServiceMessage::TimerFired {
                tag,
                generation: timer.generation,
            })
    }
}

/// Scheduler double driven by the test instead of a clock.
#[derive(Default)]
pub struct ManualTimers {
    log: TimerLog,
}

impl ManualTimers {
    pub fn new() -> (Self, TimerLog) {
        let log = TimerLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl TimerScheduler for ManualTimers {
    fn arm(&mut self, tag: TimerTag, generation: u64, after: Duration) {
        self.log
            .armed
            .lock()
            .unwrap()
            .insert(tag, ArmedTimer { generation, after });
    }

    fn cancel(&mut self, tag: TimerTag) {
        self.log.armed.lock().unwrap().remove(&tag);
    }
}
