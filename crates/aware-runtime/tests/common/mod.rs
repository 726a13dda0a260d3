//! Shared fixture for driving the state machine synchronously
//!
//! Mirrors the way the engine runs in production, minus the loop: every
//! entry point posts a message and the fixture hands it straight to the
//! handler, so a test observes exactly one interleaving and can fire timers
//! by hand.

use std::sync::Arc;

use aware_core::{
    Capabilities, ClientId, ConfigRequest, PublishConfig, SubscribeConfig, TransactionId,
};
use aware_runtime::testing::{
    BroadcastLog, ClientEvent, DataPathLog, DriverCall, DriverLog, ManualTimers,
    RecordingBroadcast, RecordingClientListener, RecordingDataPath, RecordingDriver,
    RecordingRtt, RecordingSessionListener, RttLog, TimerLog,
};
use aware_runtime::{
    Command, DriverNotification, DriverResponse, ServiceMessage, StateManager, TimerTag,
};

pub struct Fixture {
    pub sm: StateManager,
    pub driver: DriverLog,
    pub data_path: DataPathLog,
    pub rtt: RttLog,
    pub broadcast: BroadcastLog,
    pub timers: TimerLog,
}

impl Fixture {
    pub fn new() -> Self {
        let (driver, driver_log) = RecordingDriver::new();
        let (data_path, data_path_log) = RecordingDataPath::new();
        let (rtt, rtt_log) = RecordingRtt::new();
        let (broadcast, broadcast_log) = RecordingBroadcast::new();
        let (timers, timer_log) = ManualTimers::new();
        let sm = StateManager::new(
            Box::new(driver),
            Box::new(data_path),
            Box::new(rtt),
            Box::new(broadcast),
            Box::new(timers),
        );
        Self {
            sm,
            driver: driver_log,
            data_path: data_path_log,
            rtt: rtt_log,
            broadcast: broadcast_log,
            timers: timer_log,
        }
    }

    pub fn cmd(&mut self, command: Command) {
        self.sm.handle(ServiceMessage::Command(command));
    }

    pub fn resp(&mut self, response: DriverResponse) {
        self.sm.handle(ServiceMessage::Response(response));
    }

    pub fn notif(&mut self, notification: DriverNotification) {
        self.sm.handle(ServiceMessage::Notification(notification));
    }

    /// Fire an armed timer the way the alarm source would. Returns whether
    /// anything was armed.
    pub fn fire_timer(&mut self, tag: TimerTag) -> bool {
        match self.timers.fire(tag) {
            Some(message) => {
                self.sm.handle(message);
                true
            }
            None => false,
        }
    }

    /// Enable usage and complete the capability fetch, discarding the
    /// broadcast and data-path traffic most tests do not care about.
    pub fn enable_with_capabilities(&mut self, capabilities: Capabilities) {
        self.cmd(Command::EnableUsage);
        let transaction_id = self.expect_get_capabilities();
        self.resp(DriverResponse::CapabilitiesUpdate {
            transaction_id,
            capabilities,
        });
        self.broadcast.take();
        self.data_path.take();
    }

    /// Connect a client through a successful enableAndConfigure exchange.
    pub fn connect_ok(
        &mut self,
        client_id: ClientId,
        uid: u32,
        listener: &Arc<RecordingClientListener>,
        request: ConfigRequest,
    ) {
        self.cmd(Command::Connect {
            client_id,
            uid,
            listener: listener.clone(),
            request,
        });
        let (transaction_id, _, _) = self.expect_enable_and_configure();
        self.resp(DriverResponse::ConfigSuccess { transaction_id });
        assert_eq!(listener.take_events(), vec![ClientEvent::ConnectSuccess]);
    }

    /// Start a subscribe session through a successful exchange; returns the
    /// engine-assigned session id.
    pub fn subscribe_ok(
        &mut self,
        client_id: ClientId,
        config: SubscribeConfig,
        listener: &Arc<RecordingSessionListener>,
        pub_sub_id: aware_core::PubSubId,
    ) -> aware_core::SessionId {
        self.cmd(Command::Subscribe {
            client_id,
            config,
            listener: listener.clone(),
        });
        let (transaction_id, subscribe_id, _) = self.expect_subscribe();
        assert_eq!(subscribe_id, None);
        self.resp(DriverResponse::SessionConfigSuccess {
            transaction_id,
            is_publish: false,
            pub_sub_id,
        });
        listener
            .started_session_id()
            .expect("session should have started")
    }

    /// Start a publish session through a successful exchange; returns the
    /// engine-assigned session id.
    pub fn publish_ok(
        &mut self,
        client_id: ClientId,
        config: PublishConfig,
        listener: &Arc<RecordingSessionListener>,
        pub_sub_id: aware_core::PubSubId,
    ) -> aware_core::SessionId {
        self.cmd(Command::Publish {
            client_id,
            config,
            listener: listener.clone(),
        });
        let (transaction_id, publish_id, _) = self.expect_publish();
        assert_eq!(publish_id, None);
        self.resp(DriverResponse::SessionConfigSuccess {
            transaction_id,
            is_publish: true,
            pub_sub_id,
        });
        listener
            .started_session_id()
            .expect("session should have started")
    }

    // --------------------------------------------------------------------
    // Driver-call captors
    // --------------------------------------------------------------------

    pub fn expect_get_capabilities(&mut self) -> TransactionId {
        match self.driver.take().as_slice() {
            [DriverCall::GetCapabilities { transaction_id }] => *transaction_id,
            other => panic!("expected getCapabilities, got {other:?}"),
        }
    }

    pub fn expect_enable_and_configure(&mut self) -> (TransactionId, ConfigRequest, bool) {
        match self.driver.take().as_slice() {
            [DriverCall::EnableAndConfigure {
                transaction_id,
                config,
                notify_identity_change,
            }] => (*transaction_id, config.clone(), *notify_identity_change),
            other => panic!("expected enableAndConfigure, got {other:?}"),
        }
    }

    pub fn expect_publish(
        &mut self,
    ) -> (TransactionId, Option<aware_core::PubSubId>, PublishConfig) {
        match self.driver.take().as_slice() {
            [DriverCall::Publish {
                transaction_id,
                publish_id,
                config,
            }] => (*transaction_id, *publish_id, config.clone()),
            other => panic!("expected publish, got {other:?}"),
        }
    }

    pub fn expect_subscribe(
        &mut self,
    ) -> (TransactionId, Option<aware_core::PubSubId>, SubscribeConfig) {
        match self.driver.take().as_slice() {
            [DriverCall::Subscribe {
                transaction_id,
                subscribe_id,
                config,
            }] => (*transaction_id, *subscribe_id, config.clone()),
            other => panic!("expected subscribe, got {other:?}"),
        }
    }

    /// Expect exactly one sendMessage call and return its transaction id and
    /// recorded form.
    pub fn expect_send_message(&mut self) -> (TransactionId, DriverCall) {
        match self.driver.take().as_slice() {
            [call @ DriverCall::SendMessage { transaction_id, .. }] => (*transaction_id, call.clone()),
            other => panic!("expected sendMessage, got {other:?}"),
        }
    }

    pub fn expect_no_driver_calls(&mut self) {
        let calls = self.driver.take();
        assert!(calls.is_empty(), "unexpected driver calls: {calls:?}");
    }
}
