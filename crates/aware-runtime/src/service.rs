//! Service handle
//!
//! [`AwareService`] spawns the dispatch task and is the process-wide entry
//! point: applications call the command methods, the driver binding posts its
//! responses and notifications through a [`DriverNotifier`]. Both sides only
//! enqueue messages; handler logic always runs on the dispatch task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use aware_core::{
    AwareDriver, AwareError, AwareResult, Capabilities, ClientId, ClientListener, ClusterEvent,
    ConfigRequest, DataPathManager, MacAddr, MessageId, PeerId, PubSubId, PublishConfig,
    RangingId, Reason, RttParams, RttRanging, SessionId, SessionListener, SubscribeConfig,
    TransactionId, UsageBroadcast,
};

use crate::channel::{Command, DriverNotification, DriverResponse, ServiceMessage};
use crate::logic::{ServiceTask, StateManager};
use crate::timer::TokioTimers;

// ----------------------------------------------------------------------------
// Aware Service
// ----------------------------------------------------------------------------

/// Handle to a running Aware engine.
pub struct AwareService {
    sender: UnboundedSender<ServiceMessage>,
    usage_flag: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl AwareService {
    /// Wire up the engine and spawn its dispatch task on the current tokio
    /// runtime.
    pub fn spawn(
        driver: Box<dyn AwareDriver>,
        data_path: Box<dyn DataPathManager>,
        rtt: Box<dyn RttRanging>,
        broadcast: Box<dyn UsageBroadcast>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let timers = Box::new(TokioTimers::new(sender.clone()));
        let manager = StateManager::new(driver, data_path, rtt, broadcast, timers);
        let usage_flag = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(ServiceTask::new(manager, receiver, usage_flag.clone()).run());
        Self {
            sender,
            usage_flag,
            task,
        }
    }

    fn post(&self, message: ServiceMessage) -> AwareResult<()> {
        self.sender
            .send(message)
            .map_err(|_| AwareError::ChannelClosed)
    }

    fn command(&self, command: Command) -> AwareResult<()> {
        self.post(ServiceMessage::Command(command))
    }

    // --------------------------------------------------------------------
    // Application API
    // --------------------------------------------------------------------

    pub fn enable_usage(&self) -> AwareResult<()> {
        self.command(Command::EnableUsage)
    }

    pub fn disable_usage(&self) -> AwareResult<()> {
        self.command(Command::DisableUsage)
    }

    /// Whether the service is currently usable, as of the last processed
    /// message.
    pub fn is_usage_enabled(&self) -> bool {
        self.usage_flag.load(Ordering::SeqCst)
    }

    pub fn connect(
        &self,
        client_id: ClientId,
        uid: u32,
        listener: Arc<dyn ClientListener>,
        request: ConfigRequest,
    ) -> AwareResult<()> {
        self.command(Command::Connect {
            client_id,
            uid,
            listener,
            request,
        })
    }

    pub fn disconnect(&self, client_id: ClientId) -> AwareResult<()> {
        self.command(Command::Disconnect { client_id })
    }

    pub fn publish(
        &self,
        client_id: ClientId,
        config: PublishConfig,
        listener: Arc<dyn SessionListener>,
    ) -> AwareResult<()> {
        self.command(Command::Publish {
            client_id,
            config,
            listener,
        })
    }

    pub fn update_publish(
        &self,
        client_id: ClientId,
        session_id: SessionId,
        config: PublishConfig,
    ) -> AwareResult<()> {
        self.command(Command::UpdatePublish {
            client_id,
            session_id,
            config,
        })
    }

    pub fn subscribe(
        &self,
        client_id: ClientId,
        config: SubscribeConfig,
        listener: Arc<dyn SessionListener>,
    ) -> AwareResult<()> {
        self.command(Command::Subscribe {
            client_id,
            config,
            listener,
        })
    }

    pub fn update_subscribe(
        &self,
        client_id: ClientId,
        session_id: SessionId,
        config: SubscribeConfig,
    ) -> AwareResult<()> {
        self.command(Command::UpdateSubscribe {
            client_id,
            session_id,
            config,
        })
    }

    pub fn terminate_session(
        &self,
        client_id: ClientId,
        session_id: SessionId,
    ) -> AwareResult<()> {
        self.command(Command::TerminateSession {
            client_id,
            session_id,
        })
    }

    pub fn send_message(
        &self,
        client_id: ClientId,
        session_id: SessionId,
        peer_id: PeerId,
        payload: Vec<u8>,
        message_id: MessageId,
        retry_count: u32,
    ) -> AwareResult<()> {
        self.command(Command::SendMessage {
            client_id,
            session_id,
            peer_id,
            payload,
            message_id,
            retry_count,
        })
    }

    pub fn start_ranging(
        &self,
        client_id: ClientId,
        session_id: SessionId,
        params: Vec<RttParams>,
        ranging_id: RangingId,
    ) -> AwareResult<()> {
        self.command(Command::StartRanging {
            client_id,
            session_id,
            params,
            ranging_id,
        })
    }

    /// Entry points for the driver binding.
    pub fn notifier(&self) -> DriverNotifier {
        DriverNotifier {
            sender: self.sender.clone(),
        }
    }

    /// Stop accepting input and wait for the dispatch task to drain.
    pub async fn shutdown(self) {
        let AwareService { sender, task, .. } = self;
        drop(sender);
        let _ = task.await;
    }
}

// ----------------------------------------------------------------------------
// Driver Notifier
// ----------------------------------------------------------------------------

/// Posts driver responses and notifications into the dispatch loop. Cloneable
/// and cheap; the driver binding holds one.
#[derive(Clone)]
pub struct DriverNotifier {
    sender: UnboundedSender<ServiceMessage>,
}

impl DriverNotifier {
    fn post(&self, message: ServiceMessage) -> AwareResult<()> {
        self.sender
            .send(message)
            .map_err(|_| AwareError::ChannelClosed)
    }

    fn response(&self, response: DriverResponse) -> AwareResult<()> {
        self.post(ServiceMessage::Response(response))
    }

    fn notification(&self, notification: DriverNotification) -> AwareResult<()> {
        self.post(ServiceMessage::Notification(notification))
    }

    pub fn on_capabilities_update_response(
        &self,
        transaction_id: TransactionId,
        capabilities: Capabilities,
    ) -> AwareResult<()> {
        self.response(DriverResponse::CapabilitiesUpdate {
            transaction_id,
            capabilities,
        })
    }

    pub fn on_config_success_response(&self, transaction_id: TransactionId) -> AwareResult<()> {
        self.response(DriverResponse::ConfigSuccess { transaction_id })
    }

    pub fn on_config_failed_response(
        &self,
        transaction_id: TransactionId,
        reason: Reason,
    ) -> AwareResult<()> {
        self.response(DriverResponse::ConfigFailed {
            transaction_id,
            reason,
        })
    }

    pub fn on_session_config_success_response(
        &self,
        transaction_id: TransactionId,
        is_publish: bool,
        pub_sub_id: PubSubId,
    ) -> AwareResult<()> {
        self.response(DriverResponse::SessionConfigSuccess {
            transaction_id,
            is_publish,
            pub_sub_id,
        })
    }

    pub fn on_session_config_fail_response(
        &self,
        transaction_id: TransactionId,
        is_publish: bool,
        reason: Reason,
    ) -> AwareResult<()> {
        self.response(DriverResponse::SessionConfigFail {
            transaction_id,
            is_publish,
            reason,
        })
    }

    pub fn on_message_send_queued_success_response(
        &self,
        transaction_id: TransactionId,
    ) -> AwareResult<()> {
        self.response(DriverResponse::MessageSendQueuedSuccess { transaction_id })
    }

    pub fn on_message_send_queued_fail_response(
        &self,
        transaction_id: TransactionId,
        reason: Reason,
    ) -> AwareResult<()> {
        self.response(DriverResponse::MessageSendQueuedFail {
            transaction_id,
            reason,
        })
    }

    pub fn on_message_send_success_notification(
        &self,
        transaction_id: TransactionId,
    ) -> AwareResult<()> {
        self.notification(DriverNotification::MessageSendSuccess { transaction_id })
    }

    pub fn on_message_send_fail_notification(
        &self,
        transaction_id: TransactionId,
        reason: Reason,
    ) -> AwareResult<()> {
        self.notification(DriverNotification::MessageSendFail {
            transaction_id,
            reason,
        })
    }

    pub fn on_match_notification(
        &self,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
        service_specific_info: Vec<u8>,
        match_filter: Vec<u8>,
    ) -> AwareResult<()> {
        self.notification(DriverNotification::Match {
            pub_sub_id,
            requestor_id,
            peer_mac,
            service_specific_info,
            match_filter,
        })
    }

    pub fn on_message_received_notification(
        &self,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
        payload: Vec<u8>,
    ) -> AwareResult<()> {
        self.notification(DriverNotification::MessageReceived {
            pub_sub_id,
            requestor_id,
            peer_mac,
            payload,
        })
    }

    pub fn on_session_terminated_notification(
        &self,
        pub_sub_id: PubSubId,
        reason: Reason,
        is_publish: bool,
    ) -> AwareResult<()> {
        self.notification(DriverNotification::SessionTerminated {
            pub_sub_id,
            reason,
            is_publish,
        })
    }

    pub fn on_cluster_change_notification(
        &self,
        event: ClusterEvent,
        mac: MacAddr,
    ) -> AwareResult<()> {
        self.notification(DriverNotification::ClusterChange { event, mac })
    }

    pub fn on_interface_address_change_notification(&self, mac: MacAddr) -> AwareResult<()> {
        self.notification(DriverNotification::InterfaceAddressChange { mac })
    }

    pub fn on_nan_down_notification(&self, reason: Reason) -> AwareResult<()> {
        self.notification(DriverNotification::NanDown { reason })
    }
}
