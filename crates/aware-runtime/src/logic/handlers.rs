//! Command, response, notification, and timer handlers
//!
//! One handler per input, each running to completion. The discipline toward
//! the driver is "one command in flight": a command that needs the driver
//! while a transaction is outstanding parks in the command FIFO and is
//! re-evaluated on the next transition back to idle. Outbound messages ride
//! the same discipline for their queued response; their on-air results are
//! plain notifications and never block the loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use aware_core::{
    Capabilities, ClientId, ClientListener, ClientState, ConfigRequest, HostQueuedSend, MacAddr,
    MessageId, OpContext, PeerId, PubSubId, PublishConfig, RangingId, Reason, RttParams,
    SessionId, SessionKind, SessionListener, SessionState, SubscribeConfig, TransactionId,
};

use crate::channel::{Command, DriverNotification, DriverResponse, ServiceMessage};
use crate::timer::{TimerTag, COMMAND_TIMEOUT, SEND_MESSAGE_TIMEOUT};

use super::state::StateManager;

impl StateManager {
    /// Process one message from the dispatch loop.
    pub fn handle(&mut self, message: ServiceMessage) {
        match message {
            ServiceMessage::Command(command) => self.submit(command),
            ServiceMessage::Response(response) => {
                self.on_response(response);
                self.pump();
            }
            ServiceMessage::Notification(notification) => {
                self.on_notification(notification);
                self.pump();
            }
            ServiceMessage::TimerFired { tag, generation } => {
                self.on_timer_fired(tag, generation);
                self.pump();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Command intake and the idle pump
    // ------------------------------------------------------------------------

    fn submit(&mut self, command: Command) {
        debug!(command = command.label(), "command submitted");
        if self.pending.is_some() {
            if let Command::Disconnect { client_id } = &command {
                // Teardown defers until the outstanding transaction resolves;
                // in the meantime responses for this client complete silently.
                self.pending_disconnects.insert(*client_id);
            }
        }
        self.parked.push_back(command);
        self.pump();
    }

    /// Run parked commands and queued sends for as long as the engine is
    /// idle. Anything that starts a driver transaction stops the pump until
    /// the response or timeout brings it back here.
    fn pump(&mut self) {
        loop {
            if self.pending.is_some() {
                return;
            }
            if let Some(command) = self.parked.pop_front() {
                self.execute(command);
                continue;
            }
            if !self.submit_next_send() {
                return;
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::EnableUsage => self.cmd_enable_usage(),
            Command::DisableUsage => self.cmd_disable_usage(),
            Command::Connect {
                client_id,
                uid,
                listener,
                request,
            } => self.cmd_connect(client_id, uid, listener, request),
            Command::Disconnect { client_id } => self.cmd_disconnect(client_id),
            Command::Publish {
                client_id,
                config,
                listener,
            } => self.cmd_publish(client_id, config, listener),
            Command::UpdatePublish {
                client_id,
                session_id,
                config,
            } => self.cmd_update_publish(client_id, session_id, config),
            Command::Subscribe {
                client_id,
                config,
                listener,
            } => self.cmd_subscribe(client_id, config, listener),
            Command::UpdateSubscribe {
                client_id,
                session_id,
                config,
            } => self.cmd_update_subscribe(client_id, session_id, config),
            Command::TerminateSession {
                client_id,
                session_id,
            } => self.cmd_terminate_session(client_id, session_id),
            Command::SendMessage {
                client_id,
                session_id,
                peer_id,
                payload,
                message_id,
                retry_count,
            } => self.cmd_send_message(
                client_id, session_id, peer_id, payload, message_id, retry_count,
            ),
            Command::StartRanging {
                client_id,
                session_id,
                params,
                ranging_id,
            } => self.cmd_start_ranging(client_id, session_id, params, ranging_id),
        }
    }

    // ------------------------------------------------------------------------
    // Usage lifecycle
    // ------------------------------------------------------------------------

    fn cmd_enable_usage(&mut self) {
        if self.usage_enabled {
            return;
        }
        self.usage_enabled = true;
        info!("usage enabled");
        self.broadcast.usage_changed(true);

        // Capabilities are fetched once per process and reused on re-enable.
        if self.capabilities.is_none() {
            let transaction_id = self.registry.allocate();
            if self.driver.get_capabilities(transaction_id) {
                self.registry.register(transaction_id, OpContext::Capabilities);
                self.begin_wait(transaction_id);
            } else {
                warn!("driver rejected capability query");
            }
        }
    }

    fn cmd_disable_usage(&mut self) {
        if !self.usage_enabled {
            return;
        }
        self.usage_enabled = false;
        info!("usage disabled");
        self.driver.disable(TransactionId::NONE);
        self.driver.deinit();
        self.data_path.cleanup_data_paths();
        self.broadcast.usage_changed(false);
        self.data_path.delete_all_interfaces();
        self.reset_radio_state();
    }

    /// Drop every client, session, queued message, and pending transaction.
    /// Capabilities and the usage bit are left alone.
    fn reset_radio_state(&mut self) {
        self.clients.clear();
        self.registry.clear();
        self.queue.clear();
        self.current_config = None;
        self.pending = None;
        self.pending_disconnects.clear();
        if self.command_timer_armed {
            self.command_timer_armed = false;
            self.timers.cancel(TimerTag::Command);
        }
        if self.send_timer_armed {
            self.send_timer_armed = false;
            self.timers.cancel(TimerTag::SendMessage);
        }
    }

    // ------------------------------------------------------------------------
    // Client lifecycle
    // ------------------------------------------------------------------------

    fn cmd_connect(
        &mut self,
        client_id: ClientId,
        uid: u32,
        listener: Arc<dyn ClientListener>,
        request: ConfigRequest,
    ) {
        if !self.usage_enabled {
            // The app is expected to have observed the disabled broadcast.
            debug!(%client_id, "connect while usage disabled ignored");
            return;
        }
        if self.clients.contains_key(&client_id) {
            warn!(%client_id, "connect with duplicate client id ignored");
            return;
        }
        if !request.is_valid() {
            listener.on_connect_fail(Reason::InvalidArgs);
            return;
        }
        if let Some(active) = &self.current_config {
            if !request.compatible_with(active) {
                info!(%client_id, "rejecting client with incompatible configuration");
                listener.on_connect_fail(Reason::AlreadyConnectedIncompatConfig);
                return;
            }
        }

        let merged = self
            .clients
            .values()
            .map(|client| client.request())
            .fold(request.clone(), |acc, other| acc.merge(other));

        if self.current_config.as_ref() == Some(&merged) {
            // Nothing changes on the air; admit the client without touching
            // the driver.
            self.clients.insert(
                client_id,
                ClientState::new(client_id, uid, listener.clone(), request),
            );
            listener.on_connect_success();
            return;
        }

        let first_enable = self.current_config.is_none();
        let transaction_id = self.registry.allocate();
        if self
            .driver
            .enable_and_configure(transaction_id, &merged, first_enable)
        {
            self.registry.register(
                transaction_id,
                OpContext::Connect {
                    client_id,
                    uid,
                    listener,
                    request,
                    merged,
                },
            );
            self.begin_wait(transaction_id);
        } else {
            warn!(%client_id, "driver rejected configuration");
            listener.on_connect_fail(Reason::Other);
        }
    }

    fn cmd_disconnect(&mut self, client_id: ClientId) {
        self.pending_disconnects.remove(&client_id);
        let Some(client) = self.clients.remove(&client_id) else {
            debug!(%client_id, "disconnect for unknown client ignored");
            return;
        };
        info!(%client_id, "client disconnected");

        for session in client.sessions() {
            match session.kind() {
                SessionKind::Publish => {
                    self.driver
                        .stop_publish(TransactionId::NONE, session.pub_sub_id());
                }
                SessionKind::Subscribe => {
                    self.driver
                        .stop_subscribe(TransactionId::NONE, session.pub_sub_id());
                }
            }
        }

        for transaction_id in self.queue.purge_client(client_id) {
            self.registry.take(transaction_id);
        }
        self.sync_send_timer();

        if self.clients.is_empty() {
            self.current_config = None;
            self.driver.disable(TransactionId::NONE);
            self.driver.deinit();
            return;
        }

        let Some(merged) =
            ConfigRequest::merge_all(self.clients.values().map(|client| client.request()))
        else {
            return;
        };
        if self.current_config.as_ref() == Some(&merged) {
            return;
        }
        let transaction_id = self.registry.allocate();
        if self.driver.enable_and_configure(transaction_id, &merged, false) {
            self.registry
                .register(transaction_id, OpContext::Reconfigure { merged });
            self.begin_wait(transaction_id);
        } else {
            warn!("driver rejected reconfiguration after disconnect");
        }
    }

    // ------------------------------------------------------------------------
    // Discovery sessions
    // ------------------------------------------------------------------------

    fn cmd_publish(
        &mut self,
        client_id: ClientId,
        config: PublishConfig,
        listener: Arc<dyn SessionListener>,
    ) {
        if !self.clients.contains_key(&client_id) {
            warn!(%client_id, "publish for unknown client ignored");
            return;
        }
        if let Some(capabilities) = &self.capabilities {
            if let Err(err) = config.validate(capabilities) {
                warn!(%client_id, %err, "rejecting publish configuration");
                listener.on_session_config_fail(Reason::InvalidArgs);
                return;
            }
        }
        let transaction_id = self.registry.allocate();
        if self.driver.publish(transaction_id, None, &config) {
            self.registry.register(
                transaction_id,
                OpContext::StartSession {
                    client_id,
                    kind: SessionKind::Publish,
                    listener,
                },
            );
            self.begin_wait(transaction_id);
        } else {
            listener.on_session_config_fail(Reason::Other);
        }
    }

    fn cmd_subscribe(
        &mut self,
        client_id: ClientId,
        config: SubscribeConfig,
        listener: Arc<dyn SessionListener>,
    ) {
        if !self.clients.contains_key(&client_id) {
            warn!(%client_id, "subscribe for unknown client ignored");
            return;
        }
        if let Some(capabilities) = &self.capabilities {
            if let Err(err) = config.validate(capabilities) {
                warn!(%client_id, %err, "rejecting subscribe configuration");
                listener.on_session_config_fail(Reason::InvalidArgs);
                return;
            }
        }
        let transaction_id = self.registry.allocate();
        if self.driver.subscribe(transaction_id, None, &config) {
            self.registry.register(
                transaction_id,
                OpContext::StartSession {
                    client_id,
                    kind: SessionKind::Subscribe,
                    listener,
                },
            );
            self.begin_wait(transaction_id);
        } else {
            listener.on_session_config_fail(Reason::Other);
        }
    }

    fn cmd_update_publish(
        &mut self,
        client_id: ClientId,
        session_id: SessionId,
        config: PublishConfig,
    ) {
        let Some((listener, kind, pub_sub_id)) = self.session_snapshot(client_id, session_id)
        else {
            // Session may have been terminated under the app already; there
            // is nobody to fail to.
            warn!(%client_id, %session_id, "publish update for unknown session ignored");
            return;
        };
        if kind != SessionKind::Publish {
            listener.on_session_config_fail(Reason::Other);
            return;
        }
        if let Some(capabilities) = &self.capabilities {
            if config.validate(capabilities).is_err() {
                listener.on_session_config_fail(Reason::InvalidArgs);
                return;
            }
        }
        let transaction_id = self.registry.allocate();
        if self
            .driver
            .publish(transaction_id, Some(pub_sub_id), &config)
        {
            self.registry.register(
                transaction_id,
                OpContext::UpdateSession {
                    client_id,
                    session_id,
                },
            );
            self.begin_wait(transaction_id);
        } else {
            listener.on_session_config_fail(Reason::Other);
        }
    }

    fn cmd_update_subscribe(
        &mut self,
        client_id: ClientId,
        session_id: SessionId,
        config: SubscribeConfig,
    ) {
        let Some((listener, kind, pub_sub_id)) = self.session_snapshot(client_id, session_id)
        else {
            warn!(%client_id, %session_id, "subscribe update for unknown session ignored");
            return;
        };
        if kind != SessionKind::Subscribe {
            listener.on_session_config_fail(Reason::Other);
            return;
        }
        if let Some(capabilities) = &self.capabilities {
            if config.validate(capabilities).is_err() {
                listener.on_session_config_fail(Reason::InvalidArgs);
                return;
            }
        }
        let transaction_id = self.registry.allocate();
        if self
            .driver
            .subscribe(transaction_id, Some(pub_sub_id), &config)
        {
            self.registry.register(
                transaction_id,
                OpContext::UpdateSession {
                    client_id,
                    session_id,
                },
            );
            self.begin_wait(transaction_id);
        } else {
            listener.on_session_config_fail(Reason::Other);
        }
    }

    fn cmd_terminate_session(&mut self, client_id: ClientId, session_id: SessionId) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            warn!(%client_id, "terminate for unknown client ignored");
            return;
        };
        let Some(session) = client.remove_session(session_id) else {
            debug!(%client_id, %session_id, "terminate for unknown session ignored");
            return;
        };
        for transaction_id in self.queue.purge_session(session_id) {
            self.registry.take(transaction_id);
        }
        self.sync_send_timer();
        match session.kind() {
            SessionKind::Publish => {
                self.driver
                    .stop_publish(TransactionId::NONE, session.pub_sub_id());
            }
            SessionKind::Subscribe => {
                self.driver
                    .stop_subscribe(TransactionId::NONE, session.pub_sub_id());
            }
        }
    }

    fn session_snapshot(
        &self,
        client_id: ClientId,
        session_id: SessionId,
    ) -> Option<(Arc<dyn SessionListener>, SessionKind, PubSubId)> {
        let session = self.clients.get(&client_id)?.session(session_id)?;
        Some((
            session.listener().clone(),
            session.kind(),
            session.pub_sub_id(),
        ))
    }

    // ------------------------------------------------------------------------
    // Outbound messages
    // ------------------------------------------------------------------------

    fn cmd_send_message(
        &mut self,
        client_id: ClientId,
        session_id: SessionId,
        peer_id: PeerId,
        payload: Vec<u8>,
        message_id: MessageId,
        retry_count: u32,
    ) {
        {
            let Some(client) = self.clients.get(&client_id) else {
                warn!(%client_id, "send for unknown client ignored");
                return;
            };
            let Some(session) = client.session(session_id) else {
                warn!(%client_id, %session_id, "send for unknown session ignored");
                return;
            };
            if session.peer_mac(peer_id).is_none() {
                session
                    .listener()
                    .on_message_send_fail(message_id, Reason::NoMatchSession);
                return;
            }
        }
        self.queue.enqueue(HostQueuedSend {
            client_id,
            session_id,
            peer_id,
            payload,
            message_id,
            retries_left: retry_count,
        });
    }

    /// Submit the head of the host queue if the firmware window has room.
    /// Returns whether the pump should keep going.
    fn submit_next_send(&mut self) -> bool {
        let Some(message) = self.queue.pop_ready() else {
            return false;
        };
        let snapshot = self
            .clients
            .get(&message.client_id)
            .and_then(|client| client.session(message.session_id))
            .map(|session| {
                (
                    session.listener().clone(),
                    session.pub_sub_id(),
                    session.peer_mac(message.peer_id),
                )
            });
        let Some((listener, pub_sub_id, mac)) = snapshot else {
            debug!("queued message for vanished session dropped");
            return true;
        };
        // Resolve the address at transmit time so identity rotations between
        // enqueue and submit are picked up.
        let Some(mac) = mac else {
            listener.on_message_send_fail(message.message_id, Reason::NoMatchSession);
            return true;
        };
        let transaction_id = self.registry.allocate();
        if self.driver.send_message(
            transaction_id,
            pub_sub_id,
            message.peer_id,
            mac,
            &message.payload,
            message.message_id,
        ) {
            self.registry
                .register(transaction_id, OpContext::Send { message });
            self.begin_wait(transaction_id);
        } else {
            warn!("driver refused message dispatch");
            listener.on_message_send_fail(message.message_id, Reason::TxFail);
        }
        true
    }

    // ------------------------------------------------------------------------
    // Ranging
    // ------------------------------------------------------------------------

    fn cmd_start_ranging(
        &mut self,
        client_id: ClientId,
        session_id: SessionId,
        params: Vec<RttParams>,
        ranging_id: RangingId,
    ) {
        let resolved = {
            let Some(client) = self.clients.get(&client_id) else {
                warn!(%client_id, "ranging for unknown client ignored");
                return;
            };
            let Some(session) = client.session(session_id) else {
                warn!(%client_id, %session_id, "ranging for unknown session ignored");
                return;
            };
            params
                .into_iter()
                .map(|param| RttParams {
                    peer_id: param.peer_id,
                    peer_mac: session.peer_mac(param.peer_id),
                })
                .collect()
        };
        self.rtt.start_ranging(ranging_id, client_id, resolved);
    }

    // ------------------------------------------------------------------------
    // Driver responses
    // ------------------------------------------------------------------------

    fn on_response(&mut self, response: DriverResponse) {
        match response {
            DriverResponse::CapabilitiesUpdate {
                transaction_id,
                capabilities,
            } => self.on_capabilities_update(transaction_id, capabilities),
            DriverResponse::ConfigSuccess { transaction_id } => {
                self.on_config_result(transaction_id, Ok(()))
            }
            DriverResponse::ConfigFailed {
                transaction_id,
                reason,
            } => self.on_config_result(transaction_id, Err(reason)),
            DriverResponse::SessionConfigSuccess {
                transaction_id,
                is_publish,
                pub_sub_id,
            } => self.on_session_config_result(transaction_id, is_publish, Ok(pub_sub_id)),
            DriverResponse::SessionConfigFail {
                transaction_id,
                is_publish,
                reason,
            } => self.on_session_config_result(transaction_id, is_publish, Err(reason)),
            DriverResponse::MessageSendQueuedSuccess { transaction_id } => {
                self.on_message_queued_success(transaction_id)
            }
            DriverResponse::MessageSendQueuedFail {
                transaction_id,
                reason,
            } => self.on_message_queued_fail(transaction_id, reason),
        }
    }

    fn on_capabilities_update(&mut self, transaction_id: TransactionId, capabilities: Capabilities) {
        if self
            .registry
            .take_if(transaction_id, |ctx| matches!(ctx, OpContext::Capabilities))
            .is_none()
        {
            warn!(%transaction_id, "capabilities response for unknown transaction dropped");
            return;
        }
        info!("firmware capabilities recorded");
        self.queue
            .set_capacity(capabilities.max_queued_transmit_messages as usize);
        self.capabilities = Some(capabilities);
        self.data_path.create_all_interfaces();
        self.finish_wait(transaction_id);
    }

    fn on_config_result(&mut self, transaction_id: TransactionId, result: Result<(), Reason>) {
        let context = self.registry.take_if(transaction_id, |ctx| {
            matches!(
                ctx,
                OpContext::Connect { .. } | OpContext::Reconfigure { .. }
            )
        });
        let Some(context) = context else {
            warn!(%transaction_id, "config response for unknown transaction dropped");
            return;
        };
        match context {
            OpContext::Connect {
                client_id,
                uid,
                listener,
                request,
                merged,
            } => match result {
                Ok(()) => {
                    self.current_config = Some(merged);
                    self.clients.insert(
                        client_id,
                        ClientState::new(client_id, uid, listener.clone(), request),
                    );
                    if !self.is_marked_for_disconnect(client_id) {
                        listener.on_connect_success();
                    }
                }
                Err(reason) => {
                    if !self.is_marked_for_disconnect(client_id) {
                        listener.on_connect_fail(reason);
                    }
                }
            },
            OpContext::Reconfigure { merged } => match result {
                Ok(()) => self.current_config = Some(merged),
                Err(reason) => warn!(%reason, "reconfiguration failed"),
            },
            _ => {}
        }
        self.finish_wait(transaction_id);
    }

    fn on_session_config_result(
        &mut self,
        transaction_id: TransactionId,
        is_publish: bool,
        result: Result<PubSubId, Reason>,
    ) {
        let kind = SessionKind::from_is_publish(is_publish);
        let context = self.registry.take_if(transaction_id, |ctx| match ctx {
            OpContext::StartSession { kind: pending, .. } => *pending == kind,
            OpContext::UpdateSession { .. } => true,
            _ => false,
        });
        let Some(context) = context else {
            warn!(%transaction_id, "session response for unknown transaction dropped");
            return;
        };
        match context {
            OpContext::StartSession {
                client_id,
                kind,
                listener,
            } => match result {
                Ok(pub_sub_id) => {
                    let session_id = self.allocate_session_id();
                    if let Some(client) = self.clients.get_mut(&client_id) {
                        client.add_session(SessionState::new(
                            session_id,
                            pub_sub_id,
                            kind,
                            listener.clone(),
                        ));
                        if !self.is_marked_for_disconnect(client_id) {
                            listener.on_session_started(session_id);
                        }
                    } else {
                        // The owner is gone; nobody is listening, stop the
                        // session right back in the driver.
                        match kind {
                            SessionKind::Publish => {
                                self.driver.stop_publish(TransactionId::NONE, pub_sub_id);
                            }
                            SessionKind::Subscribe => {
                                self.driver.stop_subscribe(TransactionId::NONE, pub_sub_id);
                            }
                        }
                    }
                }
                Err(reason) => {
                    if !self.is_marked_for_disconnect(client_id) {
                        listener.on_session_config_fail(reason);
                    }
                }
            },
            OpContext::UpdateSession {
                client_id,
                session_id,
            } => {
                let listener = self
                    .clients
                    .get(&client_id)
                    .and_then(|client| client.session(session_id))
                    .map(|session| session.listener().clone());
                if let Some(listener) = listener {
                    if !self.is_marked_for_disconnect(client_id) {
                        match result {
                            Ok(_) => listener.on_session_config_success(),
                            Err(reason) => listener.on_session_config_fail(reason),
                        }
                    }
                }
            }
            _ => {}
        }
        self.finish_wait(transaction_id);
    }

    fn on_message_queued_success(&mut self, transaction_id: TransactionId) {
        let context = self
            .registry
            .take_if(transaction_id, |ctx| matches!(ctx, OpContext::Send { .. }));
        let Some(OpContext::Send { message }) = context else {
            warn!(%transaction_id, "queued response for unknown transaction dropped");
            return;
        };
        let session_alive = self
            .clients
            .get(&message.client_id)
            .is_some_and(|client| client.session(message.session_id).is_some());
        if session_alive {
            let was_empty = self.queue.in_flight_is_empty();
            self.registry.register(
                transaction_id,
                OpContext::SendInFlight {
                    client_id: message.client_id,
                    session_id: message.session_id,
                    message_id: message.message_id,
                },
            );
            self.queue.mark_in_flight(transaction_id, message);
            if was_empty {
                self.arm_send_timer();
            }
        } else {
            debug!("queued message for vanished session dropped");
        }
        self.finish_wait(transaction_id);
    }

    fn on_message_queued_fail(&mut self, transaction_id: TransactionId, reason: Reason) {
        let context = self
            .registry
            .take_if(transaction_id, |ctx| matches!(ctx, OpContext::Send { .. }));
        let Some(OpContext::Send { message }) = context else {
            warn!(%transaction_id, "queued failure for unknown transaction dropped");
            return;
        };
        self.notify_send_fail(&message, reason);
        self.finish_wait(transaction_id);
    }

    // ------------------------------------------------------------------------
    // Driver notifications
    // ------------------------------------------------------------------------

    fn on_notification(&mut self, notification: DriverNotification) {
        match notification {
            DriverNotification::MessageSendSuccess { transaction_id } => {
                self.on_transmit_success(transaction_id)
            }
            DriverNotification::MessageSendFail {
                transaction_id,
                reason,
            } => self.on_transmit_fail(transaction_id, reason),
            DriverNotification::Match {
                pub_sub_id,
                requestor_id,
                peer_mac,
                service_specific_info,
                match_filter,
            } => self.on_match(
                pub_sub_id,
                requestor_id,
                peer_mac,
                service_specific_info,
                match_filter,
            ),
            DriverNotification::MessageReceived {
                pub_sub_id,
                requestor_id,
                peer_mac,
                payload,
            } => self.on_peer_message(pub_sub_id, requestor_id, peer_mac, payload),
            DriverNotification::SessionTerminated {
                pub_sub_id,
                reason,
                is_publish,
            } => self.on_session_terminated(pub_sub_id, reason, is_publish),
            DriverNotification::ClusterChange { .. } => self.on_identity_event("cluster change"),
            DriverNotification::InterfaceAddressChange { .. } => {
                self.on_identity_event("interface address change")
            }
            DriverNotification::NanDown { reason } => self.on_down(reason),
        }
    }

    fn on_transmit_success(&mut self, transaction_id: TransactionId) {
        let Some(message) = self.queue.take_in_flight(transaction_id) else {
            debug!(%transaction_id, "stale transmit result dropped");
            return;
        };
        self.registry.take(transaction_id);
        self.sync_send_timer();
        self.notify_send_success(&message);
    }

    fn on_transmit_fail(&mut self, transaction_id: TransactionId, reason: Reason) {
        let Some(mut message) = self.queue.take_in_flight(transaction_id) else {
            debug!(%transaction_id, "stale transmit failure dropped");
            return;
        };
        self.registry.take(transaction_id);
        self.sync_send_timer();
        if message.retries_left > 0 {
            message.retries_left -= 1;
            // Retransmission keeps the app's message id and goes back to the
            // head of the host queue, so it re-enters the window it already
            // occupied.
            self.queue.requeue_front(message);
        } else {
            self.notify_send_fail(&message, reason);
        }
    }

    fn on_match(
        &mut self,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
        service_specific_info: Vec<u8>,
        match_filter: Vec<u8>,
    ) {
        let Some((client_id, listener)) = self.record_peer(pub_sub_id, requestor_id, peer_mac)
        else {
            debug!(%pub_sub_id, "match for unknown session dropped");
            return;
        };
        if !self.is_marked_for_disconnect(client_id) {
            listener.on_match(requestor_id, &service_specific_info, &match_filter);
        }
    }

    fn on_peer_message(
        &mut self,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
        payload: Vec<u8>,
    ) {
        let Some((client_id, listener)) = self.record_peer(pub_sub_id, requestor_id, peer_mac)
        else {
            debug!(%pub_sub_id, "message for unknown session dropped");
            return;
        };
        if !self.is_marked_for_disconnect(client_id) {
            listener.on_message_received(requestor_id, &payload);
        }
    }

    /// Upsert the peer's address in whichever session the driver addressed
    /// and hand back its owner and listener.
    fn record_peer(
        &mut self,
        pub_sub_id: PubSubId,
        requestor_id: PeerId,
        peer_mac: MacAddr,
    ) -> Option<(ClientId, Arc<dyn SessionListener>)> {
        for (client_id, client) in self.clients.iter_mut() {
            if let Some(session) = client.session_by_pub_sub_mut(pub_sub_id, None) {
                session.record_peer(requestor_id, peer_mac);
                return Some((*client_id, session.listener().clone()));
            }
        }
        None
    }

    fn on_session_terminated(&mut self, pub_sub_id: PubSubId, reason: Reason, is_publish: bool) {
        let kind = SessionKind::from_is_publish(is_publish);
        let mut found = None;
        for (client_id, client) in self.clients.iter_mut() {
            if let Some(session) = client.session_by_pub_sub_mut(pub_sub_id, Some(kind)) {
                found = Some((*client_id, session.session_id()));
                break;
            }
        }
        let Some((client_id, session_id)) = found else {
            debug!(%pub_sub_id, "termination for unknown session dropped");
            return;
        };
        let Some(session) = self
            .clients
            .get_mut(&client_id)
            .and_then(|client| client.remove_session(session_id))
        else {
            return;
        };
        for transaction_id in self.queue.purge_session(session_id) {
            self.registry.take(transaction_id);
        }
        self.sync_send_timer();
        if !self.is_marked_for_disconnect(client_id) {
            session.listener().on_session_terminated(reason);
        }
    }

    fn on_identity_event(&self, event: &str) {
        debug!(event, "identity notification");
        for client in self.clients.values() {
            if client.wants_identity_notifications()
                && !self.is_marked_for_disconnect(client.client_id())
            {
                client.listener().on_identity_changed();
            }
        }
    }

    fn on_down(&mut self, reason: Reason) {
        warn!(%reason, "radio reported down");
        for client in self.clients.values() {
            if client.wants_identity_notifications()
                && !self.is_marked_for_disconnect(client.client_id())
            {
                client.listener().on_down(reason);
            }
        }
        // Radio event, not a policy event: the usage bit stays as it is and
        // nothing is re-broadcast. Clearing the programmed configuration lets
        // the next connect bring the radio back up.
        self.reset_radio_state();
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    fn on_timer_fired(&mut self, tag: TimerTag, generation: u64) {
        match tag {
            TimerTag::Command => {
                if !self.command_timer_armed || generation != self.command_timer_generation {
                    debug!("stale command timer fire ignored");
                    return;
                }
                self.command_timer_armed = false;
                self.on_command_timeout();
            }
            TimerTag::SendMessage => {
                if !self.send_timer_armed || generation != self.send_timer_generation {
                    debug!("stale send timer fire ignored");
                    return;
                }
                self.send_timer_armed = false;
                self.on_send_window_timeout();
            }
        }
    }

    /// The single outstanding driver command never answered. Synthesize the
    /// failure of its operation and unblock the loop.
    fn on_command_timeout(&mut self) {
        let Some(transaction_id) = self.pending.take() else {
            return;
        };
        warn!(%transaction_id, "driver command timed out");
        let Some(context) = self.registry.take(transaction_id) else {
            return;
        };
        match context {
            OpContext::Capabilities => {
                warn!("capability query timed out");
            }
            OpContext::Connect {
                client_id, listener, ..
            } => {
                if !self.is_marked_for_disconnect(client_id) {
                    listener.on_connect_fail(Reason::Other);
                }
            }
            OpContext::Reconfigure { .. } => {
                warn!("reconfiguration timed out");
            }
            OpContext::StartSession {
                client_id, listener, ..
            } => {
                if !self.is_marked_for_disconnect(client_id) {
                    listener.on_session_config_fail(Reason::Other);
                }
            }
            OpContext::UpdateSession {
                client_id,
                session_id,
            } => {
                let listener = self
                    .clients
                    .get(&client_id)
                    .and_then(|client| client.session(session_id))
                    .map(|session| session.listener().clone());
                if let Some(listener) = listener {
                    if !self.is_marked_for_disconnect(client_id) {
                        listener.on_session_config_fail(Reason::Other);
                    }
                }
            }
            OpContext::Send { message } => {
                self.notify_send_fail(&message, Reason::TxFail);
            }
            OpContext::SendInFlight { .. } => {}
        }
    }

    /// The firmware sat on its send window too long. Fail everything in
    /// flight; late results for these transaction ids are discarded.
    fn on_send_window_timeout(&mut self) {
        warn!(
            in_flight = self.queue.in_flight_len(),
            "send window timed out"
        );
        for (transaction_id, message) in self.queue.drain_in_flight() {
            self.registry.take(transaction_id);
            self.notify_send_fail(&message, Reason::TxFail);
        }
    }

    // ------------------------------------------------------------------------
    // Small helpers
    // ------------------------------------------------------------------------

    fn begin_wait(&mut self, transaction_id: TransactionId) {
        self.pending = Some(transaction_id);
        self.command_timer_generation += 1;
        self.command_timer_armed = true;
        self.timers.arm(
            TimerTag::Command,
            self.command_timer_generation,
            COMMAND_TIMEOUT,
        );
    }

    fn finish_wait(&mut self, transaction_id: TransactionId) {
        if self.pending == Some(transaction_id) {
            self.pending = None;
            if self.command_timer_armed {
                self.command_timer_armed = false;
                self.timers.cancel(TimerTag::Command);
            }
        }
    }

    fn arm_send_timer(&mut self) {
        self.send_timer_generation += 1;
        self.send_timer_armed = true;
        self.timers.arm(
            TimerTag::SendMessage,
            self.send_timer_generation,
            SEND_MESSAGE_TIMEOUT,
        );
    }

    fn sync_send_timer(&mut self) {
        if self.queue.in_flight_is_empty() && self.send_timer_armed {
            self.send_timer_armed = false;
            self.timers.cancel(TimerTag::SendMessage);
        }
    }

    fn notify_send_success(&self, message: &HostQueuedSend) {
        if self.is_marked_for_disconnect(message.client_id) {
            return;
        }
        if let Some(listener) = self
            .clients
            .get(&message.client_id)
            .and_then(|client| client.session(message.session_id))
            .map(|session| session.listener().clone())
        {
            listener.on_message_send_success(message.message_id);
        }
    }

    fn notify_send_fail(&self, message: &HostQueuedSend, reason: Reason) {
        if self.is_marked_for_disconnect(message.client_id) {
            return;
        }
        if let Some(listener) = self
            .clients
            .get(&message.client_id)
            .and_then(|client| client.session(message.session_id))
            .map(|session| session.listener().clone())
        {
            listener.on_message_send_fail(message.message_id, reason);
        }
    }
}
