//! The dispatch task
//!
//! A thin tokio wrapper around the synchronous [`StateManager`]: receive one
//! message, run its handler to completion, repeat. The usage flag is mirrored
//! into an atomic so [`AwareService::is_usage_enabled`] can answer without a
//! round trip through the loop.
//!
//! [`AwareService::is_usage_enabled`]: crate::service::AwareService::is_usage_enabled

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::channel::ServiceMessage;

use super::state::StateManager;

/// Owns the engine and drains the message channel until every sender is gone.
pub struct ServiceTask {
    manager: StateManager,
    receiver: UnboundedReceiver<ServiceMessage>,
    usage_flag: Arc<AtomicBool>,
}

impl ServiceTask {
    pub fn new(
        manager: StateManager,
        receiver: UnboundedReceiver<ServiceMessage>,
        usage_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            manager,
            receiver,
            usage_flag,
        }
    }

    pub async fn run(mut self) {
        info!("aware dispatch task started");
        while let Some(message) = self.receiver.recv().await {
            self.manager.handle(message);
            self.usage_flag
                .store(self.manager.is_usage_enabled(), Ordering::SeqCst);
        }
        info!("aware dispatch task stopped");
    }
}
