//! Smoke test of the spawned service wrapper
//!
//! The synchronous behavior is covered in `state_manager.rs`; this verifies
//! the async plumbing end to end: commands posted through the handle reach
//! the dispatch task, driver callbacks posted through the notifier complete
//! transactions, and shutdown drains cleanly.

use std::time::Duration;

use aware_core::{Capabilities, ClientId, ConfigRequest};
use aware_runtime::testing::{
    ClientEvent, DriverCall, RecordingBroadcast, RecordingClientListener, RecordingDataPath,
    RecordingDriver, RecordingRtt,
};
use aware_runtime::AwareService;

async fn wait_for<T>(mut condition: impl FnMut() -> Option<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(value) = condition() {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

#[tokio::test]
async fn test_service_round_trip() {
    let (driver, driver_log) = RecordingDriver::new();
    let (data_path, data_path_log) = RecordingDataPath::new();
    let (rtt, _rtt_log) = RecordingRtt::new();
    let (broadcast, broadcast_log) = RecordingBroadcast::new();
    let service = AwareService::spawn(
        Box::new(driver),
        Box::new(data_path),
        Box::new(rtt),
        Box::new(broadcast),
    );
    let notifier = service.notifier();

    service.enable_usage().unwrap();
    let transaction_id = {
        let log = driver_log.clone();
        wait_for(move || {
            log.take().into_iter().find_map(|call| match call {
                DriverCall::GetCapabilities { transaction_id } => Some(transaction_id),
                _ => None,
            })
        })
        .await
    };
    notifier
        .on_capabilities_update_response(transaction_id, Capabilities::reference())
        .unwrap();

    let listener = RecordingClientListener::new();
    service
        .connect(ClientId(42), 1000, listener.clone(), ConfigRequest::default())
        .unwrap();
    let transaction_id = {
        let log = driver_log.clone();
        wait_for(move || {
            log.take().into_iter().find_map(|call| match call {
                DriverCall::EnableAndConfigure { transaction_id, .. } => Some(transaction_id),
                _ => None,
            })
        })
        .await
    };
    notifier.on_config_success_response(transaction_id).unwrap();

    let listener_probe = listener.clone();
    wait_for(move || {
        if listener_probe
            .take_events()
            .contains(&ClientEvent::ConnectSuccess)
        {
            Some(())
        } else {
            None
        }
    })
    .await;

    assert!(service.is_usage_enabled());
    assert!(broadcast_log.take().contains(&true));
    assert!(!data_path_log.take().is_empty());

    service.shutdown().await;
}
