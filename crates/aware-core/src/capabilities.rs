//! Firmware capability record
//!
//! Fetched exactly once after the radio is enabled and treated as immutable
//! thereafter. The send queue sizes its firmware window from
//! `max_queued_transmit_messages`; configuration validation uses the length
//! limits.

use serde::{Deserialize, Serialize};

/// Capabilities reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub max_concurrent_clusters: u32,
    pub max_publishes: u32,
    pub max_subscribes: u32,
    pub max_service_name_len: u32,
    pub max_match_filter_len: u32,
    pub max_total_match_filter_len: u32,
    pub max_service_specific_info_len: u32,
    pub max_vsa_data_len: u32,
    pub max_mesh_data_len: u32,
    pub max_ndi_interfaces: u32,
    pub max_ndp_sessions: u32,
    pub max_app_info_len: u32,
    pub max_queued_transmit_messages: u32,
}

impl Capabilities {
    /// A permissive capability set, useful as a fixture.
    pub fn reference() -> Self {
        Self {
            max_concurrent_clusters: 1,
            max_publishes: 2,
            max_subscribes: 2,
            max_service_name_len: 255,
            max_match_filter_len: 255,
            max_total_match_filter_len: 255,
            max_service_specific_info_len: 255,
            max_vsa_data_len: 255,
            max_mesh_data_len: 255,
            max_ndi_interfaces: 1,
            max_ndp_sessions: 1,
            max_app_info_len: 255,
            max_queued_transmit_messages: 6,
        }
    }
}
