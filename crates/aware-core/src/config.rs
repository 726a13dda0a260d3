//! Configuration types and the multi-client merge policy
//!
//! Every connected client supplies a [`ConfigRequest`]; the engine folds the
//! full set into one effective configuration to program into the radio. The
//! per-field merge rules and the compatibility gate for a joining client
//! live here so they can be tested without the state machine.

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::errors::{AwareError, AwareResult};

// ----------------------------------------------------------------------------
// Cluster Configuration Request
// ----------------------------------------------------------------------------

/// A client's requested radio configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    /// Preference for becoming the cluster master, 0 to 255
    pub master_preference: u32,
    /// Lower bound of the acceptable cluster id range
    pub cluster_low: u32,
    /// Upper bound of the acceptable cluster id range
    pub cluster_high: u32,
    /// Whether operation in the 5 GHz band is requested
    pub support_5g: bool,
    /// Whether the client wants identity-change notifications
    pub enable_identity_change_callback: bool,
}

impl Default for ConfigRequest {
    fn default() -> Self {
        Self {
            master_preference: 0,
            cluster_low: 0,
            cluster_high: 0xFFFF,
            support_5g: false,
            enable_identity_change_callback: false,
        }
    }
}

impl ConfigRequest {
    /// Whether the request is internally consistent.
    pub fn is_valid(&self) -> bool {
        self.cluster_low <= self.cluster_high
            && self.cluster_high <= 0xFFFF
            && self.master_preference <= 255
    }

    /// Merge two requests field by field.
    ///
    /// masterPreference takes the maximum, the cluster range widens to cover
    /// both, and the boolean capabilities combine by OR.
    pub fn merge(&self, other: &ConfigRequest) -> ConfigRequest {
        ConfigRequest {
            master_preference: self.master_preference.max(other.master_preference),
            cluster_low: self.cluster_low.min(other.cluster_low),
            cluster_high: self.cluster_high.max(other.cluster_high),
            support_5g: self.support_5g || other.support_5g,
            enable_identity_change_callback: self.enable_identity_change_callback
                || other.enable_identity_change_callback,
        }
    }

    /// Fold an iterator of requests into one effective configuration.
    pub fn merge_all<'a, I>(requests: I) -> Option<ConfigRequest>
    where
        I: IntoIterator<Item = &'a ConfigRequest>,
    {
        let mut iter = requests.into_iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, |acc, request| acc.merge(request)))
    }

    /// Whether a joining client's request can coexist with the configuration
    /// already programmed into the radio.
    ///
    /// The on-air synchronization parameters must stay unchanged: master
    /// preference and the cluster bounds have to match the active values.
    /// 5 GHz support may only be added (the merge is an OR, so it can never
    /// be withdrawn by a join), and the identity-change-callback bit is free
    /// since it does not affect over-the-air behavior.
    pub fn compatible_with(&self, active: &ConfigRequest) -> bool {
        self.master_preference == active.master_preference
            && self.cluster_low == active.cluster_low
            && self.cluster_high == active.cluster_high
            && (self.support_5g || !active.support_5g)
    }
}

// ----------------------------------------------------------------------------
// Publish Configuration
// ----------------------------------------------------------------------------

/// How a publish session advertises itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishType {
    /// Broadcast the service without waiting for queries
    Unsolicited,
    /// Respond only to active subscriber queries
    Solicited,
}

/// Configuration for a publish session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    pub service_name: String,
    /// Opaque app-level payload carried with discovery
    pub service_specific_info: Vec<u8>,
    pub match_filter: Vec<u8>,
    pub publish_type: PublishType,
    /// Number of discovery rounds, 0 for unlimited
    pub publish_count: u32,
    /// Session lifetime in seconds, 0 for unlimited
    pub ttl_sec: u32,
    pub enable_terminate_notification: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            service_specific_info: Vec::new(),
            match_filter: Vec::new(),
            publish_type: PublishType::Unsolicited,
            publish_count: 0,
            ttl_sec: 0,
            enable_terminate_notification: true,
        }
    }
}

impl PublishConfig {
    /// Check the configuration against the firmware limits.
    pub fn validate(&self, capabilities: &Capabilities) -> AwareResult<()> {
        validate_discovery_fields(
            &self.service_name,
            &self.service_specific_info,
            &self.match_filter,
            capabilities,
        )
    }
}

// ----------------------------------------------------------------------------
// Subscribe Configuration
// ----------------------------------------------------------------------------

/// How a subscribe session looks for publishers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeType {
    /// Listen for unsolicited publish broadcasts
    Passive,
    /// Transmit queries for solicited publishers
    Active,
}

/// Configuration for a subscribe session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeConfig {
    pub service_name: String,
    pub service_specific_info: Vec<u8>,
    pub match_filter: Vec<u8>,
    pub subscribe_type: SubscribeType,
    /// Number of discovery rounds, 0 for unlimited
    pub subscribe_count: u32,
    /// Session lifetime in seconds, 0 for unlimited
    pub ttl_sec: u32,
    pub enable_terminate_notification: bool,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            service_specific_info: Vec::new(),
            match_filter: Vec::new(),
            subscribe_type: SubscribeType::Passive,
            subscribe_count: 0,
            ttl_sec: 0,
            enable_terminate_notification: true,
        }
    }
}

impl SubscribeConfig {
    /// Check the configuration against the firmware limits.
    pub fn validate(&self, capabilities: &Capabilities) -> AwareResult<()> {
        validate_discovery_fields(
            &self.service_name,
            &self.service_specific_info,
            &self.match_filter,
            capabilities,
        )
    }
}

fn validate_discovery_fields(
    service_name: &str,
    service_specific_info: &[u8],
    match_filter: &[u8],
    capabilities: &Capabilities,
) -> AwareResult<()> {
    if service_name.len() > capabilities.max_service_name_len as usize {
        return Err(AwareError::InvalidConfiguration {
            reason: format!(
                "service name length {} exceeds limit {}",
                service_name.len(),
                capabilities.max_service_name_len
            ),
        });
    }
    if service_specific_info.len() > capabilities.max_service_specific_info_len as usize {
        return Err(AwareError::InvalidConfiguration {
            reason: format!(
                "service specific info length {} exceeds limit {}",
                service_specific_info.len(),
                capabilities.max_service_specific_info_len
            ),
        });
    }
    if match_filter.len() > capabilities.max_match_filter_len as usize {
        return Err(AwareError::InvalidConfiguration {
            reason: format!(
                "match filter length {} exceeds limit {}",
                match_filter.len(),
                capabilities.max_match_filter_len
            ),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request(master: u32, low: u32, high: u32) -> ConfigRequest {
        ConfigRequest {
            master_preference: master,
            cluster_low: low,
            cluster_high: high,
            ..ConfigRequest::default()
        }
    }

    #[test]
    fn test_merge_fields() {
        let a = ConfigRequest {
            master_preference: 111,
            cluster_low: 5,
            cluster_high: 100,
            support_5g: false,
            enable_identity_change_callback: false,
        };
        let b = ConfigRequest {
            master_preference: 0,
            cluster_low: 7,
            cluster_high: 155,
            support_5g: true,
            enable_identity_change_callback: true,
        };

        let merged = a.merge(&b);
        assert_eq!(merged.master_preference, 111);
        assert_eq!(merged.cluster_low, 5);
        assert_eq!(merged.cluster_high, 155);
        assert!(merged.support_5g);
        assert!(merged.enable_identity_change_callback);
    }

    #[test]
    fn test_merge_all() {
        let requests = vec![request(10, 5, 100), request(20, 3, 50), request(0, 8, 200)];
        let merged = ConfigRequest::merge_all(requests.iter()).unwrap();
        assert_eq!(merged.master_preference, 20);
        assert_eq!(merged.cluster_low, 3);
        assert_eq!(merged.cluster_high, 200);

        assert!(ConfigRequest::merge_all(std::iter::empty()).is_none());
    }

    #[test]
    fn test_compatibility_requires_matching_sync_parameters() {
        let active = request(111, 5, 100);
        assert!(request(111, 5, 100).compatible_with(&active));
        assert!(!request(0, 7, 155).compatible_with(&active));
        assert!(!request(111, 5, 101).compatible_with(&active));
    }

    #[test]
    fn test_compatibility_identity_bit_is_free() {
        let active = request(111, 5, 100);
        let mut joining = request(111, 5, 100);
        joining.enable_identity_change_callback = true;
        assert!(joining.compatible_with(&active));
    }

    #[test]
    fn test_compatibility_5g_can_only_be_added() {
        let mut active = request(111, 5, 100);
        active.support_5g = true;

        let without_5g = request(111, 5, 100);
        assert!(!without_5g.compatible_with(&active));

        let mut with_5g = request(111, 5, 100);
        with_5g.support_5g = true;
        assert!(with_5g.compatible_with(&active));

        // Upgrade direction is allowed
        let active_24g = request(111, 5, 100);
        assert!(with_5g.compatible_with(&active_24g));
    }

    #[test]
    fn test_request_validity() {
        assert!(ConfigRequest::default().is_valid());
        assert!(!request(0, 100, 5).is_valid());
        assert!(!request(1000, 5, 100).is_valid());
    }

    #[test]
    fn test_publish_config_validation() {
        let caps = Capabilities::reference();
        let config = PublishConfig {
            service_name: "some-service-name".to_string(),
            ..PublishConfig::default()
        };
        assert!(config.validate(&caps).is_ok());

        let config = PublishConfig {
            service_name: "x".repeat(300),
            ..PublishConfig::default()
        };
        assert!(config.validate(&caps).is_err());
    }

    #[test]
    fn test_subscribe_config_validation() {
        let caps = Capabilities::reference();
        let config = SubscribeConfig {
            service_specific_info: vec![0u8; 300],
            ..SubscribeConfig::default()
        };
        assert!(config.validate(&caps).is_err());
    }
}
