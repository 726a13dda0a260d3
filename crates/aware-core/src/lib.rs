//! Aware Core
//!
//! Headless components of the Aware discovery engine: the identifier and
//! reason-code vocabulary, configuration types with the multi-client merge
//! policy, the driver transaction registry, the bounded send-message queue,
//! and per-client/per-session state. Everything here is synchronous and
//! deterministic; the dispatch loop that drives these pieces lives in
//! `aware-runtime`.
//!
//! ## Architecture Overview
//!
//! The engine multiplexes many client applications onto a single radio
//! driver. Entities are addressed by small integer handles (client id,
//! session id, transaction id) rather than references, so state can be torn
//! down from any direction without cycles:
//!
//! - [`ClientState`] owns its [`SessionState`]s; a session tracks discovered
//!   peers as requestor-id to address mappings.
//! - [`TransactionRegistry`] correlates each outbound driver command with
//!   the operation that issued it.
//! - [`SendMessageQueue`] holds the host FIFO and the bounded firmware
//!   in-flight window for outbound messages.
//! - The [`AwareDriver`], [`DataPathManager`], [`RttRanging`] and
//!   [`UsageBroadcast`] traits are the seams to everything outside the
//!   engine; applications observe it through [`ClientListener`] and
//!   [`SessionListener`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod callbacks;
pub mod capabilities;
pub mod client;
pub mod config;
pub mod driver;
pub mod errors;
pub mod platform;
pub mod queue;
pub mod reason;
pub mod session;
pub mod transaction;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use callbacks::{ClientListener, SessionListener};
pub use capabilities::Capabilities;
pub use client::ClientState;
pub use config::{ConfigRequest, PublishConfig, PublishType, SubscribeConfig, SubscribeType};
pub use driver::{AwareDriver, ClusterEvent};
pub use errors::{AwareError, AwareResult};
pub use platform::{DataPathManager, RttParams, RttRanging, UsageBroadcast};
pub use queue::{HostQueuedSend, SendMessageQueue};
pub use reason::Reason;
pub use session::{SessionKind, SessionState};
pub use transaction::{OpContext, TransactionRegistry};
pub use types::{
    ClientId, MacAddr, MessageId, PeerId, PubSubId, RangingId, SessionId, TransactionId,
};
