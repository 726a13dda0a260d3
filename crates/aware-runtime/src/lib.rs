//! Aware Runtime
//!
//! The dispatch half of the Aware discovery engine. One single-threaded loop
//! owns every piece of mutable state; client API calls, driver responses,
//! driver notifications, and timer fires all arrive as messages and their
//! handlers run to completion, so the "at most one outstanding driver
//! transaction" rule is enforced by parking commands rather than by locks or
//! suspended futures.
//!
//! Applications talk to [`AwareService`]; the driver binding posts its
//! callbacks through [`DriverNotifier`]. Tests construct a [`StateManager`]
//! directly with the doubles in [`testing`] and drive it message by message.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod logic;
pub mod service;
pub mod timer;

#[cfg(feature = "test-utils")]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{Command, DriverNotification, DriverResponse, ServiceMessage};
pub use logic::StateManager;
pub use service::{AwareService, DriverNotifier};
pub use timer::{TimerScheduler, TimerTag, TokioTimers, COMMAND_TIMEOUT, SEND_MESSAGE_TIMEOUT};
