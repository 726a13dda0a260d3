//! Failure and termination reason codes
//!
//! A closed set with stable wire values. Codes are passed through from the
//! driver unchanged and are also synthesized locally for timeouts and
//! app-input errors.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Reason Codes
// ----------------------------------------------------------------------------

/// Reason attached to a failure or termination callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    /// Unspecified failure, also used for synthesized command timeouts
    Other,
    /// Firmware is out of resources for the request
    NoResources,
    /// The request carried invalid arguments
    InvalidArgs,
    /// Over-the-air transmission failed
    TxFail,
    /// The destination peer is not known to the session
    NoMatchSession,
    /// A client is already connected with an incompatible configuration
    AlreadyConnectedIncompatConfig,
    /// Session ran to its natural completion
    TerminateDone,
    /// Session terminated due to a failure
    TerminateFail,
}

impl Reason {
    /// Stable wire code for this reason.
    pub fn code(&self) -> u32 {
        match self {
            Reason::Other => 0,
            Reason::NoResources => 1,
            Reason::InvalidArgs => 2,
            Reason::TxFail => 3,
            Reason::NoMatchSession => 4,
            Reason::AlreadyConnectedIncompatConfig => 5,
            Reason::TerminateDone => 100,
            Reason::TerminateFail => 101,
        }
    }

    /// Decode a wire code, if it is part of the closed set.
    pub fn from_code(code: u32) -> Option<Reason> {
        match code {
            0 => Some(Reason::Other),
            1 => Some(Reason::NoResources),
            2 => Some(Reason::InvalidArgs),
            3 => Some(Reason::TxFail),
            4 => Some(Reason::NoMatchSession),
            5 => Some(Reason::AlreadyConnectedIncompatConfig),
            100 => Some(Reason::TerminateDone),
            101 => Some(Reason::TerminateFail),
            _ => None,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reason::Other => "OTHER",
            Reason::NoResources => "NO_RESOURCES",
            Reason::InvalidArgs => "INVALID_ARGS",
            Reason::TxFail => "TX_FAIL",
            Reason::NoMatchSession => "NO_MATCH_SESSION",
            Reason::AlreadyConnectedIncompatConfig => "ALREADY_CONNECTED_INCOMPAT_CONFIG",
            Reason::TerminateDone => "TERMINATE_DONE",
            Reason::TerminateFail => "TERMINATE_FAIL",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        let all = [
            Reason::Other,
            Reason::NoResources,
            Reason::InvalidArgs,
            Reason::TxFail,
            Reason::NoMatchSession,
            Reason::AlreadyConnectedIncompatConfig,
            Reason::TerminateDone,
            Reason::TerminateFail,
        ];
        for reason in all {
            assert_eq!(Reason::from_code(reason.code()), Some(reason));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(Reason::from_code(17), None);
    }
}
