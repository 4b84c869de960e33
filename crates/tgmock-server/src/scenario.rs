//! Named failure scenarios and their scripted `getUpdates` payloads.

use std::fmt;
use std::str::FromStr;

use crate::types::Update;

/// A failure scenario selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// `getUpdates` returns two updates sharing `update_id` 100.
    DuplicateUpdates,
    /// `getUpdates` returns update ids 5, 3, 7 in that order.
    OutOfOrder,
    /// The first request of the server's lifetime gets a 429.
    Retry429,
    /// `getUpdates` declares 100 bytes, sends a fragment, and drops the connection.
    PartialRead,
    /// `getUpdates` stalls before answering.
    SlowResponse,
    /// `getUpdates` gets a 401; other methods are unaffected.
    Unauthorized,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::DuplicateUpdates,
        Scenario::OutOfOrder,
        Scenario::Retry429,
        Scenario::PartialRead,
        Scenario::SlowResponse,
        Scenario::Unauthorized,
    ];

    /// Canonical name, as accepted on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::DuplicateUpdates => "duplicate-updates",
            Scenario::OutOfOrder => "out-of-order",
            Scenario::Retry429 => "429-retry",
            Scenario::PartialRead => "partial-read",
            Scenario::SlowResponse => "slow-response",
            Scenario::Unauthorized => "401-unauthorized",
        }
    }

    /// Fixed `getUpdates` payload for scenarios that script one.
    pub fn scripted_updates(&self) -> Option<Vec<Update>> {
        match self {
            Scenario::DuplicateUpdates => Some(vec![
                Update::text_from_fixture_user(100, 1, "dup1"),
                Update::text_from_fixture_user(100, 2, "dup2"),
            ]),
            Scenario::OutOfOrder => Some(vec![
                Update::text_from_fixture_user(5, 5, "five"),
                Update::text_from_fixture_user(3, 3, "three"),
                Update::text_from_fixture_user(7, 7, "seven"),
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised scenario name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario '{0}' (expected one of: duplicate-updates, out-of-order, 429-retry, partial-read, slow-response, 401-unauthorized)")]
pub struct UnknownScenario(pub String);

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duplicate-updates" => Ok(Scenario::DuplicateUpdates),
            "out-of-order" => Ok(Scenario::OutOfOrder),
            "429-retry" | "retry-429" => Ok(Scenario::Retry429),
            "partial-read" => Ok(Scenario::PartialRead),
            "slow-response" => Ok(Scenario::SlowResponse),
            "401-unauthorized" | "unauthorized" => Ok(Scenario::Unauthorized),
            other => Err(UnknownScenario(other.to_string())),
        }
    }
}
