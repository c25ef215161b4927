use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source app used when a producer does not name one
pub const UNKNOWN_APP: &str = "unknown.app";

/// Well-known event kinds. The set is open-ended; anything else passes
/// through the feed untouched.
pub mod kind {
    pub const MESSAGE: &str = "message";
    pub const NOTIFICATION: &str = "notification";
    pub const SWITCH: &str = "switch";
    pub const TYPING: &str = "typing";
    pub const SYSTEM: &str = "system";
    pub const OUT: &str = "out";
    pub const RAW: &str = "raw";
}

/// Milliseconds since the Unix epoch, wall clock
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One feed line, independent of the producer's payload shape
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub timestamp: i64,
    pub kind: String,
    pub source_app: String,
    pub text: String,
    /// Base64 image data as sent by the producer
    pub icon: Option<String>,
}

impl CanonicalEvent {
    pub fn new(timestamp: i64, kind: &str, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: kind.to_string(),
            source_app: UNKNOWN_APP.to_string(),
            text: text.into(),
            icon: None,
        }
    }

    /// Synthetic entry emitted by the connection manager itself
    pub fn system(timestamp: i64, text: impl Into<String>) -> Self {
        Self::new(timestamp, kind::SYSTEM, text)
    }

    /// Local echo of a payload we pushed to the server
    pub fn outbound(timestamp: i64, text: impl Into<String>) -> Self {
        Self::new(timestamp, kind::OUT, text)
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Push channel state as seen by the dashboard
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Counters derived from the feed (recomputed, never stored)
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    pub notifications: u64,
    pub switches: u64,
    pub typings: u64,
    pub last_switch_app: Option<String>,
    pub last_typing_by_app: BTreeMap<String, i64>,
}

/// Error body returned by the ingress endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
