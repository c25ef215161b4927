use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::backoff::Backoff;
use super::buffer::LogBuffer;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::models::{CanonicalEvent, ConnectionState, CounterState};
use crate::normalize::{inbound_envelope, normalize, parse_frame};
use crate::projections::CounterProjector;

/// What the UI gets to read
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub reconnect_delay_ms: u64,
    pub logs: Vec<CanonicalEvent>,
    pub counters: CounterState,
    pub last_message: Option<Value>,
    /// Events appended since start; lets readers spot new lines after eviction
    pub appended: u64,
}

/// Connection state machine plus the feed it owns.
///
/// `Connecting -> Open -> Closed -> Connecting -> ...`. Transitions are
/// driven by whoever owns the transport; every call takes the current time
/// so the machine itself stays deterministic.
#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    backoff: Backoff,
    logs: LogBuffer,
    projector: CounterProjector,
    counters: CounterState,
    last_message: Option<Value>,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            state: ConnectionState::Connecting,
            backoff: Backoff::new(config.reconnect_interval, config.max_reconnect_delay()),
            logs: LogBuffer::new(config.max_logs),
            projector: CounterProjector::new(config.typing_debounce),
            counters: CounterState::default(),
            last_message: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.backoff.current()
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn counters(&self) -> &CounterState {
        &self.counters
    }

    pub fn last_message(&self) -> Option<&Value> {
        self.last_message.as_ref()
    }

    /// Reconnect timer fired
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn on_open(&mut self, now: i64) {
        self.state = ConnectionState::Open;
        self.backoff.reset();
        self.append(CanonicalEvent::system(now, "WS connected"));
    }

    pub fn on_message(&mut self, data: &str, now: i64) {
        let parsed = parse_frame(data);
        let event = normalize(&inbound_envelope(&parsed, now), now);
        self.last_message = Some(parsed);
        self.append(event);
    }

    pub fn on_error(&mut self, reason: &str, now: i64) {
        self.append(CanonicalEvent::system(now, format!("WS error: {reason}")));
    }

    /// Channel went away. Returns the delay before the next attempt.
    pub fn on_close(&mut self, now: i64) -> Duration {
        self.state = ConnectionState::Closed;
        self.append(CanonicalEvent::system(now, "WS disconnected"));
        self.backoff.fail()
    }

    /// Gate for outbound sends. A refused send is logged to the feed.
    pub fn check_send(&mut self, now: i64) -> Result<(), ClientError> {
        if self.state.is_open() {
            return Ok(());
        }
        self.append(CanonicalEvent::system(now, "WS send failed - not connected"));
        Err(ClientError::NotConnected)
    }

    /// Local echo of a payload that made it onto the wire
    pub fn record_outbound(&mut self, text: &str, now: i64) {
        self.append(CanonicalEvent::outbound(now, text));
    }

    pub fn clear(&mut self) {
        self.logs.clear();
        self.recount();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            reconnect_delay_ms: u64::try_from(self.backoff.current().as_millis())
                .unwrap_or(u64::MAX),
            logs: self.logs.to_vec(),
            counters: self.counters.clone(),
            last_message: self.last_message.clone(),
            appended: self.logs.appended(),
        }
    }

    fn append(&mut self, event: CanonicalEvent) {
        self.logs.push(event);
        self.recount();
    }

    fn recount(&mut self) {
        self.counters = self.projector.project(self.logs.iter());
    }
}

/// Wire text for an outbound payload: strings go out verbatim
pub fn outbound_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
