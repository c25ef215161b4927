//! Log normalization.
//!
//! Producers send whatever shape they like. Every field of a
//! [`CanonicalEvent`] is resolved through a short ordered rule list; the
//! first rule that yields a usable value wins. Some producers wrap the real
//! event inside a structured `text` field, so rules can look either at the
//! envelope (top level) or at that nested payload.

use serde_json::{json, Value};

use crate::models::{kind, CanonicalEvent, UNKNOWN_APP};

/// Longest text produced by the serialization fallback, in characters
pub const TEXT_FALLBACK_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy)]
enum Scope {
    Envelope,
    Payload,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    scope: Scope,
    key: &'static str,
}

const fn envelope(key: &'static str) -> Rule {
    Rule { scope: Scope::Envelope, key }
}

const fn payload(key: &'static str) -> Rule {
    Rule { scope: Scope::Payload, key }
}

const KIND_RULES: &[Rule] = &[envelope("type"), payload("type")];
const APP_RULES: &[Rule] = &[envelope("app"), payload("app")];
const TEXT_RULES: &[Rule] = &[
    envelope("text"),
    payload("text"),
    payload("msg"),
    payload("message"),
];
const ICON_RULES: &[Rule] = &[envelope("icon"), payload("icon")];
const TS_RULES: &[Rule] = &[envelope("ts"), payload("ts")];

struct Sources<'a> {
    envelope: &'a Value,
    payload: &'a Value,
}

impl<'a> Sources<'a> {
    fn lookup(&self, rule: Rule) -> Option<&'a Value> {
        let source = match rule.scope {
            Scope::Envelope => self.envelope,
            Scope::Payload => self.payload,
        };
        source.get(rule.key)
    }

    fn first_str(&self, rules: &[Rule]) -> Option<&'a str> {
        rules.iter().find_map(|rule| match self.lookup(*rule) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        })
    }

    fn first_timestamp(&self, rules: &[Rule]) -> Option<i64> {
        rules
            .iter()
            .find_map(|rule| self.lookup(*rule).and_then(as_timestamp))
    }
}

fn as_timestamp(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    let ts = match n.as_i64() {
        Some(ts) => ts,
        None => {
            let f = n.as_f64()?;
            if !f.is_finite() {
                return None;
            }
            f as i64
        }
    };
    // zero means "unset" for producers that default their clocks
    (ts != 0).then_some(ts)
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn primitive_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncated_json(value: &Value) -> String {
    value.to_string().chars().take(TEXT_FALLBACK_LIMIT).collect()
}

/// Normalize an arbitrary payload into a feed line.
///
/// Total over every JSON value: bare strings, numbers and `null` are
/// treated as `{text: <value>}`, and anything without a usable text field
/// degrades to a truncated serialization of the payload.
pub fn normalize(raw: &Value, received_at: i64) -> CanonicalEvent {
    let wrapped;
    let envelope_value = if is_structured(raw) {
        raw
    } else {
        wrapped = json!({ "text": primitive_text(raw) });
        &wrapped
    };

    let payload_value = match envelope_value.get("text") {
        Some(nested) if is_structured(nested) => nested,
        _ => envelope_value,
    };

    let sources = Sources {
        envelope: envelope_value,
        payload: payload_value,
    };

    let text = match sources.first_str(TEXT_RULES) {
        Some(text) => text.to_string(),
        None => truncated_json(payload_value),
    };

    CanonicalEvent {
        timestamp: sources.first_timestamp(TS_RULES).unwrap_or(received_at),
        kind: sources.first_str(KIND_RULES).unwrap_or(kind::MESSAGE).to_string(),
        source_app: sources.first_str(APP_RULES).unwrap_or(UNKNOWN_APP).to_string(),
        text,
        icon: sources.first_str(ICON_RULES).map(str::to_string),
    }
}

/// Parse one push-channel frame. Non-JSON text is kept as a `raw` event.
pub fn parse_frame(data: &str) -> Value {
    serde_json::from_str(data).unwrap_or_else(|_| json!({ "type": kind::RAW, "text": data }))
}

/// Wrap an inbound payload the way the dashboard logs it: arrival time,
/// the payload's own type (or `message`), and the payload under `text`.
pub fn inbound_envelope(parsed: &Value, received_at: i64) -> Value {
    let kind = match parsed.get("type") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => kind::MESSAGE,
    };
    json!({ "ts": received_at, "type": kind, "text": parsed })
}
