use std::time::Duration;

use crate::models::{kind, CanonicalEvent, CounterState};

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: i64, kind: &str, app: &str) -> CanonicalEvent {
        CanonicalEvent {
            timestamp: ts,
            kind: kind.to_string(),
            source_app: app.to_string(),
            text: String::new(),
            icon: None,
        }
    }

    #[test]
    fn test_notifications_counted() {
        let events = vec![
            event(1, "notification", "a"),
            event(2, "message", "a"),
            event(3, "notification", "b"),
        ];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.notifications, 2);
        assert_eq!(counters.switches, 0);
        assert_eq!(counters.typings, 0);
    }

    #[test]
    fn test_switch_transitions() {
        // A counts, A skips, A->B counts, B->A counts
        let events = vec![
            event(1, "switch", "A"),
            event(2, "switch", "A"),
            event(3, "switch", "B"),
            event(4, "switch", "A"),
        ];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.switches, 3);
        assert_eq!(counters.last_switch_app.as_deref(), Some("A"));
    }

    #[test]
    fn test_switch_ignores_other_kinds_between() {
        let events = vec![
            event(1, "switch", "A"),
            event(2, "notification", "B"),
            event(3, "switch", "A"),
        ];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.switches, 1);
    }

    #[test]
    fn test_typing_debounce() {
        let mut events = vec![event(0, "typing", "X"), event(1000, "typing", "X")];

        let projector = CounterProjector::default();
        assert_eq!(projector.project(&events).typings, 1);

        events.push(event(3500, "typing", "X"));
        assert_eq!(projector.project(&events).typings, 2);
    }

    #[test]
    fn test_typing_anchor_only_moves_when_counted() {
        // 2500 and 5000 are each within 3000 of the previous event, but
        // 5000 is 5000 past the last *counted* one
        let events = vec![
            event(0, "typing", "X"),
            event(2500, "typing", "X"),
            event(5000, "typing", "X"),
        ];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.typings, 2);
        assert_eq!(counters.last_typing_by_app.get("X"), Some(&5000));
    }

    #[test]
    fn test_typing_threshold_is_exclusive() {
        let events = vec![event(0, "typing", "X"), event(3000, "typing", "X")];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.typings, 1);
    }

    #[test]
    fn test_typing_debounced_per_app() {
        let events = vec![
            event(0, "typing", "X"),
            event(10, "typing", "Y"),
            event(20, "typing", "X"),
        ];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.typings, 2);
    }

    #[test]
    fn test_typing_clock_skew() {
        // an event from the past never counts against a newer anchor
        let events = vec![event(10_000, "typing", "X"), event(1_000, "typing", "X")];

        let counters = CounterProjector::default().project(&events);
        assert_eq!(counters.typings, 1);
    }

    #[test]
    fn test_custom_debounce() {
        let events = vec![event(0, "typing", "X"), event(600, "typing", "X")];

        let projector = CounterProjector::new(Duration::from_millis(500));
        assert_eq!(projector.project(&events).typings, 2);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let events = vec![
            event(1, "switch", "A"),
            event(2, "typing", "A"),
            event(3, "notification", "A"),
            event(4, "switch", "B"),
            event(5000, "typing", "A"),
        ];

        let projector = CounterProjector::default();
        let first = projector.project(&events);
        let second = projector.project(&events);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_history() {
        let counters = CounterProjector::default().project(&Vec::new());
        assert_eq!(counters, CounterState::default());
    }
}

pub const DEFAULT_TYPING_DEBOUNCE: Duration = Duration::from_millis(3000);

/// Projects dashboard counters from the event feed
/// Counters are a fold over the whole history, oldest first
#[derive(Debug, Clone, Copy)]
pub struct CounterProjector {
    typing_debounce_ms: i64,
}

impl Default for CounterProjector {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_DEBOUNCE)
    }
}

impl CounterProjector {
    pub fn new(typing_debounce: Duration) -> Self {
        Self {
            typing_debounce_ms: i64::try_from(typing_debounce.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn project<'a, I>(&self, events: I) -> CounterState
    where
        I: IntoIterator<Item = &'a CanonicalEvent>,
    {
        events
            .into_iter()
            .fold(CounterState::default(), |acc, event| self.apply(acc, event))
    }

    fn apply(&self, mut acc: CounterState, event: &CanonicalEvent) -> CounterState {
        match event.kind.as_str() {
            kind::NOTIFICATION => {
                acc.notifications += 1;
            }
            kind::SWITCH => {
                // consecutive switches to the same app count once
                if acc.last_switch_app.as_deref() != Some(event.source_app.as_str()) {
                    acc.switches += 1;
                    acc.last_switch_app = Some(event.source_app.clone());
                }
            }
            kind::TYPING => {
                let counted = match acc.last_typing_by_app.get(&event.source_app) {
                    None => true,
                    Some(anchor) => {
                        event.timestamp.saturating_sub(*anchor) > self.typing_debounce_ms
                    }
                };
                if counted {
                    acc.typings += 1;
                    acc.last_typing_by_app
                        .insert(event.source_app.clone(), event.timestamp);
                }
            }
            _ => {}
        }
        acc
    }
}
