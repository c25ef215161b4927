//! Text rendering of the live feed for terminal dashboards.

use base64::Engine;
use chrono::{Local, TimeZone};

use crate::models::{CanonicalEvent, ConnectionState, CounterState, UNKNOWN_APP};

/// Last dotted segment of a package name: `com.whatsapp` -> `whatsapp`
pub fn app_label(app: &str) -> &str {
    let app = if app.is_empty() { UNKNOWN_APP } else { app };
    match app.rsplit('.').next() {
        Some(label) if !label.is_empty() => label,
        _ => app,
    }
}

/// Two-letter badge shown when the producer sent no icon
pub fn app_initials(app: &str) -> String {
    app_label(app).chars().take(2).collect::<String>().to_uppercase()
}

pub fn format_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// `[img 1234B]` for a decodable icon, otherwise the app initials: `[WH]`
pub fn app_badge(event: &CanonicalEvent) -> String {
    match icon_bytes(event) {
        Some(image) => format!("[img {}B]", image.len()),
        None => format!("[{}]", app_initials(&event.source_app)),
    }
}

/// `HH:MM:SS [badge] [app] text`
pub fn render_line(event: &CanonicalEvent) -> String {
    format!(
        "{} {} [{}] {}",
        format_time(event.timestamp),
        app_badge(event),
        event.source_app,
        event.text
    )
}

pub fn render_counters(counters: &CounterState) -> String {
    format!(
        "notifications={} switches={} typings={}",
        counters.notifications, counters.switches, counters.typings
    )
}

pub fn status_badge(state: ConnectionState) -> &'static str {
    if state.is_open() {
        "WS CONNECTED"
    } else {
        "WS DISCONNECTED"
    }
}

/// Decoded icon image, if the producer attached one and it is valid base64
pub fn icon_bytes(event: &CanonicalEvent) -> Option<Vec<u8>> {
    let encoded = event.icon.as_deref()?;
    let encoded = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_label_and_initials() {
        assert_eq!(app_label("com.whatsapp"), "whatsapp");
        assert_eq!(app_label("standalone"), "standalone");
        assert_eq!(app_label(""), "app");
        assert_eq!(app_label("trailing."), "trailing.");
        assert_eq!(app_initials("com.android.chrome"), "CH");
        assert_eq!(app_initials("x"), "X");
    }

    #[test]
    fn test_render_line() {
        let mut event = CanonicalEvent::new(0, "notification", "hello");
        event.source_app = "com.slack".to_string();

        let line = render_line(&event);
        assert!(line.ends_with(" [SL] [com.slack] hello"));
        assert_eq!(line.len(), "00:00:00 [SL] [com.slack] hello".len());
    }

    #[test]
    fn test_badge_prefers_icon_over_initials() {
        let mut event = CanonicalEvent::new(0, "notification", "hi");
        event.source_app = "com.whatsapp".to_string();
        assert_eq!(app_badge(&event), "[WH]");

        event.icon = Some("data:image/png;base64,aGk=".to_string());
        assert_eq!(app_badge(&event), "[img 2B]");
        assert!(render_line(&event).ends_with(" [img 2B] [com.whatsapp] hi"));

        // undecodable icons fall back to initials
        event.icon = Some("not base64!".to_string());
        assert_eq!(app_badge(&event), "[WH]");
    }

    #[test]
    fn test_render_counters() {
        let counters = CounterState {
            notifications: 3,
            switches: 2,
            typings: 1,
            ..CounterState::default()
        };
        assert_eq!(render_counters(&counters), "notifications=3 switches=2 typings=1");
    }

    #[test]
    fn test_icon_bytes() {
        let mut event = CanonicalEvent::new(0, "notification", "x");
        assert_eq!(icon_bytes(&event), None);

        event.icon = Some("aGk=".to_string());
        assert_eq!(icon_bytes(&event), Some(b"hi".to_vec()));

        event.icon = Some("data:image/png;base64,aGk=".to_string());
        assert_eq!(icon_bytes(&event), Some(b"hi".to_vec()));

        event.icon = Some("not base64!".to_string());
        assert_eq!(icon_bytes(&event), None);
    }

    #[test]
    fn test_status_badge() {
        assert_eq!(status_badge(ConnectionState::Open), "WS CONNECTED");
        assert_eq!(status_badge(ConnectionState::Closed), "WS DISCONNECTED");
    }
}
