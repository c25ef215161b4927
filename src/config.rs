use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::error::ConfigError;
use crate::projections::DEFAULT_TYPING_DEBOUNCE;

pub const DEFAULT_WS_URL: &str = "wss://tools-ios-01.onrender.com/ws";
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_BACKOFF_STEPS: u32 = 15;
pub const DEFAULT_MAX_LOGS: usize = 1000;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay server options
#[derive(Debug, Parser)]
#[command(name = "activity-relay", version, about = "Relay phone activity logs to live dashboards")]
pub struct ServerArgs {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
}

impl ServerArgs {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddr {
            addr: raw,
            reason: e.to_string(),
        })
    }
}

/// Terminal dashboard options
#[derive(Debug, Parser)]
#[command(name = "activity-dashboard", version, about = "Live feed and counters from an activity relay")]
pub struct DashboardArgs {
    #[arg(long, env = "RELAY_WS_URL", default_value = DEFAULT_WS_URL)]
    pub url: String,

    #[arg(long, default_value_t = 2000)]
    pub reconnect_interval_ms: u64,

    #[arg(long, default_value_t = 1200)]
    pub max_logs: usize,

    #[arg(long, default_value_t = 3000)]
    pub typing_debounce_ms: u64,

    /// Give up on a connect attempt after this long and back off
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Send `{"type":"ping"}` on this interval while connected
    #[arg(long)]
    pub ping_interval_secs: Option<u64>,
}

impl DashboardArgs {
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = ClientConfig::new(&self.url)?;
        config.reconnect_interval = Duration::from_millis(self.reconnect_interval_ms);
        config.max_logs = self.max_logs;
        config.typing_debounce = Duration::from_millis(self.typing_debounce_ms);
        config.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        config.validate()?;
        Ok(config)
    }
}

/// Connection manager settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: Url,
    /// Backoff increment added after every failed cycle
    pub reconnect_interval: Duration,
    /// Backoff cap, in multiples of `reconnect_interval`
    pub max_backoff_steps: u32,
    /// LogBuffer capacity
    pub max_logs: usize,
    pub typing_debounce: Duration,
    /// An attempt still pending after this counts as a failed cycle
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "scheme must be ws or wss".to_string(),
            });
        }

        Ok(Self {
            url: parsed,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_backoff_steps: DEFAULT_MAX_BACKOFF_STEPS,
            max_logs: DEFAULT_MAX_LOGS,
            typing_debounce: DEFAULT_TYPING_DEBOUNCE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_interval.is_zero() {
            return Err(ConfigError::Zero("reconnect interval"));
        }
        if self.max_backoff_steps == 0 {
            return Err(ConfigError::Zero("max backoff steps"));
        }
        if self.max_logs == 0 {
            return Err(ConfigError::Zero("max logs"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Zero("connect timeout"));
        }
        Ok(())
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        self.reconnect_interval.saturating_mul(self.max_backoff_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::new(DEFAULT_WS_URL).unwrap();

        assert_eq!(config.reconnect_interval, Duration::from_millis(2000));
        assert_eq!(config.max_reconnect_delay(), Duration::from_millis(30_000));
        assert_eq!(config.max_logs, 1000);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_http_url() {
        let err = ClientConfig::new("http://localhost:3000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = ClientConfig::new("ws://localhost:3000/ws").unwrap();
        config.max_logs = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("max logs")));
    }

    #[test]
    fn test_dashboard_args() {
        let args = DashboardArgs::parse_from([
            "activity-dashboard",
            "--url",
            "ws://127.0.0.1:3000/ws",
            "--max-logs",
            "50",
            "--reconnect-interval-ms",
            "100",
            "--connect-timeout-secs",
            "3",
        ]);
        let config = args.client_config().unwrap();

        assert_eq!(config.url.as_str(), "ws://127.0.0.1:3000/ws");
        assert_eq!(config.max_logs, 50);
        assert_eq!(config.reconnect_interval, Duration::from_millis(100));
        assert_eq!(config.typing_debounce, Duration::from_millis(3000));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_server_bind_addr() {
        let args = ServerArgs::parse_from(["activity-relay", "--port", "8088", "--host", "127.0.0.1"]);
        assert_eq!(args.bind_addr().unwrap().port(), 8088);
    }
}
