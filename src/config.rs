use std::time::Duration;

/// Controller settings, loaded from environment variables with sensible
/// defaults (call `dotenvy::dotenv()` first to pick up a `.env` file).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the dashboard backend (feed + algo routes)
    pub base_url: String,
    /// Base URL for the streaming price channel
    pub ws_url: String,
    /// Trading pair selected on startup
    pub default_pair: String,
    /// Cadence of the periodic reconciliation pass
    pub sync_interval: Duration,
    /// Cadence of the trade marker refresh
    pub marker_refresh_interval: Duration,
    /// Cadence of the active-orders poll during a close sequence
    pub order_poll_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("DASH_BASE_URL", "http://127.0.0.1:8000"),
            ws_url: env_or("DASH_WS_URL", "ws://127.0.0.1:8000"),
            default_pair: env_or("DEFAULT_PAIR", "KCS-USDT"),
            sync_interval: Duration::from_secs(env_parsed("SYNC_INTERVAL_SECS", 10)),
            marker_refresh_interval: Duration::from_secs(env_parsed("MARKER_REFRESH_SECS", 5)),
            order_poll_interval: Duration::from_secs(env_parsed("ORDER_POLL_SECS", 5)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Mask a secret for display: keep the first and last three characters,
/// star out the middle. Short values are fully starred.
pub fn mask_value(value: &str) -> String {
    if value.len() <= 6 {
        return "*".repeat(value.len());
    }
    format!(
        "{}{}{}",
        &value[..3],
        "*".repeat(value.len() - 6),
        &value[value.len() - 3..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Only assert keys this test does not set elsewhere
        let settings = Settings::from_env();
        assert!(settings.base_url.starts_with("http"));
        assert!(settings.ws_url.starts_with("ws"));
        assert!(!settings.default_pair.is_empty());
        assert!(settings.marker_refresh_interval >= Duration::from_secs(1));
    }

    #[test]
    fn test_mask_value_short() {
        assert_eq!(mask_value("abc"), "***");
        assert_eq!(mask_value("abcdef"), "******");
    }

    #[test]
    fn test_mask_value_long() {
        assert_eq!(mask_value("supersecretkey"), "sup********key");
    }

    #[test]
    fn test_mask_value_empty() {
        assert_eq!(mask_value(""), "");
    }
}
