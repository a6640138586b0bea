//! Process-level settings (§1.3), environment-overridable with the
//! numeric defaults fixed by spec.md §5.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub listen_addr: String,
    pub informer_sync_timeout: Duration,
    pub events_tick_interval: Duration,
    pub sse_keep_alive_interval: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            informer_sync_timeout: Duration::from_secs(30),
            events_tick_interval: Duration::from_secs(1),
            sse_keep_alive_interval: Duration::from_secs(15),
        }
    }
}

impl GatewaySettings {
    /// Reads overrides from the environment, falling back to the defaults
    /// above for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("GATEWAY_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            informer_sync_timeout: env_secs("GATEWAY_INFORMER_SYNC_TIMEOUT_SECS")
                .unwrap_or(defaults.informer_sync_timeout),
            events_tick_interval: env_secs("GATEWAY_EVENTS_TICK_SECS")
                .unwrap_or(defaults.events_tick_interval),
            sse_keep_alive_interval: env_secs("GATEWAY_SSE_KEEPALIVE_SECS")
                .unwrap_or(defaults.sse_keep_alive_interval),
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_usize(key).map(|n| Duration::from_secs(n as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fixed_numeric_contract() {
        let s = GatewaySettings::default();
        assert_eq!(s.informer_sync_timeout, Duration::from_secs(30));
        assert_eq!(s.events_tick_interval, Duration::from_secs(1));
    }
}
