use std::time::Duration;

use serde::Deserialize;

const DEFAULT_INIT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;

/// Settings for a `Multiplexer`
///
/// Deserializable so it can sit inside a larger application config; every
/// field except `service_name` has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultiplexerConfig {
    /// Name this process calls out as (the `cn` header)
    pub service_name: String,
    /// Announced to peers during the handshake
    pub process_name: String,
    /// How long a dispatch waits for a connection's handshake
    pub init_timeout_ms: u64,
    /// Deadline applied to requests that carry no timeout of their own
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl MultiplexerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            process_name: format!("switchboard[{}]", std::process::id()),
            init_timeout_ms: DEFAULT_INIT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: MultiplexerConfig =
            serde_json::from_str(r#"{ "service_name": "billing", "init_timeout_ms": 250 }"#)
                .unwrap();

        assert_eq!(config.service_name, "billing");
        assert_eq!(config.init_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.request_timeout(),
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
        );
        assert!(config.process_name.starts_with("switchboard["));
    }
}
