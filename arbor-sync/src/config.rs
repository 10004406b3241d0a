//! Client configuration.

use std::time::Duration;

use crate::connection::ReconnectPolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the document service (`{api_base}/documents/...`).
    pub api_base: String,
    /// Notification channel endpoint.
    pub ws_url: String,
    /// Delay policy between reconnect attempts.
    pub reconnect: ReconnectPolicy,
    /// Upper bound for a single channel handshake.
    pub connect_timeout: Duration,
    /// Upper bound for a single document-service request.
    pub request_timeout: Duration,
    /// Buffered application events before new ones are dropped.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000/api".to_string(),
            ws_url: "ws://localhost:8080".to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Config for testing (local endpoints, fast reconnects).
    pub fn for_testing(ws_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ws_url: ws_url.into(),
            reconnect: ReconnectPolicy::Fixed(Duration::from_millis(50)),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            event_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect, ReconnectPolicy::Fixed(Duration::from_secs(3)));
        assert_eq!(config.event_capacity, 256);
        assert!(config.ws_url.starts_with("ws://"));
    }
}
