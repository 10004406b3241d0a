use std::time::Duration;

use arbor_sync::{ClientConfig, ReconnectPolicy};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "arbor", about = "Follow a tree document from the terminal")]
pub struct Args {
    /// Base URL of the document service.
    #[arg(long, env = "ARBOR_API_BASE", default_value = "http://localhost:8000/api")]
    pub api_base: String,

    /// Notification channel endpoint.
    #[arg(long, env = "ARBOR_WS_URL", default_value = "ws://localhost:8080")]
    pub ws_url: String,

    /// Seconds between reconnect attempts (initial delay with --backoff).
    #[arg(long, env = "ARBOR_RECONNECT_SECS", default_value_t = 3)]
    pub reconnect_secs: u64,

    /// Back off exponentially, with jitter, up to a minute between attempts.
    #[arg(long, env = "ARBOR_BACKOFF")]
    pub backoff: bool,

    /// Document to open on start.
    #[arg(long)]
    pub open: Option<String>,
}

impl Args {
    pub fn config(&self) -> ClientConfig {
        let delay = Duration::from_secs(self.reconnect_secs);
        let reconnect = if self.backoff {
            ReconnectPolicy::Exponential {
                initial: delay,
                max: Duration::from_secs(60).max(delay),
                jitter: true,
            }
        } else {
            ReconnectPolicy::Fixed(delay)
        };

        ClientConfig {
            api_base: self.api_base.clone(),
            ws_url: self.ws_url.clone(),
            reconnect,
            ..ClientConfig::default()
        }
    }
}
