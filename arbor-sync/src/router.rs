//! Classifies inbound frames and decides which ones warrant a refresh.

use crate::protocol::{DocumentId, Notification, ProtocolError};

/// Routing decision for one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The current document changed; re-fetch it.
    Refresh { doc_id: DocumentId, action: String },
    /// Informational, stale, or malformed.
    Ignore,
}

/// Stateless router. Counts what it sees for diagnostics.
#[derive(Debug, Default)]
pub struct NotificationRouter {
    stats: RouterStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub refreshes: u64,
    pub discarded_updates: u64,
    pub acknowledgements: u64,
    pub server_errors: u64,
    pub anomalies: u64,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Decode and route a raw text frame. Undecodable frames are logged and
    /// ignored.
    pub fn route_raw(&mut self, raw: &str, current: Option<&DocumentId>) -> Route {
        match Notification::decode(raw) {
            Ok(notification) => self.route(notification, current),
            Err(e) => {
                self.anomaly(&e);
                Route::Ignore
            }
        }
    }

    pub fn route(&mut self, notification: Notification, current: Option<&DocumentId>) -> Route {
        match notification {
            Notification::Subscribed { doc_id } => {
                self.stats.acknowledgements += 1;
                log::info!("Subscribed to document {doc_id}");
                Route::Ignore
            }
            Notification::Unsubscribed { doc_id } => {
                self.stats.acknowledgements += 1;
                log::info!("Unsubscribed from document {doc_id}");
                Route::Ignore
            }
            Notification::Error { message } => {
                self.stats.server_errors += 1;
                log::warn!("Notification server error: {message}");
                Route::Ignore
            }
            Notification::DocumentUpdate { doc_id, action } => {
                if current == Some(&doc_id) {
                    self.stats.refreshes += 1;
                    log::debug!("Document {doc_id} updated ({action}), refreshing");
                    Route::Refresh { doc_id, action }
                } else {
                    self.stats.discarded_updates += 1;
                    log::debug!("Discarding {action} update for non-current document {doc_id}");
                    Route::Ignore
                }
            }
        }
    }

    /// Record a frame that could not be interpreted at all.
    pub fn anomaly(&mut self, error: &ProtocolError) {
        self.stats.anomalies += 1;
        log::warn!("Ignoring notification: {error}");
    }
}
