//! The session: connection, subscription and routing state for one client.
//!
//! ```text
//!  SessionEvent ──► Session::handle() ──► Vec<Command>
//!       ▲                                     │
//!       │            (driver, I/O only)       ▼
//!   socket / timer / selection ◄──────── execute
//! ```
//!
//! Every input is an explicit [`SessionEvent`] and every side effect an
//! explicit [`Command`], so the reconnect loop and subscription ordering can
//! be exercised without a network. Events must be fed serially.

use std::time::Duration;

use crate::connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
use crate::protocol::{ControlMessage, DocumentId, ProtocolError};
use crate::router::{NotificationRouter, Route, RouterStats};
use crate::subscription::SubscriptionTracker;

/// Inputs to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The channel was established.
    Opened,
    /// An open channel was lost.
    Closed,
    /// A connection attempt failed before the channel opened.
    ConnectFailed(String),
    /// Text frame received.
    Frame(String),
    /// Binary frame received (not part of the protocol).
    BinaryFrame(usize),
    /// The reconnect delay has passed.
    RetryElapsed,
    /// The user selected a document, or cleared the selection.
    Selected(Option<DocumentId>),
    /// Stop for good.
    Shutdown,
}

/// Side effects requested by the session, executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Send(ControlMessage),
    ScheduleReconnect(Duration),
    Emit(SyncEvent),
    Close,
}

/// Events delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Channel open (online).
    Connected,
    /// Channel lost (offline); a reconnect is scheduled.
    Disconnected,
    /// The current document changed on the server; re-fetch it.
    DocumentUpdated { doc_id: DocumentId, action: String },
}

#[derive(Debug)]
pub struct Session {
    connection: ConnectionManager,
    subscriptions: SubscriptionTracker,
    router: NotificationRouter,
}

impl Session {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            connection: ConnectionManager::new(policy),
            subscriptions: SubscriptionTracker::new(),
            router: NotificationRouter::new(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn current_document(&self) -> Option<&DocumentId> {
        self.subscriptions.current()
    }

    pub fn subscribed_document(&self) -> Option<&DocumentId> {
        self.subscriptions.subscribed()
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Begin the first connection attempt.
    pub fn start(&mut self) -> Vec<Command> {
        if self.connection.connect() {
            vec![Command::Connect]
        } else {
            Vec::new()
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::Opened => self.on_opened(),
            SessionEvent::Closed => self.on_lost(None),
            SessionEvent::ConnectFailed(reason) => self.on_lost(Some(reason)),
            SessionEvent::Frame(raw) => self.on_frame(&raw),
            SessionEvent::BinaryFrame(len) => {
                self.router.anomaly(&ProtocolError::BinaryFrame(len));
                Vec::new()
            }
            SessionEvent::RetryElapsed => {
                if self.connection.retry_elapsed() {
                    log::debug!("Reconnecting (attempt {})", self.connection.attempts() + 1);
                    vec![Command::Connect]
                } else {
                    Vec::new()
                }
            }
            SessionEvent::Selected(selection) => self.on_selected(selection),
            SessionEvent::Shutdown => {
                let was_open = self.connection.state().is_open();
                self.connection.shutdown();
                self.subscriptions.on_disconnect();
                if was_open {
                    vec![Command::Close]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn on_opened(&mut self) -> Vec<Command> {
        if !self.connection.opened() {
            log::warn!("Ignoring open in state {:?}", self.connection.state());
            return Vec::new();
        }
        log::info!("Notification channel open");
        let mut commands = vec![Command::Emit(SyncEvent::Connected)];
        if let Some(msg) = self.subscriptions.on_open() {
            commands.push(Command::Send(msg));
        }
        commands
    }

    fn on_lost(&mut self, reason: Option<String>) -> Vec<Command> {
        let was_open = self.connection.state().is_open();
        let Some(delay) = self.connection.lost() else {
            return Vec::new();
        };
        self.subscriptions.on_disconnect();

        match reason {
            Some(reason) => {
                log::info!("Connection attempt failed: {reason}; retrying in {delay:?}")
            }
            None => log::info!("Notification channel lost; reconnecting in {delay:?}"),
        }

        let mut commands = Vec::with_capacity(2);
        if was_open {
            commands.push(Command::Emit(SyncEvent::Disconnected));
        }
        commands.push(Command::ScheduleReconnect(delay));
        commands
    }

    fn on_frame(&mut self, raw: &str) -> Vec<Command> {
        match self.router.route_raw(raw, self.subscriptions.current()) {
            Route::Refresh { doc_id, action } => {
                vec![Command::Emit(SyncEvent::DocumentUpdated { doc_id, action })]
            }
            Route::Ignore => Vec::new(),
        }
    }

    fn on_selected(&mut self, selection: Option<DocumentId>) -> Vec<Command> {
        let open = self.connection.state().is_open();
        let messages = match selection {
            Some(doc_id) => self.subscriptions.set_current_document(doc_id, open),
            None => self.subscriptions.clear_current_document(open),
        };
        messages.into_iter().map(Command::Send).collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
