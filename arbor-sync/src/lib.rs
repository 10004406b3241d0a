//! # arbor-sync: Real-time sync client for tree-structured documents
//!
//! Keeps one document view in step with a document service: the view is
//! loaded over HTTP, and a WebSocket notification channel tells the client
//! when the current document changed so it can reload.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  select/create   ┌─────────────────┐
//! │ DocumentView │ ───────────────► │ CurrentDocument │
//! │ (HTTP)       │                  └────────┬────────┘
//! └──────┬───────┘                           │ watch
//!        │ render / fetch / insert           ▼
//!        ▼                          ┌─────────────────┐   subscribe    ┌──────────┐
//! ┌──────────────┐                  │ SyncClient      │ ─────────────► │ notifier │
//! │ Document     │                  │  └─ Session     │ ◄───────────── │ (WS)     │
//! │ service      │  ◄── refresh ─── │  (sans-IO core) │ document_update└──────────┘
//! └──────────────┘     SyncEvent    └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON control messages, notifications, paths
//! - [`connection`]: Channel lifecycle and reconnect policy
//! - [`subscription`]: Which document the server is sending us
//! - [`router`]: Notification classification
//! - [`session`]: Event → command state machine tying the above together
//! - [`client`]: tokio/tungstenite driver for the session
//! - [`service`] / [`http`]: Document service boundary and its reqwest client
//! - [`view`]: Load/insert/delete/search against the current document

pub mod client;
pub mod config;
pub mod connection;
pub mod current;
pub mod error;
pub mod http;
pub mod protocol;
pub mod router;
pub mod service;
pub mod session;
pub mod subscription;
pub mod view;

// Re-exports for convenience
pub use client::SyncClient;
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use current::CurrentDocument;
pub use error::{SyncError, ValidationError};
pub use http::HttpDocumentService;
pub use protocol::{ControlMessage, DocumentId, Notification, Path, ProtocolError};
pub use router::{NotificationRouter, Route, RouterStats};
pub use service::{DocumentService, ElementKind, InsertPayload};
pub use session::{Command, Session, SessionEvent, SyncEvent};
pub use subscription::SubscriptionTracker;
pub use view::{Delivery, DocumentView, LoadOutcome, Mutation, ViewSink};
