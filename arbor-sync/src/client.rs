//! WebSocket driver for the notification channel.
//!
//! One background task owns the socket and the [`Session`]. It waits on
//! exactly one of: an inbound frame, the handshake in progress, a selection
//! change, the reconnect timer, room in the event queue, or shutdown. It feeds
//! the result to the session and executes the returned commands in order
//! before waiting again. All session state is therefore mutated serially,
//! without locks, and no command awaits the network.
//!
//! ```text
//!  CurrentDocument ──watch──┐
//!  reconnect timer ─────────┼──► Session ──► socket writes
//!  socket frames ───────────┘       │
//!                                   └──► mpsc<SyncEvent> ──► application
//! ```

use std::collections::VecDeque;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::connection::ConnectionState;
use crate::current::CurrentDocument;
use crate::protocol::DocumentId;
use crate::session::{Command, Session, SessionEvent, SyncEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the background sync task.
///
/// Dropping the handle stops the task.
pub struct SyncClient {
    state: watch::Receiver<ConnectionState>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    ws_url: String,
}

impl SyncClient {
    /// Spawn the driver and start connecting. Must be called inside a tokio
    /// runtime.
    pub fn spawn(config: &ClientConfig, current: &CurrentDocument) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (stop_tx, stop_rx) = oneshot::channel();

        let driver = Driver {
            url: config.ws_url.clone(),
            connect_timeout: config.connect_timeout,
            session: Session::new(config.reconnect.clone()),
            selection: current.watch(),
            events: event_tx,
            state: state_tx,
            socket: None,
            connecting: None,
            retry_at: None,
            backlog: EventBacklog::default(),
        };
        let task = tokio::spawn(driver.run(stop_rx));

        Self {
            state: state_rx,
            event_rx: Some(event_rx),
            stop_tx: Some(stop_tx),
            task: Some(task),
            ws_url: config.ws_url.clone(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that wakes on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Close the channel and wait for the driver to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Sync task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }
}

/// What woke the driver.
enum Wake {
    Stop,
    Selection { alive: bool },
    Retry,
    Handshake(Result<WsStream, String>),
    Frame(Option<Result<Message, tungstenite::Error>>),
    Delivered,
}

type Handshake = BoxFuture<'static, Result<WsStream, String>>;

struct Driver {
    url: String,
    connect_timeout: Duration,
    session: Session,
    selection: watch::Receiver<Option<DocumentId>>,
    events: mpsc::Sender<SyncEvent>,
    state: watch::Sender<ConnectionState>,
    socket: Option<WsStream>,
    connecting: Option<Handshake>,
    retry_at: Option<Instant>,
    backlog: EventBacklog,
}

impl Driver {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut pending: VecDeque<Command> = VecDeque::new();

        let initial = self.selection.borrow_and_update().clone();
        if initial.is_some() {
            pending.extend(self.session.handle(SessionEvent::Selected(initial)));
        }
        pending.extend(self.session.start());

        loop {
            while let Some(command) = pending.pop_front() {
                let follow_up = self.execute(command).await;
                pending.extend(follow_up);
            }
            self.publish_state();

            let wake = tokio::select! {
                _ = &mut stop_rx => Wake::Stop,
                changed = self.selection.changed() => Wake::Selection { alive: changed.is_ok() },
                _ = wait_until(self.retry_at) => Wake::Retry,
                result = handshake(&mut self.connecting) => Wake::Handshake(result),
                frame = next_frame(&mut self.socket) => Wake::Frame(frame),
                _ = deliver(&self.events, &mut self.backlog), if !self.backlog.is_empty() => {
                    Wake::Delivered
                }
            };

            let event = match wake {
                Wake::Stop | Wake::Selection { alive: false } => {
                    self.connecting = None;
                    for command in self.session.handle(SessionEvent::Shutdown) {
                        self.execute(command).await;
                    }
                    self.publish_state();
                    log::info!("Sync client stopped");
                    return;
                }
                Wake::Selection { alive: true } => {
                    SessionEvent::Selected(self.selection.borrow_and_update().clone())
                }
                Wake::Retry => {
                    self.retry_at = None;
                    SessionEvent::RetryElapsed
                }
                Wake::Handshake(result) => {
                    self.connecting = None;
                    match result {
                        Ok(stream) => {
                            self.socket = Some(stream);
                            SessionEvent::Opened
                        }
                        Err(reason) => SessionEvent::ConnectFailed(reason),
                    }
                }
                Wake::Frame(frame) => match self.classify(frame) {
                    Some(event) => event,
                    None => continue,
                },
                Wake::Delivered => continue,
            };
            pending.extend(self.session.handle(event));
        }
    }

    /// Observers see `Open` before the `Connected` event.
    fn publish_state(&self) {
        let state = self.session.connection_state();
        self.state.send_if_modified(|published| {
            if *published == state {
                false
            } else {
                *published = state;
                true
            }
        });
    }

    /// Ping/pong and raw frames yield `None`; tungstenite answers pings itself.
    fn classify(
        &mut self,
        frame: Option<Result<Message, tungstenite::Error>>,
    ) -> Option<SessionEvent> {
        let event = match frame {
            Some(Ok(Message::Text(text))) => SessionEvent::Frame(text.as_str().to_owned()),
            Some(Ok(Message::Binary(data))) => SessionEvent::BinaryFrame(data.len()),
            Some(Ok(Message::Close(frame))) => {
                log::debug!("Server closed the channel: {frame:?}");
                self.socket = None;
                SessionEvent::Closed
            }
            Some(Ok(_)) => return None,
            Some(Err(e)) => {
                log::warn!("WebSocket error: {e}");
                self.socket = None;
                SessionEvent::Closed
            }
            None => {
                self.socket = None;
                SessionEvent::Closed
            }
        };
        Some(event)
    }

    async fn execute(&mut self, command: Command) -> Vec<Command> {
        match command {
            Command::Connect => {
                log::debug!("Connecting to {}", self.url);
                self.connecting = Some(open_channel(self.url.clone(), self.connect_timeout));
                Vec::new()
            }
            Command::Send(msg) => {
                let Some(socket) = self.socket.as_mut() else {
                    return Vec::new();
                };
                let text = match msg.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        log::error!("Dropping control message: {e}");
                        return Vec::new();
                    }
                };
                log::debug!("Sending {text}");
                match socket.send(Message::text(text)).await {
                    Ok(()) => Vec::new(),
                    Err(e) => {
                        log::warn!("Failed to send control message: {e}");
                        self.socket = None;
                        self.session.handle(SessionEvent::Closed)
                    }
                }
            }
            Command::ScheduleReconnect(delay) => {
                self.retry_at = Some(Instant::now() + delay);
                Vec::new()
            }
            Command::Emit(event) => {
                self.publish_state();
                self.emit(event);
                Vec::new()
            }
            Command::Close => {
                if let Some(mut socket) = self.socket.take() {
                    if let Err(e) = socket.close(None).await {
                        log::debug!("Close handshake failed: {e}");
                    }
                }
                Vec::new()
            }
        }
    }

    /// Hand `event` to the application, or park it while the queue is full.
    fn emit(&mut self, event: SyncEvent) {
        if !self.backlog.is_empty() {
            self.backlog.push(event);
            return;
        }
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                log::debug!("Event queue full, holding {event:?}");
                self.backlog.push(event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

fn open_channel(url: String, limit: Duration) -> Handshake {
    async move {
        match tokio::time::timeout(limit, tokio_tungstenite::connect_async(url.as_str())).await {
            Ok(Ok((stream, _))) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {limit:?}")),
        }
    }
    .boxed()
}

/// Events waiting for room in the application queue.
///
/// Refreshes are idempotent, so one pending refresh per document stands for
/// any number. Only the latest online/offline transition is kept.
#[derive(Debug, Default)]
struct EventBacklog {
    events: VecDeque<SyncEvent>,
}

impl EventBacklog {
    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::DocumentUpdated { ref doc_id, .. } => {
                let queued = self.events.iter().any(|pending| {
                    matches!(
                        pending,
                        SyncEvent::DocumentUpdated { doc_id: queued, .. } if queued == doc_id
                    )
                });
                if queued {
                    return;
                }
            }
            SyncEvent::Connected | SyncEvent::Disconnected => {
                self.events.retain(|pending| {
                    !matches!(pending, SyncEvent::Connected | SyncEvent::Disconnected)
                });
            }
        }
        self.events.push_back(event);
    }

    fn pop(&mut self) -> Option<SyncEvent> {
        self.events.pop_front()
    }

    fn clear(&mut self) {
        self.events.clear();
    }
}

async fn deliver(events: &mpsc::Sender<SyncEvent>, backlog: &mut EventBacklog) {
    match events.reserve().await {
        Ok(permit) => {
            if let Some(event) = backlog.pop() {
                permit.send(event);
            }
        }
        Err(_) => backlog.clear(),
    }
}

async fn handshake(pending: &mut Option<Handshake>) -> Result<WsStream, String> {
    match pending {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
