//! Connection lifecycle state machine.
//!
//! ```text
//!               connect()             opened()
//! Disconnected ──────────► Connecting ─────────► Open
//!                            ▲    │                │
//!             retry_elapsed()│    │ lost()         │ lost()
//!                            │    ▼                │
//!                        ReconnectPending ◄────────┘
//! ```
//!
//! The manager performs no I/O. It decides transitions and reconnect delays;
//! the driver in [`crate::client`] owns the socket and the timer.

use std::time::{Duration, Instant};

use rand::Rng;

/// How long a channel must stay open before its failure counter resets.
pub const DEFAULT_STABLE_AFTER: Duration = Duration::from_secs(5);

/// Notification channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    ReconnectPending,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// Delay between reconnect attempts. Retries never stop.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// `initial * 2^attempt`, capped at `max`. With `jitter`, the delay is
    /// drawn uniformly from `[0, capped]`.
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(3))
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                max,
                jitter,
            } => {
                let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let capped = initial.saturating_mul(factor).min(max);
                if jitter && !capped.is_zero() {
                    let millis = capped.as_millis() as u64;
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                } else {
                    capped
                }
            }
        }
    }
}

/// Owns the [`ConnectionState`] and the consecutive-failure counter.
///
/// A channel that drops before `stable_after` counts as a failed attempt,
/// so a server that accepts and immediately disconnects still backs off.
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    policy: ReconnectPolicy,
    attempts: u32,
    stable_after: Duration,
    opened_at: Option<Instant>,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            attempts: 0,
            stable_after: DEFAULT_STABLE_AFTER,
            opened_at: None,
        }
    }

    pub fn with_stable_after(mut self, stable_after: Duration) -> Self {
        self.stable_after = stable_after;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Failed attempts since the channel was last open for `stable_after`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `Disconnected → Connecting`. Returns `false` in any other state;
    /// a pending reconnect proceeds through [`Self::retry_elapsed`].
    pub fn connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// `Connecting → Open`. Returns `false` if no attempt was in progress.
    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        self.opened_at = Some(Instant::now());
        true
    }

    /// Channel lost or attempt failed: `Open | Connecting → ReconnectPending`.
    ///
    /// Returns the delay to wait before the next attempt, or `None` when the
    /// manager was not connected (already pending or shut down).
    pub fn lost(&mut self) -> Option<Duration> {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                if let Some(opened_at) = self.opened_at.take() {
                    if opened_at.elapsed() >= self.stable_after {
                        self.attempts = 0;
                    }
                }
                let delay = self.policy.delay(self.attempts);
                self.attempts = self.attempts.saturating_add(1);
                self.state = ConnectionState::ReconnectPending;
                Some(delay)
            }
            ConnectionState::ReconnectPending | ConnectionState::Disconnected => None,
        }
    }

    /// `ReconnectPending → Connecting`.
    pub fn retry_elapsed(&mut self) -> bool {
        if self.state != ConnectionState::ReconnectPending {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Process shutdown.
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.opened_at = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
