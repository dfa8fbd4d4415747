//! Connection-status tracking for the health-check cadence.

/// What the status indicator shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No check has completed yet.
    Unknown,
    Connected,
    /// Recent misses, not yet written off.
    Degraded { missed: u32 },
    Down,
}

/// Misses before Degraded becomes Down.
const DOWN_THRESHOLD: u32 = 3;

/// Folds health-check results into a display state. Isolated failures
/// degrade; the checker itself never aborts on them.
#[derive(Debug)]
pub struct ConnectionHealth {
    state: ConnectionState,
    last_ok_ms: Option<i64>,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self { state: ConnectionState::Unknown, last_ok_ms: None }
    }
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_ok_ms(&self) -> Option<i64> {
        self.last_ok_ms
    }

    pub fn record_success(&mut self, now_ms: i64) {
        self.state = ConnectionState::Connected;
        self.last_ok_ms = Some(now_ms);
    }

    pub fn record_failure(&mut self) {
        self.state = match self.state {
            ConnectionState::Degraded { missed } if missed + 1 >= DOWN_THRESHOLD => {
                ConnectionState::Down
            }
            ConnectionState::Degraded { missed } => ConnectionState::Degraded { missed: missed + 1 },
            ConnectionState::Down => ConnectionState::Down,
            _ => ConnectionState::Degraded { missed: 1 },
        };
    }
}
