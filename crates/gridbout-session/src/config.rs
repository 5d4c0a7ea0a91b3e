//! Session configuration

use gridbout_board::{BOARD_COLS, BOARD_ROWS};
use gridbout_state::SyncConfig;
use std::time::Duration;

/// Tunables for one peer session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub board_rows: u8,
    pub board_cols: u8,

    /// Interval between outbound pings while gameplay is running
    pub heartbeat_interval: Duration,
    /// Pong silence past this is reported as elevated latency; an RTT at
    /// or above it is reported as laggy
    pub lag_threshold: Duration,
    /// Pong silence past this triggers reconnection
    pub disconnect_threshold: Duration,

    /// Bounded reconnection attempts before giving up
    pub reconnect_attempts: u32,
    /// Fixed delay before each reconnection attempt
    pub reconnect_backoff: Duration,

    /// Interval between outbound sync ticks
    pub sync_interval: Duration,
    /// Transmission policy thresholds
    pub sync: SyncConfig,

    /// Cap on attack rows outstanding against this player
    pub max_outstanding_garbage: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_rows: BOARD_ROWS,
            board_cols: BOARD_COLS,
            heartbeat_interval: Duration::from_millis(1000),
            lag_threshold: Duration::from_millis(2000),
            disconnect_threshold: Duration::from_millis(5000),
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(2000),
            sync_interval: Duration::from_millis(50),
            sync: SyncConfig::default(),
            max_outstanding_garbage: gridbout_state::garbage::DEFAULT_MAX_OUTSTANDING,
        }
    }
}
