//! Transmission policy: delta, compressed delta, or full sync
//!
//! Wraps a [`DeltaTracker`] and decides, on each outbound tick, what is
//! worth sending. Full syncs are forced periodically and after a burst
//! of deltas so a peer that missed traffic converges anyway; an
//! immediate path exists for latency-sensitive moments (line clears,
//! garbage injection) where staleness is unacceptable.

use crate::delta::{DeltaBatch, DeltaTracker, ScalarState};
use crate::rle::{self, CompressedBatch};
use crate::StateError;
use gridbout_board::BoardState;
use std::time::{Duration, Instant};
use tracing::debug;

/// Thresholds for the transmission policy
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Force a full sync when this much time passed since the last one
    pub full_sync_interval: Duration,
    /// Force a full sync after this many delta batches
    pub full_sync_delta_limit: u32,
    /// Compress batches with at least this many cell deltas
    pub compress_min_cells: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            full_sync_interval: Duration::from_secs(30),
            full_sync_delta_limit: 100,
            compress_min_cells: 12,
        }
    }
}

/// What the policy decided to transmit this tick
#[derive(Debug, Clone, PartialEq)]
pub enum SyncDecision {
    /// Nothing changed; send nothing
    Skip,
    Delta(DeltaBatch),
    Compressed(CompressedBatch),
    FullSync(DeltaBatch),
}

/// Traffic bookkeeping. Purely diagnostic; nothing reads it to make
/// protocol decisions.
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub deltas_sent: u64,
    pub compressed_sent: u64,
    pub full_syncs_sent: u64,
    pub skipped_ticks: u64,
    pub delta_bytes_estimate: u64,
    pub full_sync_bytes_estimate: u64,
}

/// Decides per tick between skipping, a delta, its compressed form, or a
/// full sync
pub struct SyncPolicy {
    tracker: DeltaTracker,
    config: SyncConfig,
    last_full_sync: Instant,
    deltas_since_full: u32,
    stats: SyncStats,
}

impl SyncPolicy {
    pub fn new(rows: u8, cols: u8, config: SyncConfig) -> Self {
        Self {
            tracker: DeltaTracker::new(rows, cols),
            config,
            last_full_sync: Instant::now(),
            deltas_since_full: 0,
            stats: SyncStats::default(),
        }
    }

    /// Outbound tick: apply the threshold logic against the current
    /// snapshot
    pub fn tick(
        &mut self,
        board: &BoardState,
        scalars: &ScalarState,
    ) -> Result<SyncDecision, StateError> {
        self.tick_at(Instant::now(), board, scalars)
    }

    /// Same as [`tick`](Self::tick) with an explicit clock, for
    /// deterministic tests
    pub fn tick_at(
        &mut self,
        now: Instant,
        board: &BoardState,
        scalars: &ScalarState,
    ) -> Result<SyncDecision, StateError> {
        let elapsed = now.duration_since(self.last_full_sync);
        if elapsed >= self.config.full_sync_interval
            || self.deltas_since_full >= self.config.full_sync_delta_limit
        {
            debug!(
                ?elapsed,
                deltas = self.deltas_since_full,
                "full sync threshold reached"
            );
            return Ok(SyncDecision::FullSync(self.full_sync_at(now, board, scalars)));
        }

        match self.tracker.compute_delta(board, scalars)? {
            None => {
                self.stats.skipped_ticks += 1;
                Ok(SyncDecision::Skip)
            }
            Some(batch) => {
                self.deltas_since_full += 1;
                if batch.cells.len() >= self.config.compress_min_cells {
                    let compressed = rle::compress(&batch);
                    self.stats.compressed_sent += 1;
                    self.stats.delta_bytes_estimate += compressed.wire_cost() as u64;
                    Ok(SyncDecision::Compressed(compressed))
                } else {
                    self.stats.deltas_sent += 1;
                    self.stats.delta_bytes_estimate += batch.wire_cost() as u64;
                    Ok(SyncDecision::Delta(batch))
                }
            }
        }
    }

    /// Bypass the thresholds and emit a full sync right now. The tracker
    /// is force-updated so later deltas are relative to the sent state.
    pub fn send_immediate(&mut self, board: &BoardState, scalars: &ScalarState) -> DeltaBatch {
        self.full_sync_at(Instant::now(), board, scalars)
    }

    fn full_sync_at(
        &mut self,
        now: Instant,
        board: &BoardState,
        scalars: &ScalarState,
    ) -> DeltaBatch {
        let batch = self.tracker.create_full_sync(board, scalars);
        self.last_full_sync = now;
        self.deltas_since_full = 0;
        self.stats.full_syncs_sent += 1;
        self.stats.full_sync_bytes_estimate += batch.wire_cost() as u64;
        batch
    }

    /// Overwrite the tracker cache without emitting anything; see
    /// [`DeltaTracker::force_update`]
    pub fn force_update(&mut self, board: &BoardState, scalars: &ScalarState) {
        self.tracker.force_update(board, scalars);
    }

    /// Reset tracker and counters, as on game restart
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.last_full_sync = Instant::now();
        self.deltas_since_full = 0;
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbout_board::CellColor;

    fn config() -> SyncConfig {
        SyncConfig {
            full_sync_interval: Duration::from_secs(30),
            full_sync_delta_limit: 3,
            compress_min_cells: 4,
        }
    }

    #[test]
    fn unchanged_board_is_skipped_and_counted() {
        let mut policy = SyncPolicy::new(20, 10, config());
        let board = BoardState::standard();
        let scalars = ScalarState::default();

        let decision = policy.tick(&board, &scalars).unwrap();

        assert_eq!(decision, SyncDecision::Skip);
        assert_eq!(policy.stats().skipped_ticks, 1);
    }

    #[test]
    fn small_batches_go_raw_large_batches_compressed() {
        let mut policy = SyncPolicy::new(20, 10, config());
        let mut board = BoardState::standard();
        let scalars = ScalarState::default();

        board.set(0, 19, Some(CellColor(1)));
        assert!(matches!(
            policy.tick(&board, &scalars).unwrap(),
            SyncDecision::Delta(_)
        ));

        for x in 0..6 {
            board.set(x, 18, Some(CellColor(2)));
        }
        assert!(matches!(
            policy.tick(&board, &scalars).unwrap(),
            SyncDecision::Compressed(_)
        ));
    }

    #[test]
    fn delta_count_threshold_forces_full_sync() {
        let mut policy = SyncPolicy::new(20, 10, config());
        let mut board = BoardState::standard();
        let scalars = ScalarState::default();

        for i in 0..3u8 {
            board.set(i, 19, Some(CellColor(1)));
            let decision = policy.tick(&board, &scalars).unwrap();
            assert!(matches!(decision, SyncDecision::Delta(_)), "tick {i}");
        }

        // Third delta hit the limit; the next tick full-syncs even though
        // only one cell changed
        board.set(5, 19, Some(CellColor(1)));
        let decision = policy.tick(&board, &scalars).unwrap();
        assert!(matches!(decision, SyncDecision::FullSync(_)));
        assert_eq!(policy.stats().full_syncs_sent, 1);
    }

    #[test]
    fn time_threshold_forces_full_sync() {
        let mut policy = SyncPolicy::new(4, 4, config());
        let board = BoardState::new(4, 4);
        let scalars = ScalarState::default();

        let later = Instant::now() + Duration::from_secs(31);
        let decision = policy.tick_at(later, &board, &scalars).unwrap();

        assert!(matches!(decision, SyncDecision::FullSync(_)));
    }

    #[test]
    fn immediate_path_resets_counters_and_tracker() {
        let mut policy = SyncPolicy::new(20, 10, config());
        let mut board = BoardState::standard();
        let scalars = ScalarState::default();

        board.set(0, 19, Some(CellColor(1)));
        policy.tick(&board, &scalars).unwrap();

        let batch = policy.send_immediate(&board, &scalars);
        assert_eq!(batch.cells.len(), 200);

        // Tracker converged on the sent state; nothing more to report
        assert_eq!(policy.tick(&board, &scalars).unwrap(), SyncDecision::Skip);
        assert_eq!(policy.stats().full_syncs_sent, 1);
    }
}
