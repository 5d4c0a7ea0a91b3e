//! Board diffing for efficient synchronization
//!
//! Generates compact per-cell deltas between board snapshots

use crate::StateError;
use gridbout_board::{BoardState, Cell};
use rkyv::{Archive, Deserialize, Serialize};

/// One changed cell: position and its new value
#[derive(Archive, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct CellDelta {
    pub x: u8,
    pub y: u8,
    pub cell: Cell,
}

/// Scalar game state that rides along with board deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalarState {
    pub score: u32,
    pub level: u32,
    /// Rows currently queued against this player, shown on the
    /// opponent's side as a warning indicator
    pub incoming_garbage: u32,
}

/// A batch of changes since the last acknowledged snapshot
///
/// Scalar fields are present only when they changed. An empty batch is
/// never sent; `DeltaTracker::compute_delta` returns `None` instead.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct DeltaBatch {
    pub cells: Vec<CellDelta>,
    pub score: Option<u32>,
    pub level: Option<u32>,
    pub incoming_garbage: Option<u32>,
}

/// Estimated wire bytes per cell delta: x, y, presence tag, packed color
pub(crate) const CELL_DELTA_WIRE_COST: usize = 7;

impl DeltaBatch {
    fn empty() -> Self {
        Self {
            cells: Vec::new(),
            score: None,
            level: None,
            incoming_garbage: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
            && self.score.is_none()
            && self.level.is_none()
            && self.incoming_garbage.is_none()
    }

    /// Apply this batch to a board and scalar state. Exhaustive batches
    /// (full syncs) fully overwrite the board; sparse batches touch only
    /// the cells they carry.
    pub fn apply(
        &self,
        board: &mut BoardState,
        scalars: &mut ScalarState,
    ) -> Result<(), StateError> {
        for delta in &self.cells {
            if !board.in_bounds(delta.x, delta.y) {
                return Err(StateError::OutOfRange {
                    x: delta.x,
                    y: delta.y,
                });
            }
            board.set(delta.x, delta.y, delta.cell);
        }
        if let Some(score) = self.score {
            scalars.score = score;
        }
        if let Some(level) = self.level {
            scalars.level = level;
        }
        if let Some(incoming) = self.incoming_garbage {
            scalars.incoming_garbage = incoming;
        }
        Ok(())
    }

    /// Rough wire size used by the sync policy's traffic statistics
    pub fn wire_cost(&self) -> usize {
        let scalar_cost = [self.score, self.level, self.incoming_garbage]
            .iter()
            .flatten()
            .count()
            * 5;
        self.cells.len() * CELL_DELTA_WIRE_COST + scalar_cost
    }
}

/// Tracks the last-transmitted snapshot and produces deltas against it
///
/// The cache always converges to the argument of the last call, whether
/// or not anything was reported; later diffs are computed relative to
/// exactly what the peer has been told.
pub struct DeltaTracker {
    prev_board: BoardState,
    prev_scalars: ScalarState,
}

impl DeltaTracker {
    /// Create a tracker whose previous state is the empty board
    pub fn new(rows: u8, cols: u8) -> Self {
        Self {
            prev_board: BoardState::new(rows, cols),
            prev_scalars: ScalarState::default(),
        }
    }

    fn check_dimensions(&self, board: &BoardState) -> Result<(), StateError> {
        if board.rows() != self.prev_board.rows() || board.cols() != self.prev_board.cols() {
            return Err(StateError::DimensionMismatch {
                expected_rows: self.prev_board.rows(),
                expected_cols: self.prev_board.cols(),
                rows: board.rows(),
                cols: board.cols(),
            });
        }
        Ok(())
    }

    /// Diff the current snapshot against the cached previous one.
    /// Returns `None` when no cell or scalar changed.
    pub fn compute_delta(
        &mut self,
        board: &BoardState,
        scalars: &ScalarState,
    ) -> Result<Option<DeltaBatch>, StateError> {
        self.check_dimensions(board)?;

        let mut batch = DeltaBatch::empty();
        for (x, y, cell) in board.iter() {
            if cell != self.prev_board.cell(x, y) {
                batch.cells.push(CellDelta { x, y, cell });
                self.prev_board.set(x, y, cell);
            }
        }

        if scalars.score != self.prev_scalars.score {
            batch.score = Some(scalars.score);
        }
        if scalars.level != self.prev_scalars.level {
            batch.level = Some(scalars.level);
        }
        if scalars.incoming_garbage != self.prev_scalars.incoming_garbage {
            batch.incoming_garbage = Some(scalars.incoming_garbage);
        }
        self.prev_scalars = *scalars;

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    /// Emit one delta per cell unconditionally and force-sync the cache.
    /// Used for the initial handshake and periodic resync.
    pub fn create_full_sync(&mut self, board: &BoardState, scalars: &ScalarState) -> DeltaBatch {
        let batch = DeltaBatch {
            cells: board.iter().map(|(x, y, cell)| CellDelta { x, y, cell }).collect(),
            score: Some(scalars.score),
            level: Some(scalars.level),
            incoming_garbage: Some(scalars.incoming_garbage),
        };
        self.force_update(board, scalars);
        batch
    }

    /// Overwrite the cache without emitting anything. Called after a full
    /// sync has been sent, and after reconnection when everything sent
    /// before the drop is distrusted.
    pub fn force_update(&mut self, board: &BoardState, scalars: &ScalarState) {
        self.prev_board = board.clone();
        self.prev_scalars = *scalars;
    }

    /// Return the cache to the empty board, as on game restart
    pub fn reset(&mut self) {
        self.prev_board.clear();
        self.prev_scalars = ScalarState::default();
    }
}
