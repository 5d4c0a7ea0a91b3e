//! Incoming attack queue and garbage-row bookkeeping
//!
//! Masks received from the opponent wait in a bounded FIFO and are
//! injected into the local board only at a spawn boundary, never
//! mid-drop. A flags array parallel to the board rows records which rows
//! originated as attacks; it is shifted in the same pass as the board on
//! every injection and clear, so flag-to-row correspondence never
//! drifts. Clearing a flagged row credits it back against the
//! outstanding-garbage cap.

use gridbout_board::{BoardState, RowMask, GARBAGE_COLOR};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Default cap on attack rows outstanding against one player, pending
/// plus already on the board
pub const DEFAULT_MAX_OUTSTANDING: usize = 10;

/// FIFO of row attack masks awaiting injection, plus the per-row flags
/// tracking garbage already on the board
pub struct GarbageQueue {
    pending: VecDeque<RowMask>,
    /// One entry per board row, index-aligned with the board; true means
    /// the row's contents were injected from an attack
    flags: Vec<bool>,
    on_board: usize,
    max_outstanding: usize,
    dropped_masks: u64,
}

impl GarbageQueue {
    pub fn new(board_rows: u8, max_outstanding: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            flags: vec![false; board_rows as usize],
            on_board: 0,
            max_outstanding,
            dropped_masks: 0,
        }
    }

    /// Append incoming masks. Capacity is `max_outstanding` minus rows
    /// already pending or on the board; excess masks are dropped
    /// newest-first rather than queued. Returns the new pending count.
    pub fn enqueue(&mut self, masks: impl IntoIterator<Item = RowMask>) -> usize {
        for mask in masks {
            if self.pending.len() + self.on_board >= self.max_outstanding {
                self.dropped_masks += 1;
                warn!(
                    pending = self.pending.len(),
                    on_board = self.on_board,
                    "attack mask dropped, outstanding cap reached"
                );
                continue;
            }
            self.pending.push_back(mask);
        }
        self.pending.len()
    }

    /// Inject pending masks into the board. Must be called only at a
    /// spawn boundary; the caller gates this. The board and the flags
    /// array shift up together, one row per mask, until the queue drains
    /// or the cap is reached; a remainder past the cap is discarded.
    pub fn apply_pending(&mut self, board: &mut BoardState) -> usize {
        let mut available = self.max_outstanding.saturating_sub(self.on_board);
        let mut injected = 0;

        while available > 0 {
            let Some(mask) = self.pending.pop_front() else {
                break;
            };
            board.shift_up_and_inject(mask, GARBAGE_COLOR);
            self.flags.remove(0);
            self.flags.push(true);
            self.on_board += 1;
            available -= 1;
            injected += 1;
        }

        if !self.pending.is_empty() {
            self.dropped_masks += self.pending.len() as u64;
            warn!(
                discarded = self.pending.len(),
                "pending attack masks discarded, board at outstanding cap"
            );
            self.pending.clear();
        }

        if injected > 0 {
            debug!(injected, on_board = self.on_board, "garbage rows injected");
        }
        injected
    }

    /// Reconcile a line clear the game just performed. Flagged rows
    /// among the cleared ones are credited back; the flags array is then
    /// compacted with the same remove-and-shift-down transform the game
    /// applied to the board.
    pub fn on_rows_cleared(&mut self, cleared: &[u8]) {
        let mut rows: Vec<u8> = cleared
            .iter()
            .copied()
            .filter(|&y| (y as usize) < self.flags.len())
            .collect();
        rows.sort_unstable();
        rows.dedup();

        // Remove from the bottom up so earlier removals don't shift the
        // indices of later ones
        for &y in rows.iter().rev() {
            if self.flags[y as usize] {
                self.on_board -= 1;
            }
            self.flags.remove(y as usize);
        }
        for _ in 0..rows.len() {
            self.flags.insert(0, false);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Garbage rows currently on the board
    pub fn on_board_count(&self) -> usize {
        self.on_board
    }

    /// Whether the row at index y originated from an attack
    pub fn is_garbage_row(&self, y: u8) -> bool {
        self.flags.get(y as usize).copied().unwrap_or(false)
    }

    /// Total masks dropped to the overflow policy, for diagnostics
    pub fn dropped_masks(&self) -> u64 {
        self.dropped_masks
    }

    /// Forget everything, as on game restart or on the forced full
    /// resynchronization after a reconnect
    pub fn reset(&mut self) {
        self.pending.clear();
        self.flags.fill(false);
        self.on_board = 0;
    }
}
