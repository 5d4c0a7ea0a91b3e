//! Row attack masks
//!
//! A cleared row is summarized as one bit per column before it is deleted,
//! excluding the cells of the piece that triggered the clear. The mask is
//! what travels to the opponent; color is not preserved.

use rkyv::{Archive, Deserialize, Serialize};

use crate::board::Cell;

/// Bit-per-column summary of one cleared row; bit i set means column i
/// was filled by residue the opponent should receive
#[derive(Archive, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct RowMask(pub u16);

impl RowMask {
    /// Mask with no columns set
    pub fn empty() -> Self {
        Self(0)
    }

    /// Build the mask for a cleared row from its pre-deletion cells.
    /// Columns occupied by the triggering piece are left unset: those
    /// cells are fresh, not residue, and counting them would attack with
    /// the same blocks twice on chained clears.
    pub fn from_cleared_row(cells: &[Cell], piece_columns: &[u8]) -> Self {
        let mut mask = Self::empty();
        for (x, cell) in cells.iter().enumerate() {
            let x = x as u8;
            if cell.is_some() && !piece_columns.contains(&x) {
                mask.set(x);
            }
        }
        mask
    }

    /// Set the bit for a column
    pub fn set(&mut self, col: u8) {
        self.0 |= 1 << col;
    }

    /// Whether the bit for a column is set
    pub fn is_set(self, col: u8) -> bool {
        self.0 & (1 << col) != 0
    }

    /// Number of set columns
    pub fn filled(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// One cleared row as reported by the local game engine: its index, its
/// contents just before deletion, and the columns the triggering piece
/// occupied within it
#[derive(Debug, Clone)]
pub struct ClearedRow {
    pub index: u8,
    pub cells: Vec<Cell>,
    pub piece_columns: Vec<u8>,
}

impl ClearedRow {
    /// The attack mask this row contributes
    pub fn mask(&self) -> RowMask {
        RowMask::from_cleared_row(&self.cells, &self.piece_columns)
    }
}
