//! Board state representation for synchronization

use rkyv::{Archive, Deserialize, Serialize};

use crate::mask::RowMask;

/// Standard board width in columns
pub const BOARD_COLS: u8 = 10;

/// Standard board height in rows
pub const BOARD_ROWS: u8 = 20;

/// Fixed color for rows injected from an opponent attack. Masks carry no
/// color information, so every garbage cell renders the same gray.
pub const GARBAGE_COLOR: CellColor = CellColor(0x8E8E_8EFF);

/// Packed RGBA cell color
#[derive(Archive, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct CellColor(pub u32);

/// A single board cell; `None` means empty
pub type Cell = Option<CellColor>;

/// Board state that can be synchronized
///
/// Flattened row-major grid of cells. Dimensions are fixed for the
/// lifetime of a session; row 0 is the top of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    rows: u8,
    cols: u8,
    cells: Vec<Cell>,
}

impl BoardState {
    /// Create a new empty board
    pub fn new(rows: u8, cols: u8) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows as usize * cols as usize],
        }
    }

    /// Create an empty board with the standard 10x20 dimensions
    pub fn standard() -> Self {
        Self::new(BOARD_ROWS, BOARD_COLS)
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    /// Whether (x, y) lies inside the board
    pub fn in_bounds(&self, x: u8, y: u8) -> bool {
        x < self.cols && y < self.rows
    }

    fn index(&self, x: u8, y: u8) -> usize {
        y as usize * self.cols as usize + x as usize
    }

    /// Cell at (x, y); callers check bounds first
    pub fn cell(&self, x: u8, y: u8) -> Cell {
        self.cells[self.index(x, y)]
    }

    /// Overwrite the cell at (x, y); callers check bounds first
    pub fn set(&mut self, x: u8, y: u8, cell: Cell) {
        let idx = self.index(x, y);
        self.cells[idx] = cell;
    }

    /// One row of cells, top row is y = 0
    pub fn row(&self, y: u8) -> &[Cell] {
        let start = self.index(0, y);
        &self.cells[start..start + self.cols as usize]
    }

    /// Clear every cell
    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Iterate all cells in row-major order as (x, y, cell)
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8, Cell)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &cell)| ((i % cols as usize) as u8, (i / cols as usize) as u8, cell))
    }

    /// Shift the whole board up one row and insert a garbage row at the
    /// bottom, filled per the mask bits. The top row is lost.
    pub fn shift_up_and_inject(&mut self, mask: RowMask, color: CellColor) {
        self.cells.drain(..self.cols as usize);
        for x in 0..self.cols {
            self.cells
                .push(if mask.is_set(x) { Some(color) } else { None });
        }
    }

    /// Remove row y and insert an empty row at the top, the transform a
    /// line clear applies. Rows above y shift down by one.
    pub fn remove_row(&mut self, y: u8) {
        let start = self.index(0, y);
        self.cells.drain(start..start + self.cols as usize);
        for _ in 0..self.cols {
            self.cells.insert(0, None);
        }
    }

    /// Number of occupied cells
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}
