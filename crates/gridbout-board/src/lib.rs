//! Board domain types for gridbout
//!
//! Defines the synchronizable board snapshot, the cell model, and the
//! row attack masks exchanged between peers. Pure data and total
//! operations; networking and policy live in the crates above this one.

pub mod board;
pub mod mask;

pub use board::{BoardState, Cell, CellColor, BOARD_COLS, BOARD_ROWS, GARBAGE_COLOR};
pub use mask::{ClearedRow, RowMask};
