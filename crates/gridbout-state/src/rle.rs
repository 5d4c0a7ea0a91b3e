//! Run-length compression of delta batches
//!
//! Large changesets (hard drops, line clears, garbage injection) touch
//! many horizontally-contiguous same-color cells. Sorting the deltas by
//! row and merging adjacent equal values shrinks those batches to a
//! handful of runs; decompression reconstructs the exact cell set.

use crate::delta::{CellDelta, DeltaBatch};
use gridbout_board::Cell;
use rkyv::{Archive, Deserialize, Serialize};

/// `len` horizontally-contiguous cells sharing `cell`, starting at
/// (x, y). Runs never cross a row boundary.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[archive(check_bytes)]
pub struct CompressedRun {
    pub x: u8,
    pub y: u8,
    pub cell: Cell,
    pub len: u8,
}

/// Run-length compressed form of a [`DeltaBatch`]
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct CompressedBatch {
    pub runs: Vec<CompressedRun>,
    pub score: Option<u32>,
    pub level: Option<u32>,
    pub incoming_garbage: Option<u32>,
}

/// Estimated wire bytes per run: x, y, len, presence tag, packed color
pub(crate) const RUN_WIRE_COST: usize = 8;

impl CompressedBatch {
    /// Expand back to per-cell deltas. The resulting cell set is
    /// identical to the batch the runs were built from; ordering is
    /// (row, column).
    pub fn decompress(&self) -> DeltaBatch {
        let mut cells = Vec::new();
        for run in &self.runs {
            for offset in 0..run.len {
                cells.push(CellDelta {
                    x: run.x + offset,
                    y: run.y,
                    cell: run.cell,
                });
            }
        }
        DeltaBatch {
            cells,
            score: self.score,
            level: self.level,
            incoming_garbage: self.incoming_garbage,
        }
    }

    /// Rough wire size used by the sync policy's traffic statistics
    pub fn wire_cost(&self) -> usize {
        let scalar_cost = [self.score, self.level, self.incoming_garbage]
            .iter()
            .flatten()
            .count()
            * 5;
        self.runs.len() * RUN_WIRE_COST + scalar_cost
    }
}

/// Compress a batch by sorting deltas (row, column) and greedily merging
/// column-adjacent same-value neighbors into runs
pub fn compress(batch: &DeltaBatch) -> CompressedBatch {
    let mut sorted: Vec<CellDelta> = batch.cells.clone();
    sorted.sort_by_key(|d| (d.y, d.x));

    let mut runs: Vec<CompressedRun> = Vec::new();
    for delta in sorted {
        if let Some(run) = runs.last_mut() {
            if run.y == delta.y && run.cell == delta.cell && run.x + run.len == delta.x {
                run.len += 1;
                continue;
            }
        }
        runs.push(CompressedRun {
            x: delta.x,
            y: delta.y,
            cell: delta.cell,
            len: 1,
        });
    }

    CompressedBatch {
        runs,
        score: batch.score,
        level: batch.level,
        incoming_garbage: batch.incoming_garbage,
    }
}
