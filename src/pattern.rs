//! Step grids.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::percussion::TRACK_COUNT;
use crate::transport::STEPS;

/// Chromatic pitch classes in the note grid (C..B).
pub const NOTE_ROWS: usize = 12;

/// A fixed rows × 16 grid of hits. The row count never changes after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepPattern {
    rows: Vec<[bool; STEPS]>,
}

impl StepPattern {
    pub fn empty(rows: usize) -> Self {
        StepPattern {
            rows: vec![[false; STEPS]; rows],
        }
    }

    /// Empty 8-track drum grid.
    pub fn drums() -> Self {
        StepPattern::empty(TRACK_COUNT)
    }

    /// Empty 12-row note grid.
    pub fn notes() -> Self {
        StepPattern::empty(NOTE_ROWS)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[[bool; STEPS]] {
        &self.rows
    }

    fn check(&self, row: usize, step: usize) -> Result<()> {
        if row >= self.rows.len() {
            return Err(StudioError::TrackOutOfRange {
                index: row,
                len: self.rows.len(),
            });
        }
        if step >= STEPS {
            return Err(StudioError::StepOutOfRange {
                index: step,
                len: STEPS,
            });
        }
        Ok(())
    }

    /// Flip one cell; returns its new value.
    pub fn toggle(&mut self, row: usize, step: usize) -> Result<bool> {
        self.check(row, step)?;
        let cell = &mut self.rows[row][step];
        *cell = !*cell;
        Ok(*cell)
    }

    pub fn set(&mut self, row: usize, step: usize, on: bool) -> Result<()> {
        self.check(row, step)?;
        self.rows[row][step] = on;
        Ok(())
    }

    /// Out-of-range cells read as off.
    pub fn is_set(&self, row: usize, step: usize) -> bool {
        self.rows.get(row).and_then(|r| r.get(step)).copied().unwrap_or(false)
    }

    /// Replace the whole grid. The new grid must have the same row count.
    pub fn replace(&mut self, other: StepPattern) -> Result<()> {
        if other.rows.len() != self.rows.len() {
            return Err(StudioError::PatternShape {
                expected: self.rows.len(),
                found: other.rows.len(),
            });
        }
        self.rows = other.rows;
        Ok(())
    }

    pub fn clear(&mut self) {
        for row in self.rows.iter_mut() {
            *row = [false; STEPS];
        }
    }

    /// Rows with a hit at `step`, in row order.
    pub fn active_rows(&self, step: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, row)| row.get(step).copied().unwrap_or(false))
            .map(|(i, _)| i)
    }

    pub fn hit_count(&self) -> usize {
        self.rows.iter().flatten().filter(|&&on| on).count()
    }
}

impl From<Vec<[bool; STEPS]>> for StepPattern {
    fn from(rows: Vec<[bool; STEPS]>) -> Self {
        StepPattern { rows }
    }
}
