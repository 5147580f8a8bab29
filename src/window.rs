//! Conversion of a per-slice significance mask into physical z windows.
//!
//! Extraction happens in three stages:
//!  1. contiguous runs of significant slices become half-open index runs,
//!  2. each run is mapped to slice boundaries in physical z and widened by a
//!     margin on both ends,
//!  3. windows closer than the merge distance are merged transitively.

use serde::{Deserialize, Serialize};

use crate::error::DoseWindowError;
use crate::grid::DoseGrid;

/// Half-open run `[start, stop)` of slice indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRun {
    pub start: usize,
    pub stop: usize,
}

/// Physical z interval selected for the report. `start_z < stop_z` always.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceWindow {
    pub start_z: f64,
    pub stop_z: f64,
}

impl SliceWindow {
    /// Build a window, swapping the bounds if they arrive reversed.
    pub fn new(start_z: f64, stop_z: f64) -> Self {
        if start_z > stop_z {
            Self {
                start_z: stop_z,
                stop_z: start_z,
            }
        } else {
            Self { start_z, stop_z }
        }
    }

    /// Whether `z` lies inside the window, bounds included.
    #[inline]
    pub fn contains(&self, z: f64) -> bool {
        self.start_z <= z && z <= self.stop_z
    }

    pub fn length(&self) -> f64 {
        self.stop_z - self.start_z
    }
}

pub struct WindowExtractor {
    margin: f64,
    merge_distance: f64,
}

impl WindowExtractor {
    pub fn new(margin: f64, merge_distance: f64) -> Self {
        Self {
            margin,
            merge_distance,
        }
    }

    /// Split `mask` into runs of consecutive `true` entries.
    ///
    /// A run still open at the end of the mask stops at `mask.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`DoseWindowError::InternalInvariantViolation`] if the start and
    /// stop bookkeeping disagree.
    pub fn extract_runs(mask: &[bool]) -> Result<Vec<IndexRun>, DoseWindowError> {
        let mut starts = Vec::new();
        let mut stops = Vec::new();
        let mut active = false;
        for (index, &significant) in mask.iter().enumerate() {
            if significant && !active {
                starts.push(index);
                active = true;
            } else if !significant && active {
                stops.push(index);
                active = false;
            }
        }
        if active {
            stops.push(mask.len());
        }

        if starts.len() != stops.len() {
            return Err(DoseWindowError::InternalInvariantViolation {
                starts: starts.len(),
                stops: stops.len(),
            });
        }
        Ok(starts
            .into_iter()
            .zip(stops)
            .map(|(start, stop)| IndexRun { start, stop })
            .collect())
    }

    /// Map runs to slice boundaries in physical z, widened by the margin.
    pub fn to_physical(&self, runs: &[IndexRun], grid: &DoseGrid) -> Vec<SliceWindow> {
        runs.iter()
            .map(|run| {
                SliceWindow::new(
                    grid.slice_boundary(run.start) - self.margin,
                    grid.slice_boundary(run.stop) + self.margin,
                )
            })
            .collect()
    }

    /// Merge windows whose gap is below the merge distance.
    ///
    /// Input must be ordered by start. Merging chains, so any number of
    /// close windows collapse into one.
    pub fn merge(&self, windows: &[SliceWindow]) -> Vec<SliceWindow> {
        let Some((first, rest)) = windows.split_first() else {
            return Vec::new();
        };
        let mut merged = Vec::with_capacity(windows.len());
        let mut current = *first;
        for window in rest {
            if window.start_z - current.stop_z < self.merge_distance {
                current.stop_z = current.stop_z.max(window.stop_z);
            } else {
                merged.push(current);
                current = *window;
            }
        }
        merged.push(current);
        merged
    }

    /// Run all three stages over a significance mask.
    pub fn extract(
        &self,
        mask: &[bool],
        grid: &DoseGrid,
    ) -> Result<Vec<SliceWindow>, DoseWindowError> {
        let runs = Self::extract_runs(mask)?;
        let windows = self.to_physical(&runs, grid);
        Ok(self.merge(&windows))
    }
}
