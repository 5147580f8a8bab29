use crate::analysis::{AnalysisParams, DoseWindows, analyze_volume};
use crate::error::DoseWindowError;
use crate::grid::{DoseGrid, Point3};

use ndarray::Array3;

/// Dose samples on a [`DoseGrid`].
///
/// The data array has shape `(zn, yn, xn)`, so iterating it in logical order
/// visits samples with x varying fastest, then y, then z.
#[derive(Debug, Clone)]
pub struct DoseVolume {
    data: Array3<f32>,
    grid: DoseGrid,
}

impl DoseVolume {
    /// Build a volume from samples in x-fastest order.
    ///
    /// # Errors
    ///
    /// Returns [`DoseWindowError::ShapeMismatch`] if `samples.len()` differs
    /// from the grid size and [`DoseWindowError::InvalidSample`] for negative
    /// or non-finite doses.
    pub fn new(grid: DoseGrid, samples: Vec<f32>) -> Result<Self, DoseWindowError> {
        let (xn, yn, zn) = grid.counts();
        let actual = samples.len();
        let data = Array3::from_shape_vec((zn, yn, xn), samples).map_err(|_| {
            DoseWindowError::ShapeMismatch {
                expected: grid.voxel_count(),
                actual,
            }
        })?;
        Self::from_array(grid, data)
    }

    /// Build a volume from an array shaped `(zn, yn, xn)`.
    pub fn from_array(grid: DoseGrid, data: Array3<f32>) -> Result<Self, DoseWindowError> {
        let (xn, yn, zn) = grid.counts();
        if data.dim() != (zn, yn, xn) {
            return Err(DoseWindowError::ShapeMismatch {
                expected: grid.voxel_count(),
                actual: data.len(),
            });
        }
        if let Some((index, &value)) = data
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(DoseWindowError::InvalidSample { index, value });
        }
        Ok(Self { data, grid })
    }

    /// Voxel-wise sum of volumes sharing one grid.
    ///
    /// # Errors
    ///
    /// Returns [`DoseWindowError::GridMismatch`] if the grids differ,
    /// [`DoseWindowError::ShapeMismatch`] for an empty list and
    /// [`DoseWindowError::InvalidSample`] where the sum overflows.
    pub fn composite(volumes: &[DoseVolume]) -> Result<Self, DoseWindowError> {
        let (first, rest) = volumes
            .split_first()
            .ok_or(DoseWindowError::ShapeMismatch {
                expected: 1,
                actual: 0,
            })?;
        if rest.iter().any(|volume| !volume.grid.matches(&first.grid)) {
            return Err(DoseWindowError::GridMismatch);
        }
        let mut data = first.data.clone();
        for volume in rest {
            data += &volume.data;
        }
        // Sums past f32::MAX turn into infinities and are rejected here.
        Self::from_array(first.grid, data)
    }

    pub fn grid(&self) -> &DoseGrid {
        &self.grid
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Sample at grid index `(x, y, z)`.
    #[inline]
    pub fn value_at(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[[z, y, x]]
    }

    /// Physical center of voxel `(x, y, z)`.
    #[inline]
    pub fn to_physical(&self, x: usize, y: usize, z: usize) -> Point3 {
        self.grid.to_physical(x, y, z)
    }

    /// Run the full window analysis on this volume.
    pub fn analyze(&self, params: &AnalysisParams) -> Result<DoseWindows, DoseWindowError> {
        analyze_volume(self, params)
    }
}
