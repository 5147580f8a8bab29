use serde::{Deserialize, Serialize};

use crate::error::DoseWindowError;

/// A point in the physical coordinate system of a dose grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Regular sampling lattice of a dose distribution.
///
/// `corner` is the physical position of the lowest corner of the first voxel,
/// not its center. Counts are ordered `(x, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseGrid {
    corner: (f64, f64, f64),
    counts: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
}

impl DoseGrid {
    /// Build a grid, rejecting empty axes and non-positive voxel sizes.
    ///
    /// # Errors
    ///
    /// Returns [`DoseWindowError::DegenerateGrid`] if any count is zero, any
    /// voxel size is not a positive finite number, or the corner is not finite.
    pub fn new(
        corner: (f64, f64, f64),
        counts: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
    ) -> Result<Self, DoseWindowError> {
        let (xn, yn, zn) = counts;
        if xn == 0 || yn == 0 || zn == 0 {
            return Err(DoseWindowError::DegenerateGrid(format!(
                "voxel counts must be positive, got {counts:?}"
            )));
        }
        let (xr, yr, zr) = voxel_size;
        if [xr, yr, zr].iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(DoseWindowError::DegenerateGrid(format!(
                "voxel sizes must be positive, got {voxel_size:?}"
            )));
        }
        let (x0, y0, z0) = corner;
        if [x0, y0, z0].iter().any(|c| !c.is_finite()) {
            return Err(DoseWindowError::DegenerateGrid(format!(
                "corner must be finite, got {corner:?}"
            )));
        }
        Ok(Self {
            corner,
            counts,
            voxel_size,
        })
    }

    pub fn corner(&self) -> (f64, f64, f64) {
        self.corner
    }

    /// Voxel counts `(xn, yn, zn)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.counts
    }

    pub fn voxel_size(&self) -> (f64, f64, f64) {
        self.voxel_size
    }

    /// Total number of voxels.
    pub fn voxel_count(&self) -> usize {
        let (xn, yn, zn) = self.counts;
        xn * yn * zn
    }

    /// Number of voxels in one axial slice.
    pub fn slice_len(&self) -> usize {
        self.counts.0 * self.counts.1
    }

    /// Flat sample index of `(x, y, z)`; x varies fastest.
    #[inline]
    pub fn flat_index(&self, x: usize, y: usize, z: usize) -> usize {
        let (xn, yn, _) = self.counts;
        x + xn * y + xn * yn * z
    }

    /// Inverse of [`DoseGrid::flat_index`].
    #[inline]
    pub fn unravel(&self, index: usize) -> (usize, usize, usize) {
        let (xn, yn, _) = self.counts;
        let slice_len = xn * yn;
        (index % xn, (index % slice_len) / xn, index / slice_len)
    }

    /// Physical center of voxel `(x, y, z)`.
    pub fn to_physical(&self, x: usize, y: usize, z: usize) -> Point3 {
        let (x0, y0, z0) = self.corner;
        let (xr, yr, zr) = self.voxel_size;
        Point3 {
            x: x0 + (x as f64 + 0.5) * xr,
            y: y0 + (y as f64 + 0.5) * yr,
            z: z0 + (z as f64 + 0.5) * zr,
        }
    }

    /// Voxel whose center is nearest to `point`, or `None` when the point lies
    /// outside the grid.
    pub fn nearest_voxel(&self, point: Point3) -> Option<(usize, usize, usize)> {
        let (x0, y0, z0) = self.corner;
        let (xr, yr, zr) = self.voxel_size;
        let (xn, yn, zn) = self.counts;
        let x = Self::nearest_index(point.x, x0, xr, xn)?;
        let y = Self::nearest_index(point.y, y0, yr, yn)?;
        let z = Self::nearest_index(point.z, z0, zr, zn)?;
        Some((x, y, z))
    }

    #[inline]
    fn nearest_index(position: f64, origin: f64, size: f64, count: usize) -> Option<usize> {
        let index = ((position - origin) / size - 0.5).round();
        if index < 0.0 || index >= count as f64 {
            return None;
        }
        Some(index as usize)
    }

    /// Physical z of the boundary below slice `index` (`index == zn` gives the
    /// top face of the grid).
    #[inline]
    pub fn slice_boundary(&self, index: usize) -> f64 {
        self.corner.2 + self.voxel_size.2 * index as f64
    }

    /// Whether two grids describe the same lattice.
    pub fn matches(&self, other: &DoseGrid) -> bool {
        const TOLERANCE: f64 = 1e-6;
        let close = |a: (f64, f64, f64), b: (f64, f64, f64)| {
            (a.0 - b.0).abs() < TOLERANCE
                && (a.1 - b.1).abs() < TOLERANCE
                && (a.2 - b.2).abs() < TOLERANCE
        };
        self.counts == other.counts
            && close(self.corner, other.corner)
            && close(self.voxel_size, other.voxel_size)
    }
}
