//! # Dose-windows library
//!
//! This crate selects the axial slices of a 3D radiation dose distribution
//! that are worth printing in a dose slice report, and locates the global
//! dose maximum.
//!
//! A dose volume is a regular grid (corner, voxel size, voxel counts) with
//! one sample per voxel, stored with x varying fastest, then y, then z. The
//! analysis runs in four stages:
//!  - locate the global maximum (first voxel on ties)
//!  - reduce every axial slice to its maximum and mark slices whose maximum
//!    exceeds a fraction of the global maximum (default 15%)
//!  - turn runs of marked slices into physical z windows widened by a margin
//!  - merge windows closer than a merge distance
//!
//! Dose volumes can be built from raw samples or loaded from DICOM RT Dose
//! files. Several RT Dose files on the same grid are summed into a composite
//! dose. The crate only selects slices; rendering the report is left to the
//! caller, which [`report::ReportPlan`] helps with by choosing image slices
//! that fall inside the windows.
//!
//! # Examples
//!
//! ## Analysing raw samples
//!
//! ```
//! # use dose_windows::{AnalysisParams, DoseGrid, compute_dose_windows};
//! let grid = DoseGrid::new((0.0, 0.0, 0.0), (2, 1, 3), (1.0, 1.0, 1.0))
//!     .expect("grid should be valid");
//! let result = compute_dose_windows(
//!     grid,
//!     vec![3.0, 5.0, 1.0, 1.0, 8.0, 2.0],
//!     &AnalysisParams::default(),
//! )
//! .expect("analysis should succeed");
//! assert_eq!(result.max_dose, 8.0);
//! assert_eq!(result.windows.len(), 1);
//! ```
//!
//! ## Reading RT Dose files from a directory
//!
//! ```no_run
//! # use dose_windows::{AnalysisParams, DoseLoader, LengthUnit};
//! let volume = DoseLoader::load_from_directory("rtdose", LengthUnit::Centimeter)
//!     .expect("should have loaded RT Dose files");
//! let result = volume
//!     .analyze(&AnalysisParams::default())
//!     .expect("analysis should succeed");
//! println!("{} windows", result.windows.len());
//! ```

pub mod analysis;
pub mod enums;
pub mod error;
pub mod grid;
pub mod locator;
pub mod report;
pub mod significance;
pub mod volume;
pub mod volume_loader;
pub mod window;

pub use analysis::{AnalysisParams, DoseWindows, compute_dose_windows};
pub use enums::{LengthUnit, SliceOrder};
pub use error::DoseWindowError;
pub use grid::{DoseGrid, Point3};
pub use locator::{MaxDoseLocator, MaxDosePoint};
pub use report::{ReportPlan, ReportSlice};
pub use volume::DoseVolume;
pub use volume_loader::{DoseLoader, DoseLoaderError};
pub use window::{IndexRun, SliceWindow, WindowExtractor};
