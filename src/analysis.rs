use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DoseWindowError;
use crate::grid::DoseGrid;
use crate::locator::{MaxDoseLocator, MaxDosePoint};
use crate::significance::SliceSignificanceAnalyzer;
use crate::volume::DoseVolume;
use crate::window::{SliceWindow, WindowExtractor};

/// Tuning of the window analysis. Distances are in the grid's physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Fraction of the global maximum a slice maximum must exceed.
    pub threshold_fraction: f64,

    /// Windows separated by less than this are merged.
    pub merge_distance: f64,

    /// Extension applied to both ends of every window before merging.
    pub margin: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.15,
            merge_distance: 3.0,
            margin: 1.0,
        }
    }
}

impl AnalysisParams {
    /// Defaults overridden by `DOSE_THRESHOLD_FRACTION`, `DOSE_MERGE_DISTANCE`
    /// and `DOSE_WINDOW_MARGIN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the setting keys.
    /// Unparseable values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut params = Self::default();
        for (key, target) in [
            ("DOSE_THRESHOLD_FRACTION", &mut params.threshold_fraction),
            ("DOSE_MERGE_DISTANCE", &mut params.merge_distance),
            ("DOSE_WINDOW_MARGIN", &mut params.margin),
        ] {
            if let Some(val) = lookup(key) {
                match val.trim().parse() {
                    Ok(parsed) => *target = parsed,
                    Err(_) => warn!(key, value = %val, "ignoring unparseable setting"),
                }
            }
        }
        params
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), DoseWindowError> {
        let threshold = self.threshold_fraction;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DoseWindowError::InvalidParameter {
                name: "threshold_fraction",
                value: threshold,
                reason: "must lie in (0, 1]",
            });
        }
        for (name, value) in [
            ("merge_distance", self.merge_distance),
            ("margin", self.margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DoseWindowError::InvalidParameter {
                    name,
                    value,
                    reason: "must be a non-negative finite number",
                });
            }
        }
        Ok(())
    }
}

/// Outcome of the window analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseWindows {
    /// Ascending, disjoint windows; consecutive gaps are at least the merge
    /// distance.
    pub windows: Vec<SliceWindow>,
    pub max_dose: f32,
    /// `None` when the volume holds no dose.
    pub max_point: Option<MaxDosePoint>,
}

impl DoseWindows {
    fn empty() -> Self {
        Self {
            windows: Vec::new(),
            max_dose: 0.0,
            max_point: None,
        }
    }
}

/// Determine the report windows and the dose maximum of a sampled volume.
///
/// `samples` are in x-fastest order (`x + xn*y + xn*yn*z`).
///
/// # Errors
///
/// Fails on invalid parameters, a sample count that does not fit the grid,
/// or invalid samples. A volume without any dose is not an error; it yields
/// no windows and no max point.
pub fn compute_dose_windows(
    grid: DoseGrid,
    samples: Vec<f32>,
    params: &AnalysisParams,
) -> Result<DoseWindows, DoseWindowError> {
    params.validate()?;
    let volume = DoseVolume::new(grid, samples)?;
    analyze_volume(&volume, params)
}

pub(crate) fn analyze_volume(
    volume: &DoseVolume,
    params: &AnalysisParams,
) -> Result<DoseWindows, DoseWindowError> {
    params.validate()?;

    let Some(max_point) = MaxDoseLocator::locate(volume) else {
        warn!(dim = ?volume.dim(), "dose volume holds no dose, no windows selected");
        return Ok(DoseWindows::empty());
    };

    let analyzer = SliceSignificanceAnalyzer::new(params.threshold_fraction);
    let mask = analyzer.significance_mask(volume, max_point.value);
    debug!(
        significant = mask.iter().filter(|&&m| m).count(),
        slices = mask.len(),
        "classified slices"
    );

    let extractor = WindowExtractor::new(params.margin, params.merge_distance);
    let windows = extractor.extract(&mask, volume.grid())?;
    debug!(windows = windows.len(), "extracted dose windows");

    Ok(DoseWindows {
        windows,
        max_dose: max_point.value,
        max_point: Some(max_point),
    })
}
