use serde::{Deserialize, Serialize};

use crate::analysis::DoseWindows;
use crate::enums::SliceOrder;
use crate::window::SliceWindow;

/// An image slice position picked for the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportSlice {
    pub z: f64,
    /// Index of the first window containing `z`.
    pub window: usize,
}

/// Slices a renderer should draw for one analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPlan {
    /// Slice position nearest to the dose maximum, for the highlighted page.
    pub max_dose_slice: Option<f64>,
    pub slices: Vec<ReportSlice>,
}

impl ReportPlan {
    pub fn new(
        result: &DoseWindows,
        slice_positions: &[f64],
        order: SliceOrder,
        print_every: usize,
    ) -> Self {
        let max_dose_slice = result
            .max_point
            .and_then(|point| closest_slice(slice_positions, point.z));
        Self {
            max_dose_slice,
            slices: select_report_slices(slice_positions, &result.windows, order, print_every),
        }
    }
}

/// Pick the slice positions lying inside any window.
///
/// Window bounds are inclusive. After sorting by `order`, only every
/// `print_every`-th slice is kept, starting with the first; zero keeps all.
pub fn select_report_slices(
    slice_positions: &[f64],
    windows: &[SliceWindow],
    order: SliceOrder,
    print_every: usize,
) -> Vec<ReportSlice> {
    let mut slices: Vec<ReportSlice> = slice_positions
        .iter()
        .filter_map(|&z| {
            windows
                .iter()
                .position(|window| window.contains(z))
                .map(|window| ReportSlice { z, window })
        })
        .collect();

    slices.sort_by(|a, b| a.z.total_cmp(&b.z));
    if matches!(order, SliceOrder::Descending) {
        slices.reverse();
    }

    slices
        .into_iter()
        .step_by(print_every.max(1))
        .collect()
}

/// Position in `slice_positions` closest to `z`.
pub fn closest_slice(slice_positions: &[f64], z: f64) -> Option<f64> {
    slice_positions
        .iter()
        .copied()
        .filter(|p| p.is_finite())
        .min_by(|a, b| (a - z).abs().total_cmp(&(b - z).abs()))
}
