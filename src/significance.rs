use ndarray::Axis;
use rayon::prelude::*;

use crate::volume::DoseVolume;

pub struct SliceSignificanceAnalyzer {
    threshold_fraction: f64,
}

impl SliceSignificanceAnalyzer {
    pub fn new(threshold_fraction: f64) -> Self {
        Self { threshold_fraction }
    }

    /// Maximum over every voxel of each axial slice, in ascending z.
    pub fn slice_maxima(volume: &DoseVolume) -> Vec<f32> {
        volume
            .data()
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|slice| slice.iter().copied().fold(0.0_f32, f32::max))
            .collect()
    }

    /// Classify each slice maximum against `global_max`.
    ///
    /// A slice is significant when `slice_max / global_max` strictly exceeds
    /// the threshold. Nothing is significant when `global_max` is zero.
    pub fn classify(&self, slice_maxima: &[f32], global_max: f32) -> Vec<bool> {
        if global_max <= 0.0 {
            return vec![false; slice_maxima.len()];
        }
        let global_max = global_max as f64;
        slice_maxima
            .iter()
            .map(|&slice_max| slice_max as f64 / global_max > self.threshold_fraction)
            .collect()
    }

    pub fn significance_mask(&self, volume: &DoseVolume, global_max: f32) -> Vec<bool> {
        self.classify(&Self::slice_maxima(volume), global_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DoseGrid;

    fn volume(counts: (usize, usize, usize), samples: Vec<f32>) -> DoseVolume {
        let grid = DoseGrid::new((0.0, 0.0, 0.0), counts, (1.0, 1.0, 1.0)).unwrap();
        DoseVolume::new(grid, samples).unwrap()
    }

    #[test]
    fn slice_maxima_include_last_voxel_of_slice() {
        // The hottest voxel of each slice is its last one.
        let volume = volume((2, 2, 2), vec![0.0, 1.0, 2.0, 7.0, 0.0, 0.0, 0.0, 4.0]);
        assert_eq!(SliceSignificanceAnalyzer::slice_maxima(&volume), vec![7.0, 4.0]);
    }

    #[test]
    fn classifies_against_threshold_strictly() {
        let analyzer = SliceSignificanceAnalyzer::new(0.15);
        assert_eq!(
            analyzer.classify(&[5.0, 1.0, 8.0], 8.0),
            vec![true, false, true]
        );
        // Exactly at the threshold is not significant.
        let analyzer = SliceSignificanceAnalyzer::new(0.5);
        assert_eq!(analyzer.classify(&[5.0, 10.0], 10.0), vec![false, true]);
    }

    #[test]
    fn zero_global_max_marks_nothing() {
        let analyzer = SliceSignificanceAnalyzer::new(0.15);
        assert_eq!(analyzer.classify(&[0.0, 0.0, 0.0], 0.0), vec![false; 3]);
    }

    #[test]
    fn mask_has_one_entry_per_slice() {
        let samples: Vec<f32> = (0..30).map(|v| (v % 7) as f32).collect();
        let volume = volume((3, 2, 5), samples);
        let mask = SliceSignificanceAnalyzer::new(0.15).significance_mask(&volume, 6.0);
        assert_eq!(mask.len(), 5);
    }
}
