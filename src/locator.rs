use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::volume::DoseVolume;

/// Location and value of the global dose maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxDosePoint {
    pub value: f32,
    /// Grid indices `(x, y, z)` of the voxel attaining the maximum.
    pub voxel: (usize, usize, usize),
    /// Physical center of that voxel.
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub struct MaxDoseLocator;

impl MaxDoseLocator {
    /// Largest sample and the first flat index holding it.
    ///
    /// Ties resolve to the lowest flat index, i.e. lowest z, then y, then x.
    pub fn global_max(volume: &DoseVolume) -> (f32, usize) {
        volume
            .data()
            .iter()
            .enumerate()
            .fold((0.0_f32, 0_usize), |(best, best_index), (index, &value)| {
                if value > best {
                    (value, index)
                } else {
                    (best, best_index)
                }
            })
    }

    /// Locate the global maximum, or `None` when the volume carries no dose.
    pub fn locate(volume: &DoseVolume) -> Option<MaxDosePoint> {
        let (value, index) = Self::global_max(volume);
        if value <= 0.0 {
            return None;
        }
        let grid = volume.grid();
        let (x, y, z) = grid.unravel(index);
        let center = grid.to_physical(x, y, z);
        debug!(value, index, x, y, z, "located dose maximum");
        Some(MaxDosePoint {
            value,
            voxel: (x, y, z),
            x: center.x,
            y: center.y,
            z: center.z,
        })
    }
}
