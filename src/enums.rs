use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Physical unit of grid coordinates produced by the loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum LengthUnit {
    #[value(name = "mm")]
    Millimeter,
    #[default]
    #[value(name = "cm")]
    Centimeter,
}

impl LengthUnit {
    /// Factor converting DICOM millimeters to this unit.
    pub fn per_millimeter(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 0.1,
        }
    }
}

/// Order in which report slices are listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceOrder {
    Ascending,
    // Reports print head-first, i.e. from the highest z down.
    #[default]
    Descending,
}
