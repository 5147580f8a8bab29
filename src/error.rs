use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DoseWindowError {
    #[error("Sample count {actual} does not match grid size {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Degenerate dose grid: {0}")]
    DegenerateGrid(String),

    #[error("Invalid dose sample {value} at flat index {index}")]
    InvalidSample { index: usize, value: f32 },

    #[error("Dose volumes are defined on different grids")]
    GridMismatch,

    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Run extraction produced {starts} start markers but {stops} stop markers")]
    InternalInvariantViolation { starts: usize, stops: usize },
}
