use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no images found under {0}")]
    EmptyDataset(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected 8 comma-separated values, got {got}")]
    FieldCount { line: usize, got: usize },
    #[error("line {line}: invalid coordinate: {source}")]
    InvalidCoordinate {
        line: usize,
        source: std::num::ParseFloatError,
    },
}

/// Loss kernels fail loudly instead of propagating non-finite values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LossError {
    /// Every cell in the batch is masked out, so the normalizing
    /// denominator would be zero.
    #[error("no contributing cells: every cell in the batch is masked out")]
    NoContributingCells,
    #[error("label tensor shape {label:?} is incompatible with prediction shape {pred:?}")]
    ShapeMismatch { label: Vec<usize>, pred: Vec<usize> },
}
