use ndarray::{Array4, ArrayView4, Axis};

use crate::labels::REGRESSION_CHANNELS;

/// Contract for the consumed detection network: one image batch in, a
/// classification map (N, g, g, 1) and a regression map (N, g, g, 8) out.
pub trait DetectionModel {
    fn forward(&self, images: ArrayView4<f32>) -> (Array4<f32>, Array4<f32>);
}

/// Predicts zero everywhere. A stand-in for wiring and loss sanity checks,
/// not a detector.
#[derive(Debug, Clone, Copy)]
pub struct ZeroBaseline {
    pub grid: usize,
}

impl DetectionModel for ZeroBaseline {
    fn forward(&self, images: ArrayView4<f32>) -> (Array4<f32>, Array4<f32>) {
        let batch = images.len_of(Axis(0));
        (
            Array4::zeros((batch, self.grid, self.grid, 1)),
            Array4::zeros((batch, self.grid, self.grid, REGRESSION_CHANNELS)),
        )
    }
}
