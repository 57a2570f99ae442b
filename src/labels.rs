use geo::{point, Intersects, Polygon};
use ndarray::{Array2, Array3, Axis};
use tracing::instrument;

use crate::{
    zones::{ZoneClassifier, ZonePartition},
    Quad,
};

pub const REGRESSION_CHANNELS: usize = 8;

/// Turns one image's quad annotations into dense per-cell training targets.
///
/// All grids are indexed `[ix][jy]` with `ix` the x (column) coordinate.
#[derive(Debug, Clone, Copy)]
pub struct LabelSynthesizer {
    grid: usize,
    downsample: f32,
}

/// Dense targets for one image.
pub struct LabelGrids {
    /// {0,1} per cell; 1 marks a cell whose center falls inside a positive
    /// quad.
    pub class: Array2<f32>,
    /// {0,1} per cell; 0 marks a cell inside a gray quad, excluded from
    /// loss.
    pub mask: Array2<f32>,
    /// 8 signed corner offsets (full-resolution pixels) per classified
    /// cell, zero elsewhere.
    pub regression: Array3<f32>,
}

impl LabelSynthesizer {
    /// `downsample` is the pixel footprint of one grid cell (4 for a
    /// 320px crop on an 80-cell grid).
    pub fn new(grid: usize, downsample: f32) -> Self {
        Self { grid, downsample }
    }

    pub fn grid(&self) -> usize {
        self.grid
    }

    #[instrument(level = "trace", skip(self, quads, classifier))]
    pub fn synthesize(
        &self,
        width: u32,
        height: u32,
        quads: &[Quad],
        classifier: &dyn ZoneClassifier,
    ) -> LabelGrids {
        let ZonePartition { gray, positive } = classifier.classify(quads);
        let inv_x = self.grid as f32 / width as f32;
        let inv_y = self.grid as f32 / height as f32;
        let positive = to_grid_polygons(&positive, inv_x, inv_y);
        let gray = to_grid_polygons(&gray, inv_x, inv_y);

        let mut class = Array2::<f32>::zeros((self.grid, self.grid));
        let mut mask = Array2::<f32>::ones((self.grid, self.grid));
        for ix in 0..self.grid {
            for jy in 0..self.grid {
                let cell = point![x: ix as f32, y: jy as f32];
                if positive.iter().any(|poly| poly.intersects(&cell)) {
                    class[[ix, jy]] = 1.0;
                }
                // Independent of the positive test: a cell can be both
                // classified and masked out.
                if gray.iter().any(|poly| poly.intersects(&cell)) {
                    mask[[ix, jy]] = 0.0;
                }
            }
        }

        // Offsets are looked up against the full annotation list, not the
        // gray-filtered one; the last matching quad wins on overlap.
        let all = quads
            .iter()
            .map(|quad| {
                let scaled = quad.scaled(inv_x, inv_y);
                (scaled, scaled.to_polygon())
            })
            .collect::<Vec<_>>();
        let mut regression = Array3::<f32>::zeros((self.grid, self.grid, REGRESSION_CHANNELS));
        for ((ix, jy), &label) in class.indexed_iter() {
            if label != 1.0 {
                continue;
            }
            let cell = point![x: ix as f32, y: jy as f32];
            for (quad, poly) in &all {
                if !poly.intersects(&cell) {
                    continue;
                }
                for (corner, &[cx, cy]) in quad.corners.iter().enumerate() {
                    regression[[ix, jy, 2 * corner]] =
                        cx * self.downsample - ix as f32 * self.downsample;
                    regression[[ix, jy, 2 * corner + 1]] =
                        cy * self.downsample - jy as f32 * self.downsample;
                }
            }
        }

        LabelGrids {
            class,
            mask,
            regression,
        }
    }
}

fn to_grid_polygons(quads: &[Quad], inv_x: f32, inv_y: f32) -> Vec<Polygon<f32>> {
    quads
        .iter()
        .map(|quad| quad.scaled(inv_x, inv_y).to_polygon())
        .collect()
}

impl LabelGrids {
    /// Classification targets, shape (grid, grid, 2): channel 0 = class
    /// label, channel 1 = mask.
    pub fn cls_targets(&self) -> Array3<f32> {
        ndarray::stack(Axis(2), &[self.class.view(), self.mask.view()]).unwrap()
    }

    /// Merged targets, shape (grid, grid, 10): channels 0-7 = regression,
    /// 8 = class label, 9 = mask.
    pub fn merged_targets(&self) -> Array3<f32> {
        let class = self.class.view().insert_axis(Axis(2));
        let mask = self.mask.view().insert_axis(Axis(2));
        ndarray::concatenate(Axis(2), &[self.regression.view(), class, mask]).unwrap()
    }
}
