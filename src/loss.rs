//! Masked loss kernels for the two detector heads.
//!
//! Every kernel sums a per-cell loss over the mask-selected cells of the
//! whole batch and divides by the count of those cells, so loss magnitude
//! stays comparable across batches with different amounts of gray zone.
//! A batch with no contributing cells is an explicit error, never a NaN.

use ndarray::{s, ArrayView3, ArrayView4, Axis, Zip};

use crate::{labels::REGRESSION_CHANNELS, LossError};

/// Squared-error classification loss.
///
/// `y_true` is (N, g, g, 2) with channel 0 = class label and channel 1 =
/// mask; `y_pred` is (N, g, g, 1).
pub fn l2(y_true: ArrayView4<f32>, y_pred: ArrayView4<f32>) -> Result<f32, LossError> {
    check_shapes(&y_true, &y_pred, 2, 1)?;
    let label = y_true.index_axis(Axis(3), 0);
    let mask = y_true.index_axis(Axis(3), 1);
    let pred = y_pred.index_axis(Axis(3), 0);
    let count = contributing_cells(&mask)?;

    let sum = Zip::from(&label)
        .and(&mask)
        .and(&pred)
        .fold(0.0f32, |acc, &label, &mask, &pred| {
            acc + mask * (label - pred).powi(2)
        });
    Ok(sum / count)
}

/// One-sided squared hinge classification loss.
///
/// With `s = sign(0.5 - label)` mapping label {0,1} to {+1,-1}, a
/// prediction already on the correct side of the label contributes zero;
/// anything else is penalized quadratically. Tensor shapes as in [`l2`].
pub fn hinge(y_true: ArrayView4<f32>, y_pred: ArrayView4<f32>) -> Result<f32, LossError> {
    check_shapes(&y_true, &y_pred, 2, 1)?;
    let label = y_true.index_axis(Axis(3), 0);
    let mask = y_true.index_axis(Axis(3), 1);
    let pred = y_pred.index_axis(Axis(3), 0);
    let count = contributing_cells(&mask)?;

    let sum = Zip::from(&label)
        .and(&mask)
        .and(&pred)
        .fold(0.0f32, |acc, &label, &mask, &pred| {
            let side = (0.5 - label).signum();
            acc + mask * f32::max(0.0, side * (pred - label)).powi(2)
        });
    Ok(sum / count)
}

/// Smooth-L1 regression loss.
///
/// `y_true` is (N, g, g, 10): channels 0-7 = regression targets, 8 = class
/// label, 9 = mask; `y_pred` is (N, g, g, 8). Channels are gated to zero
/// wherever the class label is not positive, averaged per cell, gated by
/// the mask, then normalized by the contributing-cell count and scaled by
/// `lambda_loc`.
pub fn smooth(
    y_true: ArrayView4<f32>,
    y_pred: ArrayView4<f32>,
    lambda_loc: f32,
) -> Result<f32, LossError> {
    check_shapes(&y_true, &y_pred, 10, REGRESSION_CHANNELS)?;
    let targets = y_true.slice(s![.., .., .., 0..REGRESSION_CHANNELS]);
    let label = y_true.index_axis(Axis(3), REGRESSION_CHANNELS);
    let mask = y_true.index_axis(Axis(3), REGRESSION_CHANNELS + 1);
    let count = contributing_cells(&mask)?;

    let sum = Zip::from(targets.lanes(Axis(3)))
        .and(y_pred.lanes(Axis(3)))
        .and(&label)
        .and(&mask)
        .fold(0.0f32, |acc, target, pred, &label, &mask| {
            if label <= 0.0 {
                return acc;
            }
            let cell_sum: f32 = target
                .iter()
                .zip(pred.iter())
                .map(|(&target, &pred)| {
                    let d = (target - pred).abs();
                    if d < 1.0 {
                        0.5 * d * d
                    } else {
                        d - 0.5
                    }
                })
                .sum();
            acc + mask * (cell_sum / REGRESSION_CHANNELS as f32)
        });
    Ok(lambda_loc * sum / count)
}

/// Combined multi-task loss: [`hinge`] on the classification head plus
/// [`smooth`] on the regression head.
pub fn multi_task(
    cls_true: ArrayView4<f32>,
    cls_pred: ArrayView4<f32>,
    merged_true: ArrayView4<f32>,
    reg_pred: ArrayView4<f32>,
    lambda_loc: f32,
) -> Result<f32, LossError> {
    Ok(hinge(cls_true, cls_pred)? + smooth(merged_true, reg_pred, lambda_loc)?)
}

fn contributing_cells(mask: &ArrayView3<f32>) -> Result<f32, LossError> {
    let count = mask.iter().filter(|&&m| m == 1.0).count();
    if count == 0 {
        Err(LossError::NoContributingCells)
    } else {
        Ok(count as f32)
    }
}

fn check_shapes(
    y_true: &ArrayView4<f32>,
    y_pred: &ArrayView4<f32>,
    true_channels: usize,
    pred_channels: usize,
) -> Result<(), LossError> {
    let (n, h, w, ct) = y_true.dim();
    let (pn, ph, pw, cp) = y_pred.dim();
    if (n, h, w) != (pn, ph, pw) || ct != true_channels || cp != pred_channels {
        return Err(LossError::ShapeMismatch {
            label: y_true.shape().to_vec(),
            pred: y_pred.shape().to_vec(),
        });
    }
    Ok(())
}
