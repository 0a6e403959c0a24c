use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::math::matrix::Matrix;

/// Activation applied after a layer's affine transform.
///
/// `Softmax` is vector-valued and only meaningful on the output layer, where
/// it is paired with cross-entropy; the combined gradient is computed by the
/// network, so the layer passes it through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[serde(rename = "relu")]
    ReLU,
    Softmax,
}

impl ActivationFunction {
    /// Activates a single pre-activation vector.
    pub fn apply(&self, z: &[f64]) -> Vec<f64> {
        match self {
            ActivationFunction::ReLU => z.iter().map(|&x| relu(x)).collect(),
            ActivationFunction::Softmax => softmax(z),
        }
    }

    /// Activates a batch, one sample per column. Softmax normalizes each
    /// column on its own.
    pub fn apply_batch(&self, z: &Matrix) -> Result<Matrix> {
        match self {
            ActivationFunction::ReLU => Ok(z.map(relu)),
            ActivationFunction::Softmax => softmax_columns(z),
        }
    }
}

pub fn relu(x: f64) -> f64 {
    if x > 0.0 { x } else { 0.0 }
}

/// ReLU derivative expressed on the layer *output*. The subgradient at 0 is
/// taken to be 0.
pub fn relu_derivative(y: f64) -> f64 {
    if y > 0.0 { 1.0 } else { 0.0 }
}

/// Numerically stable softmax: shifts by the max so every exponent is <= 0.
pub fn softmax(v: &[f64]) -> Vec<f64> {
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = v.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn softmax_columns(z: &Matrix) -> Result<Matrix> {
    let columns: Vec<Vec<f64>> = (0..z.cols).map(|j| softmax(&z.column(j))).collect();
    if columns.is_empty() {
        return Ok(Matrix::zeros(z.rows, 0));
    }
    Matrix::from_columns(&columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn relu_clamps_negatives_and_zero_gradient_at_zero() {
        assert_eq!(ActivationFunction::ReLU.apply(&[-2.0, 0.0, 3.5]), vec![0.0, 0.0, 3.5]);
        assert_eq!(relu_derivative(0.0), 0.0);
        assert_eq!(relu_derivative(1e-12), 1.0);
        assert_eq!(relu_derivative(-4.0), 0.0);
    }

    #[test]
    fn softmax_survives_huge_logits() {
        let p = softmax(&[1000.0, 1001.0, -1000.0]);
        assert!(p.iter().all(|x| x.is_finite() && (0.0..=1.0).contains(x)));
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-5);
        assert!(p[1] > p[0]);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let a = softmax(&[0.5, -1.0, 2.0]);
        let b = softmax(&[500.5, 499.0, 502.0]);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn softmax_columns_normalizes_each_sample() {
        let z = Matrix::from_rows(vec![
            vec![1.0, 800.0, -300.0],
            vec![2.0, -800.0, -300.0],
            vec![3.0, 0.0, -299.0],
        ])
        .unwrap();
        let p = ActivationFunction::Softmax.apply_batch(&z).unwrap();
        for j in 0..p.cols {
            let col = p.column(j);
            assert!(col.iter().all(|x| (0.0..=1.0).contains(x)));
            assert_abs_diff_eq!(col.iter().sum::<f64>(), 1.0, epsilon = 1e-5);
        }
        // Normalization is per column, not across the batch.
        assert_abs_diff_eq!(p.data[0][1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn activation_serializes_as_short_tags() {
        assert_eq!(serde_json::to_string(&ActivationFunction::ReLU).unwrap(), "\"relu\"");
        assert_eq!(serde_json::to_string(&ActivationFunction::Softmax).unwrap(), "\"softmax\"");
    }
}
