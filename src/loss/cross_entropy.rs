use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Categorical cross-entropy for a softmax output layer.
pub struct CrossEntropyLoss;

/// Probabilities are floored here before `ln` so a zero never yields an
/// infinite loss.
pub const PROBABILITY_FLOOR: f64 = 1e-15;

impl CrossEntropyLoss {
    /// Mean over the batch (columns) of `-sum(expected * ln(max(predicted, floor)))`.
    ///
    /// `predicted` — softmax probabilities, classes x samples
    /// `expected`  — one-hot targets, same shape
    pub fn loss(predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        check_shapes(predicted, expected)?;
        if predicted.cols == 0 {
            return Err(Error::Shape("cannot compute the loss of an empty batch".to_owned()));
        }

        let total: f64 = predicted
            .data
            .iter()
            .flatten()
            .zip(expected.data.iter().flatten())
            .map(|(&p, &e)| -e * p.max(PROBABILITY_FLOOR).ln())
            .sum();
        Ok(total / predicted.cols as f64)
    }

    /// Gradient of softmax followed by cross-entropy with respect to the
    /// logits: `predicted - expected`, one column per sample.
    ///
    /// Fed straight into the output layer's backward pass, which must not
    /// apply the softmax Jacobian again.
    pub fn derivative(predicted: &Matrix, expected: &Matrix) -> Result<Matrix> {
        check_shapes(predicted, expected)?;
        predicted.sub(expected)
    }
}

fn check_shapes(predicted: &Matrix, expected: &Matrix) -> Result<()> {
    if predicted.shape() != expected.shape() {
        return Err(Error::Shape(format!(
            "predictions are {}x{} but targets are {}x{}",
            predicted.rows, predicted.cols, expected.rows, expected.cols
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cols(columns: &[Vec<f64>]) -> Matrix {
        Matrix::from_columns(columns).unwrap()
    }

    #[test]
    fn loss_is_mean_negative_log_likelihood() {
        let predicted = cols(&[vec![0.5, 0.5], vec![0.25, 0.75]]);
        let expected = cols(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let loss = CrossEntropyLoss::loss(&predicted, &expected).unwrap();
        assert_abs_diff_eq!(loss, (-(0.5f64).ln() - (0.75f64).ln()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn perfect_prediction_has_zero_loss() {
        let m = cols(&[vec![0.0, 1.0, 0.0]]);
        assert_abs_diff_eq!(CrossEntropyLoss::loss(&m, &m).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_probability_on_the_true_class_is_finite() {
        let predicted = cols(&[vec![1.0, 0.0]]);
        let expected = cols(&[vec![0.0, 1.0]]);
        let loss = CrossEntropyLoss::loss(&predicted, &expected).unwrap();
        assert!(loss.is_finite());
        assert_abs_diff_eq!(loss, -(PROBABILITY_FLOOR).ln(), epsilon = 1e-9);
    }

    #[test]
    fn loss_is_never_negative() {
        let predicted = cols(&[vec![0.1, 0.7, 0.2], vec![0.3, 0.3, 0.4], vec![0.98, 0.01, 0.01]]);
        for class in 0..3 {
            let mut one_hot = vec![0.0; 3];
            one_hot[class] = 1.0;
            let expected = cols(&[one_hot.clone(), one_hot.clone(), one_hot]);
            assert!(CrossEntropyLoss::loss(&predicted, &expected).unwrap() >= 0.0);
        }
    }

    #[test]
    fn derivative_is_prediction_minus_target() {
        let predicted = cols(&[vec![0.2, 0.8]]);
        let expected = cols(&[vec![0.0, 1.0]]);
        let grad = CrossEntropyLoss::derivative(&predicted, &expected).unwrap();
        assert_abs_diff_eq!(grad.data[0][0], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(grad.data[1][0], -0.2, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_or_empty_batches_are_rejected() {
        let a = Matrix::zeros(3, 2);
        let b = Matrix::zeros(2, 2);
        assert!(matches!(CrossEntropyLoss::loss(&a, &b), Err(Error::Shape(_))));
        assert!(CrossEntropyLoss::derivative(&a, &b).is_err());
        let empty = Matrix::zeros(3, 0);
        assert!(CrossEntropyLoss::loss(&empty, &empty).is_err());
    }
}
