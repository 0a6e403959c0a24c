use crate::math::matrix::Matrix;

/// Input and output of one layer captured during a training forward pass.
/// Both matrices have one column per sample.
#[derive(Debug, Clone)]
pub struct LayerCache {
    pub input: Matrix,
    pub output: Matrix,
}

impl LayerCache {
    pub fn new(input: Matrix, output: Matrix) -> LayerCache {
        LayerCache { input, output }
    }

    pub fn batch_size(&self) -> usize {
        self.input.cols
    }
}

/// Gradients produced by one layer's backward pass.
#[derive(Debug, Clone)]
pub struct LayerGradients {
    /// dL/d(input); `None` for the first layer, which has nothing to feed it to.
    pub input_gradient: Option<Matrix>,
    /// Summed over the batch; same shape as the weights.
    pub weight_gradient: Matrix,
    /// One column per sample; reduced to a mean during the update.
    pub bias_gradients: Matrix,
}

impl LayerGradients {
    pub fn batch_size(&self) -> usize {
        self.bias_gradients.cols
    }
}
