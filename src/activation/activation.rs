use serde::{Deserialize, Serialize};

use crate::autograd::tensor::Tensor;
use crate::error::Result;

/// Parameter-free layers applied after a linear transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    /// `max(0, x)`; the gradient at exactly zero is zero.
    ReLU,
    /// Row-wise log-softmax over the class dimension. Pair with `LossType::Nll`.
    LogSoftmax,
}

impl ActivationFunction {
    pub fn apply<'t>(&self, x: Tensor<'t>) -> Result<Tensor<'t>> {
        match self {
            ActivationFunction::ReLU => x.relu(),
            ActivationFunction::LogSoftmax => x.log_softmax(),
        }
    }
}
