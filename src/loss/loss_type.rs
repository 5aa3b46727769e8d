use serde::{Deserialize, Serialize};

use crate::autograd::tensor::Tensor;
use crate::error::Result;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::nll::NllLoss;
use crate::loss::reduction::Reduction;

/// Selects which loss function the training loop uses.
///
/// - `Nll`          — the network already ends in `LogSoftmax`.
/// - `CrossEntropy` — the network emits raw logits; log-softmax is applied here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Nll,
    CrossEntropy,
}

impl LossType {
    pub fn compute<'t>(&self, output: Tensor<'t>, labels: &[usize], reduction: Reduction) -> Result<Tensor<'t>> {
        match self {
            LossType::Nll => NllLoss::new(reduction).forward(output, labels),
            LossType::CrossEntropy => CrossEntropyLoss::new(reduction).forward(output, labels),
        }
    }
}
