use crate::autograd::tensor::Tensor;
use crate::error::Result;
use crate::loss::reduction::Reduction;

/// Categorical cross-entropy on raw logits: `nll(log_softmax(logits))`.
///
/// Backward through this pair uses the combined gradient
/// `softmax(logits) - one_hot(label)` rather than chaining the two rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss {
    pub reduction: Reduction,
}

impl CrossEntropyLoss {
    pub fn new(reduction: Reduction) -> CrossEntropyLoss {
        CrossEntropyLoss { reduction }
    }

    pub fn forward<'t>(&self, logits: Tensor<'t>, labels: &[usize]) -> Result<Tensor<'t>> {
        logits.log_softmax()?.nll_loss(labels, self.reduction)
    }
}
