use crate::autograd::tensor::Tensor;
use crate::error::Result;
use crate::loss::reduction::Reduction;

/// Negative log-likelihood over log-probabilities.
///
/// `log_probs` has shape (batch × classes) and `labels` holds one class index
/// per row. The result is `-mean` (or `-sum`) of `log_probs[row][label]`.
///
/// # Errors
/// - shape error if the label count differs from the batch size
/// - index error if any label is `>= classes`
#[derive(Debug, Clone, Copy, Default)]
pub struct NllLoss {
    pub reduction: Reduction,
}

impl NllLoss {
    pub fn new(reduction: Reduction) -> NllLoss {
        NllLoss { reduction }
    }

    pub fn forward<'t>(&self, log_probs: Tensor<'t>, labels: &[usize]) -> Result<Tensor<'t>> {
        log_probs.nll_loss(labels, self.reduction)
    }
}
