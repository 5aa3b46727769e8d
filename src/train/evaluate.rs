use serde::{Deserialize, Serialize};

use crate::autograd::tape::Tape;
use crate::data::batch::BatchSource;
use crate::error::{NnError, Result};
use crate::loss::loss_type::LossType;
use crate::loss::reduction::Reduction;
use crate::network::network::Network;
use crate::train::trainer::count_correct;

/// Loss and accuracy of a network over a batch source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalStats {
    /// Mean of the batch losses.
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Scores `network` on every batch of `source` without recording gradients
/// or touching parameters.
pub fn evaluate<S: BatchSource + ?Sized>(
    network: &Network,
    source: &mut S,
    loss_type: LossType,
    reduction: Reduction,
) -> Result<EvalStats> {
    let mut loss = 0.0;
    let mut correct = 0;
    let mut samples = 0;
    let mut batches = 0;

    for batch in source.batches() {
        let tape = Tape::new();
        let _guard = tape.no_grad();
        let output = network.forward(&tape, tape.constant(batch.inputs.clone()))?;
        let batch_loss = loss_type.compute(output, &batch.labels, reduction)?.item()?;

        batches += 1;
        loss += (batch_loss - loss) / batches as f64;
        correct += count_correct(&output.value().argmax_rows()?, &batch.labels);
        samples += batch.len();
    }

    if batches == 0 {
        return Err(NnError::InvalidConfig("evaluation source produced no batches".to_string()));
    }

    Ok(EvalStats {
        loss,
        accuracy: if samples == 0 { 0.0 } else { correct as f64 / samples as f64 },
        samples,
    })
}
