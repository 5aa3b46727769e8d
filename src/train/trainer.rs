use crate::autograd::tape::Tape;
use crate::data::batch::{Batch, BatchSource};
use crate::error::{NnError, Result};
use crate::loss::loss_type::LossType;
use crate::loss::reduction::Reduction;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::train_config::TrainConfig;

/// Result of a single optimization step on one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub loss: f64,
    /// Rows whose arg-max output matched the label.
    pub correct: usize,
    pub samples: usize,
}

/// Aggregate over one pass of a `BatchSource`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochOutcome {
    /// Mean of the batch losses.
    pub mean_loss: f64,
    pub accuracy: f64,
    pub batches: usize,
    pub samples: usize,
    /// Set when the stop flag was raised part-way through the epoch.
    pub interrupted: bool,
}

/// Runs one optimization step on `batch`.
///
/// Order: clear gradients, record the forward pass on a fresh tape, compute
/// the loss, back-propagate, apply the SGD update. The tape is dropped on
/// return.
pub fn train_step(
    network: &Network,
    optimizer: &Sgd,
    batch: &Batch,
    loss_type: LossType,
    reduction: Reduction,
) -> Result<StepOutcome> {
    optimizer.zero_grad()?;

    let tape = Tape::new();
    let input = tape.constant(batch.inputs.clone());
    let output = network.forward(&tape, input)?;
    let loss = loss_type.compute(output, &batch.labels, reduction)?;
    loss.backward()?;
    optimizer.step()?;

    let correct = count_correct(&output.value().argmax_rows()?, &batch.labels);
    Ok(StepOutcome {
        loss: loss.item()?,
        correct,
        samples: batch.len(),
    })
}

/// One full pass over `source`, one optimizer step per batch.
///
/// A failing batch aborts the epoch with `NnError::Batch` carrying the
/// 1-based epoch and 0-based batch index. An epoch that yields no batches is
/// rejected.
pub fn train_epoch<S: BatchSource + ?Sized>(
    network: &Network,
    source: &mut S,
    optimizer: &Sgd,
    config: &TrainConfig,
    epoch: usize,
) -> Result<EpochOutcome> {
    let mut mean_loss = 0.0;
    let mut correct = 0;
    let mut samples = 0;
    let mut batches = 0;
    let mut interrupted = false;

    for (index, batch) in source.batches().enumerate() {
        if config.stop_requested() {
            interrupted = true;
            break;
        }
        let step = train_step(network, optimizer, &batch, config.loss_type, config.reduction).map_err(|err| {
            NnError::Batch {
                epoch,
                batch: index,
                source: Box::new(err),
            }
        })?;

        batches += 1;
        // Running mean keeps the epoch loss independent of batch count.
        mean_loss += (step.loss - mean_loss) / batches as f64;
        correct += step.correct;
        samples += step.samples;
        log::debug!("epoch {} batch {}: loss = {:.6}", epoch, index, step.loss);
    }

    if batches == 0 && !interrupted {
        return Err(NnError::InvalidConfig(format!("epoch {} produced no batches", epoch)));
    }

    Ok(EpochOutcome {
        mean_loss,
        accuracy: if samples == 0 { 0.0 } else { correct as f64 / samples as f64 },
        batches,
        samples,
        interrupted,
    })
}

pub(crate) fn count_correct(predictions: &[usize], labels: &[usize]) -> usize {
    predictions.iter().zip(labels).filter(|(p, l)| p == l).count()
}
