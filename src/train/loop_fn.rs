use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::data::batch::BatchSource;
use crate::error::Result;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::train_epoch;

/// Everything `train_loop` observed, one entry per completed epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub epochs: Vec<EpochStats>,
    pub stopped_early: bool,
}

impl TrainReport {
    /// Mean training loss of the last completed epoch.
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|stats| stats.train_loss)
    }

    pub fn final_accuracy(&self) -> Option<f64> {
        self.epochs.last().map(|stats| stats.train_accuracy)
    }
}

/// Trains `network` for `config.epochs` passes over `source`.
///
/// # Arguments
/// - `network`   — the model; its parameters are updated in place
/// - `source`    — replayed once per epoch
/// - `optimizer` — SGD over the network's parameters
/// - `config`    — hyperparameters, optional progress channel, optional stop flag
///
/// # Early termination
/// The loop stops early, keeping what it has already reported, if:
/// - `config.stop_flag` is set (checked before every step), **or**
/// - the `progress_tx` receiver has been dropped.
///
/// A batch that fails any step aborts the run with `NnError::Batch`.
pub fn train_loop<S: BatchSource + ?Sized>(
    network: &Network,
    source: &mut S,
    optimizer: &Sgd,
    config: &TrainConfig,
) -> Result<TrainReport> {
    config.validate()?;
    let mut report = TrainReport::default();

    for epoch in 1..=config.epochs {
        if config.stop_requested() {
            report.stopped_early = true;
            break;
        }

        let t_start = Instant::now();
        let outcome = train_epoch(network, source, optimizer, config, epoch)?;
        if outcome.interrupted {
            report.stopped_early = true;
            break;
        }

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss: outcome.mean_loss,
            train_accuracy: outcome.accuracy,
            batches: outcome.batches,
            samples: outcome.samples,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        log::info!(
            "epoch {}/{}: loss = {:.6}, accuracy = {:.2}%",
            epoch,
            config.epochs,
            stats.train_loss,
            stats.train_accuracy * 100.0
        );
        report.epochs.push(stats.clone());

        if let Some(ref tx) = config.progress_tx {
            if tx.send(stats).is_err() {
                log::warn!("progress receiver dropped; stopping after epoch {}", epoch);
                report.stopped_early = true;
                break;
            }
        }
    }

    if report.stopped_early {
        log::warn!("training stopped early after {} epoch(s)", report.epochs.len());
    }
    Ok(report)
}
