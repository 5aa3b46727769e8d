use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use serde::{Deserialize, Serialize};

use crate::data::dataset::InMemoryDataset;
use crate::error::{NnError, Result};
use crate::loss::loss_type::LossType;
use crate::loss::reduction::Reduction;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::EpochStats;

fn default_batch_size() -> usize {
    32
}

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`        — total number of full passes over the batch source
/// - `learning_rate` — SGD step size, see [`TrainConfig::optimizer`]
/// - `batch_size`    — samples per mini-batch when building an in-memory data set
/// - `seed`          — shuffle seed; `None` keeps storage order
/// - `loss_type`     — `Nll` or `CrossEntropy`
/// - `reduction`     — how per-row losses combine (`Mean` by default)
/// - `progress_tx`   — optional channel; one `EpochStats` is sent per
///                     completed epoch. If the receiver is dropped the loop
///                     stops early.
/// - `stop_flag`     — optional flag; when set from elsewhere the loop stops
///                     before its next step.
///
/// The channel and the flag are runtime-only and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub loss_type: LossType,
    #[serde(default)]
    pub reduction: Reduction,
    #[serde(skip)]
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    #[serde(skip)]
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a minimal `TrainConfig` with no progress channel and no stop flag.
    pub fn new(epochs: usize, learning_rate: f64, loss_type: LossType) -> Self {
        TrainConfig {
            epochs,
            learning_rate,
            batch_size: default_batch_size(),
            seed: None,
            loss_type,
            reduction: Reduction::Mean,
            progress_tx: None,
            stop_flag: None,
        }
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(NnError::InvalidConfig("epochs must be at least 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(NnError::InvalidConfig(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_flag.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// SGD over every parameter of `network` with this config's learning rate.
    pub fn optimizer(&self, network: &Network) -> Sgd {
        Sgd::new(&network.parameters(), self.learning_rate)
    }

    /// Wraps samples in a data set using this config's batch size and seed.
    pub fn dataset(&self, inputs: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<InMemoryDataset> {
        if self.batch_size == 0 {
            return Err(NnError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        let dataset = InMemoryDataset::new(inputs, labels, self.batch_size)?;
        Ok(match self.seed {
            Some(seed) => dataset.shuffled(seed),
            None => dataset,
        })
    }

    /// Serializes the hyperparameters to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a `TrainConfig` from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let config: TrainConfig = serde_json::from_str(r#"{ "epochs": 3, "learning_rate": 0.1 }"#).unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.loss_type, LossType::Nll);
        assert_eq!(config.reduction, Reduction::Mean);
        assert!(config.progress_tx.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn batch_size_is_checked_when_building_the_dataset() {
        let mut config = TrainConfig::new(1, 0.1, LossType::Nll);
        config.batch_size = 0;
        config.validate().unwrap();
        let err = config.dataset(vec![vec![1.0]], vec![0]).unwrap_err();
        assert!(matches!(err, NnError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_positive_learning_rate() {
        let config = TrainConfig::new(1, 0.0, LossType::Nll);
        assert!(matches!(config.validate(), Err(NnError::InvalidConfig(_))));
    }
}
