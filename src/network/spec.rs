use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::layers::dense::{Init, Linear};
use crate::layers::layer::Layer;
use crate::math::array::element_count;
use crate::loss::loss_type::LossType;
use crate::network::network::Network;

fn default_bias() -> bool {
    true
}

/// Describes one linear layer and the activation that follows it.
///
/// Fields:
/// - `size`       — number of outputs of the linear transform
/// - `input_size` — number of inputs (the previous layer's `size`, or the raw
///                  feature count for the first layer)
/// - `activation` — optional activation applied after the transform
/// - `bias`       — whether the transform has a bias vector (default `true`)
/// - `init`       — weight initialization scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    #[serde(default)]
    pub activation: Option<ActivationFunction>,
    #[serde(default = "default_bias")]
    pub bias: bool,
    #[serde(default)]
    pub init: Init,
}

/// A serializable description of a network architecture plus the loss it is
/// trained with. Stored separately from trained weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub loss: LossType,
}

impl NetworkSpec {
    /// `inputs → hidden (ReLU) → classes (LogSoftmax)`, trained with NLL.
    pub fn classifier(name: &str, inputs: usize, hidden: usize, classes: usize) -> NetworkSpec {
        NetworkSpec {
            name: name.to_string(),
            layers: vec![
                LayerSpec {
                    size: hidden,
                    input_size: inputs,
                    activation: Some(ActivationFunction::ReLU),
                    bias: true,
                    init: Init::Uniform,
                },
                LayerSpec {
                    size: classes,
                    input_size: hidden,
                    activation: Some(ActivationFunction::LogSoftmax),
                    bias: true,
                    init: Init::Uniform,
                },
            ],
            loss: LossType::Nll,
        }
    }

    /// Checks that layer sizes chain and are non-zero, and that an `Nll`
    /// network ends in `LogSoftmax`.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(NnError::InvalidConfig(format!("network '{}' has no layers", self.name)));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.size == 0 || layer.input_size == 0 {
                return Err(NnError::InvalidConfig(format!("layer {} has a zero dimension", i)));
            }
            if element_count(&[layer.size, layer.input_size]).is_none() {
                return Err(NnError::InvalidConfig(format!("layer {} is too large", i)));
            }
            if i > 0 && self.layers[i - 1].size != layer.input_size {
                return Err(NnError::InvalidConfig(format!(
                    "layer {} expects {} inputs but layer {} produces {}",
                    i,
                    layer.input_size,
                    i - 1,
                    self.layers[i - 1].size
                )));
            }
        }
        if self.loss == LossType::Nll {
            let last = self.layers.last().and_then(|layer| layer.activation);
            if last != Some(ActivationFunction::LogSoftmax) {
                return Err(NnError::InvalidConfig(format!(
                    "network '{}' is trained with nll but its output layer is not log_softmax",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Fails unless `loss_type` is the loss this architecture declares.
    pub fn check_loss(&self, loss_type: LossType) -> Result<()> {
        if loss_type != self.loss {
            return Err(NnError::InvalidConfig(format!(
                "network '{}' declares {:?} loss but the training config asks for {:?}",
                self.name, self.loss, loss_type
            )));
        }
        Ok(())
    }

    /// Instantiates fresh weights for this architecture.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        self.validate()?;
        let mut layers = Vec::new();
        for spec in &self.layers {
            layers.push(Layer::from(Linear::new(spec.input_size, spec.size, spec.bias, spec.init, rng)));
            if let Some(activation) = spec.activation {
                layers.push(Layer::from(activation));
            }
        }
        Ok(Network::new(layers))
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a `NetworkSpec` from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let spec: NetworkSpec = serde_json::from_reader(reader)?;
        spec.validate()?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn classifier_builds_four_stages() {
        let spec = NetworkSpec::classifier("demo", 2, 8, 2);
        let network = spec.build(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(network.layers.len(), 4);
        assert_eq!(network.parameters().len(), 4);
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let mut spec = NetworkSpec::classifier("demo", 2, 8, 2);
        spec.layers[1].input_size = 7;
        assert!(matches!(spec.validate(), Err(NnError::InvalidConfig(_))));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let json = r#"{
            "name": "tiny",
            "layers": [{ "size": 3, "input_size": 2 }]
        }"#;
        let spec: NetworkSpec = serde_json::from_str(json).unwrap();
        assert!(spec.layers[0].bias);
        assert_eq!(spec.layers[0].activation, None);
        assert_eq!(spec.loss, LossType::Nll);
    }

    #[test]
    fn nll_requires_log_softmax_output() {
        let mut spec = NetworkSpec::classifier("demo", 2, 8, 2);
        spec.layers[1].activation = None;
        assert!(matches!(spec.validate(), Err(NnError::InvalidConfig(_))));

        spec.loss = LossType::CrossEntropy;
        spec.validate().unwrap();
    }

    #[test]
    fn training_loss_must_match_declared_loss() {
        let mut spec = NetworkSpec::classifier("logits", 2, 8, 2);
        spec.layers[1].activation = None;
        spec.loss = LossType::CrossEntropy;
        assert!(matches!(spec.check_loss(LossType::Nll), Err(NnError::InvalidConfig(_))));
        spec.check_loss(LossType::CrossEntropy).unwrap();
    }

    #[test]
    fn oversized_layer_is_rejected() {
        let mut spec = NetworkSpec::classifier("huge", 2, 8, 2);
        spec.layers[0].size = usize::MAX;
        spec.layers[1].input_size = usize::MAX;
        assert!(matches!(spec.validate(), Err(NnError::InvalidConfig(_))));
    }
}
