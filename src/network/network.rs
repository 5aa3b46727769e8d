use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::autograd::{parameter::Parameter, tape::Tape, tensor::Tensor};
use crate::error::{NnError, Result};
use crate::layers::layer::Layer;
use crate::math::array::NdArray;

/// An ordered stack of layers. Owns every parameter it trains.
#[derive(Debug, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers }
    }

    /// Forward pass; every operation is recorded on `tape`.
    pub fn forward<'t>(&self, tape: &'t Tape, input: Tensor<'t>) -> Result<Tensor<'t>> {
        let mut current = input;
        for layer in &self.layers {
            current = layer.forward(tape, current)?;
        }
        Ok(current)
    }

    /// Most likely class for each row of `inputs`, without recording gradients.
    pub fn predict(&self, inputs: &NdArray) -> Result<Vec<usize>> {
        let tape = Tape::new();
        let _guard = tape.no_grad();
        let output = self.forward(&tape, tape.constant(inputs.clone()))?;
        output.value().argmax_rows()
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.layers.iter().flat_map(|layer| layer.parameters()).collect()
    }

    pub fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }

    /// Checks every linear layer's parameter shapes and that consecutive
    /// linear layers chain.
    pub fn validate(&self) -> Result<()> {
        let mut previous_out: Option<usize> = None;
        for (i, layer) in self.layers.iter().enumerate() {
            if let Layer::Linear(linear) = layer {
                linear.validate()?;
                if let Some(out) = previous_out {
                    if out != linear.in_features {
                        return Err(NnError::InvalidConfig(format!(
                            "layer {} expects {} inputs but the previous linear layer produces {}",
                            i, linear.in_features, out
                        )));
                    }
                }
                previous_out = Some(linear.out_features);
            }
        }
        Ok(())
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a network from a JSON file previously
    /// written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let network: Network = serde_json::from_reader(reader)?;
        network.validate()?;
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::NetworkSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn saved_classifier() -> serde_json::Value {
        let network = NetworkSpec::classifier("demo", 2, 3, 2)
            .build(&mut StdRng::seed_from_u64(1))
            .unwrap();
        network.validate().unwrap();
        serde_json::to_value(&network).unwrap()
    }

    #[test]
    fn declared_features_must_match_weights() {
        let mut json = saved_classifier();
        json["layers"][0]["in_features"] = serde_json::json!(5);
        let network: Network = serde_json::from_value(json).unwrap();
        assert!(network.validate().unwrap_err().is_shape_error());
    }

    #[test]
    fn linear_layers_must_chain() {
        let mut json = saved_classifier();
        // Second linear layer replaced by one expecting 4 inputs.
        json["layers"][2] = serde_json::json!({
            "type": "linear",
            "in_features": 4,
            "out_features": 2,
            "weight": { "name": "weight", "value": { "shape": [2, 4], "data": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] } },
            "bias": null
        });
        let network: Network = serde_json::from_value(json).unwrap();
        assert!(matches!(network.validate(), Err(NnError::InvalidConfig(_))));
    }

    #[test]
    fn load_json_rejects_inconsistent_file() {
        let mut json = saved_classifier();
        json["layers"][0]["out_features"] = serde_json::json!(7);
        let path = std::env::temp_dir().join(format!("tapenet-bad-network-{}.json", std::process::id()));
        std::fs::write(&path, json.to_string()).unwrap();
        let result = Network::load_json(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.unwrap_err().is_shape_error());
    }
}
