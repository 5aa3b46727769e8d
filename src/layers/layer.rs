use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::autograd::{parameter::Parameter, tape::Tape, tensor::Tensor};
use crate::error::Result;
use crate::layers::dense::Linear;

/// One stage of a [`Network`](crate::network::Network).
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Linear(Linear),
    Activation { function: ActivationFunction },
}

impl Layer {
    pub fn forward<'t>(&self, tape: &'t Tape, input: Tensor<'t>) -> Result<Tensor<'t>> {
        match self {
            Layer::Linear(linear) => linear.forward(tape, input),
            Layer::Activation { function } => function.apply(input),
        }
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        match self {
            Layer::Linear(linear) => linear.parameters(),
            Layer::Activation { .. } => Vec::new(),
        }
    }
}

impl From<Linear> for Layer {
    fn from(linear: Linear) -> Self {
        Layer::Linear(linear)
    }
}

impl From<ActivationFunction> for Layer {
    fn from(function: ActivationFunction) -> Self {
        Layer::Activation { function }
    }
}
