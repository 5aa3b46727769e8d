use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::autograd::{parameter::Parameter, tape::Tape, tensor::Tensor};
use crate::error::{NnError, Result};
use crate::math::array::NdArray;

/// Weight initialization schemes for [`Linear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Init {
    /// Uniform in `±1/sqrt(in_features)` for weights and bias.
    #[default]
    Uniform,
    /// N(0, sqrt(2 / in_features)) weights, zero bias. Suits ReLU stacks.
    He,
    /// N(0, sqrt(1 / in_features)) weights, zero bias.
    Xavier,
}

/// Fully connected layer: `y = x·Wᵀ + b`.
///
/// `weight` has shape (out_features × in_features); `bias`, when present,
/// has shape (out_features).
#[derive(Debug, Serialize, Deserialize)]
pub struct Linear {
    pub in_features: usize,
    pub out_features: usize,
    pub weight: Parameter,
    pub bias: Option<Parameter>,
}

impl Linear {
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        with_bias: bool,
        init: Init,
        rng: &mut R,
    ) -> Linear {
        let bound = 1.0 / (in_features.max(1) as f64).sqrt();
        let weight = match init {
            Init::Uniform => NdArray::uniform(&[out_features, in_features], bound, rng),
            Init::He => NdArray::he(out_features, in_features, rng),
            Init::Xavier => NdArray::xavier(out_features, in_features, rng),
        };
        let bias = with_bias.then(|| match init {
            Init::Uniform => NdArray::uniform(&[out_features], bound, rng),
            Init::He | Init::Xavier => NdArray::zeros(&[out_features]),
        });

        Linear {
            in_features,
            out_features,
            weight: Parameter::new("weight", weight),
            bias: bias.map(|value| Parameter::new("bias", value)),
        }
    }

    /// Builds a layer from explicit values, e.g. for tests or imported weights.
    pub fn from_values(weight: NdArray, bias: Option<NdArray>) -> Result<Linear> {
        let (out_features, in_features) = weight.dims2("linear")?;
        if let Some(b) = &bias {
            if b.shape() != [out_features] {
                return Err(NnError::shape(
                    "linear",
                    format!("bias shape {:?} does not match {} outputs", b.shape(), out_features),
                ));
            }
        }
        Ok(Linear {
            in_features,
            out_features,
            weight: Parameter::new("weight", weight),
            bias: bias.map(|b| Parameter::new("bias", b)),
        })
    }

    pub fn forward<'t>(&self, tape: &'t Tape, input: Tensor<'t>) -> Result<Tensor<'t>> {
        let weight = tape.param(&self.weight);
        let bias = self.bias.as_ref().map(|b| tape.param(b));
        input.linear(weight, bias)
    }

    /// Checks that the stored parameters agree with `in_features` and
    /// `out_features`. Needed after deserialization.
    pub fn validate(&self) -> Result<()> {
        let expected = [self.out_features, self.in_features];
        if self.weight.shape() != expected {
            return Err(NnError::shape(
                "linear",
                format!("weight shape {:?} does not match {:?}", self.weight.shape(), expected),
            ));
        }
        if let Some(bias) = &self.bias {
            if bias.shape() != [self.out_features] {
                return Err(NnError::shape(
                    "linear",
                    format!("bias shape {:?} does not match {} outputs", bias.shape(), self.out_features),
                ));
            }
        }
        Ok(())
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        let mut params = vec![self.weight.clone()];
        params.extend(self.bias.iter().cloned());
        params
    }
}
