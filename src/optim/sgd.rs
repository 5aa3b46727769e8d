use crate::autograd::parameter::{Parameter, WeakParameter};
use crate::error::Result;

/// Plain stochastic gradient descent.
///
/// Holds non-owning references to the parameters it updates, so the model
/// stays the sole owner. Once the model is dropped, `step` and `zero_grad`
/// fail with `NnError::ParameterReleased`.
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f64,
    params: Vec<WeakParameter>,
}

impl Sgd {
    pub fn new(params: &[Parameter], learning_rate: f64) -> Sgd {
        Sgd {
            learning_rate,
            params: params.iter().map(Parameter::downgrade).collect(),
        }
    }

    /// `value -= learning_rate * grad` for every parameter holding a gradient.
    /// Parameters that never received a gradient are left untouched.
    pub fn step(&self) -> Result<()> {
        for weak in &self.params {
            weak.upgrade()?.descend(self.learning_rate)?;
        }
        Ok(())
    }

    /// Resets every registered gradient buffer to zero.
    pub fn zero_grad(&self) -> Result<()> {
        for weak in &self.params {
            weak.upgrade()?.zero_grad();
        }
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
