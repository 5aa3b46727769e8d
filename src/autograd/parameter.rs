use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{NnError, Result};
use crate::math::array::NdArray;

#[derive(Debug)]
struct ParamData {
    name: String,
    value: NdArray,
    /// Allocated on first accumulation; same shape as `value` from then on.
    grad: Option<NdArray>,
}

/// A trainable tensor shared between the layer that owns it, the tapes it is
/// entered onto, and the optimizer that updates it.
///
/// Cloning a `Parameter` clones the handle, not the data.
#[derive(Debug, Clone)]
pub struct Parameter(Rc<RefCell<ParamData>>);

/// Non-owning handle held by optimizers.
#[derive(Debug, Clone)]
pub struct WeakParameter(Weak<RefCell<ParamData>>);

impl Parameter {
    pub fn new(name: impl Into<String>, value: NdArray) -> Parameter {
        Parameter(Rc::new(RefCell::new(ParamData {
            name: name.into(),
            value,
            grad: None,
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.borrow().value.shape().to_vec()
    }

    pub fn value(&self) -> NdArray {
        self.0.borrow().value.clone()
    }

    /// Replaces the value; the new value must keep the parameter's shape.
    pub fn set_value(&self, value: NdArray) -> Result<()> {
        let mut data = self.0.borrow_mut();
        if data.value.shape() != value.shape() {
            return Err(NnError::shape(
                "set_value",
                format!("parameter {} has shape {:?}, got {:?}", data.name, data.value.shape(), value.shape()),
            ));
        }
        data.value = value;
        Ok(())
    }

    pub fn grad(&self) -> Option<NdArray> {
        self.0.borrow().grad.clone()
    }

    /// Adds `delta` into the gradient buffer, allocating it if needed.
    pub fn accumulate_grad(&self, delta: &NdArray) -> Result<()> {
        let mut data = self.0.borrow_mut();
        if data.value.shape() != delta.shape() {
            return Err(NnError::shape(
                "accumulate_grad",
                format!("parameter {} has shape {:?}, gradient has {:?}", data.name, data.value.shape(), delta.shape()),
            ));
        }
        match data.grad.as_mut() {
            Some(grad) => grad.add_assign(delta),
            None => {
                data.grad = Some(delta.clone());
                Ok(())
            }
        }
    }

    /// Zeroes an allocated gradient buffer. A parameter that never received a
    /// gradient stays without one.
    pub fn zero_grad(&self) {
        if let Some(grad) = self.0.borrow_mut().grad.as_mut() {
            grad.fill(0.0);
        }
    }

    /// `value -= lr * grad`. Returns false when there is no gradient to apply.
    pub fn descend(&self, learning_rate: f64) -> Result<bool> {
        let mut data = self.0.borrow_mut();
        let ParamData { value, grad, .. } = &mut *data;
        match grad {
            Some(grad) => {
                value.scaled_add(-learning_rate, grad)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn downgrade(&self) -> WeakParameter {
        WeakParameter(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Parameter) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl WeakParameter {
    pub fn upgrade(&self) -> Result<Parameter> {
        self.0.upgrade().map(Parameter).ok_or(NnError::ParameterReleased)
    }
}

#[derive(Serialize, Deserialize)]
struct ParamState {
    name: String,
    value: NdArray,
}

// Only the value is persisted; gradients are transient training state.
impl Serialize for Parameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let data = self.0.borrow();
        ParamState { name: data.name.clone(), value: data.value.clone() }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Parameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let state = ParamState::deserialize(deserializer)?;
        Ok(Parameter::new(state.name, state.value))
    }
}
