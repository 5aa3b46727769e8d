use std::fmt;

use crate::autograd::backward;
use crate::autograd::ops::{Op, OpKind};
use crate::autograd::tape::{NodeId, Tape};
use crate::error::{NnError, Result};
use crate::loss::reduction::Reduction;
use crate::math::array::NdArray;

/// Handle to a value recorded on a [`Tape`].
///
/// Tensors are cheap to copy; the tape owns the data and the history.
#[derive(Clone, Copy)]
pub struct Tensor<'t> {
    id: NodeId,
    tape: &'t Tape,
}

impl<'t> Tensor<'t> {
    pub(crate) fn new(id: NodeId, tape: &'t Tape) -> Self {
        Tensor { id, tape }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tape(&self) -> &'t Tape {
        self.tape
    }

    pub fn shape(&self) -> Vec<usize> {
        self.tape.nodes.borrow()[self.id.0].value.shape().to_vec()
    }

    pub fn value(&self) -> NdArray {
        self.tape.nodes.borrow()[self.id.0].value.clone()
    }

    /// The single value of a rank-0 tensor.
    pub fn item(&self) -> Result<f64> {
        let nodes = self.tape.nodes.borrow();
        let value = &nodes[self.id.0].value;
        if value.rank() != 0 {
            return Err(NnError::shape("item", format!("expected rank 0, got shape {:?}", value.shape())));
        }
        Ok(value.data()[0])
    }

    pub fn requires_grad(&self) -> bool {
        self.tape.nodes.borrow()[self.id.0].requires_grad
    }

    /// Accumulated gradient of a leaf: a variable's own buffer or the bound
    /// parameter's. Intermediate results keep no gradient.
    pub fn grad(&self) -> Option<NdArray> {
        let nodes = self.tape.nodes.borrow();
        let node = &nodes[self.id.0];
        match &node.op {
            Op::Leaf => node.grad.clone(),
            Op::Param(param) => param.grad(),
            _ => None,
        }
    }

    /// Backpropagates from this rank-0 tensor into every tracked leaf.
    pub fn backward(&self) -> Result<()> {
        backward::run(self.tape, self.id)
    }

    pub fn add(&self, rhs: Tensor<'t>) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Add, &[*self, rhs])
    }

    pub fn sub(&self, rhs: Tensor<'t>) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Sub, &[*self, rhs])
    }

    pub fn mul(&self, rhs: Tensor<'t>) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Mul, &[*self, rhs])
    }

    pub fn scale(&self, factor: f64) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Scale(factor), &[*self])
    }

    pub fn square(&self) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Square, &[*self])
    }

    pub fn sum(&self) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Sum, &[*self])
    }

    pub fn mean(&self) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Mean, &[*self])
    }

    pub fn matmul(&self, rhs: Tensor<'t>) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::MatMul, &[*self, rhs])
    }

    /// `self·weightᵀ + bias` with `self` (batch × in) and `weight` (out × in).
    pub fn linear(&self, weight: Tensor<'t>, bias: Option<Tensor<'t>>) -> Result<Tensor<'t>> {
        match bias {
            Some(bias) => self.tape.forward_op(OpKind::Linear, &[*self, weight, bias]),
            None => self.tape.forward_op(OpKind::Linear, &[*self, weight]),
        }
    }

    pub fn relu(&self) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::Relu, &[*self])
    }

    /// Row-wise log-softmax of a (batch × classes) tensor.
    pub fn log_softmax(&self) -> Result<Tensor<'t>> {
        self.tape.forward_op(OpKind::LogSoftmax, &[*self])
    }

    /// Negative log-likelihood of `labels` under these log-probabilities.
    pub fn nll_loss(&self, labels: &[usize], reduction: Reduction) -> Result<Tensor<'t>> {
        let kind = OpKind::Nll { labels: labels.to_vec(), reduction };
        self.tape.forward_op(kind, &[*self])
    }
}

impl fmt::Debug for Tensor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.tape.nodes.borrow();
        let node = &nodes[self.id.0];
        f.debug_struct("Tensor")
            .field("id", &self.id.0)
            .field("shape", &node.value.shape())
            .field("requires_grad", &node.requires_grad)
            .finish()
    }
}
