use std::cell::{Cell, RefCell};

use crate::autograd::grad_mode::NoGradGuard;
use crate::autograd::ops::{Op, OpKind};
use crate::autograd::parameter::Parameter;
use crate::autograd::tensor::Tensor;
use crate::error::{NnError, Result};
use crate::math::array::NdArray;

/// Index of a node in its tape's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) value: NdArray,
    /// Accumulated gradient, only kept for `Op::Leaf` variables.
    pub(crate) grad: Option<NdArray>,
    pub(crate) op: Op,
    pub(crate) requires_grad: bool,
}

/// Arena recording one forward pass.
///
/// Nodes are appended strictly in evaluation order, so every node's inputs
/// have smaller ids than the node itself and reverse creation order is a valid
/// reverse topological order. Dropping the tape releases the whole graph.
#[derive(Debug)]
pub struct Tape {
    pub(crate) nodes: RefCell<Vec<Node>>,
    grad_enabled: Cell<bool>,
}

impl Default for Tape {
    fn default() -> Self {
        Tape {
            nodes: RefCell::new(Vec::new()),
            grad_enabled: Cell::new(true),
        }
    }
}

impl Tape {
    pub fn new() -> Tape {
        Tape::default()
    }

    /// An input that never receives a gradient.
    pub fn constant(&self, value: NdArray) -> Tensor<'_> {
        self.push(value, Op::Leaf, false)
    }

    /// A gradient-tracked leaf whose gradient is kept on this tape.
    pub fn variable(&self, value: NdArray) -> Tensor<'_> {
        self.push(value, Op::Leaf, true)
    }

    /// Enters a parameter's current value; backward accumulates into the
    /// parameter's own gradient buffer.
    pub fn param(&self, param: &Parameter) -> Tensor<'_> {
        let tracked = self.is_grad_enabled();
        self.push(param.value(), Op::Param(param.clone()), tracked)
    }

    /// Records one operation and returns its output.
    ///
    /// Operands must come from this tape and have compatible shapes; the output
    /// tracks gradients only if recording is enabled and some operand does.
    pub fn forward_op<'t>(&'t self, kind: OpKind, inputs: &[Tensor<'t>]) -> Result<Tensor<'t>> {
        if inputs.iter().any(|t| !std::ptr::eq(t.tape(), self)) {
            return Err(NnError::ForeignTensor);
        }
        let ids: Vec<NodeId> = inputs.iter().map(|t| t.id()).collect();
        let (value, requires_grad) = {
            let nodes = self.nodes.borrow();
            let values: Vec<&NdArray> = ids.iter().map(|id| &nodes[id.0].value).collect();
            let value = kind.forward(&values)?;
            let requires_grad = self.is_grad_enabled() && ids.iter().any(|id| nodes[id.0].requires_grad);
            (value, requires_grad)
        };
        let op = if requires_grad { kind.into_op(&ids) } else { Op::Leaf };
        Ok(self.push(value, op, requires_grad))
    }

    /// Disables gradient recording on this tape until the guard is dropped.
    pub fn no_grad(&self) -> NoGradGuard<'_> {
        NoGradGuard::new(self)
    }

    pub fn is_grad_enabled(&self) -> bool {
        self.grad_enabled.get()
    }

    pub(crate) fn set_grad_enabled(&self, enabled: bool) {
        self.grad_enabled.set(enabled);
    }

    /// Clears the gradients of every variable on this tape. Parameter
    /// gradients live on the parameters and are cleared by the optimizer.
    pub fn zero_grad(&self) {
        for node in self.nodes.borrow_mut().iter_mut() {
            if let Some(grad) = node.grad.as_mut() {
                grad.fill(0.0);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    fn push(&self, value: NdArray, op: Op, requires_grad: bool) -> Tensor<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(Node { value, grad: None, op, requires_grad });
        Tensor::new(id, self)
    }
}
