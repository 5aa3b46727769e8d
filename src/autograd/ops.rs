use crate::autograd::parameter::Parameter;
use crate::autograd::tape::NodeId;
use crate::error::{NnError, Result};
use crate::loss::reduction::Reduction;
use crate::math::array::NdArray;

/// The closed set of operations a tape can record.
///
/// Operand order for `Linear` is `[input, weight]` or `[input, weight, bias]`;
/// `Nll` takes the log-probabilities as its single operand.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Scale(f64),
    Square,
    Sum,
    Mean,
    MatMul,
    Linear,
    Relu,
    LogSoftmax,
    Nll { labels: Vec<usize>, reduction: Reduction },
}

/// A recorded node's operation, with operands resolved to node ids.
#[derive(Debug)]
pub(crate) enum Op {
    /// Constant, variable, or an output recorded without history.
    Leaf,
    Param(Parameter),
    Add(NodeId, NodeId),
    Sub(NodeId, NodeId),
    Mul(NodeId, NodeId),
    Scale(NodeId, f64),
    Square(NodeId),
    Sum(NodeId),
    Mean(NodeId),
    MatMul(NodeId, NodeId),
    Linear { input: NodeId, weight: NodeId, bias: Option<NodeId> },
    Relu(NodeId),
    LogSoftmax(NodeId),
    Nll { input: NodeId, labels: Vec<usize>, reduction: Reduction },
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Scale(_) => "scale",
            OpKind::Square => "square",
            OpKind::Sum => "sum",
            OpKind::Mean => "mean",
            OpKind::MatMul => "matmul",
            OpKind::Linear => "linear",
            OpKind::Relu => "relu",
            OpKind::LogSoftmax => "log_softmax",
            OpKind::Nll { .. } => "nll_loss",
        }
    }

    fn check_arity(&self, got: usize) -> Result<()> {
        let ok = match self {
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::MatMul => got == 2,
            OpKind::Linear => got == 2 || got == 3,
            _ => got == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(NnError::shape(self.name(), format!("wrong number of operands: {}", got)))
        }
    }

    /// Validates operands and computes the output value.
    pub(crate) fn forward(&self, inputs: &[&NdArray]) -> Result<NdArray> {
        self.check_arity(inputs.len())?;
        let op = self.name();
        match self {
            OpKind::Add => inputs[0].zip_map(inputs[1], op, |a, b| a + b),
            OpKind::Sub => inputs[0].zip_map(inputs[1], op, |a, b| a - b),
            OpKind::Mul => inputs[0].zip_map(inputs[1], op, |a, b| a * b),
            OpKind::Scale(c) => Ok(inputs[0].map(|x| x * c)),
            OpKind::Square => Ok(inputs[0].map(|x| x * x)),
            OpKind::Sum => Ok(NdArray::scalar(inputs[0].sum())),
            OpKind::Mean => {
                if inputs[0].is_empty() {
                    return Err(NnError::shape(op, "mean of an empty tensor"));
                }
                Ok(NdArray::scalar(inputs[0].sum() / inputs[0].len() as f64))
            }
            OpKind::MatMul => inputs[0].matmul(inputs[1]),
            OpKind::Linear => linear_forward(inputs[0], inputs[1], inputs.get(2).copied()),
            OpKind::Relu => Ok(inputs[0].map(|x| if x > 0.0 { x } else { 0.0 })),
            OpKind::LogSoftmax => log_softmax_forward(inputs[0]),
            OpKind::Nll { labels, reduction } => nll_forward(inputs[0], labels, *reduction),
        }
    }

    pub(crate) fn into_op(self, ids: &[NodeId]) -> Op {
        match self {
            OpKind::Add => Op::Add(ids[0], ids[1]),
            OpKind::Sub => Op::Sub(ids[0], ids[1]),
            OpKind::Mul => Op::Mul(ids[0], ids[1]),
            OpKind::Scale(c) => Op::Scale(ids[0], c),
            OpKind::Square => Op::Square(ids[0]),
            OpKind::Sum => Op::Sum(ids[0]),
            OpKind::Mean => Op::Mean(ids[0]),
            OpKind::MatMul => Op::MatMul(ids[0], ids[1]),
            OpKind::Linear => Op::Linear {
                input: ids[0],
                weight: ids[1],
                bias: ids.get(2).copied(),
            },
            OpKind::Relu => Op::Relu(ids[0]),
            OpKind::LogSoftmax => Op::LogSoftmax(ids[0]),
            OpKind::Nll { labels, reduction } => Op::Nll { input: ids[0], labels, reduction },
        }
    }
}

/// `y = x·Wᵀ + b` for `x` (batch × in), `W` (out × in), `b` (out).
fn linear_forward(x: &NdArray, w: &NdArray, b: Option<&NdArray>) -> Result<NdArray> {
    let (batch, in_features) = x.dims2("linear")?;
    let (out_features, w_in) = w.dims2("linear")?;
    if in_features != w_in {
        return Err(NnError::shape(
            "linear",
            format!("input has {} features, weight expects {}", in_features, w_in),
        ));
    }
    if let Some(b) = b {
        if b.shape() != [out_features] {
            return Err(NnError::shape(
                "linear",
                format!("bias shape {:?} does not match {} outputs", b.shape(), out_features),
            ));
        }
    }

    let xs = x.data();
    let ws = w.data();
    let mut out = Vec::with_capacity(batch * out_features);
    for i in 0..batch {
        let row = &xs[i * in_features..(i + 1) * in_features];
        for o in 0..out_features {
            let w_row = &ws[o * in_features..(o + 1) * in_features];
            let dot: f64 = row.iter().zip(w_row).map(|(a, b)| a * b).sum();
            out.push(dot + b.map_or(0.0, |b| b.data()[o]));
        }
    }
    NdArray::from_vec(out, &[batch, out_features])
}

/// Row-wise `x_i - max - ln Σ exp(x_j - max)`.
fn log_softmax_forward(x: &NdArray) -> Result<NdArray> {
    let (rows, cols) = x.dims2("log_softmax")?;
    if cols == 0 {
        return Err(NnError::shape("log_softmax", "rows have no classes"));
    }
    let mut out = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        let row = x.row(i);
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lse = row.iter().map(|v| (v - max).exp()).sum::<f64>().ln();
        out.extend(row.iter().map(|v| v - max - lse));
    }
    NdArray::from_vec(out, &[rows, cols])
}

/// Labels are checked before any value is read.
fn nll_forward(log_probs: &NdArray, labels: &[usize], reduction: Reduction) -> Result<NdArray> {
    let (rows, classes) = log_probs.dims2("nll_loss")?;
    if labels.len() != rows {
        return Err(NnError::shape(
            "nll_loss",
            format!("{} labels for a batch of {} rows", labels.len(), rows),
        ));
    }
    if let Some((row, &label)) = labels.iter().enumerate().find(|&(_, &l)| l >= classes) {
        return Err(NnError::Index { row, label, classes });
    }
    if rows == 0 && reduction == Reduction::Mean {
        return Err(NnError::shape("nll_loss", "mean over an empty batch"));
    }
    let total: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| -log_probs.row(i)[label])
        .sum();
    Ok(NdArray::scalar(total * reduction.scale(rows)))
}
