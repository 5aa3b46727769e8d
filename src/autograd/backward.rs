use crate::autograd::ops::Op;
use crate::autograd::tape::{Node, NodeId, Tape};
use crate::error::{NnError, Result};
use crate::math::array::NdArray;

/// Reverse pass from `root`, which must be rank 0.
///
/// Every node at or below `root` is visited once, in reverse creation order.
/// Contributions to a node are summed before its own rule runs. Leaf
/// gradients are added to whatever the leaf already holds.
pub(crate) fn run(tape: &Tape, root: NodeId) -> Result<()> {
    let mut leaf_updates: Vec<(usize, NdArray)> = Vec::new();
    {
        let nodes = tape.nodes.borrow();
        let root_node = &nodes[root.0];
        if root_node.value.rank() != 0 {
            return Err(NnError::NonScalarBackward {
                shape: root_node.value.shape().to_vec(),
            });
        }
        if !root_node.requires_grad {
            log::debug!("backward on an untracked tensor; nothing to do");
            return Ok(());
        }

        let mut grads: Vec<Option<NdArray>> = vec![None; root.0 + 1];
        grads[root.0] = Some(NdArray::scalar(1.0));

        for i in (0..=root.0).rev() {
            let Some(g) = grads[i].take() else { continue };
            let node = &nodes[i];
            if !node.requires_grad {
                continue;
            }
            match &node.op {
                Op::Leaf => leaf_updates.push((i, g)),
                Op::Param(param) => param.accumulate_grad(&g)?,
                Op::Add(a, b) => {
                    send(&nodes, &mut grads, *a, || Ok(g.clone()))?;
                    send(&nodes, &mut grads, *b, || Ok(g.clone()))?;
                }
                Op::Sub(a, b) => {
                    send(&nodes, &mut grads, *a, || Ok(g.clone()))?;
                    send(&nodes, &mut grads, *b, || Ok(g.map(|x| -x)))?;
                }
                Op::Mul(a, b) => {
                    send(&nodes, &mut grads, *a, || g.zip_map(&nodes[b.0].value, "mul", |g, y| g * y))?;
                    send(&nodes, &mut grads, *b, || g.zip_map(&nodes[a.0].value, "mul", |g, x| g * x))?;
                }
                Op::Scale(a, c) => {
                    send(&nodes, &mut grads, *a, || Ok(g.map(|x| x * c)))?;
                }
                Op::Square(a) => {
                    send(&nodes, &mut grads, *a, || g.zip_map(&nodes[a.0].value, "square", |g, x| 2.0 * x * g))?;
                }
                Op::Sum(a) => {
                    let upstream = g.data()[0];
                    send(&nodes, &mut grads, *a, || Ok(NdArray::full(nodes[a.0].value.shape(), upstream)))?;
                }
                Op::Mean(a) => {
                    let input = &nodes[a.0].value;
                    let share = g.data()[0] / input.len() as f64;
                    send(&nodes, &mut grads, *a, || Ok(NdArray::full(input.shape(), share)))?;
                }
                Op::MatMul(a, b) => {
                    // dA = G·Bᵀ, dB = Aᵀ·G
                    send(&nodes, &mut grads, *a, || g.matmul(&nodes[b.0].value.transpose()?))?;
                    send(&nodes, &mut grads, *b, || nodes[a.0].value.transpose()?.matmul(&g))?;
                }
                Op::Linear { input, weight, bias } => {
                    // dx = G·W, dW = Gᵀ·x, db = Σ_batch G
                    send(&nodes, &mut grads, *input, || g.matmul(&nodes[weight.0].value))?;
                    send(&nodes, &mut grads, *weight, || g.transpose()?.matmul(&nodes[input.0].value))?;
                    if let Some(bias) = bias {
                        send(&nodes, &mut grads, *bias, || g.sum_rows())?;
                    }
                }
                Op::Relu(a) => {
                    send(&nodes, &mut grads, *a, || {
                        g.zip_map(&nodes[a.0].value, "relu", |g, x| if x > 0.0 { g } else { 0.0 })
                    })?;
                }
                Op::LogSoftmax(a) => {
                    let output = &node.value;
                    send(&nodes, &mut grads, *a, || log_softmax_backward(output, &g))?;
                }
                Op::Nll { input, labels, reduction } => {
                    let log_probs = &nodes[input.0];
                    let (rows, _) = log_probs.value.dims2("nll_loss")?;
                    let scale = g.data()[0] * reduction.scale(rows);
                    match log_probs.op {
                        // log_softmax feeding nll: the composed gradient w.r.t.
                        // the logits is softmax(x) - one_hot(label).
                        Op::LogSoftmax(logits) => {
                            send(&nodes, &mut grads, logits, || {
                                Ok(fused_softmax_nll(&log_probs.value, labels, scale))
                            })?;
                        }
                        _ => {
                            send(&nodes, &mut grads, *input, || {
                                let mut delta = NdArray::zeros(log_probs.value.shape());
                                let classes = log_probs.value.shape()[1];
                                for (row, &label) in labels.iter().enumerate() {
                                    delta.data_mut()[row * classes + label] = -scale;
                                }
                                Ok(delta)
                            })?;
                        }
                    }
                }
            }
        }
    }

    let mut nodes = tape.nodes.borrow_mut();
    for (i, g) in leaf_updates {
        match nodes[i].grad.as_mut() {
            Some(acc) => acc.add_assign(&g)?,
            None => nodes[i].grad = Some(g),
        }
    }
    Ok(())
}

/// Adds the delta produced by `delta` into `target`'s pending gradient.
/// The delta is only computed when the target tracks gradients.
fn send<F>(nodes: &[Node], grads: &mut [Option<NdArray>], target: NodeId, delta: F) -> Result<()>
where
    F: FnOnce() -> Result<NdArray>,
{
    if !nodes[target.0].requires_grad {
        return Ok(());
    }
    let delta = delta()?;
    match grads[target.0].as_mut() {
        Some(acc) => acc.add_assign(&delta),
        None => {
            grads[target.0] = Some(delta);
            Ok(())
        }
    }
}

/// `dx = g - softmax(x) · Σ_row g`, with `softmax(x) = exp(log_softmax(x))`.
fn log_softmax_backward(output: &NdArray, g: &NdArray) -> Result<NdArray> {
    let (rows, cols) = output.dims2("log_softmax")?;
    let mut delta = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        let row_sum: f64 = g.row(i).iter().sum();
        delta.extend(
            output
                .row(i)
                .iter()
                .zip(g.row(i))
                .map(|(y, g)| g - y.exp() * row_sum),
        );
    }
    NdArray::from_vec(delta, &[rows, cols])
}

fn fused_softmax_nll(log_probs: &NdArray, labels: &[usize], scale: f64) -> NdArray {
    let mut delta = log_probs.map(|y| y.exp() * scale);
    let classes = log_probs.shape()[1];
    for (row, &label) in labels.iter().enumerate() {
        delta.data_mut()[row * classes + label] -= scale;
    }
    delta
}
