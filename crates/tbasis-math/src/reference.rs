//! Host reference for the tensor-product basis actions.
//!
//! Evaluates INTERP, GRAD and WEIGHT with the same layouts as the device
//! kernels so device output can be checked entry by entry. Elements are
//! independent and split across the rayon pool.

use rayon::prelude::*;

use crate::layout::{BasisSpec, EvalMode, TransposeMode};
use crate::{check_len, MathError, Result, Scalar};

/// The 1D matrices of a basis, borrowed from host memory.
#[derive(Copy, Clone, Debug)]
pub struct HostMatrices<'a> {
    pub interp1d: &'a [Scalar],
    pub grad1d: &'a [Scalar],
    pub qweight1d: &'a [Scalar],
}

impl<'a> HostMatrices<'a> {
    pub fn validate(&self, spec: &BasisSpec) -> Result<()> {
        check_len("interp1d", spec.p * spec.q, self.interp1d.len())?;
        check_len("grad1d", spec.p * spec.q, self.grad1d.len())?;
        check_len("qweight1d", spec.q, self.qweight1d.len())
    }
}

/// Applies one 1D operator along `axis` of a tensor stored x-fastest.
///
/// `op` is `Q×P` row-major. Forward maps `P -> Q` points on that axis;
/// transpose maps `Q -> P`.
fn contract_axis(
    input: &[Scalar],
    dims: [usize; 3],
    axis: usize,
    op: &[Scalar],
    p: usize,
    q: usize,
    transpose: bool,
) -> (Vec<Scalar>, [usize; 3]) {
    let (n_in, n_out) = if transpose { (q, p) } else { (p, q) };
    debug_assert_eq!(dims[axis], n_in);
    let mut out_dims = dims;
    out_dims[axis] = n_out;

    let stride = dims[..axis].iter().product::<usize>();
    let outer = dims[axis + 1..].iter().product::<usize>();
    let mut out = vec![0.0; out_dims.iter().product()];
    for o in 0..outer {
        for j in 0..n_out {
            for s in 0..stride {
                let mut acc = 0.0;
                for i in 0..n_in {
                    let coeff = if transpose { op[j + i * p] } else { op[i + j * p] };
                    acc += coeff * input[s + stride * (i + n_in * o)];
                }
                out[s + stride * (j + n_out * o)] = acc;
            }
        }
    }
    (out, out_dims)
}

/// One separable pass: `op_for(axis)` chooses the matrix for each axis.
fn tensor_apply<'m>(
    spec: &BasisSpec,
    input: &[Scalar],
    transpose: bool,
    op_for: impl Fn(usize) -> &'m [Scalar],
) -> Vec<Scalar> {
    let n = if transpose { spec.q } else { spec.p };
    let mut dims = [1usize; 3];
    dims[..spec.dim].fill(n);
    let mut data = input.to_vec();
    for axis in 0..spec.dim {
        let (next, next_dims) =
            contract_axis(&data, dims, axis, op_for(axis), spec.p, spec.q, transpose);
        data = next;
        dims = next_dims;
    }
    data
}

/// Host evaluation of `v = op(u)` over `nelem` elements.
///
/// `u` is ignored for WEIGHT. Transpose mode overwrites `v`; the result
/// equals zero-filling `v` and accumulating every gradient direction.
pub fn apply(
    spec: &BasisSpec,
    mats: &HostMatrices<'_>,
    mode: EvalMode,
    tmode: TransposeMode,
    nelem: usize,
    u: &[Scalar],
    v: &mut [Scalar],
) -> Result<()> {
    spec.validate()?;
    mats.validate(spec)?;
    let (in_len, out_len) = spec.field_lens(mode, tmode, nelem)?;
    if mode != EvalMode::Weight {
        check_len("input field", in_len, u.len())?;
    }
    check_len("output field", out_len, v.len())?;

    let nodes = spec.elem_size();
    let qpts = spec.num_qpts();
    let slots = spec.ncomp * nelem;
    let transpose = tmode.is_transpose();

    match mode {
        EvalMode::Weight => {
            let w = weights(spec, mats.qweight1d);
            v.par_chunks_mut(qpts).for_each(|dst| dst.copy_from_slice(&w));
        }
        EvalMode::Interp => {
            let (chunk_in, chunk_out) = if transpose { (qpts, nodes) } else { (nodes, qpts) };
            v.par_chunks_mut(chunk_out).enumerate().for_each(|(slot, dst)| {
                let src = &u[slot * chunk_in..(slot + 1) * chunk_in];
                dst.copy_from_slice(&tensor_apply(spec, src, transpose, |_| mats.interp1d));
            });
        }
        EvalMode::Grad if !transpose => {
            // Output chunk index runs over [dir][comp][elem].
            v.par_chunks_mut(qpts).enumerate().for_each(|(idx, dst)| {
                let dir = idx / slots;
                let slot = idx % slots;
                let src = &u[slot * nodes..(slot + 1) * nodes];
                let out = tensor_apply(spec, src, false, |axis| {
                    if axis == dir {
                        mats.grad1d
                    } else {
                        mats.interp1d
                    }
                });
                dst.copy_from_slice(&out);
            });
        }
        EvalMode::Grad => {
            v.par_chunks_mut(nodes).enumerate().for_each(|(slot, dst)| {
                dst.fill(0.0);
                for dir in 0..spec.dim {
                    let base = (dir * slots + slot) * qpts;
                    let out = tensor_apply(spec, &u[base..base + qpts], true, |axis| {
                        if axis == dir {
                            mats.grad1d
                        } else {
                            mats.interp1d
                        }
                    });
                    for (d, o) in dst.iter_mut().zip(out) {
                        *d += o;
                    }
                }
            });
        }
        EvalMode::Div | EvalMode::Curl | EvalMode::None => {
            return Err(MathError::UnsupportedMode(mode));
        }
    }
    Ok(())
}

/// Tensor-product quadrature weights of one element, x fastest.
pub fn weights(spec: &BasisSpec, qweight1d: &[Scalar]) -> Vec<Scalar> {
    let q = spec.q;
    (0..spec.num_qpts())
        .map(|idx| {
            let mut w = 1.0;
            let mut rest = idx;
            for _ in 0..spec.dim {
                w *= qweight1d[rest % q];
                rest /= q;
            }
            w
        })
        .collect()
}
