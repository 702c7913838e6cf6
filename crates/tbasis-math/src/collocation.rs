//! Collocated gradient: the `Q×Q` operator acting directly on values at
//! quadrature points.

use crate::{check_len, MathError, Result, Scalar};

const RANK_TOL: f64 = 1e-12;

/// Returns `C` (`Q×Q`, row-major) with `C · interp1d = grad1d`.
///
/// `interp1d` and `grad1d` are `Q×P` row-major. With `B = Q₁R` the thin QR
/// factorization of `interp1d`, `C = grad1d · R⁻¹ · Q₁ᵀ`, the minimum-norm
/// solution. Requires `Q >= P` and `interp1d` of full column rank.
pub fn collocated_grad(
    p: usize,
    q: usize,
    interp1d: &[Scalar],
    grad1d: &[Scalar],
) -> Result<Vec<Scalar>> {
    check_len("interp1d", p * q, interp1d.len())?;
    check_len("grad1d", p * q, grad1d.len())?;
    if q < p {
        return Err(MathError::InvalidSpec(format!(
            "collocated gradient needs Q >= P, got P={p} Q={q}"
        )));
    }

    // Modified Gram-Schmidt on the P columns of interp1d.
    let mut basis = vec![0.0; p * q]; // column j stored at [j * q..(j + 1) * q]
    let mut r = vec![0.0; p * p]; // upper triangular, r[k * p + j]
    for j in 0..p {
        let mut col: Vec<f64> = (0..q).map(|i| interp1d[i * p + j]).collect();
        for k in 0..j {
            let qk = &basis[k * q..(k + 1) * q];
            let dot: f64 = qk.iter().zip(&col).map(|(a, b)| a * b).sum();
            r[k * p + j] = dot;
            for (c, a) in col.iter_mut().zip(qk) {
                *c -= dot * a;
            }
        }
        let norm = col.iter().map(|c| c * c).sum::<f64>().sqrt();
        if norm < RANK_TOL {
            return Err(MathError::Singular(format!(
                "interp1d column {j} is linearly dependent"
            )));
        }
        r[j * p + j] = norm;
        for (dst, c) in basis[j * q..(j + 1) * q].iter_mut().zip(&col) {
            *dst = c / norm;
        }
    }

    // X R = grad1d, one row at a time by forward substitution.
    let mut x = vec![0.0; q * p];
    for i in 0..q {
        for j in 0..p {
            let mut acc = grad1d[i * p + j];
            for k in 0..j {
                acc -= x[i * p + k] * r[k * p + j];
            }
            x[i * p + j] = acc / r[j * p + j];
        }
    }

    let mut colo = vec![0.0; q * q];
    for i in 0..q {
        for l in 0..q {
            colo[i * q + l] = (0..p).map(|j| x[i * p + j] * basis[j * q + l]).sum();
        }
    }
    Ok(colo)
}
