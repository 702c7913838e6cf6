//! Gauss and Gauss–Lobatto rules on the reference interval `[-1, 1]`.
//!
//! Nodes come back in ascending order. Both rules locate their nodes by
//! Newton iteration on Legendre polynomials starting from Chebyshev guesses.

use core::f64::consts::PI;

use crate::{MathError, Result, Scalar};

const NEWTON_TOL: f64 = 1e-15;
const NEWTON_MAX_ITERS: usize = 100;

/// `(P_n(x), P_{n-1}(x))` by the three-term recurrence, `n >= 1`.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut prev = 1.0;
    let mut cur = x;
    for k in 1..n {
        let k = k as f64;
        let next = ((2.0 * k + 1.0) * x * cur - k * prev) / (k + 1.0);
        prev = cur;
        cur = next;
    }
    (cur, prev)
}

/// `P_n'(x)` for interior `x`.
fn legendre_deriv(n: usize, x: f64) -> f64 {
    let (pn, pn1) = legendre(n, x);
    n as f64 * (x * pn - pn1) / (x * x - 1.0)
}

/// `n`-point Gauss–Legendre rule, exact for polynomials of degree `2n - 1`.
pub fn gauss_quadrature(n: usize) -> Result<(Vec<Scalar>, Vec<Scalar>)> {
    if n < 1 {
        return Err(MathError::TooFewPoints {
            rule: "Gauss",
            n,
            min: 1,
        });
    }
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..n {
        let mut x = -(PI * (i as f64 + 0.5) / n as f64).cos();
        for _ in 0..NEWTON_MAX_ITERS {
            let (pn, _) = legendre(n, x);
            let dx = pn / legendre_deriv(n, x);
            x -= dx;
            if dx.abs() < NEWTON_TOL {
                break;
            }
        }
        let dp = legendre_deriv(n, x);
        nodes[i] = x;
        weights[i] = 2.0 / ((1.0 - x * x) * dp * dp);
    }
    Ok((nodes, weights))
}

/// `n`-point Gauss–Lobatto rule (endpoints included), exact for degree
/// `2n - 3`.
pub fn gauss_lobatto_quadrature(n: usize) -> Result<(Vec<Scalar>, Vec<Scalar>)> {
    if n < 2 {
        return Err(MathError::TooFewPoints {
            rule: "Gauss-Lobatto",
            n,
            min: 2,
        });
    }
    let m = n - 1;
    let mf = m as f64;
    let end_weight = 2.0 / (mf * (mf + 1.0));

    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    nodes[0] = -1.0;
    nodes[m] = 1.0;
    weights[0] = end_weight;
    weights[m] = end_weight;

    // Interior nodes are the roots of P_m'.
    for i in 1..m {
        let mut x = -(PI * i as f64 / mf).cos();
        for _ in 0..NEWTON_MAX_ITERS {
            let (pm, _) = legendre(m, x);
            let f = legendre_deriv(m, x);
            let df = (2.0 * x * f - mf * (mf + 1.0) * pm) / (1.0 - x * x);
            let dx = f / df;
            x -= dx;
            if dx.abs() < NEWTON_TOL {
                break;
            }
        }
        let (pm, _) = legendre(m, x);
        nodes[i] = x;
        weights[i] = end_weight / (pm * pm);
    }
    Ok((nodes, weights))
}
