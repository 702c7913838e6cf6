//! Lagrange interpolation and derivative matrices, and the H1 Lagrange
//! basis built from them.

use crate::layout::BasisSpec;
use crate::quadrature::{gauss_lobatto_quadrature, gauss_quadrature};
use crate::{MathError, Result, Scalar};

/// Quadrature rule used for the points a basis is evaluated at.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum QuadMode {
    Gauss,
    #[default]
    GaussLobatto,
}

impl core::str::FromStr for QuadMode {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "gauss" => Ok(QuadMode::Gauss),
            "gauss-lobatto" | "lobatto" | "gll" => Ok(QuadMode::GaussLobatto),
            other => Err(format!("unknown quadrature {other:?}")),
        }
    }
}

/// Interpolation and derivative matrices of the Lagrange polynomials on
/// `nodes`, evaluated at `qref`.
///
/// Both matrices are `Q×P` row-major: entry `[q * P + p]` is basis function
/// `p` (or its derivative) at point `q`.
pub fn lagrange_matrices(nodes: &[Scalar], qref: &[Scalar]) -> Result<(Vec<Scalar>, Vec<Scalar>)> {
    let p = nodes.len();
    if p == 0 {
        return Err(MathError::InvalidSpec("Lagrange basis needs at least one node".into()));
    }
    for i in 0..p {
        for j in i + 1..p {
            if nodes[i] == nodes[j] {
                return Err(MathError::Singular(format!(
                    "coincident Lagrange nodes {i} and {j} at {}",
                    nodes[i]
                )));
            }
        }
    }

    let mut interp = vec![0.0; qref.len() * p];
    let mut grad = vec![0.0; qref.len() * p];
    for (iq, &x) in qref.iter().enumerate() {
        for j in 0..p {
            let mut value = 1.0;
            let mut deriv = 0.0;
            for m in 0..p {
                if m == j {
                    continue;
                }
                let denom = nodes[j] - nodes[m];
                // Product rule: d/dx of prod_k (x - x_k)/(x_j - x_k).
                deriv = deriv * (x - nodes[m]) / denom + value / denom;
                value *= (x - nodes[m]) / denom;
            }
            interp[iq * p + j] = value;
            grad[iq * p + j] = deriv;
        }
    }
    Ok((interp, grad))
}

/// A tensor-product H1 Lagrange basis: Gauss–Lobatto nodes, a quadrature
/// rule and the 1D matrices that connect them.
#[derive(Clone, Debug)]
pub struct H1LagrangeBasis {
    pub dim: usize,
    pub p: usize,
    pub q: usize,
    pub nodes: Vec<Scalar>,
    pub qref1d: Vec<Scalar>,
    pub qweight1d: Vec<Scalar>,
    pub interp1d: Vec<Scalar>,
    pub grad1d: Vec<Scalar>,
}

impl H1LagrangeBasis {
    /// Builds the basis. `P = 1` uses the single midpoint node, giving a
    /// constant basis function.
    pub fn new(dim: usize, p: usize, q: usize, quad: QuadMode) -> Result<Self> {
        BasisSpec::new(dim, p, q, 1)?;
        let nodes = if p == 1 {
            vec![0.0]
        } else {
            gauss_lobatto_quadrature(p)?.0
        };
        let (qref1d, qweight1d) = match quad {
            QuadMode::Gauss => gauss_quadrature(q)?,
            QuadMode::GaussLobatto => gauss_lobatto_quadrature(q)?,
        };
        let (interp1d, grad1d) = lagrange_matrices(&nodes, &qref1d)?;
        Ok(Self {
            dim,
            p,
            q,
            nodes,
            qref1d,
            qweight1d,
            interp1d,
            grad1d,
        })
    }

    pub fn spec(&self, ncomp: usize) -> Result<BasisSpec> {
        BasisSpec::new(self.dim, self.p, self.q, ncomp)
    }
}
