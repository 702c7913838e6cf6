//! Basis shape, evaluation modes and the field layouts both the device
//! kernels and the host reference agree on.
//!
//! Nodal fields are `[comp][elem][x][y?][z?]` with `P` points per axis.
//! Quadrature fields are `[comp][elem][qx][qy?][qz?]` with `Q` points per
//! axis; gradients add an outermost axis of length `dim`; weights drop the
//! component axis. There is no padding anywhere.

use core::fmt;

use tbasis_util::basics::int_pow;

use crate::{MathError, Result};

/// Evaluation modes with their stable integer identifiers.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EvalMode {
    Interp = 0,
    Grad = 1,
    Weight = 2,
    Div = 3,
    Curl = 4,
    None = 5,
}

impl EvalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EvalMode::Interp => "interp",
            EvalMode::Grad => "grad",
            EvalMode::Weight => "weight",
            EvalMode::Div => "div",
            EvalMode::Curl => "curl",
            EvalMode::None => "none",
        }
    }
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl TryFrom<i32> for EvalMode {
    type Error = i32;

    fn try_from(id: i32) -> core::result::Result<Self, i32> {
        Ok(match id {
            0 => EvalMode::Interp,
            1 => EvalMode::Grad,
            2 => EvalMode::Weight,
            3 => EvalMode::Div,
            4 => EvalMode::Curl,
            5 => EvalMode::None,
            other => return Err(other),
        })
    }
}

impl core::str::FromStr for EvalMode {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "interp" => Ok(EvalMode::Interp),
            "grad" => Ok(EvalMode::Grad),
            "weight" => Ok(EvalMode::Weight),
            "div" => Ok(EvalMode::Div),
            "curl" => Ok(EvalMode::Curl),
            "none" => Ok(EvalMode::None),
            other => Err(format!("unknown evaluation mode {other:?}")),
        }
    }
}

#[repr(i32)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TransposeMode {
    #[default]
    NoTranspose = 0,
    Transpose = 1,
}

impl TransposeMode {
    pub fn is_transpose(self) -> bool {
        self == TransposeMode::Transpose
    }

    /// Value passed to the kernels' `transpose` argument.
    pub fn as_flag(self) -> i32 {
        self as i32
    }
}

impl From<bool> for TransposeMode {
    fn from(transpose: bool) -> Self {
        if transpose {
            TransposeMode::Transpose
        } else {
            TransposeMode::NoTranspose
        }
    }
}

impl TryFrom<i32> for TransposeMode {
    type Error = i32;

    fn try_from(id: i32) -> core::result::Result<Self, i32> {
        match id {
            0 => Ok(TransposeMode::NoTranspose),
            1 => Ok(TransposeMode::Transpose),
            other => Err(other),
        }
    }
}

/// Shape of a tensor-product basis: dimension, nodes and quadrature points
/// per edge, and field components.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BasisSpec {
    pub dim: usize,
    pub p: usize,
    pub q: usize,
    pub ncomp: usize,
}

impl BasisSpec {
    pub fn new(dim: usize, p: usize, q: usize, ncomp: usize) -> Result<Self> {
        let spec = Self { dim, p, q, ncomp };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.dim) {
            return Err(MathError::InvalidSpec(format!(
                "dim must be 1, 2 or 3, got {}",
                self.dim
            )));
        }
        if self.p == 0 || self.q == 0 || self.ncomp == 0 {
            return Err(MathError::InvalidSpec(format!(
                "P, Q and ncomp must be positive, got P={} Q={} ncomp={}",
                self.p, self.q, self.ncomp
            )));
        }
        Ok(())
    }

    /// Thread-plane extent `T = max(P, Q)`.
    pub fn t1d(&self) -> usize {
        self.p.max(self.q)
    }

    /// Nodes per element, `P^dim`.
    pub fn elem_size(&self) -> usize {
        int_pow(self.p, self.dim)
    }

    /// Quadrature points per element, `Q^dim`.
    pub fn num_qpts(&self) -> usize {
        int_pow(self.q, self.dim)
    }

    /// `(input_len, output_len)` of an application over `nelem` elements.
    ///
    /// WEIGHT reads no input, so its input length is zero. Modes the engine
    /// does not evaluate are `UnsupportedMode`; lengths that do not fit in
    /// `usize` are `TooManyElements`.
    pub fn field_lens(
        &self,
        mode: EvalMode,
        tmode: TransposeMode,
        nelem: usize,
    ) -> Result<(usize, usize)> {
        let len = |factors: &[usize]| {
            factors
                .iter()
                .try_fold(nelem, |acc, &f| acc.checked_mul(f))
                .ok_or(MathError::TooManyElements(nelem))
        };
        let (nodal_side, quad_side) = match mode {
            EvalMode::Interp => (
                len(&[self.ncomp, self.elem_size()])?,
                len(&[self.ncomp, self.num_qpts()])?,
            ),
            EvalMode::Grad => (
                len(&[self.ncomp, self.elem_size()])?,
                len(&[self.dim, self.ncomp, self.num_qpts()])?,
            ),
            EvalMode::Weight => return Ok((0, len(&[self.num_qpts()])?)),
            EvalMode::Div | EvalMode::Curl | EvalMode::None => {
                return Err(MathError::UnsupportedMode(mode))
            }
        };
        Ok(if tmode.is_transpose() {
            (quad_side, nodal_side)
        } else {
            (nodal_side, quad_side)
        })
    }
}

impl fmt::Display for BasisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dim={} P={} Q={} ncomp={}",
            self.dim, self.p, self.q, self.ncomp
        )
    }
}
