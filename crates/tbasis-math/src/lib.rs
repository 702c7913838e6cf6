//! Host numerics for tensor-product bases.
//!
//! Quadrature rules and Lagrange matrices feed basis construction, the
//! collocated gradient is prepared for 3D bases, and [`reference`] evaluates
//! the same operators as the device kernels for parity checks.

pub mod collocation;
pub mod lagrange;
pub mod layout;
pub mod quadrature;
pub mod reference;

pub use collocation::collocated_grad;
pub use lagrange::{lagrange_matrices, H1LagrangeBasis, QuadMode};
pub use layout::{BasisSpec, EvalMode, TransposeMode};
pub use quadrature::{gauss_lobatto_quadrature, gauss_quadrature};

pub use tbasis_util::basics::Scalar;

#[derive(Debug, thiserror::Error)]
pub enum MathError {
    #[error("invalid basis: {0}")]
    InvalidSpec(String),

    #[error("{what}: expected {expected} entries, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("evaluation mode {0} is not supported")]
    UnsupportedMode(EvalMode),

    #[error("{rule} quadrature needs at least {min} points, got {n}")]
    TooFewPoints {
        rule: &'static str,
        n: usize,
        min: usize,
    },

    #[error("singular matrix: {0}")]
    Singular(String),

    #[error("field lengths for {0} elements overflow usize")]
    TooManyElements(usize),
}

pub type Result<T> = std::result::Result<T, MathError>;

/// Length check shared by every entry point that takes caller buffers.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MathError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
