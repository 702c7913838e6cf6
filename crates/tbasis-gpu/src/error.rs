//! Errors returned by basis construction and application.

use tbasis_math::{EvalMode, MathError};

#[derive(Debug, thiserror::Error)]
pub enum BasisError {
    #[error("evaluation mode {0} is not supported by tensor bases")]
    UnsupportedMode(EvalMode),

    #[error("evaluation mode none cannot be applied")]
    MisuseNone,

    #[error("{what}: expected {expected} entries, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} needs an input vector")]
    MissingInput(EvalMode),

    #[error("invalid basis: {0}")]
    InvalidSpec(String),

    #[error("launch exceeds device limits: {0}")]
    LaunchLimit(String),

    #[error("device allocation failed: {0}")]
    DeviceAlloc(String),

    #[error("device copy failed: {0}")]
    DeviceCopy(String),

    #[error("kernel launch failed: {0}")]
    DeviceLaunch(String),

    #[error("module load failed: {0}")]
    ModuleLoad(String),

    #[error("device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, BasisError>;

impl BasisError {
    /// Non-zero status code for callers that report plain integers.
    /// Success is `0` and never produced here.
    pub fn status_code(&self) -> i32 {
        match self {
            BasisError::UnsupportedMode(_) => 1,
            BasisError::MisuseNone => 2,
            BasisError::ShapeMismatch { .. } => 3,
            BasisError::MissingInput(_) => 4,
            BasisError::InvalidSpec(_) => 5,
            BasisError::LaunchLimit(_) => 6,
            BasisError::DeviceAlloc(_) => 7,
            BasisError::DeviceCopy(_) => 8,
            BasisError::DeviceLaunch(_) => 9,
            BasisError::ModuleLoad(_) => 10,
            BasisError::Device(_) => 11,
        }
    }
}

impl From<MathError> for BasisError {
    fn from(e: MathError) -> Self {
        match e {
            MathError::ShapeMismatch {
                what,
                expected,
                actual,
            } => BasisError::ShapeMismatch {
                what,
                expected,
                actual,
            },
            MathError::UnsupportedMode(EvalMode::None) => BasisError::MisuseNone,
            MathError::UnsupportedMode(mode) => BasisError::UnsupportedMode(mode),
            overflow @ MathError::TooManyElements(_) => BasisError::LaunchLimit(overflow.to_string()),
            other => BasisError::InvalidSpec(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_and_nonzero() {
        let errors = [
            BasisError::UnsupportedMode(EvalMode::Div),
            BasisError::MisuseNone,
            BasisError::ShapeMismatch {
                what: "v",
                expected: 1,
                actual: 2,
            },
            BasisError::MissingInput(EvalMode::Interp),
            BasisError::InvalidSpec(String::new()),
            BasisError::LaunchLimit(String::new()),
            BasisError::DeviceAlloc(String::new()),
            BasisError::DeviceCopy(String::new()),
            BasisError::DeviceLaunch(String::new()),
            BasisError::ModuleLoad(String::new()),
            BasisError::Device(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(BasisError::status_code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn math_errors_map_onto_basis_errors() {
        let e: BasisError = MathError::UnsupportedMode(EvalMode::None).into();
        assert!(matches!(e, BasisError::MisuseNone));
        let e: BasisError = MathError::Singular("x".into()).into();
        assert!(matches!(e, BasisError::InvalidSpec(_)));
        let e: BasisError = MathError::TooManyElements(7).into();
        assert!(matches!(e, BasisError::LaunchLimit(_)));
        let e: BasisError = MathError::ShapeMismatch {
            what: "interp1d",
            expected: 4,
            actual: 3,
        }
        .into();
        assert_eq!(e.to_string(), "interp1d: expected 4 entries, got 3");
    }
}
