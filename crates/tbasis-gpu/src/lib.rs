//! Tensor-product basis actions on GPU devices.
//!
//! A [`TensorBasis`] owns the 1D basis matrices in device memory and a
//! device module specialized for its `(dim, P, Q, ncomp)` shape. Its single
//! entry point, [`TensorBasis::apply`], enqueues INTERP, GRAD or WEIGHT
//! (optionally transposed) over a batch of elements.
//!
//! Devices are reached through the [`backend::Platform`] trait. The CUDA
//! implementation lives behind the `cuda` feature.

pub mod backend;
pub mod basis;
pub mod error;
pub mod params;
pub mod planner;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use backend::{DeviceBuffer, DeviceCaps, KernelArgs, LaunchDims, Platform};
pub use basis::{DeviceMatrices, TensorBasis};
pub use error::{BasisError, Result};
pub use params::KernelParams;
pub use planner::{BlockSizes, LaunchPlan};

pub use tbasis_math::reference::HostMatrices;
pub use tbasis_math::{BasisSpec, EvalMode, TransposeMode};
