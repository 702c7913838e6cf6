//! CUDA device vectors.

use cudarc::driver::safe::CudaSlice;

use crate::backend::DeviceBuffer;
use tbasis_util::basics::Scalar;

/// Scalar vector in CUDA device memory.
///
/// Empty vectors still own a one-element allocation so kernels always
/// receive a valid pointer.
pub struct CudaVector {
    pub(crate) data: CudaSlice<Scalar>,
    pub(crate) len: usize,
}

impl DeviceBuffer for CudaVector {
    fn len(&self) -> usize {
        self.len
    }
}
