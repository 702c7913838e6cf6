//! CUDA platform using cudarc and runtime compilation via NVRTC.

mod buffers;
mod kernels;
mod platform;

pub use buffers::CudaVector;
pub use platform::CudaPlatform;
