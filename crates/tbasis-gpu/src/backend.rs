//! Platform trait and the launch types shared by every device backend.

use tbasis_util::basics::{Extents3D, Scalar};

use crate::error::Result;

/// Device capability information, queried when the platform is created.
#[derive(Debug, Clone)]
pub struct DeviceCaps {
    pub name: String,
    /// Compute capability major version.
    pub compute_major: u32,
    pub compute_minor: u32,
    /// Total device memory in bytes.
    pub total_memory: usize,
    /// Free device memory in bytes (snapshot at query time).
    pub free_memory: usize,
    pub max_threads_per_block: u32,
    /// Static plus dynamic shared memory available to one block, in bytes.
    pub max_shared_mem_per_block: u32,
}

/// A scalar vector in device memory. Length is in scalars, not bytes.
pub trait DeviceBuffer: Send + Sync {
    fn len(&self) -> usize;

    fn size_bytes(&self) -> usize {
        self.len() * std::mem::size_of::<Scalar>()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grid, block and dynamic shared memory of one kernel launch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchDims {
    pub grid: Extents3D,
    pub block: Extents3D,
    pub shared_mem_bytes: u32,
}

/// Arguments of the three basis kernels, in device parameter order.
///
/// Buffers are borrowed for the duration of the launch call only; the
/// platform must not keep them past its return.
pub enum KernelArgs<'a, B> {
    Interp {
        nelem: i32,
        transpose: i32,
        interp1d: &'a B,
        u: &'a B,
        v: &'a mut B,
    },
    Grad {
        nelem: i32,
        transpose: i32,
        interp1d: &'a B,
        grad1d: &'a B,
        u: &'a B,
        v: &'a mut B,
    },
    Weight {
        nelem: i32,
        qweight1d: &'a B,
        v: &'a mut B,
    },
}

impl<B> KernelArgs<'_, B> {
    /// Entry point name inside the compiled module.
    pub fn kernel_name(&self) -> &'static str {
        match self {
            KernelArgs::Interp { .. } => "interp",
            KernelArgs::Grad { .. } => "grad",
            KernelArgs::Weight { .. } => "weight",
        }
    }
}

/// A device the basis kernels can run on.
///
/// Associated types keep buffers, modules and kernels concrete so basis
/// application is monomorphized per platform. Buffers free their memory and
/// modules unload themselves when dropped.
///
/// # Execution model
///
/// Work is enqueued on a single in-order stream. `launch` and `zero` return
/// once the work is enqueued; `download` and `synchronize` block.
pub trait Platform: Send + Sync + Sized {
    type Buf: DeviceBuffer;
    type Module: Send + Sync;
    type Kernel: Send + Sync;

    fn caps(&self) -> &DeviceCaps;

    /// Allocate a zero-initialized buffer of `len` scalars.
    fn alloc(&self, len: usize) -> Result<Self::Buf>;

    /// Copy host data into a device buffer of the same length.
    fn upload(&self, src: &[Scalar], dst: &mut Self::Buf) -> Result<()>;

    /// Copy a device buffer into host memory of the same length.
    fn download(&self, src: &Self::Buf, dst: &mut [Scalar]) -> Result<()>;

    /// Zero-fill a buffer end to end.
    fn zero(&self, buf: &mut Self::Buf) -> Result<()>;

    /// Compile a device-code template specialized by `defines`.
    fn compile(&self, template: &str, defines: &[(&'static str, usize)]) -> Result<Self::Module>;

    fn get_kernel(&self, module: &Self::Module, name: &str) -> Result<Self::Kernel>;

    fn launch(
        &self,
        kernel: &Self::Kernel,
        dims: LaunchDims,
        args: KernelArgs<'_, Self::Buf>,
    ) -> Result<()>;

    /// Block until all enqueued work has completed.
    fn synchronize(&self) -> Result<()>;

    /// Allocate a buffer holding a copy of `src`.
    fn alloc_from(&self, src: &[Scalar]) -> Result<Self::Buf> {
        let mut buf = self.alloc(src.len())?;
        self.upload(src, &mut buf)?;
        Ok(buf)
    }
}
