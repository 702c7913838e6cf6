//! [`Platform`] implementation for one CUDA device and its default stream.

use std::sync::Arc;

use cudarc::driver::result;
use cudarc::driver::safe::{CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, LaunchConfig};
use cudarc::driver::sys::CUdevice_attribute_enum;
use cudarc::driver::PushKernelArg;

use super::buffers::CudaVector;
use super::kernels::{compile_module, load_kernel};
use crate::backend::{DeviceBuffer, DeviceCaps, KernelArgs, LaunchDims, Platform};
use crate::error::{BasisError, Result};
use tbasis_util::basics::Scalar;

pub struct CudaPlatform {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    caps: DeviceCaps,
}

impl CudaPlatform {
    /// Create a platform on the given device ordinal (0-indexed).
    pub fn new(device_ordinal: usize) -> Result<Self> {
        let ctx = CudaContext::new(device_ordinal)
            .map_err(|e| BasisError::Device(format!("CudaContext::new: {e}")))?;
        let stream = ctx.default_stream();

        let name = ctx
            .name()
            .map_err(|e| BasisError::Device(format!("device name: {e}")))?;
        let (compute_major, compute_minor) = ctx
            .compute_capability()
            .map_err(|e| BasisError::Device(format!("compute_capability: {e}")))?;
        let (free_memory, total_memory) = result::mem_get_info()
            .map_err(|e| BasisError::Device(format!("cuMemGetInfo: {e}")))?;
        let attribute = |attr: CUdevice_attribute_enum, what: &str| -> Result<u32> {
            ctx.attribute(attr)
                .map(|v| v.max(0) as u32)
                .map_err(|e| BasisError::Device(format!("{what}: {e}")))
        };
        let max_threads_per_block = attribute(
            CUdevice_attribute_enum::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK,
            "max threads per block",
        )?;
        let max_shared_mem_per_block = attribute(
            CUdevice_attribute_enum::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK,
            "max shared memory per block",
        )?;

        let caps = DeviceCaps {
            name,
            compute_major: compute_major as u32,
            compute_minor: compute_minor as u32,
            total_memory,
            free_memory,
            max_threads_per_block,
            max_shared_mem_per_block,
        };
        tracing::info!(
            device = %caps.name,
            compute = %format_args!("{}.{}", caps.compute_major, caps.compute_minor),
            total_mib = caps.total_memory >> 20,
            max_threads_per_block,
            max_shared_mem_per_block,
            "CUDA platform ready"
        );

        Ok(Self { ctx, stream, caps })
    }

    pub fn context(&self) -> &Arc<CudaContext> {
        &self.ctx
    }
}

fn launch_config(dims: LaunchDims) -> LaunchConfig {
    LaunchConfig {
        grid_dim: dims.grid.as_tuple(),
        block_dim: dims.block.as_tuple(),
        shared_mem_bytes: dims.shared_mem_bytes,
    }
}

impl Platform for CudaPlatform {
    type Buf = CudaVector;
    type Module = Arc<CudaModule>;
    type Kernel = CudaFunction;

    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn alloc(&self, len: usize) -> Result<CudaVector> {
        let data: CudaSlice<Scalar> = self
            .stream
            .alloc_zeros(len.max(1))
            .map_err(|e| {
                BasisError::DeviceAlloc(format!(
                    "{} bytes ({} free): {e}",
                    len * std::mem::size_of::<Scalar>(),
                    self.caps.free_memory
                ))
            })?;
        Ok(CudaVector { data, len })
    }

    fn upload(&self, src: &[Scalar], dst: &mut CudaVector) -> Result<()> {
        if src.len() != dst.len {
            return Err(BasisError::DeviceCopy(format!(
                "upload size mismatch: src={}, dst={}",
                src.len(),
                dst.len
            )));
        }
        if src.is_empty() {
            return Ok(());
        }
        self.stream
            .memcpy_htod(src, &mut dst.data)
            .map_err(|e| BasisError::DeviceCopy(format!("upload: {e}")))
    }

    fn download(&self, src: &CudaVector, dst: &mut [Scalar]) -> Result<()> {
        if src.len != dst.len() {
            return Err(BasisError::DeviceCopy(format!(
                "download size mismatch: src={}, dst={}",
                src.len,
                dst.len()
            )));
        }
        if dst.is_empty() {
            return Ok(());
        }
        self.stream
            .memcpy_dtoh(&src.data, dst)
            .map_err(|e| BasisError::DeviceCopy(format!("download: {e}")))
    }

    fn zero(&self, buf: &mut CudaVector) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.stream
            .memset_zeros(&mut buf.data)
            .map_err(|e| BasisError::DeviceCopy(format!("memset: {e}")))
    }

    fn compile(&self, template: &str, defines: &[(&'static str, usize)]) -> Result<Arc<CudaModule>> {
        compile_module(&self.ctx, template, defines)
    }

    fn get_kernel(&self, module: &Arc<CudaModule>, name: &str) -> Result<CudaFunction> {
        load_kernel(module, name)
    }

    fn launch(
        &self,
        kernel: &CudaFunction,
        dims: LaunchDims,
        args: KernelArgs<'_, CudaVector>,
    ) -> Result<()> {
        let name = args.kernel_name();
        let cfg = launch_config(dims);
        let launched = match args {
            KernelArgs::Interp {
                nelem,
                transpose,
                interp1d,
                u,
                v,
            } => {
                let mut builder = self.stream.launch_builder(kernel);
                builder
                    .arg(&nelem)
                    .arg(&transpose)
                    .arg(&interp1d.data)
                    .arg(&u.data)
                    .arg(&mut v.data);
                // SAFETY: argument order and types match `interp` in
                // tensor_basis.cu; every buffer holds at least the number of
                // scalars the kernel indexes for `nelem` elements.
                unsafe { builder.launch(cfg) }
            }
            KernelArgs::Grad {
                nelem,
                transpose,
                interp1d,
                grad1d,
                u,
                v,
            } => {
                let mut builder = self.stream.launch_builder(kernel);
                builder
                    .arg(&nelem)
                    .arg(&transpose)
                    .arg(&interp1d.data)
                    .arg(&grad1d.data)
                    .arg(&u.data)
                    .arg(&mut v.data);
                // SAFETY: as above, for `grad`.
                unsafe { builder.launch(cfg) }
            }
            KernelArgs::Weight { nelem, qweight1d, v } => {
                let mut builder = self.stream.launch_builder(kernel);
                builder.arg(&nelem).arg(&qweight1d.data).arg(&mut v.data);
                // SAFETY: as above, for `weight`.
                unsafe { builder.launch(cfg) }
            }
        };
        launched
            .map(|_| ())
            .map_err(|e| BasisError::DeviceLaunch(format!("{name}: {e}")))
    }

    fn synchronize(&self) -> Result<()> {
        self.stream
            .synchronize()
            .map_err(|e| BasisError::Device(format!("synchronize: {e}")))
    }
}
