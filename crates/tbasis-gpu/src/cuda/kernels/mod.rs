//! Runtime compilation of the basis template.
//!
//! The template is embedded with `include_str!` (see `params`) and compiled
//! to PTX per basis with its shape defines prepended, so the generated PTX
//! always matches the driver on the host machine.

use std::sync::Arc;
use std::time::Instant;

use cudarc::driver::safe::{CudaContext, CudaFunction, CudaModule};
use cudarc::nvrtc::safe::compile_ptx;

use crate::error::{BasisError, Result};
use crate::params::render_source;

pub(crate) fn compile_module(
    ctx: &Arc<CudaContext>,
    template: &str,
    defines: &[(&'static str, usize)],
) -> Result<Arc<CudaModule>> {
    let src = render_source(template, defines);
    let start = Instant::now();
    let ptx = compile_ptx(src).map_err(|e| BasisError::ModuleLoad(format!("nvrtc compile: {e}")))?;
    let module = ctx
        .load_module(ptx)
        .map_err(|e| BasisError::ModuleLoad(format!("load_module: {e}")))?;
    tracing::debug!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
        "compiled basis module"
    );
    Ok(module)
}

pub(crate) fn load_kernel(module: &Arc<CudaModule>, name: &str) -> Result<CudaFunction> {
    module
        .load_function(name)
        .map_err(|e| BasisError::ModuleLoad(format!("load_function({name}): {e}")))
}
