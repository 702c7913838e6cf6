//! The tensor-product basis object: device matrices, a specialized module
//! and its three kernels, plus the launch plans derived from the shape.

use std::sync::Arc;
use std::time::Instant;

use tbasis_math::reference::HostMatrices;
use tbasis_math::{collocated_grad, BasisSpec, EvalMode, H1LagrangeBasis, MathError, TransposeMode};

use crate::backend::{DeviceBuffer, KernelArgs, Platform};
use crate::error::{BasisError, Result};
use crate::params::{KernelParams, TENSOR_BASIS_TEMPLATE};
use crate::planner::{BlockSizes, LaunchPlan, LaunchPlans};

/// Basis matrices in device memory, immutable after construction.
pub struct DeviceMatrices<B> {
    pub interp1d: B,
    pub grad1d: B,
    pub qweight1d: B,
    /// `Q×Q` collocated gradient, present only for 3D bases with `Q >= P`
    /// whose `interp1d` has full column rank.
    /// Uploaded for tensor-contraction consumers; the basis kernels never
    /// read it.
    pub collograd1d: Option<B>,
}

struct Kernels<K> {
    interp: K,
    grad: K,
    weight: K,
}

/// A tensor-product basis bound to one platform.
///
/// `apply` only enqueues work; call [`Platform::synchronize`] or download
/// the output before reading results on the host. Applying the same basis
/// from several threads at once is supported only if the platform isolates
/// their streams.
pub struct TensorBasis<P: Platform> {
    spec: BasisSpec,
    params: KernelParams,
    plans: LaunchPlans,
    // Field order is drop order: kernels go before the module they live in.
    kernels: Kernels<P::Kernel>,
    module: P::Module,
    matrices: DeviceMatrices<P::Buf>,
    platform: Arc<P>,
}

impl<P: Platform> TensorBasis<P> {
    /// Uploads the host matrices, compiles the specialized module and
    /// resolves its kernels.
    ///
    /// `mats.interp1d` and `mats.grad1d` are `Q×P` row-major and
    /// `mats.qweight1d` has `Q` entries. Every planned launch is checked
    /// against the device limits here, so `apply` cannot hit them later.
    pub fn new(platform: Arc<P>, spec: BasisSpec, mats: &HostMatrices<'_>) -> Result<Self> {
        spec.validate()?;
        mats.validate(&spec)?;

        let blk = BlockSizes::compute(&spec);
        let plans = LaunchPlans::new(&spec, &blk)?;
        plans.check_limits(&blk, platform.caps())?;
        let params = KernelParams::new(&spec, blk);

        let collograd1d = if spec.dim == 3 && spec.q >= spec.p {
            match collocated_grad(spec.p, spec.q, mats.interp1d, mats.grad1d) {
                Ok(colo) => Some(platform.alloc_from(&colo)?),
                Err(MathError::Singular(reason)) => {
                    tracing::warn!(%spec, %reason, "no collocated gradient for this basis");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };
        let matrices = DeviceMatrices {
            interp1d: platform.alloc_from(mats.interp1d)?,
            grad1d: platform.alloc_from(mats.grad1d)?,
            qweight1d: platform.alloc_from(mats.qweight1d)?,
            collograd1d,
        };

        let start = Instant::now();
        let module = platform.compile(TENSOR_BASIS_TEMPLATE, &params.defines())?;
        let kernels = Kernels {
            interp: platform.get_kernel(&module, "interp")?,
            grad: platform.get_kernel(&module, "grad")?,
            weight: platform.get_kernel(&module, "weight")?,
        };
        tracing::info!(
            %spec,
            blk_interp = blk.interp,
            blk_grad = blk.grad,
            blk_weight = blk.weight,
            collocated = matrices.collograd1d.is_some(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "tensor basis ready"
        );

        Ok(Self {
            spec,
            params,
            plans,
            kernels,
            module,
            matrices,
            platform,
        })
    }

    /// Builds a basis from a Lagrange basis with `ncomp` field components.
    pub fn from_lagrange(platform: Arc<P>, basis: &H1LagrangeBasis, ncomp: usize) -> Result<Self> {
        let spec = basis.spec(ncomp)?;
        let mats = HostMatrices {
            interp1d: &basis.interp1d,
            grad1d: &basis.grad1d,
            qweight1d: &basis.qweight1d,
        };
        Self::new(platform, spec, &mats)
    }

    pub fn spec(&self) -> &BasisSpec {
        &self.spec
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn matrices(&self) -> &DeviceMatrices<P::Buf> {
        &self.matrices
    }

    pub fn module(&self) -> &P::Module {
        &self.module
    }

    /// Launch plan of a supported mode.
    pub fn plan(&self, mode: EvalMode) -> Result<&LaunchPlan> {
        check_mode(mode)?;
        self.plans
            .for_mode(mode)
            .ok_or(BasisError::UnsupportedMode(mode))
    }

    /// `(u_len, v_len)` expected by `apply`. WEIGHT takes no input.
    pub fn field_lens(&self, mode: EvalMode, tmode: TransposeMode, nelem: usize) -> Result<(usize, usize)> {
        check_mode(mode)?;
        Ok(self.spec.field_lens(mode, tmode, nelem)?)
    }

    /// Enqueues `v = op(u)` over `nelem` elements.
    ///
    /// In transpose mode `v` is zero-filled first, so it receives exactly
    /// the per-element contributions. `u` is ignored for WEIGHT. With
    /// `nelem == 0` nothing is launched.
    pub fn apply(
        &self,
        mode: EvalMode,
        tmode: TransposeMode,
        nelem: usize,
        u: Option<&P::Buf>,
        v: &mut P::Buf,
    ) -> Result<()> {
        let _span = tracing::debug_span!("apply", %mode, transpose = tmode.is_transpose(), nelem).entered();

        let (u_len, v_len) = self.field_lens(mode, tmode, nelem)?;
        // Kernels index fields with 32-bit ints.
        let longest = u_len.max(v_len);
        if longest > i32::MAX as usize {
            return Err(BasisError::LaunchLimit(format!(
                "{nelem} elements need {longest} scalars per field, kernels index at most {}",
                i32::MAX
            )));
        }
        check_len("output vector", v_len, v.len())?;
        let u = match (mode, u) {
            (EvalMode::Weight, _) => None,
            (_, Some(u)) => {
                check_len("input vector", u_len, u.len())?;
                Some(u)
            }
            (_, None) => return Err(BasisError::MissingInput(mode)),
        };

        if nelem == 0 {
            tracing::debug!("no elements, nothing to launch");
            return Ok(());
        }
        let nelem_arg = i32::try_from(nelem)
            .map_err(|_| BasisError::LaunchLimit(format!("{nelem} elements exceed i32")))?;

        if tmode.is_transpose() {
            self.platform.zero(v)?;
        }

        let dims = self.plan(mode)?.dims(nelem)?;
        tracing::debug!(grid = %dims.grid, block = %dims.block, shared = dims.shared_mem_bytes, "launch");

        let transpose = tmode.as_flag();
        let m = &self.matrices;
        let (kernel, args) = match (mode, u) {
            (EvalMode::Interp, Some(u)) => (
                &self.kernels.interp,
                KernelArgs::Interp {
                    nelem: nelem_arg,
                    transpose,
                    interp1d: &m.interp1d,
                    u,
                    v,
                },
            ),
            (EvalMode::Grad, Some(u)) => (
                &self.kernels.grad,
                KernelArgs::Grad {
                    nelem: nelem_arg,
                    transpose,
                    interp1d: &m.interp1d,
                    grad1d: &m.grad1d,
                    u,
                    v,
                },
            ),
            (EvalMode::Weight, _) => (
                &self.kernels.weight,
                KernelArgs::Weight {
                    nelem: nelem_arg,
                    qweight1d: &m.qweight1d,
                    v,
                },
            ),
            (mode, _) => return Err(BasisError::MissingInput(mode)),
        };
        self.platform.launch(kernel, dims, args)
    }
}

impl<P: Platform> Drop for TensorBasis<P> {
    fn drop(&mut self) {
        tracing::debug!(spec = %self.spec, "releasing tensor basis");
    }
}

fn check_mode(mode: EvalMode) -> Result<()> {
    match mode {
        EvalMode::Interp | EvalMode::Grad | EvalMode::Weight => Ok(()),
        EvalMode::None => Err(BasisError::MisuseNone),
        EvalMode::Div | EvalMode::Curl => Err(BasisError::UnsupportedMode(mode)),
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(BasisError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
