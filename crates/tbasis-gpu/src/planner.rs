//! Launch planning: block sizes fixed at construction, and per-mode thread
//! blocks, elements per block, grids and shared memory.
//!
//! With `T = max(P, Q)`:
//!
//! | dim | mode        | block       | elems/block               | dyn. shared   |
//! |-----|-------------|-------------|---------------------------|---------------|
//! | 1   | interp/grad | `(T, 1, e)` | `max(1, min(64, 256/T))`  | `e·T`         |
//! | 2   | interp/grad | `(T, T, C·e)` | `max(1, blk/(T²·C))`    | `C·e·T²`      |
//! | 3   | interp/grad | `(T, T, C)` | `1`                       | `C·T²`        |
//! | 1   | weight      | `(Q, e, 1)` | `max(1, blk_w/Q)`         | `0`           |
//! | 2   | weight      | `(Q, Q, e)` | `max(1, blk_w/Q²)`        | `0`           |
//! | 3   | weight      | `(Q, Q, Q)` | `1`                       | `0`           |

use tbasis_math::{BasisSpec, EvalMode};
use tbasis_util::basics::{div_ceil, Extents3D, Scalar};

use crate::backend::{DeviceCaps, LaunchDims};
use crate::error::{BasisError, Result};

const MIN_BLOCK_SIZE: usize = 64;
const MAX_BLOCK_SIZE: usize = 1024;

/// Block size of every 1D kernel.
pub const BLOCK_SIZE_1D: usize = 256;

/// Cap on elements per block for 1D interp/grad. Together with
/// [`BLOCK_SIZE_1D`] these are tuning defaults, not correctness constraints.
pub const MAX_ELEMS_PER_BLOCK_1D: usize = 64;

/// Largest grid x extent the launch API accepts.
const MAX_GRID_X: usize = i32::MAX as usize;

const SCALAR_BYTES: usize = std::mem::size_of::<Scalar>();

/// Smallest power of two in `[64, 1024]` strictly greater than `required`,
/// saturating at 1024.
pub fn block_size_from_requirement(required: usize) -> usize {
    let mut size = MIN_BLOCK_SIZE;
    while size < MAX_BLOCK_SIZE && size <= required {
        size *= 2;
    }
    size
}

/// `__launch_bounds__` of the three kernels, baked into the module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockSizes {
    pub interp: usize,
    pub grad: usize,
    pub weight: usize,
}

impl BlockSizes {
    pub fn compute(spec: &BasisSpec) -> Self {
        let t = spec.t1d();
        let contraction = block_size_from_requirement(t * t * spec.ncomp);
        match spec.dim {
            1 => Self {
                interp: BLOCK_SIZE_1D,
                grad: BLOCK_SIZE_1D,
                weight: BLOCK_SIZE_1D,
            },
            2 => Self {
                interp: contraction,
                grad: contraction,
                weight: block_size_from_requirement(MIN_BLOCK_SIZE.max(spec.q * spec.q)),
            },
            _ => Self {
                interp: contraction,
                grad: contraction,
                weight: block_size_from_requirement(spec.num_qpts()),
            },
        }
    }

    pub fn for_mode(&self, mode: EvalMode) -> Option<usize> {
        match mode {
            EvalMode::Interp => Some(self.interp),
            EvalMode::Grad => Some(self.grad),
            EvalMode::Weight => Some(self.weight),
            _ => None,
        }
    }
}

/// Launch shape of one mode, independent of the element count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LaunchPlan {
    pub block: Extents3D,
    pub elems_per_block: usize,
    /// Dynamic shared memory, in scalars.
    pub shared_scalars: usize,
    /// Shared memory the kernel declares statically, in scalars.
    pub static_shared_scalars: usize,
}

fn to_u32(what: &str, n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| BasisError::LaunchLimit(format!("{what} {n} does not fit in u32")))
}

impl LaunchPlan {
    pub fn new(spec: &BasisSpec, blk: &BlockSizes, mode: EvalMode) -> Result<Self> {
        let block_size = blk.for_mode(mode).ok_or(match mode {
            EvalMode::None => BasisError::MisuseNone,
            other => BasisError::UnsupportedMode(other),
        })?;
        let (t, q, c) = (spec.t1d(), spec.q, spec.ncomp);
        let pq = spec.p * spec.q;

        let (block, elems_per_block, shared_scalars) = match (mode, spec.dim) {
            (EvalMode::Weight, 1) => {
                let e = (block_size / q).max(1);
                ((q, e, 1), e, 0)
            }
            (EvalMode::Weight, 2) => {
                let e = (block_size / (q * q)).max(1);
                ((q, q, e), e, 0)
            }
            (EvalMode::Weight, _) => ((q, q, q), 1, 0),
            (_, 1) => {
                let e = (BLOCK_SIZE_1D / t).clamp(1, MAX_ELEMS_PER_BLOCK_1D);
                ((t, 1, e), e, e * t)
            }
            (_, 2) => {
                let e = (block_size / (t * t * c)).max(1);
                ((t, t, c * e), e, c * e * t * t)
            }
            _ => ((t, t, c), 1, c * t * t),
        };
        let static_shared_scalars = match mode {
            EvalMode::Interp => pq,
            EvalMode::Grad => 2 * pq,
            _ => 0,
        };

        Ok(Self {
            block: Extents3D::new(
                to_u32("block x", block.0)?,
                to_u32("block y", block.1)?,
                to_u32("block z", block.2)?,
            ),
            elems_per_block,
            shared_scalars,
            static_shared_scalars,
        })
    }

    pub fn threads(&self) -> u64 {
        self.block.volume()
    }

    pub fn shared_bytes(&self) -> usize {
        self.shared_scalars * SCALAR_BYTES
    }

    pub fn total_shared_bytes(&self) -> usize {
        (self.shared_scalars + self.static_shared_scalars) * SCALAR_BYTES
    }

    /// Blocks needed to cover `nelem` elements.
    pub fn grid(&self, nelem: usize) -> usize {
        div_ceil(nelem, self.elems_per_block)
    }

    pub fn dims(&self, nelem: usize) -> Result<LaunchDims> {
        let grid = self.grid(nelem);
        if grid > MAX_GRID_X {
            return Err(BasisError::LaunchLimit(format!(
                "{nelem} elements need {grid} blocks, limit is {MAX_GRID_X}"
            )));
        }
        Ok(LaunchDims {
            grid: Extents3D::new(to_u32("grid", grid)?, 1, 1),
            block: self.block,
            shared_mem_bytes: to_u32("shared memory", self.shared_bytes())?,
        })
    }

    /// Checks the block against the kernel's launch bounds and the device.
    pub fn check_limits(&self, mode: EvalMode, block_size: usize, caps: &DeviceCaps) -> Result<()> {
        let threads = self.threads();
        let max_threads = (block_size as u64).min(caps.max_threads_per_block as u64);
        if threads > max_threads {
            return Err(BasisError::LaunchLimit(format!(
                "{mode} block {} has {threads} threads, limit is {max_threads}",
                self.block
            )));
        }
        let shared = self.total_shared_bytes();
        if shared > caps.max_shared_mem_per_block as usize {
            return Err(BasisError::LaunchLimit(format!(
                "{mode} needs {shared} bytes of shared memory, limit is {}",
                caps.max_shared_mem_per_block
            )));
        }
        Ok(())
    }
}

/// Plans of the three supported modes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LaunchPlans {
    pub interp: LaunchPlan,
    pub grad: LaunchPlan,
    pub weight: LaunchPlan,
}

impl LaunchPlans {
    pub fn new(spec: &BasisSpec, blk: &BlockSizes) -> Result<Self> {
        Ok(Self {
            interp: LaunchPlan::new(spec, blk, EvalMode::Interp)?,
            grad: LaunchPlan::new(spec, blk, EvalMode::Grad)?,
            weight: LaunchPlan::new(spec, blk, EvalMode::Weight)?,
        })
    }

    pub fn for_mode(&self, mode: EvalMode) -> Option<&LaunchPlan> {
        match mode {
            EvalMode::Interp => Some(&self.interp),
            EvalMode::Grad => Some(&self.grad),
            EvalMode::Weight => Some(&self.weight),
            _ => None,
        }
    }

    pub fn check_limits(&self, blk: &BlockSizes, caps: &DeviceCaps) -> Result<()> {
        self.interp.check_limits(EvalMode::Interp, blk.interp, caps)?;
        self.grad.check_limits(EvalMode::Grad, blk.grad, caps)?;
        self.weight.check_limits(EvalMode::Weight, blk.weight, caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> DeviceCaps {
        DeviceCaps {
            name: "test".into(),
            compute_major: 8,
            compute_minor: 0,
            total_memory: 1 << 30,
            free_memory: 1 << 30,
            max_threads_per_block: 1024,
            max_shared_mem_per_block: 48 * 1024,
        }
    }

    #[test]
    fn block_size_is_next_power_of_two_above_requirement() {
        assert_eq!(block_size_from_requirement(0), 64);
        assert_eq!(block_size_from_requirement(4), 64);
        assert_eq!(block_size_from_requirement(63), 64);
        assert_eq!(block_size_from_requirement(64), 128);
        assert_eq!(block_size_from_requirement(100), 128);
        assert_eq!(block_size_from_requirement(512), 1024);
        assert_eq!(block_size_from_requirement(5000), 1024);
    }

    #[test]
    fn block_sizes_per_dim() {
        let one = BlockSizes::compute(&BasisSpec::new(1, 4, 6, 3).unwrap());
        assert_eq!(one, BlockSizes { interp: 256, grad: 256, weight: 256 });

        // T = 4, C = 2: 32 threads required; weight needs max(64, 16).
        let two = BlockSizes::compute(&BasisSpec::new(2, 3, 4, 2).unwrap());
        assert_eq!(two, BlockSizes { interp: 64, grad: 64, weight: 128 });

        // T = 5, C = 3: 75 threads; Q^3 = 125.
        let three = BlockSizes::compute(&BasisSpec::new(3, 5, 5, 3).unwrap());
        assert_eq!(three, BlockSizes { interp: 128, grad: 128, weight: 128 });
    }

    #[test]
    fn one_d_plans() {
        let spec = BasisSpec::new(1, 2, 3, 1).unwrap();
        let plans = LaunchPlans::new(&spec, &BlockSizes::compute(&spec)).unwrap();
        assert_eq!(plans.interp.block, Extents3D::new(3, 1, 64));
        assert_eq!(plans.interp.elems_per_block, 64);
        assert_eq!(plans.interp.shared_scalars, 64 * 3);
        assert_eq!(plans.grad.static_shared_scalars, 12);
        assert_eq!(plans.weight.block, Extents3D::new(3, 85, 1));
        assert_eq!(plans.weight.shared_scalars, 0);

        // Wide 1D elements collapse to few elements per block.
        let wide = BasisSpec::new(1, 10, 100, 1).unwrap();
        let plan = LaunchPlan::new(&wide, &BlockSizes::compute(&wide), EvalMode::Interp).unwrap();
        assert_eq!(plan.elems_per_block, 2);
    }

    #[test]
    fn two_and_three_d_plans() {
        let spec = BasisSpec::new(2, 3, 4, 2).unwrap();
        let plans = LaunchPlans::new(&spec, &BlockSizes::compute(&spec)).unwrap();
        // blk 64 / (16 * 2) = 2 elements.
        assert_eq!(plans.interp.block, Extents3D::new(4, 4, 4));
        assert_eq!(plans.interp.elems_per_block, 2);
        assert_eq!(plans.interp.shared_scalars, 64);
        // blk_w 128 / 16 = 8 elements.
        assert_eq!(plans.weight.block, Extents3D::new(4, 4, 8));

        let spec = BasisSpec::new(3, 2, 2, 2).unwrap();
        let plans = LaunchPlans::new(&spec, &BlockSizes::compute(&spec)).unwrap();
        assert_eq!(plans.grad.block, Extents3D::new(2, 2, 2));
        assert_eq!(plans.grad.elems_per_block, 1);
        assert_eq!(plans.grad.shared_scalars, 8);
        assert_eq!(plans.weight.block, Extents3D::new(2, 2, 2));
    }

    #[test]
    fn grid_covers_partial_last_block() {
        let spec = BasisSpec::new(2, 2, 2, 1).unwrap();
        let plan = LaunchPlan::new(&spec, &BlockSizes::compute(&spec), EvalMode::Interp).unwrap();
        assert_eq!(plan.elems_per_block, 16);
        let dims = plan.dims(17).unwrap();
        assert_eq!(dims.grid, Extents3D::new(2, 1, 1));
        assert_eq!(dims.shared_mem_bytes, 16 * 4 * 8);
        assert_eq!(plan.grid(0), 0);
    }

    #[test]
    fn unsupported_modes_have_no_plan() {
        let spec = BasisSpec::new(2, 2, 2, 1).unwrap();
        let blk = BlockSizes::compute(&spec);
        assert!(matches!(
            LaunchPlan::new(&spec, &blk, EvalMode::Curl),
            Err(BasisError::UnsupportedMode(EvalMode::Curl))
        ));
        assert!(matches!(
            LaunchPlan::new(&spec, &blk, EvalMode::None),
            Err(BasisError::MisuseNone)
        ));
    }

    #[test]
    fn limits_reject_oversized_blocks() {
        let spec = BasisSpec::new(3, 12, 12, 8).unwrap();
        let blk = BlockSizes::compute(&spec);
        let plans = LaunchPlans::new(&spec, &blk).unwrap();
        assert!(matches!(
            plans.check_limits(&blk, &caps()),
            Err(BasisError::LaunchLimit(_))
        ));

        let spec = BasisSpec::new(3, 4, 5, 3).unwrap();
        let blk = BlockSizes::compute(&spec);
        let plans = LaunchPlans::new(&spec, &blk).unwrap();
        plans.check_limits(&blk, &caps()).unwrap();

        let mut small = caps();
        small.max_shared_mem_per_block = 256;
        assert!(matches!(
            plans.check_limits(&blk, &small),
            Err(BasisError::LaunchLimit(_))
        ));
    }
}
