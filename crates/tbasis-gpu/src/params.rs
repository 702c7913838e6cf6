//! Compile-time parameters of a basis module.
//!
//! Every kernel is specialized on the basis shape and block sizes through
//! preprocessor defines, so loop bounds are immediates the device compiler
//! can unroll.

use std::fmt::Write as _;

use tbasis_math::BasisSpec;
use tbasis_util::basics::int_pow;

use crate::planner::BlockSizes;

/// Device-code template shared by every basis.
pub const TENSOR_BASIS_TEMPLATE: &str = include_str!("cuda/kernels/tensor_basis.cu");

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KernelParams {
    pub dim: usize,
    pub p: usize,
    pub q: usize,
    pub t1d: usize,
    pub ncomp: usize,
    pub blk: BlockSizes,
}

impl KernelParams {
    pub fn new(spec: &BasisSpec, blk: BlockSizes) -> Self {
        Self {
            dim: spec.dim,
            p: spec.p,
            q: spec.q,
            t1d: spec.t1d(),
            ncomp: spec.ncomp,
            blk,
        }
    }

    /// Register stack a thread could need for all components, `C·T^dim`.
    pub fn buf_len(&self) -> usize {
        self.ncomp * int_pow(self.t1d, self.dim)
    }

    /// The defines the template is compiled with, in a fixed order.
    pub fn defines(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Q1D", self.q),
            ("P1D", self.p),
            ("T1D", self.t1d),
            ("BASIS_BUF_LEN", self.buf_len()),
            ("BASIS_DIM", self.dim),
            ("BASIS_NCOMP", self.ncomp),
            ("BASIS_ELEMSIZE", int_pow(self.p, self.dim)),
            ("BASIS_NQPT", int_pow(self.q, self.dim)),
            ("INTERP_BLKSIZE", self.blk.interp),
            ("GRAD_BLKSIZE", self.blk.grad),
            ("WEIGHT_BLKSIZE", self.blk.weight),
        ]
    }
}

/// Prepends one `#define` line per entry to `template`.
pub fn render_source(template: &str, defines: &[(&'static str, usize)]) -> String {
    let mut src = String::with_capacity(template.len() + defines.len() * 32);
    for (name, value) in defines {
        let _ = writeln!(src, "#define {name} {value}");
    }
    src.push_str(template);
    src
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_follow_shape() {
        let spec = BasisSpec::new(3, 2, 4, 2).unwrap();
        let params = KernelParams::new(&spec, BlockSizes::compute(&spec));
        let defines = params.defines();
        let get = |name: &str| defines.iter().find(|(n, _)| *n == name).map(|(_, v)| *v);
        assert_eq!(defines.len(), 11);
        assert_eq!(get("T1D"), Some(4));
        assert_eq!(get("BASIS_BUF_LEN"), Some(2 * 64));
        assert_eq!(get("BASIS_ELEMSIZE"), Some(8));
        assert_eq!(get("BASIS_NQPT"), Some(64));
        assert_eq!(get("INTERP_BLKSIZE"), Some(64));
        assert_eq!(get("WEIGHT_BLKSIZE"), Some(128));
    }

    #[test]
    fn rendered_source_starts_with_defines() {
        let src = render_source("body", &[("P1D", 3), ("Q1D", 5)]);
        assert_eq!(src, "#define P1D 3\n#define Q1D 5\nbody");
    }

    #[test]
    fn template_has_the_three_entry_points() {
        let flat = TENSOR_BASIS_TEMPLATE.split_whitespace().collect::<Vec<_>>().join(" ");
        for entry in [
            "__launch_bounds__(INTERP_BLKSIZE) interp(",
            "__launch_bounds__(GRAD_BLKSIZE) grad(",
            "__launch_bounds__(WEIGHT_BLKSIZE) weight(",
        ] {
            assert!(flat.contains(entry), "missing {entry}");
        }
    }
}
