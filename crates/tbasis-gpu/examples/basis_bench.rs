//! Benchmark: basis application on the host reference and on CUDA.
//!
//! Run with: cargo run -p tbasis-gpu --features cuda --example basis_bench --release

use std::time::{Duration, Instant};

use tbasis_math::reference::{self, HostMatrices};
use tbasis_math::{BasisSpec, EvalMode, H1LagrangeBasis, QuadMode, TransposeMode};

const WARMUP: usize = 5;
const ITERS: usize = 50;
const NELEM: usize = 4096;

// (dim, P, Q, ncomp)
const CONFIGS: [(usize, usize, usize, usize); 5] = [
    (1, 4, 6, 1),
    (2, 3, 4, 1),
    (2, 5, 7, 3),
    (3, 3, 4, 1),
    (3, 5, 6, 3),
];

const MODES: [(EvalMode, TransposeMode); 4] = [
    (EvalMode::Interp, TransposeMode::NoTranspose),
    (EvalMode::Interp, TransposeMode::Transpose),
    (EvalMode::Grad, TransposeMode::NoTranspose),
    (EvalMode::Grad, TransposeMode::Transpose),
];

fn report(label: &str, elapsed: Duration) {
    let per_iter = elapsed / ITERS as u32;
    let melem_per_s = NELEM as f64 / per_iter.as_secs_f64() / 1e6;
    println!(
        "    {label}: {:.1}us/iter ({melem_per_s:.1} Melem/s)",
        per_iter.as_secs_f64() * 1e6
    );
}

fn input(len: usize) -> Vec<f64> {
    (0..len).map(|i| ((i % 97) as f64 - 48.0) * 0.01).collect()
}

fn bench_host(lagrange: &H1LagrangeBasis, spec: &BasisSpec) {
    let mats = HostMatrices {
        interp1d: &lagrange.interp1d,
        grad1d: &lagrange.grad1d,
        qweight1d: &lagrange.qweight1d,
    };
    for (mode, tmode) in MODES {
        let (u_len, v_len) = spec.field_lens(mode, tmode, NELEM).unwrap();
        let u = input(u_len);
        let mut v = vec![0.0; v_len];
        for _ in 0..WARMUP {
            reference::apply(spec, &mats, mode, tmode, NELEM, &u, &mut v).unwrap();
        }
        let start = Instant::now();
        for _ in 0..ITERS {
            reference::apply(spec, &mats, mode, tmode, NELEM, &u, &mut v).unwrap();
        }
        report(&format!("{mode}{}", if tmode.is_transpose() { "^T" } else { "" }), start.elapsed());
    }
}

fn main() {
    println!("=== tbasis apply benchmark ({NELEM} elements) ===\n");

    println!("Host reference:");
    for (dim, p, q, ncomp) in CONFIGS {
        let lagrange = H1LagrangeBasis::new(dim, p, q, QuadMode::Gauss).unwrap();
        let spec = lagrange.spec(ncomp).unwrap();
        println!("  {spec}");
        bench_host(&lagrange, &spec);
    }

    #[cfg(feature = "cuda")]
    {
        use std::sync::Arc;
        use tbasis_gpu::backend::Platform;
        use tbasis_gpu::cuda::CudaPlatform;
        use tbasis_gpu::TensorBasis;

        match CudaPlatform::new(0) {
            Ok(cuda) => {
                let cuda = Arc::new(cuda);
                let caps = cuda.caps();
                println!(
                    "\nCUDA: {} (compute {}.{}):",
                    caps.name, caps.compute_major, caps.compute_minor
                );
                for (dim, p, q, ncomp) in CONFIGS {
                    let lagrange = H1LagrangeBasis::new(dim, p, q, QuadMode::Gauss).unwrap();
                    let basis = TensorBasis::from_lagrange(cuda.clone(), &lagrange, ncomp).unwrap();
                    println!("  {}", basis.spec());
                    for (mode, tmode) in MODES {
                        let (u_len, v_len) = basis.field_lens(mode, tmode, NELEM).unwrap();
                        let u = cuda.alloc_from(&input(u_len)).unwrap();
                        let mut v = cuda.alloc(v_len).unwrap();
                        for _ in 0..WARMUP {
                            basis.apply(mode, tmode, NELEM, Some(&u), &mut v).unwrap();
                        }
                        cuda.synchronize().unwrap();
                        let start = Instant::now();
                        for _ in 0..ITERS {
                            basis.apply(mode, tmode, NELEM, Some(&u), &mut v).unwrap();
                        }
                        cuda.synchronize().unwrap();
                        let suffix = if tmode.is_transpose() { "^T" } else { "" };
                        report(&format!("{mode}{suffix}"), start.elapsed());
                    }
                }
            }
            Err(e) => {
                println!("\nCUDA: unavailable ({e})");
            }
        }
    }

    #[cfg(not(feature = "cuda"))]
    {
        println!("\nCUDA: not compiled (enable --features cuda)");
    }

    println!("\nDone.");
}
