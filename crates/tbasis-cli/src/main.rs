use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use tbasis_gpu::planner::{BlockSizes, LaunchPlans};
use tbasis_gpu::KernelParams;
use tbasis_math::reference::{self, HostMatrices};
use tbasis_math::{BasisSpec, EvalMode, H1LagrangeBasis, QuadMode, TransposeMode};
use tbasis_util::args::{has_help, ArgVisitor, Args};

#[derive(Default)]
struct BasisArgs {
    dim: usize,
    p: usize,
    q: usize,
    ncomp: usize,
    nelem: usize,
    mode: String,
    transpose: bool,
    quadrature: String,
    device: String,
    check: bool,
    tolerance_exp: i32,
    verbosity: i32,
}

impl Args for BasisArgs {
    fn for_each<V: ArgVisitor>(&mut self, v: &mut V) {
        v.visit_usize(&mut self.dim, "dim", 3, "Reference dimension (1, 2 or 3)", 1);
        v.visit_usize(&mut self.p, "p", 3, "Nodes per edge", 1);
        v.visit_usize(&mut self.q, "q", 4, "Quadrature points per edge", 1);
        v.visit_usize(&mut self.ncomp, "ncomp", 1, "Field components", 1);
        v.visit_usize(&mut self.nelem, "nelem", 1000, "Elements in the batch", 1);
        v.visit_string(&mut self.mode, "mode", "interp", "interp, grad or weight", 1);
        v.visit_bool(&mut self.transpose, "transpose", false, "Apply the transpose", 1);
        v.visit_string(&mut self.quadrature, "quadrature", "gauss", "gauss or gauss-lobatto", 2);
        v.visit_string(&mut self.device, "device", "cuda", "cuda[:i], or host to print the reference only", 1);
        v.visit_bool(&mut self.check, "check", false, "Compare the device result with the host reference", 1);
        v.visit_i32(&mut self.tolerance_exp, "tolerance-exp", -11, "Check tolerance is 10^this", 2);
        v.visit_i32(&mut self.verbosity, "verbosity", 1, "Print level for options and plans", 2);
    }
}

/// Parses `host`, `cuda` or `cuda:N`.
fn parse_device(device: &str) -> anyhow::Result<Option<usize>> {
    match device {
        "host" | "cpu" => Ok(None),
        "cuda" => Ok(Some(0)),
        other => match other.strip_prefix("cuda:") {
            Some(idx) => Ok(Some(
                idx.parse()
                    .with_context(|| format!("bad CUDA device index {idx:?}"))?,
            )),
            None => bail!("unknown device {other:?} (expected host or cuda[:i])"),
        },
    }
}

/// Deterministic input with every entry distinct.
fn input(len: usize) -> Vec<f64> {
    (0..len).map(|i| ((i * 37 + 11) % 101) as f64 / 50.0 - 1.0).collect()
}

fn summarize(label: &str, v: &[f64]) {
    let sum: f64 = v.iter().sum();
    let max = v.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    println!("{label}: {} values, sum {sum:.12e}, max |v| {max:.6e}", v.len());
}

fn print_plans(spec: &BasisSpec, verbosity: i32) -> anyhow::Result<()> {
    let blk = BlockSizes::compute(spec);
    let params = KernelParams::new(spec, blk);
    let plans = LaunchPlans::new(spec, &blk)?;
    if verbosity >= 2 {
        for (name, value) in params.defines() {
            println!("#define {name} {value}");
        }
    }
    for (mode, plan) in [
        (EvalMode::Interp, &plans.interp),
        (EvalMode::Grad, &plans.grad),
        (EvalMode::Weight, &plans.weight),
    ] {
        println!(
            "{mode:<6} block {} elems/block {} shared {} B",
            plan.block,
            plan.elems_per_block,
            plan.total_shared_bytes()
        );
    }
    Ok(())
}

#[cfg(feature = "cuda")]
fn run_cuda(
    ordinal: usize,
    lagrange: &H1LagrangeBasis,
    ncomp: usize,
    mode: EvalMode,
    tmode: TransposeMode,
    nelem: usize,
    u: &[f64],
) -> anyhow::Result<Vec<f64>> {
    use std::sync::Arc;
    use std::time::Instant;
    use tbasis_gpu::backend::Platform;
    use tbasis_gpu::cuda::CudaPlatform;
    use tbasis_gpu::TensorBasis;

    let platform = Arc::new(CudaPlatform::new(ordinal).context("create CUDA platform")?);
    let basis = TensorBasis::from_lagrange(platform.clone(), lagrange, ncomp)
        .map_err(|e| anyhow::anyhow!("basis construction failed (status {}): {e}", e.status_code()))?;
    let (_, v_len) = basis.field_lens(mode, tmode, nelem)?;
    let u_buf = platform.alloc_from(u)?;
    let mut v_buf = platform.alloc(v_len)?;

    let start = Instant::now();
    basis
        .apply(mode, tmode, nelem, Some(&u_buf), &mut v_buf)
        .map_err(|e| anyhow::anyhow!("apply failed (status {}): {e}", e.status_code()))?;
    platform.synchronize()?;
    tracing::info!(elapsed_us = start.elapsed().as_secs_f64() * 1e6, "device apply");

    let mut v = vec![0.0; v_len];
    platform.download(&v_buf, &mut v)?;
    Ok(v)
}

#[cfg(not(feature = "cuda"))]
fn run_cuda(
    _ordinal: usize,
    _lagrange: &H1LagrangeBasis,
    _ncomp: usize,
    _mode: EvalMode,
    _tmode: TransposeMode,
    _nelem: usize,
    _u: &[f64],
) -> anyhow::Result<Vec<f64>> {
    bail!("CUDA support not compiled (rebuild with --features cuda)")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut args = BasisArgs::default();
    if has_help(&argv) {
        println!("tbasis: apply a tensor-product Lagrange basis to a batch of elements\n");
        args.help();
        return Ok(());
    }
    args.init_and_parse(&argv)?;
    args.print(args.verbosity);

    let mode: EvalMode = args.mode.parse().map_err(anyhow::Error::msg)?;
    let quad: QuadMode = args.quadrature.parse().map_err(anyhow::Error::msg)?;
    let tmode = TransposeMode::from(args.transpose);
    let device = parse_device(&args.device)?;

    let lagrange = H1LagrangeBasis::new(args.dim, args.p, args.q, quad).context("build Lagrange basis")?;
    let spec = lagrange.spec(args.ncomp)?;
    println!("basis {spec}, {} elements, {mode}{}", args.nelem, if args.transpose { " (transpose)" } else { "" });
    print_plans(&spec, args.verbosity)?;

    let (u_len, v_len) = spec.field_lens(mode, tmode, args.nelem)?;
    let u = input(u_len);

    let mats = HostMatrices {
        interp1d: &lagrange.interp1d,
        grad1d: &lagrange.grad1d,
        qweight1d: &lagrange.qweight1d,
    };
    let host_reference = || -> anyhow::Result<Vec<f64>> {
        let mut v = vec![0.0; v_len];
        reference::apply(&spec, &mats, mode, tmode, args.nelem, &u, &mut v)?;
        Ok(v)
    };

    let Some(ordinal) = device else {
        if args.check {
            tracing::warn!("--check compares a device run with the host reference; ignored for --device host");
        }
        summarize("host reference", &host_reference()?);
        return Ok(());
    };

    let got = run_cuda(ordinal, &lagrange, args.ncomp, mode, tmode, args.nelem, &u)?;
    summarize("device", &got);
    if args.check {
        let expected = host_reference()?;
        let max_err = got
            .iter()
            .zip(&expected)
            .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
        let tol = 10f64.powi(args.tolerance_exp);
        println!("max abs error vs host reference: {max_err:.3e} (tolerance {tol:.0e})");
        if max_err > tol {
            bail!("device result differs from host reference by {max_err:.3e}");
        }
    }
    Ok(())
}
