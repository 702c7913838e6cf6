//! CUDA basis tests: device results must match the host reference.
//!
//! Run with: cargo test -p tbasis-gpu --features cuda --test cuda_basis_basic

#![cfg(feature = "cuda")]

use std::sync::Arc;

use tbasis_gpu::backend::Platform;
use tbasis_gpu::cuda::CudaPlatform;
use tbasis_gpu::{BasisError, TensorBasis};
use tbasis_math::reference::{self, HostMatrices};
use tbasis_math::{BasisSpec, EvalMode, H1LagrangeBasis, QuadMode, TransposeMode};

const NT: TransposeMode = TransposeMode::NoTranspose;
const T: TransposeMode = TransposeMode::Transpose;

fn approx_eq(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(
        a.len(),
        b.len(),
        "length mismatch: {} vs {}",
        a.len(),
        b.len()
    );
    for (i, (&x, &y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let rel = if y.abs() > 1e-12 { diff / y.abs() } else { diff };
        assert!(
            diff <= tol || rel <= tol,
            "mismatch at index {}: {} vs {} (diff={}, rel={})",
            i,
            x,
            y,
            diff,
            rel
        );
    }
}

fn get_platform() -> Option<Arc<CudaPlatform>> {
    // cudarc may panic (not return Err) if the driver is too old for the
    // linked CUDA version. Catch that so tests skip instead of failing.
    match std::panic::catch_unwind(|| CudaPlatform::new(0)) {
        Ok(Ok(p)) => Some(Arc::new(p)),
        Ok(Err(e)) => {
            eprintln!("Skipping CUDA test: {e}");
            None
        }
        Err(_) => {
            eprintln!("Skipping CUDA test: cudarc panicked (driver/toolkit mismatch?)");
            None
        }
    }
}

/// Helper macro to skip test if no CUDA device is available.
macro_rules! require_cuda {
    () => {
        match get_platform() {
            Some(p) => p,
            None => return,
        }
    };
}

/// Applies on the device, starting from a poisoned output vector.
fn device_apply(
    basis: &TensorBasis<CudaPlatform>,
    mode: EvalMode,
    tmode: TransposeMode,
    nelem: usize,
    u: &[f64],
) -> Vec<f64> {
    let platform = basis.platform();
    let (_, v_len) = basis.field_lens(mode, tmode, nelem).unwrap();
    let u_buf = platform.alloc_from(u).unwrap();
    let mut v_buf = platform.alloc_from(&vec![f64::NAN; v_len]).unwrap();
    basis.apply(mode, tmode, nelem, Some(&u_buf), &mut v_buf).unwrap();
    let mut v = vec![0.0; v_len];
    platform.download(&v_buf, &mut v).unwrap();
    platform.synchronize().unwrap();
    v
}

fn host_apply(
    basis: &H1LagrangeBasis,
    spec: &BasisSpec,
    mode: EvalMode,
    tmode: TransposeMode,
    nelem: usize,
    u: &[f64],
) -> Vec<f64> {
    let mats = HostMatrices {
        interp1d: &basis.interp1d,
        grad1d: &basis.grad1d,
        qweight1d: &basis.qweight1d,
    };
    let (_, v_len) = spec.field_lens(mode, tmode, nelem).unwrap();
    let mut v = vec![0.0; v_len];
    reference::apply(spec, &mats, mode, tmode, nelem, u, &mut v).unwrap();
    v
}

fn input(len: usize) -> Vec<f64> {
    (0..len).map(|i| ((i * 7 + 3) % 11) as f64 / 11.0 - 0.4).collect()
}

fn identity(n: usize) -> Vec<f64> {
    let mut m = vec![0.0; n * n];
    for i in 0..n {
        m[i * n + i] = 1.0;
    }
    m
}

fn custom_basis(
    platform: &Arc<CudaPlatform>,
    spec: BasisSpec,
    interp1d: &[f64],
    qweight1d: &[f64],
) -> TensorBasis<CudaPlatform> {
    let grad1d = vec![0.0; spec.p * spec.q];
    let mats = HostMatrices {
        interp1d,
        grad1d: &grad1d,
        qweight1d,
    };
    TensorBasis::new(platform.clone(), spec, &mats).unwrap()
}

#[test]
fn identity_interp_1d() {
    let platform = require_cuda!();
    let basis = custom_basis(&platform, BasisSpec::new(1, 2, 2, 1).unwrap(), &identity(2), &[1.0, 1.0]);
    let v = device_apply(&basis, EvalMode::Interp, NT, 1, &[3.0, 5.0]);
    approx_eq(&v, &[3.0, 5.0], 1e-15);
}

#[test]
fn linear_interp_two_nodes_to_three_points() {
    let platform = require_cuda!();
    let b = [1.0, 0.0, 0.5, 0.5, 0.0, 1.0];
    let basis = custom_basis(&platform, BasisSpec::new(1, 2, 3, 1).unwrap(), &b, &[1.0; 3]);
    let v = device_apply(&basis, EvalMode::Interp, NT, 1, &[2.0, 4.0]);
    approx_eq(&v, &[2.0, 3.0, 4.0], 1e-15);
}

#[test]
fn identity_interp_2d() {
    let platform = require_cuda!();
    let basis = custom_basis(&platform, BasisSpec::new(2, 2, 2, 1).unwrap(), &identity(2), &[1.0, 1.0]);
    let v = device_apply(&basis, EvalMode::Interp, NT, 1, &[1.0, 2.0, 3.0, 4.0]);
    approx_eq(&v, &[1.0, 2.0, 3.0, 4.0], 1e-15);
}

#[test]
fn interp_2d_preserves_constants() {
    let platform = require_cuda!();
    let lagrange = H1LagrangeBasis::new(2, 3, 4, QuadMode::Gauss).unwrap();
    let basis = TensorBasis::from_lagrange(platform, &lagrange, 1).unwrap();
    let v = device_apply(&basis, EvalMode::Interp, NT, 1, &[1.0; 9]);
    approx_eq(&v, &[1.0; 16], 1e-13);
}

#[test]
fn weight_3d_has_no_component_axis() {
    let platform = require_cuda!();
    let basis = custom_basis(&platform, BasisSpec::new(3, 2, 2, 2).unwrap(), &identity(2), &[1.0, 1.0]);
    let mut v = platform.alloc(8).unwrap();
    basis.apply(EvalMode::Weight, NT, 1, None, &mut v).unwrap();
    let mut host = vec![0.0; 8];
    platform.download(&v, &mut host).unwrap();
    approx_eq(&host, &[1.0; 8], 1e-15);
}

#[test]
fn transpose_interp_2d_overwrites_poisoned_output() {
    let platform = require_cuda!();
    let basis = custom_basis(&platform, BasisSpec::new(2, 2, 2, 1).unwrap(), &identity(2), &[1.0, 1.0]);
    let v = device_apply(&basis, EvalMode::Interp, T, 2, &[1.0; 8]);
    approx_eq(&v, &[1.0; 8], 1e-15);
}

#[test]
fn all_modes_match_reference_across_shapes() {
    let platform = require_cuda!();
    // P = Q, P > Q, Q > P, P = 1 and Q = 1 in every dimension, several
    // component counts, and element counts that leave a partial last block.
    let shapes = [
        (1, 1, 1, 1),
        (1, 3, 5, 2),
        (1, 6, 4, 1),
        (2, 1, 3, 1),
        (2, 2, 2, 1),
        (2, 3, 5, 3),
        (2, 5, 3, 2),
        (3, 2, 1, 1),
        (3, 3, 3, 2),
        (3, 3, 4, 1),
        (3, 4, 3, 3),
    ];
    for &(dim, p, q, ncomp) in &shapes {
        let quad = if q == 1 { QuadMode::Gauss } else { QuadMode::GaussLobatto };
        let lagrange = H1LagrangeBasis::new(dim, p, q, quad).unwrap();
        let basis = TensorBasis::from_lagrange(platform.clone(), &lagrange, ncomp).unwrap();
        let spec = *basis.spec();
        for nelem in [1, 7, 67] {
            for mode in [EvalMode::Interp, EvalMode::Grad, EvalMode::Weight] {
                for tmode in [NT, T] {
                    let (u_len, _) = spec.field_lens(mode, tmode, nelem).unwrap();
                    let u = input(u_len);
                    let got = device_apply(&basis, mode, tmode, nelem, &u);
                    let want = host_apply(&lagrange, &spec, mode, tmode, nelem, &u);
                    approx_eq(&got, &want, 1e-11);
                }
            }
        }
    }
}

#[test]
fn interp_transpose_interp_is_positive_semidefinite() {
    let platform = require_cuda!();
    let lagrange = H1LagrangeBasis::new(3, 3, 4, QuadMode::Gauss).unwrap();
    let basis = TensorBasis::from_lagrange(platform, &lagrange, 2).unwrap();
    let nelem = 5;
    let (n_nodes, _) = basis.field_lens(EvalMode::Interp, NT, nelem).unwrap();
    let u = input(n_nodes);
    let iu = device_apply(&basis, EvalMode::Interp, NT, nelem, &u);
    let itiu = device_apply(&basis, EvalMode::Interp, T, nelem, &iu);
    let form: f64 = u.iter().zip(&itiu).map(|(a, b)| a * b).sum();
    assert!(form >= -1e-12, "form = {form}");
}

#[test]
fn grad_1d_of_identity_is_one() {
    let platform = require_cuda!();
    let lagrange = H1LagrangeBasis::new(1, 4, 6, QuadMode::Gauss).unwrap();
    let basis = TensorBasis::from_lagrange(platform, &lagrange, 1).unwrap();
    let nelem = 3;
    let u: Vec<f64> = (0..nelem).flat_map(|_| lagrange.nodes.iter().copied()).collect();
    let v = device_apply(&basis, EvalMode::Grad, NT, nelem, &u);
    approx_eq(&v, &vec![1.0; nelem * 6], 1e-12);
}

#[test]
fn weight_sums_to_reference_measure() {
    let platform = require_cuda!();
    for dim in 1..=3 {
        let lagrange = H1LagrangeBasis::new(dim, 3, 4, QuadMode::GaussLobatto).unwrap();
        let basis = TensorBasis::from_lagrange(platform.clone(), &lagrange, 1).unwrap();
        let v = device_apply(&basis, EvalMode::Weight, NT, 2, &[]);
        let per_elem = v.len() / 2;
        let sum: f64 = v[..per_elem].iter().sum();
        assert!((sum - 2f64.powi(dim as i32)).abs() < 1e-12, "dim {dim}: {sum}");
    }
}

#[test]
fn empty_batch_is_a_no_op() {
    let platform = require_cuda!();
    let lagrange = H1LagrangeBasis::new(2, 3, 3, QuadMode::Gauss).unwrap();
    let basis = TensorBasis::from_lagrange(platform.clone(), &lagrange, 1).unwrap();
    let u = platform.alloc(0).unwrap();
    let mut v = platform.alloc(0).unwrap();
    basis.apply(EvalMode::Grad, T, 0, Some(&u), &mut v).unwrap();
    platform.synchronize().unwrap();
}

#[test]
fn unsupported_modes_fail() {
    let platform = require_cuda!();
    let lagrange = H1LagrangeBasis::new(1, 2, 2, QuadMode::Gauss).unwrap();
    let basis = TensorBasis::from_lagrange(platform.clone(), &lagrange, 1).unwrap();
    let u = platform.alloc(2).unwrap();
    let mut v = platform.alloc(2).unwrap();
    assert!(matches!(
        basis.apply(EvalMode::Div, NT, 1, Some(&u), &mut v),
        Err(BasisError::UnsupportedMode(EvalMode::Div))
    ));
    assert!(matches!(
        basis.apply(EvalMode::None, NT, 1, Some(&u), &mut v),
        Err(BasisError::MisuseNone)
    ));
}
