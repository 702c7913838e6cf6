//! Build script for tbasis-gpu.
//!
//! The device template is compiled at runtime via NVRTC, specialized per
//! basis, so nothing is compiled here. Cargo only needs to know that the
//! embedded `.cu` sources are inputs of the crate.

fn main() {
    let kernel_dir = std::path::Path::new("src/cuda/kernels");
    println!("cargo:rerun-if-changed={}", kernel_dir.display());
    let Ok(entries) = std::fs::read_dir(kernel_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "cu") {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }
}
