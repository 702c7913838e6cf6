//! Low-level utilities shared across the tbasis crates.

pub mod args;
pub mod basics;
