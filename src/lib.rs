//! Python bindings for the COARE3.5 bulk air-sea flux algorithm
//!
//! The numerical work lives in [`coare_core`]. This crate converts NumPy arrays
//! to and from the core types and exposes the solver as `xcoare._lib`.

pub mod python;

pub use coare_core;
