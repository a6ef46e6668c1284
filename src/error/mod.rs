//! # Error Module
//!
//! Structured error type for the optimizer. Unlike a full front-end compiler,
//! this crate has exactly two failure modes (§7): an internal invariant
//! violation, treated as a compiler bug, and a capacity limit the analysis
//! declines to exceed. No user source text ever reaches this layer, so there
//! is no span/severity machinery here.
pub mod optimizer_error;

pub use optimizer_error::OptimizerError;
