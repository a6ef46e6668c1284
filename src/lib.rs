//! # traceopt
//!
//! An abstract-interpretation optimizer for SSA intermediate representations.
//! Runs three interlocking transformations over one function body in a fixed
//! sequence: range (constraint) propagation with lattice widening,
//! unreachable-code pruning with constant folding, and jump threading via
//! trace partitioning.
//!
//! ## Important modules:
//! * `ir` - the handle-based CFG/SSA intermediate representation this crate
//!   operates over, plus dominance and validity checking.
//! * `analysis` - the six optimizer components (C1-C6): the constraint
//!   lattice, the abstract operator table, the worklist dataflow engine,
//!   trace insertion, prune & fold, and the jump threader.
//! * `config` - tunables for the fixpoint driver (`OptimizerConfig`).
//! * `error` - the two error kinds the optimizer can surface.
//! * `phase` - the named-phase pipeline runner hosts can bracket.
pub mod analysis;
pub mod config;
pub mod error;
pub mod ir;
pub mod optimize;
pub mod phase;

pub use config::OptimizerConfig;
pub use error::OptimizerError;
pub use optimize::optimize;
