//! The error type the optimizer can return.
//!
//! Two kinds only, matching the two failure modes a single-pass, single-function
//! abstract-interpretation optimizer can hit: an internal invariant broke (a
//! compiler bug, not recoverable inside the pass), or the IR handed in exceeds
//! a hard structural limit the analysis's bitsets cannot represent.

use thiserror::Error;

use crate::ir::handle::CfgHandle;

/// Errors surfaced by [`crate::optimize::optimize`] and the components it drives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptimizerError {
    /// An internal invariant (I1-I5, §3) did not hold after a phase, or a
    /// helper reached a state the algorithm assumes cannot occur (e.g.
    /// `local_lookup` reaching a block with no predecessors). Treated as a
    /// compiler bug: the pass is abandoned and the caller should treat the
    /// IR as unusable for further optimization.
    #[error("optimizer invariant violated in phase `{phase}`: {detail}")]
    InvariantViolation { phase: &'static str, detail: String },

    /// A block carries more successors than the per-context executable-edge
    /// bitset can represent (64). Detected at entry; the pass declines to
    /// mutate the IR at all and reports the offending block.
    #[error("block {block:?} has {successors} successors, exceeding the 64-edge capacity")]
    CapacityExceeded { block: CfgHandle, successors: usize },
}
