// src/ir/ssa.rs
//! SSA node storage.
//!
//! Nodes live in a flat, handle-indexed arena (`Function::ssa_arena`) rather
//! than a name-keyed map, so side tables in `analysis` can be plain `Vec`s
//! indexed by `SsaHandle` (§9).

use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::Opcode;
use crate::ir::types::Type;
use crate::ir::value::Value;

/// One SSA definition.
#[derive(Debug, Clone)]
pub struct SsaNode {
    pub op: Opcode,
    pub ty: Type,
    /// The block this node is defined in. For a `Phi`, input `i` corresponds
    /// to the block's `i`-th predecessor edge (§3); a `Trace`'s inputs
    /// instead follow the `(orig, branch_or_parent, arg_i, ...)` layout of
    /// §4.4.2.
    pub block: CfgHandle,
    pub inputs: Vec<Value>,
    /// Uses of this node: `(user, operand index)` pairs. Maintained
    /// incrementally by every input-mutating method on `Function` so
    /// `output_size`/`output(i)` (§6) never need a linear scan.
    pub uses: Vec<(SsaHandle, usize)>,
    /// Non-null iff this node is a synthetic φ or trace inserted by C4/C6
    /// rather than original program code — the canonical "analysis
    /// artifact" predicate (§9). Points at the original SSA handle this
    /// node stands in for.
    pub rebuild_mapping: Option<SsaHandle>,
    /// Set true once `prune_fold` has spliced this node out, so other
    /// handles recorded in side tables (e.g. `needs_rebuild`) can be
    /// recognised as stale without reusing a freed arena slot. Dead nodes
    /// retain their slot; no handle is ever invalidated by removal.
    pub dead: bool,
}

impl SsaNode {
    #[must_use]
    pub fn new(op: Opcode, ty: Type, block: CfgHandle, inputs: Vec<Value>) -> Self {
        Self { op, ty, block, inputs, uses: Vec::new(), rebuild_mapping: None, dead: false }
    }

    /// §9: "marked by a non-null `rebuild_mapping`" is the test for "this is
    /// an analysis artifact, not original code".
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.rebuild_mapping.is_some()
    }

    #[must_use]
    pub const fn is_phi(&self) -> bool {
        matches!(self.op, Opcode::Phi)
    }

    #[must_use]
    pub const fn is_trace(&self) -> bool {
        matches!(self.op, Opcode::Trace)
    }

    #[must_use]
    pub fn input_size(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn output_size(&self) -> usize {
        self.uses.len()
    }
}
