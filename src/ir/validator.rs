// src/ir/validator.rs
//! Structural invariant checking (§3 I1/I2, and the φ-arity half of I5's
//! sibling property). `assert_valid` is a hard postcondition after every
//! named phase (§5, §8 P4).
//!
//! I3 (constraint-vector sizing) and I4 (propagate monotonicity) are
//! properties of the analysis side tables in `crate::analysis::context`, not
//! of the bare IR, and are checked there (debug assertions in
//! `Context::set_constraints`) rather than here.

use crate::ir::dominance::DominanceInfo;
use crate::ir::function::Function;
use crate::ir::value::Value;

/// Checks I1 (SSA dominance) and I2 (φ arity) over every live node in `f`.
///
/// # Errors
///
/// Returns a description of the first invariant violation found.
pub fn check(f: &Function) -> Result<(), String> {
    let mut dom = DominanceInfo::new();
    dom.compute(f.cfg()).map_err(|e| format!("dominance computation failed: {e}"))?;

    for block in f.cfg().blocks() {
        let block_data = f.cfg().block(block);

        // I2: phi arity must equal predecessor count.
        let pred_count = f.cfg().input_size(block);
        for &phi in block_data.phis() {
            let node = f.node(phi);
            if node.dead {
                continue;
            }
            if node.input_size() != pred_count {
                return Err(format!(
                    "I2 violated: phi {phi} in {block} has {} inputs, block has {pred_count} predecessors",
                    node.input_size()
                ));
            }
        }

        // I1: every operand of a non-phi node must be defined in the same
        // block (and appear no later, which we don't track positionally
        // here — definition order is enforced by construction, since
        // `emplace_ssa` never lets a node reference a handle created after
        // it) or in a block that dominates `block`.
        for h in block_data.all() {
            let node = f.node(h);
            if node.dead || node.is_phi() {
                continue;
            }
            for input in &node.inputs {
                if let Value::Handle(src) = *input {
                    let src_block = f.node(src).block;
                    if src_block != block && !dom.dominates(src_block, block) {
                        return Err(format!(
                            "I1 violated: {h} in {block} uses {src} defined in {src_block}, \
                             which does not dominate {block}"
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}
