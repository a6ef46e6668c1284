// src/analysis/trace.rs
//! Trace insertion and on-demand SSA rebuild (C4, §4.4).
//!
//! Splits both outgoing edges of every two-way `If` block and materializes
//! the taken-branch assumption as a synthetic `SSA_trace` node, then
//! redirects downstream uses of the traced value to read the trace (or a
//! freshly reconstructed φ) instead of the raw value.

use std::collections::HashSet;

use crate::analysis::context::{AnalysisCtx, Context};
use crate::analysis::lattice::ConstraintElem;
use crate::analysis::operators::narrow_fn;
use crate::analysis::propagate::operand_elem;
use crate::error::OptimizerError;
use crate::ir::function::Function;
use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::{OpFlags, Opcode};
use crate::ir::value::{ConstValue, Value};

/// §4.4.2 `insert_trace(block, orig, parent, arg_i)`.
#[allow(clippy::too_many_arguments)]
fn insert_trace(
    func: &mut Function,
    context: &mut Context,
    needs_rebuild: &mut HashSet<SsaHandle>,
    block: CfgHandle,
    orig: SsaHandle,
    parent: Value,
    arg_i: usize,
) {
    if let Some(&existing) = context.rebuild_map(block).get(&orig) {
        if parent != Value::Handle(existing) {
            func.link_append_input(existing, parent);
            func.link_append_input(existing, Value::Const(ConstValue::U64(arg_i as u64)));
        }
        return;
    }

    let ty = func.node(orig).ty.clone();
    let trace = func.emplace_ssa(Opcode::Trace, ty, block, vec![Value::Handle(orig), parent]);
    context.resize_for(func);
    func.node_mut(trace).rebuild_mapping = Some(orig);
    context.rebuild_map_mut(block).insert(orig, trace);

    if matches!(parent, Value::Handle(_)) {
        func.link_append_input(trace, Value::Const(ConstValue::U64(arg_i as u64)));
    }

    needs_rebuild.insert(orig);

    let op = func.node(orig).op;
    if op.flags().contains(OpFlags::TRACE_INPUTS) {
        let operands = func.node(orig).inputs.clone();
        for (j, operand) in operands.into_iter().enumerate() {
            if let Value::Handle(h) = operand {
                insert_trace(func, context, needs_rebuild, block, h, Value::Handle(trace), j);
            }
        }
    }
}

/// §4.4.3 `compute_trace_constraints(trace)`. Invoked from the main
/// propagate visit (`crate::analysis::propagate`) whenever a `Trace` node is
/// revisited, so it always reads the other operands' *current* `Propagate`
/// constraints.
#[must_use]
pub fn compute_trace_constraints(func: &Function, context: &Context, trace: SsaHandle, ctx: AnalysisCtx) -> ConstraintElem {
    let node = func.node(trace);
    debug_assert_eq!(node.op, Opcode::Trace);
    let mask = node.ty.numeric_bitmask();

    if node.inputs.len() == 2 {
        return match node.inputs[1] {
            Value::Const(c) => ConstraintElem::const_(c.as_u64(), mask),
            Value::Handle(_) => ConstraintElem::bottom(mask),
        };
    }

    let mut acc = ConstraintElem::bottom(mask);
    for pair in node.inputs[1..].chunks(2) {
        let [parent_val, arg_i_val] = pair else { continue };
        let (Value::Handle(parent_trace), Value::Const(arg_i_const)) = (*parent_val, *arg_i_val) else { continue };
        let arg_i = arg_i_const.as_u64() as usize;

        let Some(parent_original) = func.node(parent_trace).inputs.first().and_then(|v| v.as_handle()) else {
            continue;
        };
        let parent_op = func.node(parent_original).op;
        let parent_ty = func.node(parent_original).ty.clone();
        // `narrow_fn` narrows *operand* constraints, so it needs the
        // operands' own type, not the node's result type — the two
        // coincide for arithmetic ops but not for comparisons, whose
        // operands are never `Bool`.
        let operand_ty = func
            .node(parent_original)
            .inputs
            .iter()
            .find_map(|v| v.as_handle())
            .map_or_else(|| parent_ty.clone(), |h| func.node(h).ty.clone());
        let operand_mask = operand_ty.numeric_bitmask();

        let mut input_constraints: Vec<ConstraintElem> = func
            .node(parent_original)
            .inputs
            .iter()
            .map(|&v| operand_elem(func, context, v, ctx, operand_mask))
            .collect();

        let refinement = context.constraints(parent_trace, ctx).map_or(ConstraintElem::Top, |c| c.first());
        narrow_fn(parent_op, &mut input_constraints, refinement, &operand_ty);

        if let Some(&refined) = input_constraints.get(arg_i) {
            acc = acc.intersect(refined);
        }
    }

    let prev = context.constraints(trace, ctx).map_or(ConstraintElem::Top, |c| c.first());
    prev.union_(acc)
}

/// The block a use's operand `idx` is evaluated "from", for `local_lookup`
/// purposes: a φ's `i`-th input is read as seen from the block's `i`-th
/// predecessor; every other node's operands are read from the node's own
/// block.
fn input_block(func: &Function, user: SsaHandle, idx: usize) -> CfgHandle {
    let node = func.node(user);
    if node.is_phi() { func.cfg().predecessors(node.block).nth(idx).unwrap_or(node.block) } else { node.block }
}

/// §4.4.4 `local_lookup(block, v)`: on-demand SSA reconstruction (Braun et
/// al.), with the cycle-breaking pre-registration of step 5.
fn local_lookup(func: &mut Function, context: &mut Context, block: CfgHandle, v: SsaHandle) -> Result<SsaHandle, OptimizerError> {
    if func.node(v).block == block {
        return Ok(v);
    }
    if let Some(&existing) = context.rebuild_map(block).get(&v) {
        return Ok(existing);
    }
    let preds: Vec<CfgHandle> = func.cfg().predecessors(block).collect();
    match preds.len() {
        0 => Err(OptimizerError::InvariantViolation {
            phase: "TRACE",
            detail: format!("local_lookup reached block {block} with no predecessors while resolving {v}"),
        }),
        1 => local_lookup(func, context, preds[0], v),
        _ => {
            let ty = func.node(v).ty.clone();
            let phi = func.emplace_ssa(Opcode::Phi, ty, block, Vec::new());
            context.resize_for(func);
            // Pre-register before recursing: breaks cycles through back-edges.
            context.rebuild_map_mut(block).insert(v, phi);
            func.node_mut(phi).rebuild_mapping = Some(v);
            for pred in preds {
                let resolved = local_lookup(func, context, pred, v)?;
                func.link_append_input(phi, Value::Handle(resolved));
            }
            Ok(phi)
        }
    }
}

/// §4.4.4: redirect every downstream use of `h` to `rebuild_mapping(h)` (or
/// `h` itself if untraced), reconstructing φs on demand as needed. Skips the
/// trace node's own canonical reference to its original value (input 0),
/// which must never be rewritten onto itself.
fn rebuild_uses(func: &mut Function, context: &mut Context, h: SsaHandle) -> Result<(), OptimizerError> {
    let look_for = func.node(h).rebuild_mapping.unwrap_or(h);
    let uses: Vec<(SsaHandle, usize)> = func.node(h).uses.clone();
    for (user, idx) in uses {
        if user == h {
            continue;
        }
        if func.node(user).op == Opcode::Trace && idx == 0 {
            continue;
        }
        let from_block = input_block(func, user, idx);
        let resolved = local_lookup(func, context, from_block, look_for)?;
        if resolved != h {
            func.link_change_input(user, idx, Value::Handle(resolved));
        }
    }
    Ok(())
}

/// §4.4.1 + §4.4.2 + §4.4.4 end to end: splits every two-way `If` block's
/// outgoing edges, builds the trace graph on each split block, and rewires
/// downstream uses. Returns whether any trace was inserted.
///
/// # Errors
///
/// Returns [`OptimizerError::InvariantViolation`] if SSA reconstruction hits
/// a block with no predecessors (a malformed CFG).
pub fn run_trace_insertion(func: &mut Function, context: &mut Context) -> Result<bool, OptimizerError> {
    let mut needs_rebuild: HashSet<SsaHandle> = HashSet::new();
    let candidate_blocks: Vec<CfgHandle> = func.cfg().blocks().collect();

    for block in candidate_blocks {
        if func.cfg().output_size(block) != 2 {
            continue;
        }
        let Some(branch) = func.cfg().block(block).last_daisy() else { continue };
        if func.node(branch).op != Opcode::If {
            continue;
        }
        let Value::Handle(cond) = func.node(branch).inputs[0] else { continue };

        for i in 0..2 {
            let Some(orig_succ) = func.cfg().output(block, i) else { continue };
            let t_i = func.split_edge(block, orig_succ);
            context.resize_for(func);
            insert_trace(func, context, &mut needs_rebuild, t_i, cond, Value::Const(ConstValue::U64(i as u64)), 0);
        }
    }

    let any_inserted = !needs_rebuild.is_empty();
    for h in needs_rebuild {
        rebuild_uses(func, context, h)?;
    }
    Ok(any_inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FunctionBuilder;
    use crate::ir::types::Type;

    #[test]
    fn if_block_splits_into_two_trace_blocks() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let t = b.param(entry, Type::Bool);
        let then_blk = b.add_block();
        let else_blk = b.add_block();
        b.add_edge(entry, then_blk);
        b.add_edge(entry, else_blk);
        b.branch(entry, t);
        let mut func = b.finish();
        let mut context = Context::new();
        context.resize_for(&func);

        let updated = run_trace_insertion(&mut func, &mut context).unwrap();
        assert!(updated);
        assert_eq!(func.cfg().output_size(entry), 2);
        for succ in func.cfg().successors(entry).collect::<Vec<_>>() {
            assert_eq!(func.cfg().input_size(succ), 1);
            assert_eq!(func.cfg().output_size(succ), 1);
            let trace = func.cfg().block(succ).all().find(|&h| func.node(h).op == Opcode::Trace);
            assert!(trace.is_some());
        }
    }

    #[test]
    fn root_trace_constraint_is_branch_constant() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let t = b.param(entry, Type::Bool);
        let then_blk = b.add_block();
        let else_blk = b.add_block();
        b.add_edge(entry, then_blk);
        b.add_edge(entry, else_blk);
        b.branch(entry, t);
        let mut func = b.finish();
        let mut context = Context::new();
        context.resize_for(&func);
        run_trace_insertion(&mut func, &mut context).unwrap();

        let then_succ = func.cfg().output(entry, 0).unwrap();
        let trace = func.cfg().block(then_succ).all().find(|&h| func.node(h).op == Opcode::Trace).unwrap();
        let elem = compute_trace_constraints(&func, &context, trace, AnalysisCtx::Propagate);
        assert!(elem.is_const());
        assert_eq!(elem.get_const(), 0);
    }
}
