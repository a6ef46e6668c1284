// src/analysis/thread.rs
//! Skippable marking and the jump threader (C6, §4.6).
//!
//! Reuses the `Propagate` context's visit machinery
//! (`crate::analysis::propagate`) under the `JumpThread` selector: the same
//! worklist, the same `operand_elem`/`carry_elem` helpers, the same trace
//! constraint computation, just reading and writing the other half of each
//! side table.

use crate::analysis::context::{AnalysisCtx, Context};
use crate::analysis::lattice::{ConstraintElem, ConstraintsDef};
use crate::analysis::operators::abstract_fn;
use crate::analysis::propagate::{carry_elem, operand_elem, phi_operand_elem};
use crate::analysis::trace::compute_trace_constraints;
use crate::analysis::worklist::SsaWorklist;
use crate::ir::function::Function;
use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::Opcode;
use crate::ir::value::Value;

/// §4.6 "mark skippable": every SSA node in the block is either a rebuild
/// artifact (`rebuild_mapping` set) or every one of its uses stays local to
/// the block or lands on a `Trace`.
fn block_is_skippable(func: &Function, block: CfgHandle) -> bool {
    func.cfg().block(block).all().all(|h| {
        let node = func.node(h);
        if node.is_synthetic() {
            return true;
        }
        node.uses.iter().all(|&(user, _)| {
            let user_node = func.node(user);
            user_node.block == block || user_node.op == Opcode::Trace
        })
    })
}

/// §4.6 step one: classify every block's `skippable` flag.
pub fn mark_skippable(func: &Function, context: &mut Context) {
    for block in func.cfg().blocks().collect::<Vec<_>>() {
        let skippable = block_is_skippable(func, block);
        context.set_skippable(block, skippable);
    }
}

/// Walks an edge backwards through skippable single-in/single-out blocks
/// until reaching a two-output block, returning `(origin, origin_branch_i)`.
fn find_origin(func: &Function, context: &Context, mut block: CfgHandle) -> Option<(CfgHandle, usize)> {
    loop {
        if let Some(pred) = func.cfg().input(block, 0) {
            if func.cfg().output_size(pred) == 2 {
                let idx = func.cfg().successor_index(pred, block)?;
                return Some((pred, idx));
            }
            if func.cfg().input_size(block) == 1 && context.is_skippable(block) {
                block = pred;
                continue;
            }
        }
        return None;
    }
}

/// §4.6 step 3, per-SSA visit under `JumpThread`: recompute the constraint,
/// normalize, and if changed mark `touched` and requeue users. Shares the
/// opcode dispatch of `propagate::visit_ssa_propagate` but never touches the
/// CFG worklist — the forward walk in `walk_thread` drives block-to-block
/// movement itself.
fn jump_thread_visit(func: &Function, context: &mut Context, ssa_wl: &mut SsaWorklist, h: SsaHandle) {
    let node = func.node(h);
    if node.dead || node.op == Opcode::If || node.op.scalar_constraint_slots() == 0 {
        return;
    }

    let mask = node.ty.numeric_bitmask();
    let size = node.ty.element_count().max(node.op.scalar_constraint_slots());
    let old = context.constraints(h, AnalysisCtx::JumpThread).cloned().unwrap_or_else(|| ConstraintsDef::top(mask, size));

    let input_elems: Vec<ConstraintElem> =
        node.inputs.iter().map(|&v| operand_elem(func, context, v, AnalysisCtx::JumpThread, mask)).collect();

    let new_vec = if node.op == Opcode::Phi {
        let block = node.block;
        vec![
            node.inputs
                .iter()
                .enumerate()
                .map(|(i, &v)| phi_operand_elem(func, context, block, i, v, AnalysisCtx::JumpThread, mask))
                .fold(ConstraintElem::Top, ConstraintElem::union_),
        ]
    } else if node.op == Opcode::Trace {
        vec![compute_trace_constraints(func, context, h, AnalysisCtx::JumpThread)]
    } else {
        let result = abstract_fn(node.op, &input_elems, &node.ty);
        let mut v = vec![result];
        if node.op.scalar_constraint_slots() == 2 {
            v.push(carry_elem(node.op, input_elems[0], input_elems[1]));
        }
        v
    };
    let new_vec: Vec<ConstraintElem> = new_vec.into_iter().map(ConstraintElem::normalize).collect();
    let new = ConstraintsDef { mask, vec: new_vec };

    if new != old {
        context.set_constraints(h, AnalysisCtx::JumpThread, new);
        context.set_touched(h, true);
        for &(user, _) in &node.uses {
            ssa_wl.enqueue(user);
        }
    }
}

/// If `block` has two outputs and its branch condition is now a concrete
/// constant under `JumpThread`, the index of the forced next edge.
fn target_branch_index(func: &Function, context: &Context, block: CfgHandle) -> Option<usize> {
    if func.cfg().output_size(block) != 2 {
        return None;
    }
    let branch = func.cfg().block(block).last_daisy()?;
    if func.node(branch).op != Opcode::If {
        return None;
    }
    let mask = func.node(branch).ty.numeric_bitmask().max(1);
    let elem = operand_elem(func, context, func.node(branch).inputs[0], AnalysisCtx::JumpThread, mask);
    elem.is_const().then(|| elem.get_const() as usize)
}

/// §4.6 steps 1-4: `run_jump_thread(origin, origin_branch_i)`. Returns the
/// chain of blocks visited (path[0] == origin) and how many branches were
/// forced along the way.
fn walk_thread(func: &Function, context: &mut Context, origin: CfgHandle, origin_branch_i: usize) -> (Vec<CfgHandle>, usize) {
    context.reset_jump_thread_state();
    context.mark_block_executable(origin, AnalysisCtx::JumpThread);

    let mut path = vec![origin];
    let mut branch_i = origin_branch_i;
    let mut branches_skipped = 0usize;
    let mut current = origin;

    loop {
        let Some(target) = func.cfg().output(current, branch_i) else { break };
        if context.is_block_executable(target, AnalysisCtx::JumpThread) {
            break; // loop back to an already-visited block
        }
        if !context.is_skippable(target) || func.cfg().output_size(target) == 0 {
            break;
        }

        let pred_idx = func.cfg().predecessor_index(target, current).unwrap_or(0);
        context.set_input_taken(target, Some(pred_idx));
        context.mark_block_executable(target, AnalysisCtx::JumpThread);
        path.push(target);

        let mut ssa_wl = SsaWorklist::new();
        for h in func.cfg().block(target).phis() {
            ssa_wl.enqueue(*h);
        }
        for h in func.cfg().block(target).all() {
            if context.touched(h) {
                ssa_wl.enqueue(h);
            }
        }
        while let Some(h) = ssa_wl.dequeue() {
            jump_thread_visit(func, context, &mut ssa_wl, h);
        }

        match target_branch_index(func, context, target) {
            Some(idx) => {
                branches_skipped += 1;
                branch_i = idx;
                current = target;
            }
            None => break,
        }
    }

    (path, branches_skipped)
}

/// §4.6 "when `end` contains φs, the new edge contributes a value computed
/// by walking the threaded path backwards": follows `input_taken` from
/// `phi`'s defining block, stopping at a constant, at a φ outside the
/// threaded region, or at `origin`, and resolving `rebuild_mapping` along
/// the way.
fn resolve_phi_value(func: &Function, context: &Context, origin: CfgHandle, phi: SsaHandle) -> Value {
    let mut current = phi;
    loop {
        let node = func.node(current);
        if !node.is_phi() {
            return Value::Handle(current);
        }
        let block = node.block;
        if block == origin || !context.is_block_executable(block, AnalysisCtx::JumpThread) {
            return Value::Handle(current);
        }
        let Some(idx) = context.input_taken(block) else {
            return Value::Handle(current);
        };
        let Some(&input) = node.inputs.get(idx) else {
            return Value::Handle(current);
        };
        match input {
            Value::Const(_) => return input,
            Value::Handle(h) => {
                current = func.node(h).rebuild_mapping.unwrap_or(h);
            }
        }
    }
}

/// §4.6: add the reconciling input to every φ in `end` for the new `trace ->
/// end` edge.
fn reconcile_phis(func: &mut Function, context: &Context, origin: CfgHandle, end: CfgHandle) {
    for phi in func.cfg().block(end).phis().to_vec() {
        let value = resolve_phi_value(func, context, origin, phi);
        func.link_append_input(phi, value);
    }
}

/// §4.6 end to end: marks skippable blocks, then for every conditional
/// join/test target and predecessor edge, tries threading the chain of
/// skippable blocks leading into it. Returns whether any thread was added.
pub fn run_jump_thread(func: &mut Function, context: &mut Context) -> bool {
    mark_skippable(func, context);

    let mut threaded_jumps: Vec<CfgHandle> = Vec::new();
    let targets: Vec<CfgHandle> = func.cfg().blocks().filter(|&b| func.cfg().output_size(b) >= 2).collect();

    for target in targets {
        let preds: Vec<CfgHandle> = func.cfg().predecessors(target).collect();
        for pred in preds {
            let Some((origin, origin_branch_i)) = find_origin(func, context, pred) else { continue };
            let (path, branches_skipped) = walk_thread(func, context, origin, origin_branch_i);
            if branches_skipped == 0 {
                continue;
            }
            let end = *path.last().expect("walk_thread always visits origin");
            let Some(trace_block) = func.cfg().output(origin, origin_branch_i) else { continue };

            func.cfg_mut().add_edge(trace_block, end);
            reconcile_phis(func, context, origin, end);
            threaded_jumps.push(trace_block);
        }
    }

    let any = !threaded_jumps.is_empty();
    for trace_block in threaded_jumps {
        if let Some(old_succ) = func.cfg().output(trace_block, 0) {
            func.cfg_mut().remove_edge(trace_block, old_succ);
            if func.cfg().input_size(old_succ) == 0 {
                func.prune_cfg(old_succ);
            }
        }
    }
    any
}

/// §4.6 "remove skippable": splices out every block that is `skippable`,
/// single-input, single-output, replacing its synthetic nodes' remaining
/// uses with their `rebuild_mapping` target before pruning and merging.
pub fn remove_skippable(func: &mut Function, context: &Context) -> bool {
    let mut updated = false;
    let candidates: Vec<CfgHandle> = func
        .cfg()
        .blocks()
        .filter(|&b| context.is_skippable(b) && func.cfg().input_size(b) == 1 && func.cfg().output_size(b) == 1)
        .collect();

    for block in candidates {
        if !func.cfg().blocks().any(|b| b == block) {
            continue;
        }
        for h in func.cfg().block(block).all().collect::<Vec<_>>() {
            if let Some(mapping) = func.node(h).rebuild_mapping {
                func.replace_with(h, Value::Handle(mapping));
            }
        }
        for h in func.cfg().block(block).all().collect::<Vec<_>>() {
            func.prune_ssa(h);
        }
        func.merge_edge(block);
        updated = true;
    }
    updated
}
