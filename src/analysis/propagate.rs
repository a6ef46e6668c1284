// src/analysis/propagate.rs
//! The worklist dataflow engine (C3, §4.3), instantiated for the `Propagate`
//! context. `range_propagate` is the outer fixpoint driver; `queue_node`/
//! `visit_block` are shared with the jump threader (§4.6), which drives the
//! same machinery under the `JumpThread` context with a different per-node
//! visit rule (`crate::analysis::thread::jump_thread_visit`).

use crate::analysis::context::{AnalysisCtx, Context};
use crate::analysis::lattice::{Bounds, ConstraintElem, ConstraintsDef};
use crate::analysis::operators::abstract_fn;
use crate::analysis::worklist::{CfgWorklist, SsaWorklist};
use crate::config::OptimizerConfig;
use crate::ir::function::Function;
use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::Opcode;
use crate::ir::value::Value;

/// §4.3 `queue_node`: only enqueues a node whose block is already executable
/// in `ctx`.
pub fn queue_node(func: &Function, context: &Context, ssa_wl: &mut SsaWorklist, h: SsaHandle, ctx: AnalysisCtx) {
    if context.is_block_executable(func.node(h).block, ctx) {
        ssa_wl.enqueue(h);
    }
}

fn queue_uses(func: &Function, context: &Context, ssa_wl: &mut SsaWorklist, h: SsaHandle, ctx: AnalysisCtx) {
    for &(user, _) in &func.node(h).uses {
        queue_node(func, context, ssa_wl, user, ctx);
    }
}

/// §4.3, per block visited the first time under `ctx`.
pub fn visit_block(
    func: &Function,
    context: &mut Context,
    cfg_wl: &mut CfgWorklist,
    ssa_wl: &mut SsaWorklist,
    block: CfgHandle,
    ctx: AnalysisCtx,
) {
    if !context.mark_block_executable(block, ctx) {
        return;
    }
    for h in func.cfg().block(block).all() {
        ssa_wl.enqueue(h);
    }
    if func.cfg().output_size(block) == 1 {
        let succ = func.cfg().output(block, 0).expect("output_size==1 implies output(0) exists");
        context.mark_edge_executable(block, 0, ctx);
        cfg_wl.enqueue(succ);
    }
}

pub(crate) fn operand_elem(func: &Function, context: &Context, v: Value, ctx: AnalysisCtx, mask: u64) -> ConstraintElem {
    match v {
        Value::Const(c) => ConstraintElem::const_(c.as_u64(), mask),
        Value::Handle(h) => context.constraints(h, ctx).map_or(ConstraintElem::Top, ConstraintsDef::first),
    }
}

/// §4.3 `compute_constraints` for a φ's `i`-th input: `Top` unless the
/// predecessor edge feeding that input is already proven executable in
/// `ctx`, since an unexecuted predecessor contributes nothing yet.
pub(crate) fn phi_operand_elem(
    func: &Function,
    context: &Context,
    block: CfgHandle,
    idx: usize,
    v: Value,
    ctx: AnalysisCtx,
    mask: u64,
) -> ConstraintElem {
    let Some(pred) = func.cfg().predecessors(block).nth(idx) else {
        return ConstraintElem::Top;
    };
    let Some(out_idx) = func.cfg().successor_index(pred, block) else {
        return ConstraintElem::Top;
    };
    if !context.is_edge_executable(pred, out_idx, ctx) {
        return ConstraintElem::Top;
    }
    operand_elem(func, context, v, ctx, mask)
}

/// Overflow-aware carry for `Add`/`Sub`'s second result slot (§3: 2 slots
/// for these opcodes, result then carry). Exact when both operands are
/// constant, `bottom` (1-bit) otherwise — a sound, simply-computed default.
pub(crate) fn carry_elem(op: Opcode, a: ConstraintElem, b: ConstraintElem) -> ConstraintElem {
    if let (ConstraintElem::Val { bounds: ba, .. }, ConstraintElem::Val { bounds: bb, .. }) = (a, b) {
        if ba.is_const() && bb.is_const() {
            let carry = match op {
                Opcode::Add => u64::from(ba.min + bb.min > i128::from(u32::MAX)),
                Opcode::Sub => u64::from(ba.min < bb.min),
                _ => 0,
            };
            return ConstraintElem::const_(carry, 0x1);
        }
    }
    if a.is_top() || b.is_top() {
        ConstraintElem::Top
    } else {
        ConstraintElem::bottom(0x1)
    }
}

/// §4.3, per SSA visit under the `Propagate` context.
fn visit_ssa_propagate(
    func: &Function,
    context: &mut Context,
    cfg_wl: &mut CfgWorklist,
    ssa_wl: &mut SsaWorklist,
    config: &OptimizerConfig,
    h: SsaHandle,
) {
    let node = func.node(h);
    if node.dead {
        return;
    }
    if node.op == Opcode::If {
        let mask = node.ty.numeric_bitmask().max(1);
        let elem = operand_elem(func, context, node.inputs[0], AnalysisCtx::Propagate, mask);
        let block = node.block;
        if elem.is_top() {
            // Defining edge not yet executable; nothing to do.
        } else if elem.is_const() {
            let idx = elem.get_const() as usize;
            if let Some(succ) = func.cfg().output(block, idx) {
                context.mark_edge_executable(block, idx, AnalysisCtx::Propagate);
                cfg_wl.enqueue(succ);
            }
        } else {
            for (idx, succ) in func.cfg().successors(block).enumerate() {
                context.mark_edge_executable(block, idx, AnalysisCtx::Propagate);
                cfg_wl.enqueue(succ);
            }
        }
        return;
    }
    if node.op.scalar_constraint_slots() == 0 {
        return;
    }

    let mask = node.ty.numeric_bitmask();
    let size = node.ty.element_count().max(node.op.scalar_constraint_slots());
    let old = context.constraints(h, AnalysisCtx::Propagate).cloned().unwrap_or_else(|| ConstraintsDef::top(mask, size));

    let visited = context.visited_count(h);
    let input_elems: Vec<ConstraintElem> =
        node.inputs.iter().map(|&v| operand_elem(func, context, v, AnalysisCtx::Propagate, mask)).collect();

    let mut new_vec = if visited >= config.widen_op {
        vec![ConstraintElem::bottom(mask); size]
    } else if node.op == Opcode::Phi {
        let block = node.block;
        vec![
            node.inputs
                .iter()
                .enumerate()
                .map(|(i, &v)| phi_operand_elem(func, context, block, i, v, AnalysisCtx::Propagate, mask))
                .fold(ConstraintElem::Top, ConstraintElem::union_),
        ]
    } else if node.op == Opcode::Trace {
        vec![crate::analysis::trace::compute_trace_constraints(func, context, h, AnalysisCtx::Propagate)]
    } else {
        let result = abstract_fn(node.op, &input_elems, &node.ty);
        let mut v = vec![result];
        if node.op.scalar_constraint_slots() == 2 {
            v.push(carry_elem(node.op, input_elems[0], input_elems[1]));
        }
        v
    };

    if visited > config.widen_op_bounds {
        new_vec = new_vec.into_iter().map(|e| e.widen(visited, config.widen_op_bounds, config.widen_op)).collect();
    }
    let new_vec: Vec<ConstraintElem> = new_vec.into_iter().map(ConstraintElem::normalize).collect();
    let new = ConstraintsDef { mask, vec: new_vec };

    if new != old {
        context.set_constraints(h, AnalysisCtx::Propagate, new);
        let bump = if node.is_trace() { 2 } else { 1 };
        context.bump_visited_count(h, bump);
        queue_uses(func, context, ssa_wl, h, AnalysisCtx::Propagate);
    }
}

/// §2 step 1 / §4.3: drains SSA first, then CFG, seeding SSA visits; repeats
/// until both worklists are empty (a fixpoint has been reached).
///
/// # Errors
///
/// Returns [`crate::error::OptimizerError::InvariantViolation`] if the outer
/// iteration bound (`config.max_fixpoint_iterations`) is exceeded — a sanity
/// backstop, since the per-value widening counters are the real termination
/// argument (P3) and should always converge well before this cap.
pub fn range_propagate(
    func: &Function,
    context: &mut Context,
    config: &OptimizerConfig,
) -> Result<(), crate::error::OptimizerError> {
    let mut cfg_wl = CfgWorklist::new();
    let mut ssa_wl = SsaWorklist::new();
    cfg_wl.enqueue(func.cfg().entry());

    let mut iterations = 0usize;
    loop {
        let mut progressed = false;
        while let Some(h) = ssa_wl.dequeue() {
            visit_ssa_propagate(func, context, &mut cfg_wl, &mut ssa_wl, config, h);
            progressed = true;
        }
        if let Some(block) = cfg_wl.dequeue() {
            visit_block(func, context, &mut cfg_wl, &mut ssa_wl, block, AnalysisCtx::Propagate);
            progressed = true;
        }
        if !progressed {
            break;
        }
        iterations += 1;
        if iterations > config.max_fixpoint_iterations {
            return Err(crate::error::OptimizerError::InvariantViolation {
                phase: "PROPAGATE",
                detail: "fixpoint did not converge within max_fixpoint_iterations".to_string(),
            });
        }
    }
    Ok(())
}

#[must_use]
pub fn bounds_const(v: i128) -> Bounds {
    Bounds::single(v)
}
