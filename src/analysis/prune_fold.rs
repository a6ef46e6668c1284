// src/analysis/prune_fold.rs
//! Prune & fold (C5, §4.5): branch resolution, dead block removal, constant
//! folding, and comparison-chain simplification. Runs after a `Propagate`
//! fixpoint, in that order — each step assumes the previous one already ran
//! so constant operands are literal `Value::Const`s by the time comparison
//! simplification looks at them.

use crate::analysis::context::{AnalysisCtx, Context};
use crate::ir::function::Function;
use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::Opcode;
use crate::ir::types::Type;
use crate::ir::value::{ConstValue, Value};

fn taken_branch(func: &Function, context: &Context, branch: SsaHandle) -> Option<usize> {
    match func.node(branch).inputs[0] {
        Value::Const(c) => Some(c.as_u64() as usize),
        Value::Handle(h) => {
            let elem = context.constraints(h, AnalysisCtx::Propagate)?.first();
            elem.is_const().then(|| elem.get_const() as usize)
        }
    }
}

/// Removes the `If` node and its non-taken out-edge from every two-way
/// block whose condition is now statically determined.
fn resolve_branches(func: &mut Function, context: &Context) -> bool {
    let mut updated = false;
    for block in func.cfg().blocks().collect::<Vec<_>>() {
        if func.cfg().output_size(block) != 2 {
            continue;
        }
        let Some(branch) = func.cfg().block(block).last_daisy() else { continue };
        if func.node(branch).op != Opcode::If {
            continue;
        }
        let Some(taken) = taken_branch(func, context, branch) else { continue };
        let prune_idx = 1 - taken;
        let Some(prune_succ) = func.cfg().output(block, prune_idx) else { continue };
        func.cfg_mut().remove_edge(block, prune_succ);
        func.prune_ssa(branch);
        updated = true;
    }
    updated
}

/// §4.5 "any block with `executable[PROPAGATE] == false` is removed by
/// `prune_cfg`". Re-checks liveness before each removal since an earlier
/// cascade may already have taken a later candidate with it.
fn remove_dead_blocks(func: &mut Function, context: &Context) -> bool {
    let mut updated = false;
    let candidates: Vec<CfgHandle> =
        func.cfg().blocks().filter(|&b| !context.is_block_executable(b, AnalysisCtx::Propagate)).collect();
    for block in candidates {
        if func.cfg().blocks().any(|b| b == block) {
            func.prune_cfg(block);
            updated = true;
        }
    }
    updated
}

fn const_value_for(ty: &Type, bits: u64) -> ConstValue {
    match ty {
        Type::I8 => ConstValue::I8(bits as u8 as i8),
        Type::I16 => ConstValue::I16(bits as u16 as i16),
        Type::I32 => ConstValue::I32(bits as u32 as i32),
        Type::I64 => ConstValue::I64(bits as i64),
        Type::U8 => ConstValue::U8(bits as u8),
        Type::U16 => ConstValue::U16(bits as u16),
        Type::U32 => ConstValue::U32(bits as u32),
        Type::U64 => ConstValue::U64(bits),
        Type::Bool => ConstValue::Bool(bits != 0),
        Type::Array(..) => unreachable!("array types never reach constant folding: not numeric"),
    }
}

/// Replaces every numeric, used SSA node whose first constraint is constant
/// with that literal.
fn fold_constants(func: &mut Function, context: &Context) -> bool {
    let mut updated = false;
    for h in func.ssa_handles().collect::<Vec<_>>() {
        let (dead, numeric, has_uses, ty) = {
            let node = func.node(h);
            (node.dead, node.ty.is_numeric(), !node.uses.is_empty(), node.ty.clone())
        };
        if dead || !numeric || !has_uses {
            continue;
        }
        let Some(cdef) = context.constraints(h, AnalysisCtx::Propagate) else { continue };
        let elem = cdef.first();
        if !elem.is_const() {
            continue;
        }
        let value = const_value_for(&ty, elem.get_const());
        func.replace_with(h, Value::Const(value));
        func.prune_ssa(h);
        updated = true;
    }
    updated
}

/// §4.5 "EQ/NEQ take operands in pairs; remove any pair whose operands are
/// both known-constant and whose equality matches the opcode sense."
fn simplify_eq_neq(func: &mut Function) -> bool {
    let mut updated = false;
    for h in func.ssa_handles().collect::<Vec<_>>() {
        let (op, dead) = {
            let node = func.node(h);
            (node.op, node.dead)
        };
        if dead || !matches!(op, Opcode::Eq | Opcode::Neq) {
            continue;
        }
        loop {
            let inputs = func.node(h).inputs.clone();
            let mut trivial_pair = None;
            for pair_start in (0..inputs.len()).step_by(2) {
                if pair_start + 1 >= inputs.len() {
                    break;
                }
                if let (Value::Const(a), Value::Const(b)) = (inputs[pair_start], inputs[pair_start + 1]) {
                    let equal = a.as_u64() == b.as_u64();
                    let matches_sense = if op == Opcode::Eq { equal } else { !equal };
                    if matches_sense {
                        trivial_pair = Some(pair_start);
                        break;
                    }
                }
            }
            let Some(idx) = trivial_pair else { break };
            // Two removals at the same index: the second slides the former
            // idx+1 down into idx's place.
            func.link_remove_input(h, idx);
            func.link_remove_input(h, idx);
            updated = true;
        }
    }
    updated
}

/// §4.5 "while the last two operands are both constant and equal, shrink
/// inputs by one."
fn simplify_lt_lte(func: &mut Function) -> bool {
    let mut updated = false;
    for h in func.ssa_handles().collect::<Vec<_>>() {
        let (op, dead) = {
            let node = func.node(h);
            (node.op, node.dead)
        };
        if dead || !matches!(op, Opcode::Lt | Opcode::Lte) {
            continue;
        }
        loop {
            let inputs = func.node(h).inputs.clone();
            if inputs.len() < 2 {
                break;
            }
            let (a, b) = (inputs[inputs.len() - 2], inputs[inputs.len() - 1]);
            let Value::Const(ca) = a else { break };
            let Value::Const(cb) = b else { break };
            if ca.as_u64() != cb.as_u64() {
                break;
            }
            func.link_shrink_inputs(h, inputs.len() - 1);
            updated = true;
        }
    }
    updated
}

/// The "PRUNE" phase: branch resolution plus dead-block removal.
#[must_use]
pub fn run_prune(func: &mut Function, context: &Context) -> bool {
    let mut updated = resolve_branches(func, context);
    updated |= remove_dead_blocks(func, context);
    updated
}

/// The "FOLD" phase: constant folding plus comparison-chain simplification.
#[must_use]
pub fn run_fold(func: &mut Function, context: &Context) -> bool {
    let mut updated = fold_constants(func, context);
    updated |= simplify_eq_neq(func);
    updated |= simplify_lt_lte(func);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lattice::ConstraintsDef;
    use crate::ir::builder::FunctionBuilder;

    #[test]
    fn constant_branch_removes_dead_side() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let then_blk = b.add_block();
        let else_blk = b.add_block();
        b.add_edge(entry, then_blk);
        b.add_edge(entry, else_blk);
        let cond = b.param(entry, Type::Bool);
        b.branch(entry, cond);
        let mut func = b.finish();

        let mut context = Context::new();
        context.resize_for(&func);
        context.mark_block_executable(entry, AnalysisCtx::Propagate);
        context.mark_block_executable(then_blk, AnalysisCtx::Propagate);
        context.set_constraints(cond, AnalysisCtx::Propagate, ConstraintsDef { mask: 0x1, vec: vec![crate::analysis::lattice::ConstraintElem::const_(0, 0x1)] });

        let updated = run_prune(&mut func, &context) | run_fold(&mut func, &context);
        assert!(updated);
        assert_eq!(func.cfg().output_size(entry), 1);
        assert_eq!(func.cfg().output(entry, 0), Some(then_blk));
        assert!(!func.cfg().blocks().any(|b| b == else_blk));
    }

    #[test]
    fn eq_chain_drops_trivial_pair() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let k1 = b.const_i32(5);
        let k2 = b.const_i32(5);
        let x = b.param(entry, Type::I32);
        let y = b.param(entry, Type::I32);
        let eq = b.op(entry, Opcode::Eq, Type::Bool, vec![k1, k2, Value::Handle(x), Value::Handle(y)]);
        // give it a use so it's not pruned as dead before we inspect it
        b.op(entry, Opcode::Trace, Type::Bool, vec![Value::Handle(eq)]);
        let mut func = b.finish();

        simplify_eq_neq(&mut func);
        assert_eq!(func.node(eq).inputs.len(), 2);
    }

    #[test]
    fn lt_chain_shrinks_trivial_tail() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let x = b.param(entry, Type::I32);
        let k = b.const_i32(10);
        let lt = b.op(entry, Opcode::Lt, Type::Bool, vec![Value::Handle(x), k, k]);
        b.op(entry, Opcode::Trace, Type::Bool, vec![Value::Handle(lt)]);
        let mut func = b.finish();

        simplify_lt_lte(&mut func);
        assert_eq!(func.node(lt).inputs.len(), 2);
    }
}
