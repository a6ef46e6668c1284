//! The top-level entry point (§2, §6 `optimize(ir) -> bool`).
//!
//! Wires the six analysis components into the seven named phases of §5
//! ("TRACE", "PROPAGATE", "PRUNE", "MARK SKIP", "THREAD", "FOLD",
//! "REMOVE SKIP") and drives them to a fixpoint: each full pass over the
//! pipeline may unlock further trace insertion or folding opportunities, so
//! the whole sequence repeats until a pass reports no change, matching P6
//! (idempotence modulo `updated`).

use crate::analysis::context::Context;
use crate::analysis::{prune_fold, thread, trace};
use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::ir::function::Function;
use crate::phase::{run_pipeline, Phase};

struct TracePhase;

impl Phase for TracePhase {
    fn name(&self) -> &'static str {
        "TRACE"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, _config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        trace::run_trace_insertion(func, context)
    }
}

struct PropagatePhase;

impl Phase for PropagatePhase {
    fn name(&self) -> &'static str {
        "PROPAGATE"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        crate::analysis::propagate::range_propagate(func, context, config)?;
        // Propagation only ever refines side-table constraints; the IR
        // itself is untouched until PRUNE/FOLD consume them.
        Ok(false)
    }
}

struct PrunePhase;

impl Phase for PrunePhase {
    fn name(&self) -> &'static str {
        "PRUNE"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, _config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        Ok(prune_fold::run_prune(func, context))
    }
}

struct MarkSkipPhase;

impl Phase for MarkSkipPhase {
    fn name(&self) -> &'static str {
        "MARK SKIP"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, _config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        thread::mark_skippable(func, context);
        Ok(false)
    }
}

struct ThreadPhase;

impl Phase for ThreadPhase {
    fn name(&self) -> &'static str {
        "THREAD"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, _config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        Ok(thread::run_jump_thread(func, context))
    }
}

struct FoldPhase;

impl Phase for FoldPhase {
    fn name(&self) -> &'static str {
        "FOLD"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, _config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        Ok(prune_fold::run_fold(func, context))
    }
}

struct RemoveSkipPhase;

impl Phase for RemoveSkipPhase {
    fn name(&self) -> &'static str {
        "REMOVE SKIP"
    }

    fn run(&mut self, func: &mut Function, context: &mut Context, _config: &OptimizerConfig) -> Result<bool, OptimizerError> {
        Ok(thread::remove_skippable(func, context))
    }
}

fn phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(TracePhase),
        Box::new(PropagatePhase),
        Box::new(PrunePhase),
        Box::new(MarkSkipPhase),
        Box::new(ThreadPhase),
        Box::new(FoldPhase),
        Box::new(RemoveSkipPhase),
    ]
}

/// Runs the full optimizer pipeline over `func` to a fixpoint, returning
/// whether anything changed (§6 `optimize(ir) -> bool`).
///
/// A fresh [`Context`] is allocated for this call and dropped at return
/// (§5: side tables never outlive one invocation).
///
/// # Errors
///
/// Returns [`OptimizerError::CapacityExceeded`] without mutating `func` if
/// any block exceeds the 64-successor bitset capacity (§7, S6). Returns
/// [`OptimizerError::InvariantViolation`] if a phase leaves the IR invalid
/// or a fixpoint fails to converge within `config.max_fixpoint_iterations`.
pub fn optimize(func: &mut Function, config: &OptimizerConfig) -> Result<bool, OptimizerError> {
    Context::check_capacity(func)?;

    let mut context = Context::new();
    context.resize_for(func);

    let mut updated = false;
    let mut iterations = 0usize;
    loop {
        let pass_updated = run_pipeline(func, &mut context, config, phases())?;
        updated |= pass_updated;
        if !pass_updated {
            break;
        }
        iterations += 1;
        if iterations > config.max_fixpoint_iterations {
            return Err(OptimizerError::InvariantViolation {
                phase: "PROPAGATE",
                detail: "outer phase pipeline did not converge within max_fixpoint_iterations".to_string(),
            });
        }
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FunctionBuilder;
    use crate::ir::opcode::Opcode;
    use crate::ir::types::Type;
    use crate::ir::value::Value;

    #[test]
    fn constant_branch_is_pruned_end_to_end() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let one = b.const_i32(1);
        let cond = b.op(entry, Opcode::Eq, Type::Bool, vec![one, one]);
        let then_blk = b.add_block();
        let else_blk = b.add_block();
        b.add_edge(entry, then_blk);
        b.add_edge(entry, else_blk);
        b.branch(entry, cond);
        let mut func = b.finish();

        let config = OptimizerConfig::default();
        let updated = optimize(&mut func, &config).unwrap();

        assert!(updated);
        assert_eq!(func.cfg().output_size(entry), 1);
        assert!(!func.cfg().blocks().any(|blk| blk == else_blk));
        assert!(func.assert_valid().is_ok());
    }

    #[test]
    fn capacity_violation_declines_without_mutation() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let mut succs = Vec::new();
        for _ in 0..65 {
            let blk = b.add_block();
            b.add_edge(entry, blk);
            succs.push(blk);
        }
        let mut func = b.finish();
        let before = func.clone();

        let config = OptimizerConfig::default();
        let err = optimize(&mut func, &config).unwrap_err();

        assert!(matches!(err, OptimizerError::CapacityExceeded { successors: 65, .. }));
        assert_eq!(func.cfg().output_size(entry), before.cfg().output_size(entry));
        let _ = succs;
    }

    #[test]
    fn idempotent_second_run_reports_no_change() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.entry();
        let x = b.param(entry, Type::I32);
        let k = b.const_i32(10);
        let lt = b.op(entry, Opcode::Lt, Type::Bool, vec![Value::Handle(x), k]);
        let then_blk = b.add_block();
        let else_blk = b.add_block();
        b.add_edge(entry, then_blk);
        b.add_edge(entry, else_blk);
        b.branch(entry, lt);
        let mut func = b.finish();

        let config = OptimizerConfig::default();
        optimize(&mut func, &config).unwrap();
        let second = optimize(&mut func, &config).unwrap();
        assert!(!second);
    }
}
