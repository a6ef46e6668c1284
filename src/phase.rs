//! Named-phase pipeline runner.
//!
//! A host compiler may only abort the optimizer between named phases (§5);
//! within a phase the IR can be transiently inconsistent. `Phase` gives each
//! step a name for that bracketing and for `--verbose` tracing.

use console::style;

use crate::analysis::context::Context;
use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::ir::function::Function;

pub trait Phase {
    fn name(&self) -> &'static str;

    /// Runs the phase, returning whether it changed the IR.
    fn run(&mut self, func: &mut Function, context: &mut Context, config: &OptimizerConfig) -> Result<bool, OptimizerError>;
}

/// Runs `phases` in order, short-circuiting on the first error.
///
/// Returns whether any phase reported a change.
pub fn run_pipeline(
    func: &mut Function,
    context: &mut Context,
    config: &OptimizerConfig,
    phases: Vec<Box<dyn Phase>>,
) -> Result<bool, OptimizerError> {
    let mut updated = false;
    for mut phase in phases {
        if config.verbose {
            eprintln!("{} {}", style("running phase:").bold(), style(phase.name()).cyan());
        }
        updated |= phase.run(func, context, config)?;
        func.assert_valid().map_err(|detail| OptimizerError::InvariantViolation { phase: phase.name(), detail })?;
    }
    Ok(updated)
}
