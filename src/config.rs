//! Tunables for the fixpoint driver.

/// Configuration for a single [`crate::optimize::optimize`] invocation.
///
/// Mirrors the role of the constant-folding pass's `SCCPConfig` in the
/// compiler this optimizer was adapted from: a small, `Default`-able struct
/// the driver consults, rather than free-floating constants sprinkled
/// through the analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// Hard cap on the number of outer fixpoint iterations `optimize` will
    /// drive before giving up and returning an [`crate::error::OptimizerError::InvariantViolation`].
    /// This is a sanity backstop against a non-terminating transfer function;
    /// the real termination argument (P3) is the per-value widening counter,
    /// which always forces convergence well before this cap under the
    /// default thresholds.
    pub max_fixpoint_iterations: usize,

    /// When set, each phase name is printed via `console::style` before it runs.
    pub verbose: bool,

    /// Visit count at which a value's `bounds` are forced to `bottom(mask)`
    /// while bits are kept. Spec default: 16.
    pub widen_op_bounds: u32,

    /// Visit count at which a value's entire element is forced to
    /// `bottom(mask)`. Spec default: 24. Must be `> widen_op_bounds`.
    pub widen_op: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_fixpoint_iterations: 10_000, verbose: false, widen_op_bounds: 16, widen_op: 24 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_spec() {
        let cfg = OptimizerConfig::default();
        assert_eq!(cfg.widen_op_bounds, 16);
        assert_eq!(cfg.widen_op, 24);
        assert!(cfg.widen_op_bounds < cfg.widen_op);
    }
}
