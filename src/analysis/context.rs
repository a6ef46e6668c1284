// src/analysis/context.rs
//! Per-CFG and per-SSA analysis side tables (§3), and the two analysis
//! contexts (`PROPAGATE`, `JUMP_THREAD`) that share them via a selector
//! rather than two cloned analysis objects (§9).

use std::collections::HashMap;

use crate::analysis::lattice::ConstraintsDef;
use crate::error::OptimizerError;
use crate::ir::function::Function;
use crate::ir::handle::{CfgHandle, SsaHandle};

/// Maximum successor count an `output_executable` bitset can represent
/// (§3, §7).
pub const MAX_SUCCESSORS: usize = 64;

/// Which of the two analysis walks a side-table slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisCtx {
    Propagate = 0,
    JumpThread = 1,
}

impl AnalysisCtx {
    const fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct CfgAiData {
    /// Bitset over outgoing edges, one bit per successor index, per context.
    pub output_executable: [u64; 2],
    pub executable: [bool; 2],
    /// Scratch: which incoming edge index was taken on the current thread walk.
    pub input_taken: Option<usize>,
    /// Original SSA handle -> substitute valid inside this block (§3).
    pub rebuild_map: HashMap<SsaHandle, SsaHandle>,
    /// §4.6: true once `mark_skippable` has classified this block.
    pub skippable: bool,
}

#[derive(Debug, Clone)]
pub struct SsaAiData {
    pub constraints: [Option<ConstraintsDef>; 2],
    pub visited_count: u32,
    pub touched: bool,
}

impl Default for SsaAiData {
    fn default() -> Self {
        Self { constraints: [None, None], visited_count: 0, touched: false }
    }
}

/// Owns every side table for one `optimize()` invocation. Scoped to that
/// invocation and dropped at its end (§5): no side table outlives one call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cfg_data: Vec<CfgAiData>,
    ssa_data: Vec<SsaAiData>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grows both side tables to cover every handle currently live in
    /// `func`. Must be called after *any* mutation that creates a new CFG
    /// block or SSA node, before that handle (or any later one) is
    /// dereferenced again (§5, §9).
    pub fn resize_for(&mut self, func: &Function) {
        let cfg_len = func.cfg().blocks().map(|h| h.node_index().index() + 1).max().unwrap_or(0);
        if self.cfg_data.len() < cfg_len {
            self.cfg_data.resize(cfg_len, CfgAiData::default());
        }
        if self.ssa_data.len() < func.ssa_len() {
            self.ssa_data.resize(func.ssa_len(), SsaAiData::default());
        }
    }

    /// §7 capacity check: run before any mutation; declines to optimize if
    /// any block exceeds the representable successor count.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::CapacityExceeded`] naming the first
    /// offending block.
    pub fn check_capacity(func: &Function) -> Result<(), OptimizerError> {
        for block in func.cfg().blocks() {
            let successors = func.cfg().output_size(block);
            if successors > MAX_SUCCESSORS {
                return Err(OptimizerError::CapacityExceeded { block, successors });
            }
        }
        Ok(())
    }

    fn cfg(&self, h: CfgHandle) -> &CfgAiData {
        &self.cfg_data[h.node_index().index()]
    }

    fn cfg_mut(&mut self, h: CfgHandle) -> &mut CfgAiData {
        &mut self.cfg_data[h.node_index().index()]
    }

    #[must_use]
    pub fn is_block_executable(&self, h: CfgHandle, ctx: AnalysisCtx) -> bool {
        self.cfg(h).executable[ctx.idx()]
    }

    pub fn mark_block_executable(&mut self, h: CfgHandle, ctx: AnalysisCtx) -> bool {
        let entry = &mut self.cfg_mut(h).executable[ctx.idx()];
        if *entry {
            false
        } else {
            *entry = true;
            true
        }
    }

    #[must_use]
    pub fn is_edge_executable(&self, h: CfgHandle, out_idx: usize, ctx: AnalysisCtx) -> bool {
        self.cfg(h).output_executable[ctx.idx()] & (1 << out_idx) != 0
    }

    /// Returns `true` if the edge was newly marked.
    pub fn mark_edge_executable(&mut self, h: CfgHandle, out_idx: usize, ctx: AnalysisCtx) -> bool {
        let bit = 1u64 << out_idx;
        let slot = &mut self.cfg_mut(h).output_executable[ctx.idx()];
        if *slot & bit != 0 {
            false
        } else {
            *slot |= bit;
            true
        }
    }

    pub fn rebuild_map(&self, h: CfgHandle) -> &HashMap<SsaHandle, SsaHandle> {
        &self.cfg(h).rebuild_map
    }

    pub fn rebuild_map_mut(&mut self, h: CfgHandle) -> &mut HashMap<SsaHandle, SsaHandle> {
        &mut self.cfg_mut(h).rebuild_map
    }

    #[must_use]
    pub fn is_skippable(&self, h: CfgHandle) -> bool {
        self.cfg(h).skippable
    }

    pub fn set_skippable(&mut self, h: CfgHandle, v: bool) {
        self.cfg_mut(h).skippable = v;
    }

    pub fn input_taken(&self, h: CfgHandle) -> Option<usize> {
        self.cfg(h).input_taken
    }

    pub fn set_input_taken(&mut self, h: CfgHandle, v: Option<usize>) {
        self.cfg_mut(h).input_taken = v;
    }

    fn ssa(&self, h: SsaHandle) -> &SsaAiData {
        &self.ssa_data[h.index()]
    }

    fn ssa_mut(&mut self, h: SsaHandle) -> &mut SsaAiData {
        &mut self.ssa_data[h.index()]
    }

    #[must_use]
    pub fn constraints(&self, h: SsaHandle, ctx: AnalysisCtx) -> Option<&ConstraintsDef> {
        self.ssa(h).constraints[ctx.idx()].as_ref()
    }

    /// I3/I4: debug-only postcondition that every update keeps the
    /// constraint vector's size fixed and only ever moves the lattice value
    /// down (more precise), never back up — P1's `all_subset(old, new)`.
    pub fn set_constraints(&mut self, h: SsaHandle, ctx: AnalysisCtx, c: ConstraintsDef) {
        if cfg!(debug_assertions) {
            if let Some(old) = &self.ssa(h).constraints[ctx.idx()] {
                debug_assert_eq!(old.vec.len(), c.vec.len(), "I3 violated: constraint vector resized for {h}");
                debug_assert!(old.all_subset(&c), "I4 violated: propagate step for {h} moved backwards in the lattice");
            }
        }
        self.ssa_mut(h).constraints[ctx.idx()] = Some(c);
    }

    #[must_use]
    pub fn visited_count(&self, h: SsaHandle) -> u32 {
        self.ssa(h).visited_count
    }

    pub fn bump_visited_count(&mut self, h: SsaHandle, by: u32) {
        self.ssa_mut(h).visited_count += by;
    }

    #[must_use]
    pub fn touched(&self, h: SsaHandle) -> bool {
        self.ssa(h).touched
    }

    pub fn set_touched(&mut self, h: SsaHandle, v: bool) {
        self.ssa_mut(h).touched = v;
    }

    /// §4.6 step 1: reset `JumpThread` executable state and `touched` for
    /// every live handle before a new thread walk. Preserving this reset is
    /// load-bearing for the loop-detection argument ("target already
    /// executable in this context" is only a valid cycle test because state
    /// is fresh at the start of each walk) — §9's documented open question.
    pub fn reset_jump_thread_state(&mut self) {
        for cfg in &mut self.cfg_data {
            cfg.executable[AnalysisCtx::JumpThread.idx()] = false;
            cfg.output_executable[AnalysisCtx::JumpThread.idx()] = 0;
            cfg.input_taken = None;
        }
        for ssa in &mut self.ssa_data {
            ssa.touched = false;
        }
    }
}
