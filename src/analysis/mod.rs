//! The six optimizer components (C1-C6, §4): the constraint lattice, the
//! abstract operator table, the two-context side tables, the worklist
//! dataflow engine, trace insertion, prune & fold, and the jump threader.

pub mod context;
pub mod lattice;
pub mod operators;
pub mod propagate;
pub mod prune_fold;
pub mod thread;
pub mod trace;
pub mod worklist;

pub use context::{AnalysisCtx, Context};
pub use prune_fold::{run_fold, run_prune};
pub use thread::{mark_skippable, remove_skippable, run_jump_thread};
pub use trace::run_trace_insertion;
