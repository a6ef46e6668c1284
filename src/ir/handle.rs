// src/ir/handle.rs
//! Handle types addressing CFG blocks and SSA nodes.
//!
//! Every side table in `analysis` is an array indexed by one of these, never
//! a map keyed by pointer or by the handle's own fields (§9): handles must
//! stay valid, and cheaply comparable/hashable, across node creation.

use std::fmt;

use petgraph::graph::NodeIndex;

/// Addresses a basic block in a function's control-flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CfgHandle(pub(crate) NodeIndex);

impl CfgHandle {
    pub(crate) const fn from_node_index(idx: NodeIndex) -> Self {
        Self(idx)
    }

    pub(crate) const fn node_index(self) -> NodeIndex {
        self.0
    }
}

impl fmt::Display for CfgHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0.index())
    }
}

/// Addresses an SSA node within a function's flat SSA arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SsaHandle(pub(crate) usize);

impl SsaHandle {
    pub(crate) const fn from_index(idx: usize) -> Self {
        Self(idx)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SsaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
