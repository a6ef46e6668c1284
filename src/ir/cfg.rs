// src/ir/cfg.rs
use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;

use crate::ir::block::BasicBlock;
use crate::ir::handle::CfgHandle;

/// The function's control-flow graph.
///
/// Backed by `StableDiGraph` rather than the plain `DiGraph` the teacher's
/// front-end CFG uses: `prune_cfg` (§4.5) removes blocks mid-pass while
/// `CfgHandle`s computed earlier in the same phase are still held in
/// worklists and side tables, and only a stable graph keeps those indices
/// valid across removal.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    graph: StableDiGraph<BasicBlock, ()>,
    entry: CfgHandle,
    reverse_post_order: Vec<CfgHandle>,
    reverse_post_order_valid: bool,
}

impl ControlFlowGraph {
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let entry = CfgHandle::from_node_index(graph.add_node(BasicBlock::new()));
        Self { graph, entry, reverse_post_order: Vec::new(), reverse_post_order_valid: false }
    }

    #[must_use]
    pub const fn entry(&self) -> CfgHandle {
        self.entry
    }

    #[must_use]
    pub fn block(&self, h: CfgHandle) -> &BasicBlock {
        &self.graph[h.node_index()]
    }

    pub fn block_mut(&mut self, h: CfgHandle) -> &mut BasicBlock {
        &mut self.graph[h.node_index()]
    }

    pub fn add_block(&mut self) -> CfgHandle {
        let idx = self.graph.add_node(BasicBlock::new());
        self.reverse_post_order_valid = false;
        CfgHandle::from_node_index(idx)
    }

    pub fn add_edge(&mut self, from: CfgHandle, to: CfgHandle) {
        self.graph.add_edge(from.node_index(), to.node_index(), ());
        self.reverse_post_order_valid = false;
    }

    /// Removes one edge; does not touch either endpoint block.
    pub fn remove_edge(&mut self, from: CfgHandle, to: CfgHandle) {
        if let Some(e) = self.graph.find_edge(from.node_index(), to.node_index()) {
            self.graph.remove_edge(e);
            self.reverse_post_order_valid = false;
        }
    }

    /// Removes a block entirely. Callers must first remove all of its edges
    /// and any operand/`uses` references to its nodes.
    pub fn remove_block(&mut self, h: CfgHandle) {
        self.graph.remove_node(h.node_index());
        self.reverse_post_order_valid = false;
    }

    #[must_use]
    pub fn blocks(&self) -> impl Iterator<Item = CfgHandle> + '_ {
        self.graph.node_indices().map(CfgHandle::from_node_index)
    }

    /// §6 `input_size()` — number of predecessor edges.
    #[must_use]
    pub fn input_size(&self, h: CfgHandle) -> usize {
        self.graph.neighbors_directed(h.node_index(), Direction::Incoming).count()
    }

    /// §6 `output_size()` — number of successor edges.
    #[must_use]
    pub fn output_size(&self, h: CfgHandle) -> usize {
        self.graph.neighbors_directed(h.node_index(), Direction::Outgoing).count()
    }

    /// §6 `input(i)` — the `i`-th predecessor, in edge-insertion order.
    #[must_use]
    pub fn input(&self, h: CfgHandle, i: usize) -> Option<CfgHandle> {
        self.predecessors(h).nth(i)
    }

    /// §6 `output(i)` — the `i`-th successor, in edge-insertion order.
    #[must_use]
    pub fn output(&self, h: CfgHandle, i: usize) -> Option<CfgHandle> {
        self.successors(h).nth(i)
    }

    #[must_use]
    pub fn predecessors(&self, h: CfgHandle) -> impl Iterator<Item = CfgHandle> + '_ {
        // `StableDiGraph` walks incoming neighbors in reverse insertion
        // order; reverse again so `input(i)` is stable insertion order.
        let mut v: Vec<_> = self.graph.neighbors_directed(h.node_index(), Direction::Incoming).collect();
        v.reverse();
        v.into_iter().map(CfgHandle::from_node_index)
    }

    #[must_use]
    pub fn successors(&self, h: CfgHandle) -> impl Iterator<Item = CfgHandle> + '_ {
        let mut v: Vec<_> = self.graph.neighbors_directed(h.node_index(), Direction::Outgoing).collect();
        v.reverse();
        v.into_iter().map(CfgHandle::from_node_index)
    }

    /// Position of `pred` among `h`'s predecessors, i.e. which φ input slot
    /// corresponds to that edge.
    #[must_use]
    pub fn predecessor_index(&self, h: CfgHandle, pred: CfgHandle) -> Option<usize> {
        self.predecessors(h).position(|p| p == pred)
    }

    #[must_use]
    pub fn successor_index(&self, h: CfgHandle, succ: CfgHandle) -> Option<usize> {
        self.successors(h).position(|s| s == succ)
    }

    #[must_use]
    pub fn reverse_post_order(&mut self) -> &[CfgHandle] {
        if !self.reverse_post_order_valid {
            self.reverse_post_order = self.compute_reverse_post_order();
            self.reverse_post_order_valid = true;
        }
        &self.reverse_post_order
    }

    /// Same traversal as `reverse_post_order`, but computed fresh every call
    /// against a shared reference — for callers (e.g. `validator`) that only
    /// have `&ControlFlowGraph` and can't populate the cache.
    #[must_use]
    pub fn compute_reverse_post_order(&self) -> Vec<CfgHandle> {
        // petgraph's `Dfs` visitor only gives pre-order; a manual
        // stack-based walk gets us post-order directly, which we then
        // reverse.
        let mut post_order = Vec::new();
        let mut stack = vec![(self.entry.node_index(), false)];
        let mut visited = std::collections::HashSet::new();
        visited.insert(self.entry.node_index());
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                post_order.push(node);
                continue;
            }
            stack.push((node, true));
            for succ in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if visited.insert(succ) {
                    stack.push((succ, false));
                }
            }
        }
        post_order.reverse();
        post_order.into_iter().map(CfgHandle::from_node_index).collect()
    }

    pub fn invalidate_reverse_post_order(&mut self) {
        self.reverse_post_order_valid = false;
    }
}

impl Default for ControlFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}
