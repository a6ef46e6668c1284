// src/ir/function.rs
//! `Function`: owns the CFG and the flat SSA arena, and exposes the
//! handle-based mutation API (§6) the analysis components are written
//! against.

use crate::ir::cfg::ControlFlowGraph;
use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::Opcode;
use crate::ir::ssa::SsaNode;
use crate::ir::types::Type;
use crate::ir::validator;
use crate::ir::value::Value;

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Type>,
    cfg: ControlFlowGraph,
    ssa_arena: Vec<SsaNode>,
}

impl Function {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Vec::new(), cfg: ControlFlowGraph::new(), ssa_arena: Vec::new() }
    }

    #[must_use]
    pub const fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    pub const fn cfg_mut(&mut self) -> &mut ControlFlowGraph {
        &mut self.cfg
    }

    #[must_use]
    pub fn node(&self, h: SsaHandle) -> &SsaNode {
        &self.ssa_arena[h.index()]
    }

    pub fn node_mut(&mut self, h: SsaHandle) -> &mut SsaNode {
        &mut self.ssa_arena[h.index()]
    }

    /// Total arena size. Side tables in `analysis` are `Vec`s of this length,
    /// resized every time `emplace_ssa` grows the arena (§5).
    #[must_use]
    pub fn ssa_len(&self) -> usize {
        self.ssa_arena.len()
    }

    #[must_use]
    pub fn ssa_handles(&self) -> impl Iterator<Item = SsaHandle> {
        (0..self.ssa_arena.len()).map(SsaHandle::from_index)
    }

    /// §6 `emplace_ssa(op, type)` — creates a new SSA node appended to
    /// `block`'s node list (or φ list, for `Opcode::Phi`), wiring up
    /// `uses` for every handle operand in `inputs`. Callers owning a side
    /// table keyed by `SsaHandle` must resize it immediately after this
    /// call, before dereferencing any other handle (§5, §9).
    pub fn emplace_ssa(&mut self, op: Opcode, ty: Type, block: CfgHandle, inputs: Vec<Value>) -> SsaHandle {
        let handle = SsaHandle::from_index(self.ssa_arena.len());
        for (idx, input) in inputs.iter().enumerate() {
            if let Value::Handle(src) = *input {
                self.ssa_arena[src.index()].uses.push((handle, idx));
            }
        }
        let node = SsaNode::new(op, ty, block, inputs);
        let is_phi = node.is_phi();
        self.ssa_arena.push(node);
        if is_phi {
            self.cfg.block_mut(block).push_phi(handle);
        } else {
            self.cfg.block_mut(block).push_node(handle);
        }
        handle
    }

    /// §6 `alloc_input`/`build_set_input` — sets operand `i`, wiring `uses`.
    /// Grows `inputs` with a placeholder if needed (mirrors the source's
    /// `alloc_input(n)` pre-sizing a φ before all its predecessors are
    /// known).
    pub fn build_set_input(&mut self, h: SsaHandle, i: usize, v: Value) {
        if let Value::Handle(src) = v {
            self.ssa_arena[src.index()].uses.push((h, i));
        }
        let node = &mut self.ssa_arena[h.index()];
        if i >= node.inputs.len() {
            node.inputs.resize(i + 1, Value::Const(crate::ir::value::ConstValue::Bool(false)));
        }
        node.inputs[i] = v;
    }

    /// §6 `link_append_input(v)`.
    pub fn link_append_input(&mut self, h: SsaHandle, v: Value) -> usize {
        let idx = self.ssa_arena[h.index()].inputs.len();
        if let Value::Handle(src) = v {
            self.ssa_arena[src.index()].uses.push((h, idx));
        }
        self.ssa_arena[h.index()].inputs.push(v);
        idx
    }

    /// §6 `link_change_input(i, v)`. Returns `true` if the old operand's
    /// use-edge at this slot was the producer's last reference, matching
    /// the source's "removed due to aliasing" signal.
    pub fn link_change_input(&mut self, h: SsaHandle, i: usize, v: Value) -> bool {
        let old = self.ssa_arena[h.index()].inputs[i];
        if let Value::Handle(old_src) = old {
            self.ssa_arena[old_src.index()].uses.retain(|&(u, ui)| !(u == h && ui == i));
        }
        if let Value::Handle(new_src) = v {
            self.ssa_arena[new_src.index()].uses.push((h, i));
        }
        self.ssa_arena[h.index()].inputs[i] = v;
        if let Value::Handle(old_src) = old { self.ssa_arena[old_src.index()].uses.is_empty() } else { false }
    }

    /// §6 `link_remove_input(i)` — removes operand `i`, shifting later
    /// operands' recorded use-edges down by one.
    pub fn link_remove_input(&mut self, h: SsaHandle, i: usize) {
        let old = self.ssa_arena[h.index()].inputs.remove(i);
        if let Value::Handle(old_src) = old {
            self.ssa_arena[old_src.index()].uses.retain(|&(u, ui)| !(u == h && ui == i));
        }
        let shifted: Vec<(SsaHandle, usize)> = self.ssa_arena[h.index()]
            .inputs
            .iter()
            .enumerate()
            .skip(i)
            .filter_map(|(j, v)| if let Value::Handle(s) = *v { Some((s, j)) } else { None })
            .collect();
        for (src, new_idx) in shifted {
            if let Some(entry) =
                self.ssa_arena[src.index()].uses.iter_mut().find(|(u, idx)| *u == h && *idx == new_idx + 1)
            {
                entry.1 = new_idx;
            }
        }
    }

    /// §6 `link_shrink_inputs(n)` — truncates to `n` operands.
    pub fn link_shrink_inputs(&mut self, h: SsaHandle, n: usize) {
        while self.ssa_arena[h.index()].inputs.len() > n {
            let last = self.ssa_arena[h.index()].inputs.len() - 1;
            self.link_remove_input(h, last);
        }
    }

    /// §6 `replace_with` — redirects every use of `old` to `new`, then
    /// marks `old` dead. Does not remove `old` from its block; callers call
    /// `prune_ssa` separately once all rewiring for the phase is done.
    pub fn replace_with(&mut self, old: SsaHandle, new: Value) {
        let uses = std::mem::take(&mut self.ssa_arena[old.index()].uses);
        for (user, idx) in uses {
            if user == old {
                continue;
            }
            self.link_change_input(user, idx, new);
        }
        self.ssa_arena[old.index()].dead = true;
    }

    /// §6 `prune()` — removes a dead, useless node from its block's list.
    /// The arena slot is retained; handles are never invalidated by removal.
    pub fn prune_ssa(&mut self, h: SsaHandle) {
        let block = self.node(h).block;
        self.cfg.block_mut(block).remove(h);
        self.ssa_arena[h.index()].dead = true;
    }

    /// §6 `split_edge(edge)` — inserts a fresh, empty block on the edge
    /// `from -> to`.
    pub fn split_edge(&mut self, from: CfgHandle, to: CfgHandle) -> CfgHandle {
        let mid = self.cfg.add_block();
        self.cfg.remove_edge(from, to);
        self.cfg.add_edge(from, mid);
        self.cfg.add_edge(mid, to);
        mid
    }

    /// §6 `merge_edge(h)` — splices a single-input, single-output block `h`
    /// out of the graph, connecting its predecessor directly to its
    /// successor. Callers are responsible for having already rewritten any
    /// SSA use of nodes defined in `h` (`remove_skippable`, §4.6).
    pub fn merge_edge(&mut self, h: CfgHandle) {
        debug_assert_eq!(self.cfg.input_size(h), 1);
        debug_assert_eq!(self.cfg.output_size(h), 1);
        let pred = self.cfg.input(h, 0).expect("merge_edge: block has no predecessor");
        let succ = self.cfg.output(h, 0).expect("merge_edge: block has no successor");
        self.cfg.remove_edge(pred, h);
        self.cfg.remove_edge(h, succ);
        self.cfg.add_edge(pred, succ);
        self.cfg.remove_block(h);
    }

    /// §4.5 dead-block removal / §4.6 cascade: removes `h` and, if that
    /// drops any successor's predecessor count to zero, recursively prunes
    /// those too. Assumes all SSA nodes defined in blocks it removes have
    /// already been rewritten or are provably unused.
    pub fn prune_cfg(&mut self, h: CfgHandle) {
        let mut stack = vec![h];
        while let Some(block) = stack.pop() {
            if block != self.cfg.entry() && self.cfg.input_size(block) > 0 {
                continue;
            }
            let succs: Vec<_> = self.cfg.successors(block).collect();
            for succ in &succs {
                self.cfg.remove_edge(block, *succ);
            }
            for h2 in self.cfg.block(block).all().collect::<Vec<_>>() {
                self.ssa_arena[h2.index()].dead = true;
            }
            self.cfg.remove_block(block);
            for succ in succs {
                if succ != block && self.cfg.input_size(succ) == 0 {
                    stack.push(succ);
                }
            }
        }
    }

    /// §5/§8 P4: hard postcondition after every phase.
    pub fn assert_valid(&self) -> Result<(), String> {
        validator::check(self)
    }
}
