// src/ir/dominance.rs
//! Dominance analysis for control flow graphs.

use std::collections::{HashMap, HashSet};

use crate::ir::cfg::ControlFlowGraph;
use crate::ir::handle::CfgHandle;

/// Dominance relationships in a control-flow graph.
#[derive(Debug, Clone, Default)]
pub struct DominanceInfo {
    pub idom: HashMap<CfgHandle, CfgHandle>,
}

impl DominanceInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the dominator tree using the "A Simple, Fast Dominance
    /// Algorithm" by Cooper, Harvey and Kennedy, over reverse post order.
    ///
    /// # Errors
    ///
    /// Returns an error string if `cfg` has no blocks reachable from entry.
    pub fn compute(&mut self, cfg: &ControlFlowGraph) -> Result<(), String> {
        let entry = cfg.entry();
        self.idom.clear();
        self.idom.insert(entry, entry);

        let rpo: Vec<CfgHandle> = cfg.compute_reverse_post_order();
        let rpo_index: HashMap<CfgHandle, usize> = rpo.iter().enumerate().map(|(i, &h)| (h, i)).collect();
        let post_order: Vec<CfgHandle> = rpo.iter().copied().filter(|&h| h != entry).collect();
        if rpo.is_empty() {
            return Err("control-flow graph has no reachable blocks".to_string());
        }

        let preds: HashMap<CfgHandle, Vec<CfgHandle>> =
            rpo.iter().map(|&h| (h, cfg.predecessors(h).filter(|p| rpo_index.contains_key(p)).collect())).collect();

        let mut changed = true;
        while changed {
            changed = false;
            for &node in &post_order {
                let node_preds = &preds[&node];
                let mut new_idom = None;
                for &p in node_preds {
                    if !self.idom.contains_key(&p) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => self.intersect(cur, p, &rpo_index),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if self.idom.get(&node) != Some(&new_idom) {
                        self.idom.insert(node, new_idom);
                        changed = true;
                    }
                }
            }
        }
        Ok(())
    }

    fn intersect(&self, mut a: CfgHandle, mut b: CfgHandle, rpo_index: &HashMap<CfgHandle, usize>) -> CfgHandle {
        while a != b {
            while rpo_index[&a] > rpo_index[&b] {
                a = self.idom[&a];
            }
            while rpo_index[&b] > rpo_index[&a] {
                b = self.idom[&b];
            }
        }
        a
    }

    /// True iff `a` dominates `b` (reflexively).
    #[must_use]
    pub fn dominates(&self, a: CfgHandle, b: CfgHandle) -> bool {
        let mut cur = b;
        let mut seen = HashSet::new();
        loop {
            if cur == a {
                return true;
            }
            let Some(&idom) = self.idom.get(&cur) else { return false };
            if idom == cur || !seen.insert(cur) {
                return cur == a;
            }
            cur = idom;
        }
    }
}
