//! Graph traversals: execution order and discovery chains.

use super::{ImportTarget, ModuleGraph, UnitId};
use crate::dependency_chain::DependencyChain;

impl ModuleGraph {
    /// Units in execution order: dependencies before dependents.
    ///
    /// Post-order DFS over static edges from each entry in turn, then from
    /// each dynamic import target in discovery order. Cycles are cut where
    /// they are first closed, so the order is deterministic for a given
    /// graph. Units reachable from nothing are not listed.
    pub fn exec_order(&self) -> Vec<UnitId> {
        let mut visited = vec![false; self.len()];
        let mut order = Vec::with_capacity(self.len());

        for &entry in self.entries() {
            self.post_order(entry, &mut visited, &mut order);
        }

        // Dynamic imports start their own static subgraphs. Scan the order as
        // it grows so nested dynamic imports are picked up too.
        let mut cursor = 0;
        let mut dynamic_roots = Vec::new();
        loop {
            while cursor < order.len() {
                let unit = order[cursor];
                cursor += 1;
                for (_, record, target) in self.edges(unit) {
                    if let (false, ImportTarget::Unit(to)) = (record.kind.is_static(), target) {
                        dynamic_roots.push(*to);
                    }
                }
            }
            let Some(root) = dynamic_roots.iter().copied().find(|r| !visited[r.index()]) else {
                break;
            };
            self.post_order(root, &mut visited, &mut order);
        }

        order
    }

    fn post_order(&self, root: UnitId, visited: &mut [bool], order: &mut Vec<UnitId>) {
        if visited[root.index()] {
            return;
        }
        visited[root.index()] = true;

        // (unit, next record to look at)
        let mut stack = vec![(root, 0usize)];
        while let Some(&(unit, next)) = stack.last() {
            let targets = &self.node(unit).targets;
            let records = &self.unit(unit).import_records;

            let mut cursor = next;
            let mut child = None;
            while cursor < targets.len() {
                let i = cursor;
                cursor += 1;
                if !records[i].kind.is_static() {
                    continue;
                }
                if let ImportTarget::Unit(to) = targets[i]
                    && !visited[to.index()]
                {
                    visited[to.index()] = true;
                    child = Some(to);
                    break;
                }
            }
            if let Some(top) = stack.last_mut() {
                top.1 = cursor;
            }

            match child {
                Some(to) => stack.push((to, 0)),
                None => {
                    order.push(unit);
                    stack.pop();
                }
            }
        }
    }

    /// Units reachable from `root` over static edges, `root` included.
    pub fn static_closure(&self, root: UnitId) -> Vec<UnitId> {
        let mut visited = vec![false; self.len()];
        let mut order = Vec::new();
        self.post_order(root, &mut visited, &mut order);
        order
    }

    /// Discovery path from an entry point down to `unit`.
    pub fn dependency_chain(&self, unit: UnitId) -> DependencyChain {
        let mut path = vec![self.unit(unit).id.clone()];
        let mut current = self.node(unit).parent;
        // Parents always point at earlier-discovered units, so this ends.
        while let Some(parent) = current {
            path.push(self.unit(parent).id.clone());
            current = self.node(parent).parent;
        }
        path.reverse();
        DependencyChain::new(path)
    }
}
