//! The caller/callee relation between subroutines (spec.md §4.7). Built by
//! one read-only walk that tracks the innermost enclosing subroutine and
//! records an edge at every identifier reference that resolves to a
//! subroutine — this covers both call statements/expressions and a bare
//! reference such as taking a subroutine's address.

use std::collections::{HashSet, VecDeque};

use crate::ast::{Ast, NodeId, NodeKind};
use crate::walker::Visitor;

#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    callees: std::collections::HashMap<NodeId, HashSet<NodeId>>,
    callers: std::collections::HashMap<NodeId, HashSet<NodeId>>,
}

struct Builder<'a> {
    ast: &'a Ast,
    stack: Vec<NodeId>,
    graph: CallGraph,
}

impl Visitor for Builder<'_> {
    fn visit(&mut self, ast: &Ast, id: NodeId) {
        let is_subroutine = matches!(ast.kind(id), NodeKind::Subroutine(_));
        if is_subroutine {
            self.stack.push(id);
        }

        if let NodeKind::IdentRef(_) = ast.kind(id) {
            if let Some(&target) = ast.resolved.get(&id) {
                if matches!(ast.kind(target), NodeKind::Subroutine(_)) {
                    if let Some(&caller) = self.stack.last() {
                        self.graph.callees.entry(caller).or_default().insert(target);
                        self.graph.callers.entry(target).or_default().insert(caller);
                    }
                }
            }
        }

        self.visit_children(ast, id);

        if is_subroutine {
            self.stack.pop();
        }
    }
}

impl CallGraph {
    /// Walk the whole tree rooted at `root` and build the relation. Name
    /// resolution must already have run: unresolved `IdentRef`s are simply
    /// skipped, since a call graph built before resolution would be
    /// meaningless anyway (spec.md §4.6 "operates after name resolution").
    pub fn build(ast: &Ast, root: NodeId) -> Self {
        let mut builder = Builder {
            ast,
            stack: Vec::new(),
            graph: CallGraph::default(),
        };
        builder.visit(ast, root);
        builder.graph
    }

    pub fn callers(&self, sub: NodeId) -> HashSet<NodeId> {
        self.callers.get(&sub).cloned().unwrap_or_default()
    }

    pub fn callees(&self, sub: NodeId) -> HashSet<NodeId> {
        self.callees.get(&sub).cloned().unwrap_or_default()
    }

    /// Every subroutine transitively reachable from `entry_point` via calls,
    /// including `entry_point` itself.
    pub fn reachable_from(&self, entry_point: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(entry_point);
        queue.push_back(entry_point);
        while let Some(sub) = queue.pop_front() {
            for callee in self.callees(sub) {
                if seen.insert(callee) {
                    queue.push_back(callee);
                }
            }
        }
        seen
    }

    /// True if `sub` is reachable from one of its own callees — a cycle in
    /// the graph. Recursion is reported by callers of this query but never
    /// aborts compilation (spec.md §4.7).
    pub fn is_recursive(&self, sub: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.callees(sub).into_iter().collect();
        while let Some(n) = stack.pop() {
            if n == sub {
                return true;
            }
            if seen.insert(n) {
                stack.extend(self.callees(n));
            }
        }
        false
    }

    /// Visit every `Subroutine` node within `module`'s subtree, in source
    /// order, invoking `action` on each.
    pub fn for_all_subroutines(ast: &Ast, module: NodeId, mut action: impl FnMut(NodeId)) {
        struct Collector<'a, F> {
            action: &'a mut F,
        }
        impl<F: FnMut(NodeId)> Visitor for Collector<'_, F> {
            fn visit(&mut self, ast: &Ast, id: NodeId) {
                if matches!(ast.kind(id), NodeKind::Subroutine(_)) {
                    (self.action)(id);
                }
                self.visit_children(ast, id);
            }
        }
        let mut collector = Collector { action: &mut action };
        collector.visit(ast, module);
    }
}
