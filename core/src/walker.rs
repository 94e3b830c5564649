//! The uniform tree-walker framework (spec.md §4.1): a read-only `Visitor`
//! for queries and reporting passes, and a `MutatingPass` that gathers
//! modifications during one full traversal and applies them afterward so
//! that iteration order is never disturbed mid-walk.

use crate::ast::{Ast, NodeId};
use crate::bug;

/// One of the six tree-surgery primitives a mutating pass may request.
/// Every other shape of mutation is out of contract (spec.md §4.1: "Passes
/// must not mutate sibling lists directly").
#[derive(Clone, Debug)]
pub enum Modification {
    Remove {
        parent: NodeId,
        node: NodeId,
    },
    Replace {
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    },
    InsertBefore {
        parent: NodeId,
        anchor: NodeId,
        new: NodeId,
    },
    InsertAfter {
        parent: NodeId,
        anchor: NodeId,
        new: NodeId,
    },
    InsertFirst {
        parent: NodeId,
        new: NodeId,
    },
    InsertLast {
        parent: NodeId,
        new: NodeId,
    },
}

impl Modification {
    fn apply(self, ast: &mut Ast) {
        match self {
            Self::Remove { parent, node } => ast.remove(parent, node),
            Self::Replace { parent, old, new } => ast.replace(parent, old, new),
            Self::InsertBefore { parent, anchor, new } => ast.insert_before(parent, anchor, new),
            Self::InsertAfter { parent, anchor, new } => ast.insert_after(parent, anchor, new),
            Self::InsertFirst { parent, new } => ast.insert_first(parent, new),
            Self::InsertLast { parent, new } => ast.insert_last(parent, new),
        }
    }
}

/// A read-only traversal. The default `visit` recurses into children in
/// source order; override per-kind hooks by matching on `ast.kind(id)`
/// inside `visit` and calling `self.visit_children` to keep recursing.
pub trait Visitor {
    fn visit(&mut self, ast: &Ast, id: NodeId) {
        self.visit_children(ast, id);
    }

    fn visit_children(&mut self, ast: &Ast, id: NodeId) {
        for &child in ast.children_of(id) {
            self.visit(ast, child);
        }
    }
}

/// A traversal that rewrites the tree. Each visited node may push zero or
/// more [`Modification`]s; they are collected across a full traversal and
/// applied in a second phase, so a pass never observes a tree that is
/// half-mutated partway through its own walk. `visit_node` receives `&mut
/// Ast` so it may allocate fresh, detached replacement nodes (via
/// `Ast::alloc_detached_node`/`Ast::deep_clone`) as it goes — allocating a
/// new arena slot never disturbs any existing node's parent or children, so
/// it's safe to do immediately; only the structural splice is deferred.
pub trait MutatingPass {
    fn visit_node(&mut self, ast: &mut Ast, id: NodeId, modifications: &mut Vec<Modification>);
}

fn collect<P: MutatingPass>(pass: &mut P, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
    pass.visit_node(ast, id, mods);
    for child in ast.children_of(id).to_vec() {
        collect(pass, ast, child, mods);
    }
}

/// Run `pass` over the tree rooted at `root` exactly once, applying whatever
/// modifications it requested. Returns whether any modification was made,
/// which is how callers detect a fixpoint.
pub fn run_pass_once<P: MutatingPass>(pass: &mut P, ast: &mut Ast, root: NodeId) -> bool {
    let mut mods = Vec::new();
    collect(pass, ast, root, &mut mods);
    let changed = !mods.is_empty();
    for m in mods {
        m.apply(ast);
    }
    changed
}

/// Run `pass` repeatedly until a round produces no modifications (spec.md
/// §4.1: "iterated until a fixpoint... when it rewrites expressions"). Used
/// by the constant folder. `max_rounds` is a backstop against a buggy
/// rewrite that never converges; spec.md §8 property 4 says a correct pass
/// always converges in finitely many rounds, so hitting the cap is always a
/// compiler bug, not a user-triggerable condition.
pub fn run_to_fixpoint<P: MutatingPass>(
    pass: &mut P,
    ast: &mut Ast,
    root: NodeId,
    max_rounds: usize,
) {
    for _ in 0..max_rounds {
        if !run_pass_once(pass, ast, root) {
            return;
        }
    }
    bug!("pass did not reach a fixpoint after {} rounds", max_rounds);
}
