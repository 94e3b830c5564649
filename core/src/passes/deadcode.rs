//! Dead-code removal (spec.md §4.6): drop unreachable subroutines, empty
//! blocks, and unused modules; warn (without removing) about statements
//! following an unconditional terminator; deduplicate back-to-back plain
//! assignments to the same target. Operates after name resolution so the
//! call graph (spec.md §4.7) is meaningful.

use crate::ast::decl::Subroutine;
use crate::ast::{Ast, NodeId, NodeKind};
use crate::callgraph::CallGraph;
use crate::error::{CompileError, Diagnostics};

pub struct DeadCodeRemover {
    diagnostics: Diagnostics<CompileError>,
}

impl DeadCodeRemover {
    pub fn new(source: &str) -> Self {
        Self {
            diagnostics: Diagnostics::new(source.to_string()),
        }
    }

    /// Runs every sweep once. Removal changes the tree in ways that can make
    /// more of it dead (e.g. removing the last caller of a helper makes that
    /// helper itself removable), so the driver is expected to call this
    /// repeatedly until a round removes nothing — mirroring the constant
    /// folder's fixpoint discipline (spec.md §4.5, §8 property 4), though
    /// dead-code removal itself isn't required to converge to a unique
    /// normal form, just to terminate.
    pub fn run(mut self, ast: &mut Ast, root: NodeId) -> (Diagnostics<CompileError>, bool) {
        self.warn_unreachable_after_terminators(ast, root);
        self.dedup_assignments(ast, root);
        let graph = CallGraph::build(ast, root);
        let removed_subs = self.remove_dead_subroutines(ast, root, &graph);
        let removed_blocks = self.remove_dead_blocks(ast, root);
        let removed_modules = self.remove_dead_modules(ast, root);
        (self.diagnostics, removed_subs || removed_blocks || removed_modules)
    }

    /// Subroutines with no callers, no executable code, and no variables,
    /// unless they're the entry point, an asm-subroutine, or flagged
    /// `force_output` on their enclosing block (spec.md §4.6; §8 property 6
    /// "never deletes an entry point, an asm-subroutine, or anything
    /// transitively reachable from the entry point").
    fn remove_dead_subroutines(&mut self, ast: &mut Ast, root: NodeId, graph: &CallGraph) -> bool {
        let entry_points: Vec<NodeId> = collect_subroutines(ast, root)
            .into_iter()
            .filter(|&s| matches!(ast.kind(s), NodeKind::Subroutine(sub) if sub.is_start()))
            .collect();
        let mut reachable = std::collections::HashSet::new();
        for &entry in &entry_points {
            reachable.extend(graph.reachable_from(entry));
        }

        let mut removed = false;
        for sub in collect_subroutines(ast, root) {
            let (is_start, is_asm) = match ast.kind(sub) {
                NodeKind::Subroutine(s) => (s.is_start(), s.is_asm),
                _ => continue,
            };
            if is_start || is_asm || reachable.contains(&sub) {
                continue;
            }
            let force_output = ast
                .parent_of(sub)
                .map(|p| matches!(ast.kind(p), NodeKind::Block(b) if b.force_output()))
                .unwrap_or(false);
            if force_output {
                continue;
            }
            let no_callers = graph.callers(sub).is_empty();
            let is_empty = !contains_executable_code_or_vars(ast, sub);
            if no_callers || is_empty {
                let parent = ast.parent_of(sub).expect("Subroutine always has a parent");
                ast.remove(parent, sub);
                removed = true;
            }
        }
        removed
    }

    /// Blocks with no executable code and no variables, unless flagged
    /// `force_output` (spec.md §4.6).
    fn remove_dead_blocks(&mut self, ast: &mut Ast, root: NodeId) -> bool {
        let mut removed = false;
        for block in collect_blocks(ast, root) {
            let force_output = matches!(ast.kind(block), NodeKind::Block(b) if b.force_output());
            if force_output {
                continue;
            }
            if !contains_executable_code_or_vars(ast, block) {
                let parent = ast.parent_of(block).expect("Block always has a parent");
                ast.remove(parent, block);
                removed = true;
            }
        }
        removed
    }

    /// Modules that are neither a library nor imported by anything, or that
    /// are empty (spec.md §4.6). A module transitively containing the
    /// program's entry point is exempt from the "unused" half of this rule
    /// the same way `remove_dead_subroutines` exempts the entry point
    /// itself (spec.md §8 property 6): it's the compiled program's main
    /// module, not a library waiting to be imported, so "nothing imports
    /// it" doesn't make it dead.
    fn remove_dead_modules(&mut self, ast: &mut Ast, root: NodeId) -> bool {
        let modules: Vec<NodeId> = ast
            .children_of(root)
            .iter()
            .copied()
            .filter(|&c| matches!(ast.kind(c), NodeKind::Module(_)))
            .collect();

        let mut imported_names = std::collections::HashSet::new();
        for &m in &modules {
            if let NodeKind::Module(module) = ast.kind(m) {
                imported_names.extend(module.imports.iter().cloned());
            }
        }

        let mut removed = false;
        for &m in &modules {
            let (is_library, name) = match ast.kind(m) {
                NodeKind::Module(module) => (module.is_library, module.name.clone()),
                _ => continue,
            };
            let empty = ast.children_of(m).is_empty();
            let unused = !is_library && !imported_names.contains(&name) && !contains_entry_point(ast, m);
            if empty || unused {
                ast.remove(root, m);
                removed = true;
            }
        }
        removed
    }

    /// Warn about the first statement following an unconditional terminator
    /// in a statement list, when that statement isn't one of the kinds that
    /// legitimately follow dead control flow (a label someone can still jump
    /// to, a directive, a declaration, inline asm, a nested subroutine/struct
    /// definition). Does not remove anything (spec.md §4.6).
    fn warn_unreachable_after_terminators(&mut self, ast: &Ast, id: NodeId) {
        let children = ast.children_of(id).to_vec();
        for window in children.windows(2) {
            let (prev, next) = (window[0], window[1]);
            if ast.is_unconditional_terminator(prev) && !is_exempt_after_terminator(ast.kind(next)) {
                self.diagnostics.push(CompileError::UnreachableCode, ast.span(next));
            }
        }
        for &child in &children {
            self.warn_unreachable_after_terminators(ast, child);
        }
    }

    /// `A1; A2` where both are plain assignments to the structurally same
    /// target, the target lives in regular RAM, and A2's RHS is trivial and
    /// doesn't mention the target: remove `A1` (spec.md §4.6).
    fn dedup_assignments(&mut self, ast: &mut Ast, id: NodeId) {
        loop {
            let children = ast.children_of(id).to_vec();
            let mut to_remove = None;
            for window in children.windows(2) {
                let (a1, a2) = (window[0], window[1]);
                if is_deduplicatable_pair(ast, a1, a2) {
                    to_remove = Some(a1);
                    break;
                }
            }
            match to_remove {
                Some(a1) => ast.remove(id, a1),
                None => break,
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.dedup_assignments(ast, child);
        }
    }
}

fn collect_subroutines(ast: &Ast, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_by_kind(ast, root, &mut out, |k| matches!(k, NodeKind::Subroutine(_)));
    out
}

fn collect_blocks(ast: &Ast, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_by_kind(ast, root, &mut out, |k| matches!(k, NodeKind::Block(_)));
    out
}

fn collect_by_kind(ast: &Ast, id: NodeId, out: &mut Vec<NodeId>, pred: impl Fn(&NodeKind) -> bool + Copy) {
    if pred(ast.kind(id)) {
        out.push(id);
    }
    for &child in ast.children_of(id) {
        collect_by_kind(ast, child, out, pred);
    }
}

fn contains_entry_point(ast: &Ast, id: NodeId) -> bool {
    if matches!(ast.kind(id), NodeKind::Subroutine(s) if s.is_start()) {
        return true;
    }
    ast.children_of(id).iter().any(|&c| contains_entry_point(ast, c))
}

fn contains_executable_code_or_vars(ast: &Ast, id: NodeId) -> bool {
    for &child in ast.children_of(id) {
        match ast.kind(child) {
            NodeKind::VarDecl(_) => return true,
            NodeKind::Subroutine(s) if is_start_or_has_body(s, ast, child) => return true,
            NodeKind::Label(_) | NodeKind::Directive(_) | NodeKind::StructDecl(_) => continue,
            NodeKind::Subroutine(_) => continue,
            _ => return true,
        }
    }
    false
}

fn is_start_or_has_body(s: &Subroutine, ast: &Ast, id: NodeId) -> bool {
    s.is_start() || !ast.children_of(id).is_empty()
}

fn is_exempt_after_terminator(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Label(_)
            | NodeKind::Directive(_)
            | NodeKind::VarDecl(_)
            | NodeKind::InlineAsm(_)
            | NodeKind::Subroutine(_)
            | NodeKind::StructDecl(_)
    )
}

fn is_deduplicatable_pair(ast: &Ast, a1: NodeId, a2: NodeId) -> bool {
    let (a1_kind, a2_kind) = (ast.kind(a1), ast.kind(a2));
    let (assign1, assign2) = match (a1_kind, a2_kind) {
        (NodeKind::Assignment(x), NodeKind::Assignment(y)) => (x, y),
        _ => return false,
    };
    if assign1.aug_op.is_some() || assign2.aug_op.is_some() {
        return false;
    }
    let (t1, t2) = (ast.children_of(a1)[0], ast.children_of(a2)[0]);
    if !targets_structurally_equal(ast, t1, t2) {
        return false;
    }
    if !target_in_regular_ram(ast, t1) {
        return false;
    }
    let rhs2 = ast.children_of(a2)[1];
    is_trivial_rhs(ast, rhs2) && !mentions_target(ast, rhs2, t2)
}

fn targets_structurally_equal(ast: &Ast, a: NodeId, b: NodeId) -> bool {
    match (ast.kind(a), ast.kind(b)) {
        (NodeKind::IdentRef(_), NodeKind::IdentRef(_)) => {
            ast.resolved.get(&a) == ast.resolved.get(&b) && ast.resolved.get(&a).is_some()
        }
        (NodeKind::ArrayIndex(_), NodeKind::ArrayIndex(_)) => {
            let (ca, cb) = (ast.children_of(a), ast.children_of(b));
            ca.len() == cb.len()
                && ca
                    .iter()
                    .zip(cb)
                    .all(|(&x, &y)| targets_structurally_equal(ast, x, y))
        }
        (NodeKind::MemRead(_), NodeKind::MemRead(_)) => {
            targets_structurally_equal(ast, ast.children_of(a)[0], ast.children_of(b)[0])
        }
        _ => false,
    }
}

/// A variable target lives in regular RAM unless it's explicitly required to
/// sit in the zero page; zero-page variables are excluded from dedup because
/// a zero-page write can be observed by indirect-addressing side effects a
/// plain RAM write cannot.
fn target_in_regular_ram(ast: &Ast, target: NodeId) -> bool {
    match ast.kind(target) {
        NodeKind::IdentRef(_) => match ast.resolved.get(&target) {
            Some(&decl) => match ast.kind(decl) {
                NodeKind::VarDecl(v) => !matches!(v.zeropage, crate::ast::types::ZeropageWish::Require),
                _ => false,
            },
            None => false,
        },
        NodeKind::ArrayIndex(_) => {
            let base = ast.children_of(target)[0];
            target_in_regular_ram(ast, base)
        }
        _ => false,
    }
}

fn is_trivial_rhs(ast: &Ast, id: NodeId) -> bool {
    !matches!(
        ast.kind(id),
        NodeKind::PrefixExpr(_) | NodeKind::BinaryExpr(_) | NodeKind::TypeCast(_) | NodeKind::FunctionCallExpr(_)
    )
}

fn mentions_target(ast: &Ast, expr: NodeId, target: NodeId) -> bool {
    if targets_structurally_equal(ast, expr, target) {
        return true;
    }
    ast.children_of(expr)
        .iter()
        .any(|&c| mentions_target(ast, c, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{Block, Module, VarDecl};
    use crate::ast::expr::{IdentRef, NumberLit, NumericValue};
    use crate::ast::stmt::Assignment;
    use crate::ast::types::{DataType, ZeropageWish};
    use crate::util::Span;

    fn make_module(ast: &mut Ast, root: NodeId) -> NodeId {
        ast.alloc(
            NodeKind::Module(Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        )
    }

    fn make_sub(ast: &mut Ast, parent: NodeId, name: &str, is_asm: bool) -> NodeId {
        ast.alloc(
            NodeKind::Subroutine(Subroutine {
                name: name.into(),
                params: vec![],
                return_types: vec![],
                asm_registers: None,
                clobbers: None,
                address: None,
                inline: false,
                is_asm,
            }),
            Span::SYNTHETIC,
            parent,
        )
    }

    #[test]
    fn removes_uncalled_helper_subroutine() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let block = ast.alloc(
            NodeKind::Block(Block {
                name: "main".into(),
                address: None,
                options: vec![],
            }),
            Span::SYNTHETIC,
            module,
        );
        make_sub(&mut ast, block, "start", false);
        let helper = make_sub(&mut ast, block, "helper", false);
        ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "v".into(),
                data_type: DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            helper,
        );

        let (_, changed) = DeadCodeRemover::new("").run(&mut ast, root);
        assert!(changed);
        assert!(!ast.children_of(block).contains(&helper));
    }

    #[test]
    fn keeps_asm_subroutine_even_if_uncalled() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let block = ast.alloc(
            NodeKind::Block(Block {
                name: "main".into(),
                address: None,
                options: vec![],
            }),
            Span::SYNTHETIC,
            module,
        );
        make_sub(&mut ast, block, "start", false);
        let asm_sub = make_sub(&mut ast, block, "raw", true);

        DeadCodeRemover::new("").run(&mut ast, root);
        assert!(ast.children_of(block).contains(&asm_sub));
    }

    #[test]
    fn keeps_unimported_module_that_contains_the_entry_point() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let block = ast.alloc(
            NodeKind::Block(Block {
                name: "main".into(),
                address: None,
                options: vec![],
            }),
            Span::SYNTHETIC,
            module,
        );
        make_sub(&mut ast, block, "start", false);

        DeadCodeRemover::new("").run(&mut ast, root);
        assert!(ast.children_of(root).contains(&module));
    }

    #[test]
    fn dedups_consecutive_trivial_assignments_to_same_target() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let var = ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "x".into(),
                data_type: DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            module,
        );

        let make_assignment = |ast: &mut Ast, value: i64| {
            let assignment = ast.alloc(
                NodeKind::Assignment(Assignment { aug_op: None }),
                Span::SYNTHETIC,
                module,
            );
            let target = ast.alloc(
                NodeKind::IdentRef(IdentRef { path: vec!["x".into()] }),
                Span::SYNTHETIC,
                assignment,
            );
            ast.resolved.insert(target, var);
            ast.alloc(
                NodeKind::NumberLit(NumberLit {
                    data_type: DataType::Ubyte,
                    value: NumericValue::Int(value),
                }),
                Span::SYNTHETIC,
                assignment,
            );
            assignment
        };
        let a1 = make_assignment(&mut ast, 1);
        let _a2 = make_assignment(&mut ast, 1);

        DeadCodeRemover::new("").run(&mut ast, root);
        assert!(!ast.children_of(module).contains(&a1));
        assert_eq!(
            ast.children_of(module)
                .iter()
                .filter(|&&c| matches!(ast.kind(c), NodeKind::Assignment(_)))
                .count(),
            1
        );
    }

    #[test]
    fn warns_about_statement_after_return() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let sub = make_sub(&mut ast, module, "start", false);
        ast.alloc(NodeKind::Return(crate::ast::stmt::Return), Span::SYNTHETIC, sub);
        ast.alloc(
            NodeKind::CallStatement(crate::ast::stmt::CallStatement),
            Span::SYNTHETIC,
            sub,
        );

        let (diags, _) = DeadCodeRemover::new("").run(&mut ast, root);
        assert_eq!(diags.errors().len(), 1);
    }

    #[test]
    fn warns_about_statement_after_call_to_exit() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let sub = make_sub(&mut ast, module, "start", false);
        let exit_sub = make_sub(&mut ast, module, "exit", false);
        let call = ast.alloc(
            NodeKind::CallStatement(crate::ast::stmt::CallStatement),
            Span::SYNTHETIC,
            sub,
        );
        let callee = ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["exit".into()] }),
            Span::SYNTHETIC,
            call,
        );
        ast.resolved.insert(callee, exit_sub);
        ast.alloc(
            NodeKind::CallStatement(crate::ast::stmt::CallStatement),
            Span::SYNTHETIC,
            sub,
        );

        let (diags, _) = DeadCodeRemover::new("").run(&mut ast, root);
        assert_eq!(diags.errors().len(), 1);
    }

    #[test]
    fn call_to_non_exit_subroutine_is_not_a_terminator() {
        let (mut ast, root) = Ast::new();
        let module = make_module(&mut ast, root);
        let sub = make_sub(&mut ast, module, "start", false);
        let helper = make_sub(&mut ast, module, "helper", false);
        let call = ast.alloc(
            NodeKind::CallStatement(crate::ast::stmt::CallStatement),
            Span::SYNTHETIC,
            sub,
        );
        let callee = ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["helper".into()] }),
            Span::SYNTHETIC,
            call,
        );
        ast.resolved.insert(callee, helper);
        ast.alloc(
            NodeKind::CallStatement(crate::ast::stmt::CallStatement),
            Span::SYNTHETIC,
            sub,
        );

        let (diags, _) = DeadCodeRemover::new("").run(&mut ast, root);
        assert_eq!(diags.errors().len(), 0);
    }
}
