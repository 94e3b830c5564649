//! Program-level checks (spec.md §4.8): diagnostics that don't belong to any
//! one pass because they inspect a whole declaration or the set of modules
//! rather than rewriting expressions. Runs after name resolution and type
//! inference, so `resolved`/`types` are available.

use std::collections::HashSet;

use crate::ast::types::DataType;
use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::{CompileError, Diagnostics};
use crate::walker::Visitor;

pub struct ProgramChecker {
    diagnostics: Diagnostics<CompileError>,
}

impl ProgramChecker {
    pub fn new(source: &str) -> Self {
        Self {
            diagnostics: Diagnostics::new(source.to_string()),
        }
    }

    pub fn run(mut self, ast: &Ast, root: NodeId) -> Diagnostics<CompileError> {
        self.check_duplicate_modules(ast, root);
        let mut walker = CheckWalker { checker: &mut self };
        walker.visit(ast, root);
        self.diagnostics
    }

    fn check_duplicate_modules(&mut self, ast: &Ast, root: NodeId) {
        let mut seen = HashSet::new();
        for &child in ast.children_of(root) {
            if let NodeKind::Module(m) = ast.kind(child) {
                if !seen.insert(m.name.clone()) {
                    self.diagnostics.push(
                        CompileError::DuplicateModule { name: m.name.clone() },
                        ast.span(child),
                    );
                }
            }
        }
    }

    fn check_node(&mut self, ast: &Ast, id: NodeId) {
        match ast.kind(id) {
            NodeKind::VarDecl(v) => {
                if let Some(&init) = ast.children_of(id).first() {
                    if references_declaration(ast, init, id) {
                        self.diagnostics.push(
                            CompileError::RecursiveInitializer { name: v.name.clone() },
                            ast.span(id),
                        );
                    }
                    if v.is_const {
                        self.check_literal_bounds(ast, init, &v.data_type);
                    }
                }
            }
            NodeKind::StringLit(s) => {
                if s.value.is_empty() || s.value.len() > 255 {
                    self.diagnostics.push(
                        CompileError::StringLiteralLengthInvalid { length: s.value.len() },
                        ast.span(id),
                    );
                }
            }
            NodeKind::TypeCast(cast) => {
                if let DataType::Struct { resolved: None, name } = &cast.target {
                    self.diagnostics.push(
                        CompileError::UnknownStruct { name: name.clone() },
                        ast.span(id),
                    );
                }
            }
            _ => {}
        }
        if let Some(ty) = ast.types.get(&id) {
            if let DataType::Struct { resolved: None, name } = ty {
                self.diagnostics.push(
                    CompileError::UnknownStruct { name: name.clone() },
                    ast.span(id),
                );
            }
        }
    }

    /// Struct element-count mismatch: an `ArrayLit` used to initialize a
    /// `Struct`-typed declaration whose element count doesn't match the
    /// struct's member count (spec.md §4.8; the `s = { v1, .., vN }` literal
    /// form referenced by §9's struct-assignment note).
    fn check_struct_literal(&mut self, ast: &Ast, var_decl: NodeId, struct_decl: NodeId, init: NodeId) {
        let expected = match ast.kind(struct_decl) {
            NodeKind::StructDecl(s) => s.members.len(),
            _ => return,
        };
        let actual = match ast.kind(init) {
            NodeKind::ArrayLit(_) => ast.children_of(init).len(),
            _ => return,
        };
        let _ = var_decl;
        if actual != expected {
            self.diagnostics.push(
                CompileError::StructElementCountMismatch { expected, actual },
                ast.span(init),
            );
        }
    }

    fn check_literal_bounds(&mut self, ast: &Ast, init: NodeId, declared: &DataType) {
        if let NodeKind::NumberLit(n) = ast.kind(init) {
            if !crate::passes::typecheck::literal_fits(&n.value, declared) {
                self.diagnostics.push(
                    CompileError::NumericLiteralOverflow {
                        type_name: declared.to_string(),
                    },
                    ast.span(init),
                );
            }
        }
    }
}

/// Does the subtree rooted at `id` contain an `IdentRef` resolving to
/// `target`? Used to flag `var x = x + 1`-style self-referential
/// initializers.
fn references_declaration(ast: &Ast, id: NodeId, target: NodeId) -> bool {
    if let NodeKind::IdentRef(_) = ast.kind(id) {
        if ast.resolved.get(&id) == Some(&target) {
            return true;
        }
    }
    ast.children_of(id)
        .iter()
        .any(|&c| references_declaration(ast, c, target))
}

struct CheckWalker<'a> {
    checker: &'a mut ProgramChecker,
}

impl Visitor for CheckWalker<'_> {
    fn visit(&mut self, ast: &Ast, id: NodeId) {
        self.checker.check_node(ast, id);
        if let (NodeKind::VarDecl(v), Some(&init)) = (ast.kind(id), ast.children_of(id).first()) {
            if let DataType::Struct {
                resolved: Some(struct_decl),
                ..
            } = &v.data_type
            {
                self.checker.check_struct_literal(ast, id, *struct_decl, init);
            }
        }
        self.visit_children(ast, id);
    }
}
