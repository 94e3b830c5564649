//! Name/scope resolution (spec.md §4.2). Attaches every identifier
//! reference to a unique declaration reachable through the scope chain, or
//! to cross-module imports at the Module level, and populates the
//! `scopedName` cache on every declaration while it goes.

use std::collections::HashMap;

use crate::ast::{decl, types::ZeropageWish, Ast, NodeId, NodeKind};
use crate::error::{CompileError, Diagnostics};
use crate::util::Span;
use crate::walker::Visitor;

/// A node's own declared name, for the kinds that introduce one. Blocks are
/// included because `module.block.member`-style paths step through them.
fn declared_name(kind: &NodeKind) -> Option<&str> {
    match kind {
        NodeKind::VarDecl(d) => Some(&d.name),
        NodeKind::Subroutine(d) => Some(&d.name),
        NodeKind::Label(d) => Some(&d.name),
        NodeKind::StructDecl(d) => Some(&d.name),
        NodeKind::Module(d) => Some(&d.name),
        NodeKind::Block(d) => Some(&d.name),
        _ => None,
    }
}

pub struct Resolver<'a> {
    diagnostics: Diagnostics<CompileError>,
    /// Direct named children of every scope, computed once up front.
    members: HashMap<NodeId, HashMap<String, NodeId>>,
    /// Top-level module name -> Module node, for cross-module imports.
    modules_by_name: HashMap<String, NodeId>,
    placeholder: Option<NodeId>,
    source: &'a str,
}

struct MemberCollector<'b> {
    members: &'b mut HashMap<NodeId, HashMap<String, NodeId>>,
}

impl Visitor for MemberCollector<'_> {
    fn visit(&mut self, ast: &Ast, id: NodeId) {
        if ast.kind(id).is_scope() || matches!(ast.kind(id), NodeKind::Program(_)) {
            let mut table = HashMap::new();
            for &child in ast.children_of(id) {
                if let Some(name) = declared_name(ast.kind(child)) {
                    table.entry(name.to_string()).or_insert(child);
                }
            }
            self.members.insert(id, table);
        }
        self.visit_children(ast, id);
    }
}

struct IdentCollector {
    idents: Vec<NodeId>,
}

impl Visitor for IdentCollector {
    fn visit(&mut self, ast: &Ast, id: NodeId) {
        if matches!(ast.kind(id), NodeKind::IdentRef(_)) {
            self.idents.push(id);
        }
        self.visit_children(ast, id);
    }
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            diagnostics: Diagnostics::new(source.to_string()),
            members: HashMap::new(),
            modules_by_name: HashMap::new(),
            placeholder: None,
            source,
        }
    }

    /// Run resolution over the whole program, returning any diagnostics
    /// collected. Unlike most passes this never returns `Err` on its own:
    /// per spec.md §7, name-resolution errors are recoverable and the pass
    /// continues by resolving to a placeholder declaration, so the caller
    /// decides whether accumulated diagnostics should abort the pipeline.
    pub fn run(&mut self, ast: &mut Ast, root: NodeId) -> Diagnostics<CompileError> {
        let mut collector = MemberCollector {
            members: &mut self.members,
        };
        collector.visit(ast, root);

        for &module in ast.children_of(root).to_vec().iter() {
            if let NodeKind::Module(m) = ast.kind(module) {
                self.modules_by_name.insert(m.name.clone(), module);
            }
        }

        self.assign_scoped_names(ast, root, "");

        let mut idents = IdentCollector { idents: Vec::new() };
        idents.visit(ast, root);
        for ident in idents.idents {
            self.resolve_one(ast, root, ident);
        }

        std::mem::replace(&mut self.diagnostics, Diagnostics::new(self.source.to_string()))
    }

    /// Populate `ast.scoped_names` for every declaration: the dotted path
    /// from the Program root, used later for assembly-label emission.
    fn assign_scoped_names(&mut self, ast: &mut Ast, id: NodeId, prefix: &str) {
        let own_name = declared_name(ast.kind(id)).map(|s| s.to_string());
        let path = match (&own_name, prefix.is_empty()) {
            (Some(name), true) => name.clone(),
            (Some(name), false) => format!("{}.{}", prefix, name),
            (None, _) => prefix.to_string(),
        };
        if ast.kind(id).is_declaration() || matches!(ast.kind(id), NodeKind::Block(_)) {
            ast.scoped_names.insert(id, path.clone());
        }
        for child in ast.children_of(id).to_vec() {
            self.assign_scoped_names(ast, child, &path);
        }
    }

    fn placeholder_decl(&mut self, ast: &mut Ast, root: NodeId) -> NodeId {
        if let Some(id) = self.placeholder {
            return id;
        }
        let err_module = ast.alloc(
            NodeKind::Module(decl::Module {
                name: "<errors>".into(),
                is_library: true,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let placeholder = ast.alloc(
            NodeKind::VarDecl(decl::VarDecl {
                name: "<unresolved>".into(),
                data_type: crate::ast::types::DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            err_module,
        );
        self.placeholder = Some(placeholder);
        placeholder
    }

    fn resolve_one(&mut self, ast: &mut Ast, root: NodeId, ident: NodeId) {
        let path = match ast.kind(ident) {
            NodeKind::IdentRef(r) => r.path.clone(),
            _ => return,
        };
        let span = ast.span(ident);

        let chain = ast.scope_chain(ident);
        let first = &path[0];
        let mut found: Option<NodeId> = None;
        let mut ambiguous = false;

        'outer: for &scope in &chain {
            let mut candidates = Vec::new();
            if let Some(table) = self.members.get(&scope) {
                if let Some(&c) = table.get(first) {
                    candidates.push(c);
                }
            }
            if let NodeKind::Module(m) = ast.kind(scope) {
                for imported in &m.imports {
                    if let Some(&imported_module) = self.modules_by_name.get(imported) {
                        if let Some(table) = self.members.get(&imported_module) {
                            if let Some(&c) = table.get(first) {
                                if !candidates.contains(&c) {
                                    candidates.push(c);
                                }
                            }
                        }
                    }
                }
            }
            match candidates.len() {
                0 => continue,
                1 => {
                    found = Some(candidates[0]);
                    break 'outer;
                }
                _ => {
                    ambiguous = true;
                    break 'outer;
                }
            }
        }

        let mut target = if ambiguous {
            self.diagnostics.push(
                CompileError::AmbiguousName {
                    path: path.join("."),
                },
                span,
            );
            self.placeholder_decl(ast, root)
        } else {
            match found {
                Some(t) => t,
                None => {
                    self.diagnostics.push(
                        CompileError::UnresolvedName {
                            path: path.join("."),
                        },
                        span,
                    );
                    self.placeholder_decl(ast, root)
                }
            }
        };

        for segment in &path[1..] {
            let next = self
                .members
                .get(&target)
                .and_then(|table| table.get(segment))
                .copied();
            target = match next {
                Some(n) => n,
                None => {
                    self.diagnostics.push(
                        CompileError::UnresolvedName {
                            path: path.join("."),
                        },
                        span,
                    );
                    self.placeholder_decl(ast, root)
                }
            };
        }

        ast.resolved.insert(ident, target);
    }
}
