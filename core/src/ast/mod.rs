//! The AST core: an arena of nodes addressed by stable [`NodeId`]s, with
//! parent links and child lists maintained as plain data rather than
//! pointers (spec.md §9 "open sealed AST hierarchy with visitors" /
//! "mutable parent pointers set after construction"). Late-bound
//! cross-references (resolved names, inferred types, canonical scoped names)
//! live in side tables on [`Ast`] rather than as fields on the nodes
//! themselves, following the same "Option<SymbolId> populated later" note.

pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::bug;
use crate::util::Span;
use types::DataType;

/// A stable index into the arena. Indices are never reused within one
/// compilation, so a `NodeId` captured before a rewrite remains valid (or
/// detectably dangling, never silently wrong) after it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The tagged sum of every node kind the tree can contain. Matches spec.md
/// §3's declaration/expression/statement inventory one-for-one.
#[derive(Clone, Debug, Serialize)]
pub enum NodeKind {
    Program(decl::Program),
    Module(decl::Module),
    Block(decl::Block),
    Subroutine(decl::Subroutine),
    StructDecl(decl::StructDecl),
    AnonymousScope(decl::AnonymousScope),
    VarDecl(decl::VarDecl),
    Label(decl::Label),
    Directive(decl::Directive),

    NumberLit(expr::NumberLit),
    StringLit(expr::StringLit),
    ArrayLit(expr::ArrayLit),
    IdentRef(expr::IdentRef),
    BinaryExpr(expr::BinaryExpr),
    PrefixExpr(expr::PrefixExpr),
    TypeCast(expr::TypeCast),
    FunctionCallExpr(expr::FunctionCall),
    MemRead(expr::MemRead),
    AddressOf(expr::AddressOf),
    RangeExpr(expr::RangeExpr),
    ArrayIndex(expr::ArrayIndex),

    Assignment(stmt::Assignment),
    PostIncDec(stmt::PostIncDec),
    CallStatement(stmt::CallStatement),
    Return(stmt::Return),
    Break(stmt::Break),
    Jump(stmt::Jump),
    If(stmt::If),
    BranchOnFlag(stmt::BranchOnFlag),
    ForLoop(stmt::ForLoop),
    While(stmt::While),
    Until(stmt::Until),
    RepeatN(stmt::RepeatN),
    When(stmt::When),
    InlineAsm(stmt::InlineAsm),
    NoOp(stmt::NoOp),
}

impl NodeKind {
    /// A node is a scope if it introduces a named environment (spec.md §3
    /// "Scope"): Module, Block, Subroutine, StructDecl, AnonymousScope.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            Self::Module(_)
                | Self::Block(_)
                | Self::Subroutine(_)
                | Self::StructDecl(_)
                | Self::AnonymousScope(_)
        )
    }

    /// True for the statement kinds that unconditionally hand control
    /// elsewhere by their shape alone, without needing name resolution
    /// (spec.md §4.6). A `CallStatement` can also terminate (a call to
    /// `exit`), but that needs the resolved callee, so it's handled by
    /// [`Ast::is_unconditional_terminator`] instead.
    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(self, Self::Return(_) | Self::Break(_) | Self::Jump(_))
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Self::VarDecl(_) | Self::Subroutine(_) | Self::Label(_) | Self::StructDecl(_)
        )
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Program(_) => "Program",
            Self::Module(_) => "Module",
            Self::Block(_) => "Block",
            Self::Subroutine(_) => "Subroutine",
            Self::StructDecl(_) => "StructDecl",
            Self::AnonymousScope(_) => "AnonymousScope",
            Self::VarDecl(_) => "VarDecl",
            Self::Label(_) => "Label",
            Self::Directive(_) => "Directive",
            Self::NumberLit(_) => "NumberLit",
            Self::StringLit(_) => "StringLit",
            Self::ArrayLit(_) => "ArrayLit",
            Self::IdentRef(_) => "IdentRef",
            Self::BinaryExpr(_) => "BinaryExpr",
            Self::PrefixExpr(_) => "PrefixExpr",
            Self::TypeCast(_) => "TypeCast",
            Self::FunctionCallExpr(_) => "FunctionCall",
            Self::MemRead(_) => "MemRead",
            Self::AddressOf(_) => "AddressOf",
            Self::RangeExpr(_) => "RangeExpr",
            Self::ArrayIndex(_) => "ArrayIndex",
            Self::Assignment(_) => "Assignment",
            Self::PostIncDec(_) => "PostIncDec",
            Self::CallStatement(_) => "CallStatement",
            Self::Return(_) => "Return",
            Self::Break(_) => "Break",
            Self::Jump(_) => "Jump",
            Self::If(_) => "If",
            Self::BranchOnFlag(_) => "BranchOnFlag",
            Self::ForLoop(_) => "ForLoop",
            Self::While(_) => "While",
            Self::Until(_) => "Until",
            Self::RepeatN(_) => "RepeatN",
            Self::When(_) => "When",
            Self::InlineAsm(_) => "InlineAsm",
            Self::NoOp(_) => "NoOp",
        }
    }
}

/// One arena slot: a node's payload, its source position, its parent (`None`
/// only for the Program root), and its children in source/current order.
#[derive(Clone, Debug, Serialize)]
pub struct NodeRecord {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// The whole tree plus the late-bound side tables that later passes fill in.
/// Nodes are never physically freed mid-compile: `Remove` just unlinks a
/// node from its parent's child list, which is enough to make it
/// unreachable (spec.md §3 "Lifecycle: destruction is implicit").
#[derive(Clone, Debug, Default, Serialize)]
pub struct Ast {
    nodes: Vec<NodeRecord>,
    /// `IdentRef` node -> the declaration node it names (spec.md §4.2).
    pub resolved: HashMap<NodeId, NodeId>,
    /// Expression node -> inferred data type (spec.md §4.3).
    pub types: HashMap<NodeId, DataType>,
    /// Declaration node -> canonical dotted path from the Program root, used
    /// for assembly-label emission (spec.md §4.2's `scopedName` cache).
    pub scoped_names: HashMap<NodeId, String>,
}

impl Ast {
    /// Start a new tree with a freshly allocated, parentless `Program` root.
    pub fn new() -> (Self, NodeId) {
        let mut ast = Self::default();
        let root = ast.alloc_detached(NodeKind::Program(decl::Program), Span::SYNTHETIC);
        (ast, root)
    }

    fn alloc_detached(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            kind,
            span,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Allocate a new node and append it as the last child of `parent`.
    pub fn alloc(&mut self, kind: NodeKind, span: Span, parent: NodeId) -> NodeId {
        let id = self.alloc_detached(kind, span);
        self.append_child(parent, id);
        id
    }

    /// Allocate a new node with no parent yet. Used by rewriting passes that
    /// build a replacement subtree before splicing it in with one of the
    /// six modification primitives.
    pub fn alloc_detached_node(&mut self, kind: NodeKind, span: Span) -> NodeId {
        self.alloc_detached(kind, span)
    }

    /// Recursively duplicate `node` and its whole subtree into fresh,
    /// detached arena slots, carrying over any `resolved`/`types` side-table
    /// entries the original had. Used by passes that need the same
    /// sub-expression to appear twice in the rewritten tree, e.g.
    /// desugaring `x op= e` into `x = x op e` (spec.md §4.4 step 5), where
    /// the target `x` must occur both as the assignment's target and inside
    /// the new RHS.
    pub fn deep_clone(&mut self, node: NodeId) -> NodeId {
        let kind = self.kind(node).clone();
        let span = self.span(node);
        let children = self.children_of(node).to_vec();
        let clone_id = self.alloc_detached(kind, span);
        for child in children {
            let child_clone = self.deep_clone(child);
            self.append_child(clone_id, child_clone);
        }
        if let Some(&target) = self.resolved.get(&node) {
            self.resolved.insert(clone_id, target);
        }
        if let Some(ty) = self.types.get(&node).cloned() {
            self.types.insert(clone_id, ty);
        }
        clone_id
    }

    pub fn node(&self, id: NodeId) -> &NodeRecord {
        self.nodes.get(id.0 as usize).unwrap_or_else(|| {
            bug!("NodeId {} out of range (arena has {} nodes)", id, self.nodes.len())
        })
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        let len = self.nodes.len();
        self.nodes
            .get_mut(id.0 as usize)
            .unwrap_or_else(|| bug!("NodeId {} out of range (arena has {} nodes)", id, len))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// The enclosing scope of `id`: walk parents until one is a scope node,
    /// per spec.md §3's scope-chain definition. Returns `None` only for the
    /// Program root itself.
    pub fn enclosing_scope(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.parent_of(id)?;
        loop {
            if self.kind(cur).is_scope() || matches!(self.kind(cur), NodeKind::Program(_)) {
                return Some(cur);
            }
            cur = self.parent_of(cur)?;
        }
    }

    /// The full scope chain from `id`'s enclosing scope out to the Program
    /// root, nearest first.
    pub fn scope_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cur = self.enclosing_scope(id);
        while let Some(scope) = cur {
            chain.push(scope);
            if matches!(self.kind(scope), NodeKind::Program(_)) {
                break;
            }
            cur = self.parent_of(scope);
        }
        chain
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> usize {
        self.children_of(parent)
            .iter()
            .position(|&c| c == child)
            .unwrap_or_else(|| {
                bug!(
                    "{} is not among {}'s children during replace/remove",
                    child,
                    parent
                )
            })
    }

    /// Append `child` as the new last child of `parent`, setting its parent
    /// link. Panics (internal invariant violation) if `child` already has a
    /// parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(child).parent.is_some() {
            bug!("{} already has a parent; detach it before reattaching", child);
        }
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    fn insert_child_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if self.node(child).parent.is_some() {
            bug!("{} already has a parent; detach it before reattaching", child);
        }
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.insert(index, child);
    }

    /// Remove `node` from `parent`'s child list and clear its parent link.
    /// The node becomes unreachable but is not removed from the arena —
    /// existing `NodeId`s into it (e.g. in a side table computed earlier)
    /// remain well-formed pointers, just to a now-detached subtree.
    pub fn remove(&mut self, parent: NodeId, node: NodeId) {
        let idx = self.child_index(parent, node);
        self.node_mut(parent).children.remove(idx);
        self.node_mut(node).parent = None;
    }

    /// Replace `old` with `new` in `parent`'s child list, in place.
    pub fn replace(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        let idx = self.child_index(parent, old);
        self.node_mut(old).parent = None;
        if self.node(new).parent.is_some() {
            bug!("{} already has a parent; detach it before reattaching", new);
        }
        self.node_mut(new).parent = Some(parent);
        self.node_mut(parent).children[idx] = new;
    }

    pub fn insert_before(&mut self, parent: NodeId, anchor: NodeId, new: NodeId) {
        let idx = self.child_index(parent, anchor);
        self.insert_child_at(parent, idx, new);
    }

    pub fn insert_after(&mut self, parent: NodeId, anchor: NodeId, new: NodeId) {
        let idx = self.child_index(parent, anchor);
        self.insert_child_at(parent, idx + 1, new);
    }

    pub fn insert_first(&mut self, parent: NodeId, new: NodeId) {
        self.insert_child_at(parent, 0, new);
    }

    pub fn insert_last(&mut self, parent: NodeId, new: NodeId) {
        let len = self.children_of(parent).len();
        self.insert_child_at(parent, len, new);
    }

    /// The canonical dotted path computed by the name resolver. Panics if
    /// queried before resolution has populated it — querying this early is
    /// always a pass-ordering bug, never a user-facing condition.
    pub fn scoped_name(&self, decl: NodeId) -> &str {
        self.scoped_names
            .get(&decl)
            .unwrap_or_else(|| bug!("scopedName queried on {} before name resolution ran", decl))
    }

    /// The declaration an `IdentRef` resolved to. Panics if queried before
    /// resolution.
    pub fn resolved_target(&self, ident_ref: NodeId) -> NodeId {
        *self.resolved.get(&ident_ref).unwrap_or_else(|| {
            bug!("{} queried for its resolution before name resolution ran", ident_ref)
        })
    }

    /// Does `id` unconditionally hand control elsewhere — `return`, `break`,
    /// `jump`, or a call whose callee resolves to the `exit` subroutine
    /// (spec.md §4.6)? Used by dead-code removal to flag unreachable code
    /// following it.
    pub fn is_unconditional_terminator(&self, id: NodeId) -> bool {
        if self.kind(id).is_unconditional_terminator() {
            return true;
        }
        if !matches!(self.kind(id), NodeKind::CallStatement(_)) {
            return false;
        }
        let callee = match self.children_of(id).first() {
            Some(&c) => c,
            None => return false,
        };
        if !matches!(self.kind(callee), NodeKind::IdentRef(_)) {
            return false;
        }
        match self.resolved.get(&callee) {
            Some(&target) => matches!(self.kind(target), NodeKind::Subroutine(s) if s.is_exit()),
            None => false,
        }
    }

    /// The inferred type of an expression node. Panics if queried before
    /// type inference.
    pub fn type_of(&self, expr: NodeId) -> &DataType {
        self.types
            .get(&expr)
            .unwrap_or_else(|| bug!("{} queried for its type before type inference ran", expr))
    }

    /// Verifies testable property 1 (spec.md §8): for every node, its
    /// parent's child list actually contains it. Used by tests and by
    /// passes in debug builds to catch tree-surgery bugs early.
    #[cfg(any(test, debug_assertions))]
    pub fn check_parent_child_consistency(&self) -> Result<(), String> {
        for (i, record) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            if let Some(parent) = record.parent {
                if !self.children_of(parent).contains(&id) {
                    return Err(format!(
                        "{} claims parent {} but is not among its children",
                        id, parent
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(ast: &mut Ast, parent: NodeId) -> NodeId {
        ast.alloc(NodeKind::NoOp(stmt::NoOp), Span::SYNTHETIC, parent)
    }

    #[test]
    fn new_tree_has_parentless_root() {
        let (ast, root) = Ast::new();
        assert!(ast.parent_of(root).is_none());
        assert!(matches!(ast.kind(root), NodeKind::Program(_)));
    }

    #[test]
    fn append_sets_parent_and_child_list() {
        let (mut ast, root) = Ast::new();
        let child = leaf(&mut ast, root);
        assert_eq!(ast.parent_of(child), Some(root));
        assert_eq!(ast.children_of(root), &[child]);
        ast.check_parent_child_consistency().unwrap();
    }

    #[test]
    fn remove_detaches_but_keeps_node_addressable() {
        let (mut ast, root) = Ast::new();
        let child = leaf(&mut ast, root);
        ast.remove(root, child);
        assert!(ast.children_of(root).is_empty());
        assert!(ast.parent_of(child).is_none());
        // The node is still a valid arena slot.
        assert!(matches!(ast.kind(child), NodeKind::NoOp(_)));
    }

    #[test]
    fn replace_swaps_child_in_place() {
        let (mut ast, root) = Ast::new();
        let old = leaf(&mut ast, root);
        let new = ast.alloc_detached(NodeKind::NoOp(stmt::NoOp), Span::SYNTHETIC);
        ast.replace(root, old, new);
        assert_eq!(ast.children_of(root), &[new]);
        assert_eq!(ast.parent_of(new), Some(root));
        assert!(ast.parent_of(old).is_none());
    }

    #[test]
    fn insert_before_and_after_preserve_order() {
        let (mut ast, root) = Ast::new();
        let a = leaf(&mut ast, root);
        let c = leaf(&mut ast, root);
        let b = ast.alloc_detached(NodeKind::NoOp(stmt::NoOp), Span::SYNTHETIC);
        ast.insert_after(root, a, b);
        assert_eq!(ast.children_of(root), &[a, b, c]);

        let z = ast.alloc_detached(NodeKind::NoOp(stmt::NoOp), Span::SYNTHETIC);
        ast.insert_before(root, a, z);
        assert_eq!(ast.children_of(root), &[z, a, b, c]);
    }

    #[test]
    #[should_panic(expected = "already has a parent")]
    fn append_panics_on_double_attach() {
        let (mut ast, root) = Ast::new();
        let child = leaf(&mut ast, root);
        ast.append_child(root, child);
    }

    #[test]
    #[should_panic(expected = "scopedName queried")]
    fn scoped_name_panics_before_resolution() {
        let (ast, root) = Ast::new();
        ast.scoped_name(root);
    }
}
