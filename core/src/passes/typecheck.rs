//! Type inference and checking (spec.md §4.3), plus the
//! `AugAssign.isAugmentable` structural predicate that gates the
//! specialized in-place codegen path (spec.md §4.9).

use crate::ast::expr::NumericValue;
use crate::ast::{types::DataType, Ast, NodeId, NodeKind};
use crate::error::{CompileError, Diagnostics};

pub struct TypeChecker {
    diagnostics: Diagnostics<CompileError>,
}

impl TypeChecker {
    pub fn new(source: &str) -> Self {
        Self {
            diagnostics: Diagnostics::new(source.to_string()),
        }
    }

    /// Infer and record the type of every expression reachable from `root`,
    /// and check every assignment's value against its target's type.
    /// Returns whatever diagnostics were collected.
    pub fn run(mut self, ast: &mut Ast, root: NodeId) -> Diagnostics<CompileError> {
        self.walk(ast, root);
        self.diagnostics
    }

    fn walk(&mut self, ast: &mut Ast, id: NodeId) {
        for child in ast.children_of(id).to_vec() {
            self.walk(ast, child);
        }
        if is_expression(ast.kind(id)) {
            let ty = self.infer(ast, id);
            ast.types.insert(id, ty);
        }
        if let NodeKind::Assignment(a) = ast.kind(id).clone() {
            if a.aug_op.is_none() {
                self.check_assignment(ast, id);
            }
        }
        if let NodeKind::VarDecl(decl) = ast.kind(id).clone() {
            if let Some(&init) = ast.children_of(id).first() {
                self.check_value_fits(ast, &decl.data_type, init);
            }
        }
    }

    fn infer(&mut self, ast: &mut Ast, id: NodeId) -> DataType {
        let children = ast.children_of(id).to_vec();
        match ast.kind(id).clone() {
            NodeKind::NumberLit(lit) => lit.data_type,
            NodeKind::StringLit(_) => DataType::Str,
            NodeKind::ArrayLit(lit) => {
                let elem = lit.element_type.clone().unwrap_or_else(|| {
                    children
                        .first()
                        .map(|&c| ast.type_of(c).clone())
                        .unwrap_or(DataType::Ubyte)
                });
                DataType::Array(Box::new(elem), Some(children.len()))
            }
            NodeKind::IdentRef(_) => {
                let target = ast.resolved_target(id);
                self.type_of_declaration(ast, target)
            }
            NodeKind::BinaryExpr(bin) => {
                let lhs = ast.type_of(children[0]).clone();
                let rhs = ast.type_of(children[1]).clone();
                if bin.op.is_comparison() {
                    DataType::Ubyte
                } else {
                    lhs.promote_with(&rhs).unwrap_or(DataType::Ubyte)
                }
            }
            NodeKind::PrefixExpr(pfx) => {
                use crate::ast::expr::PrefixOp;
                match pfx.op {
                    PrefixOp::LogNot => DataType::Ubyte,
                    _ => ast.type_of(children[0]).clone(),
                }
            }
            NodeKind::TypeCast(cast) => cast.target,
            NodeKind::FunctionCallExpr(_) => {
                let callee = children[0];
                if let NodeKind::IdentRef(_) = ast.kind(callee) {
                    let target = ast.resolved_target(callee);
                    self.type_of_declaration(ast, target)
                } else {
                    DataType::Ubyte
                }
            }
            NodeKind::MemRead(_) => DataType::Ubyte,
            NodeKind::AddressOf(_) => DataType::Uword,
            NodeKind::RangeExpr(_) => ast.type_of(children[0]).clone(),
            NodeKind::ArrayIndex(_) => match ast.type_of(children[0]) {
                DataType::Array(elem, _) => (**elem).clone(),
                other => {
                    self.diagnostics.push(
                        CompileError::DomainError {
                            detail: format!("cannot index a value of type {}", other),
                        },
                        ast.span(id),
                    );
                    DataType::Ubyte
                }
            },
            other => panic!("infer() called on non-expression node {:?}", other.type_label()),
        }
    }

    fn type_of_declaration(&self, ast: &Ast, decl: NodeId) -> DataType {
        match ast.kind(decl) {
            NodeKind::VarDecl(v) => v.data_type.clone(),
            NodeKind::Subroutine(s) => s.return_types.first().cloned().unwrap_or(DataType::Ubyte),
            NodeKind::Label(_) => DataType::Uword,
            NodeKind::StructDecl(s) => DataType::Struct {
                name: s.name.clone(),
                resolved: Some(decl),
            },
            _ => DataType::Ubyte,
        }
    }

    fn check_assignment(&mut self, ast: &mut Ast, assignment: NodeId) {
        let children = ast.children_of(assignment).to_vec();
        let (target, value) = (children[0], children[1]);
        let target_ty = ast.type_of(target).clone();
        self.check_value_fits(ast, &target_ty, value);
    }

    /// Checks that `value`'s inferred type fits `target_ty`, per the
    /// widening/narrowing rules in spec.md §4.3.
    fn check_value_fits(&mut self, ast: &Ast, target_ty: &DataType, value: NodeId) {
        let value_ty = ast.type_of(value).clone();
        if value_ty == *target_ty || value_ty.widens_to(target_ty) {
            return;
        }
        if let NodeKind::NumberLit(lit) = ast.kind(value) {
            if literal_fits(&lit.value, target_ty) {
                return;
            }
            self.diagnostics.push(
                CompileError::NarrowingRequiresCast {
                    from: value_ty.to_string(),
                    to: target_ty.to_string(),
                },
                ast.span(value),
            );
            return;
        }
        if let (DataType::Array(_, actual), DataType::Array(_, declared)) = (&value_ty, target_ty) {
            if let (Some(actual), Some(declared)) = (actual, declared) {
                if actual != declared {
                    self.diagnostics.push(
                        CompileError::ArraySizeMismatch {
                            declared: *declared,
                            actual: *actual,
                        },
                        ast.span(value),
                    );
                }
            }
            return;
        }
        if matches!(
            (&value_ty, target_ty),
            (DataType::Struct { .. }, DataType::Struct { .. })
        ) {
            return;
        }
        self.diagnostics.push(
            CompileError::TypeMismatch {
                expected: target_ty.to_string(),
                found: value_ty.to_string(),
            },
            ast.span(value),
        );
    }
}

fn is_expression(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::NumberLit(_)
            | NodeKind::StringLit(_)
            | NodeKind::ArrayLit(_)
            | NodeKind::IdentRef(_)
            | NodeKind::BinaryExpr(_)
            | NodeKind::PrefixExpr(_)
            | NodeKind::TypeCast(_)
            | NodeKind::FunctionCallExpr(_)
            | NodeKind::MemRead(_)
            | NodeKind::AddressOf(_)
            | NodeKind::RangeExpr(_)
            | NodeKind::ArrayIndex(_)
    )
}

pub(crate) fn literal_fits(value: &NumericValue, ty: &DataType) -> bool {
    let n = match value {
        NumericValue::Int(n) => *n,
        NumericValue::Float(_) => return matches!(ty, DataType::Float),
    };
    match ty {
        DataType::Ubyte => (0..=255).contains(&n),
        DataType::Byte => (-128..=127).contains(&n),
        DataType::Uword => (0..=65535).contains(&n),
        DataType::Word => (-32768..=32767).contains(&n),
        DataType::Float => true,
        _ => false,
    }
}

/// Which shape of `A = RHS` lets the augmented-assignment codegen run
/// in-place, per the four disjuncts of `AugAssign.isAugmentable`
/// (spec.md §4.3). Carried alongside the boolean result so codegen dispatch
/// can agree with the predicate's structural match (spec.md §8 property 3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AugmentableForm {
    /// `A = A op X`.
    Direct,
    /// `A = X op A`, `op` associative/commutative.
    Commuted,
    /// `A = (A op X) op Y` or a symmetric two-level tree, same op at both
    /// levels, `A` appearing exactly once.
    TwoLevelSameOp,
    /// `A = op A` or `A = A as T` (optionally through one nested cast).
    PrefixOrCast,
}

/// Tests whether a plain (non-augmented) assignment's RHS can be reshaped
/// into an in-place update of its target, and if so, which shape it is.
/// Operates on a desugared assignment (`a.aug_op` must be `None`): the
/// augmented form `x op= e` is rewritten to `x = x op e` well before codegen
/// sees it (spec.md §4.4 step 5), and this predicate runs against that
/// rewritten form.
pub fn is_augmentable(ast: &Ast, assignment: NodeId) -> Option<AugmentableForm> {
    let children = ast.children_of(assignment);
    if children.len() != 2 {
        return None;
    }
    let (target, rhs) = (children[0], children[1]);

    match ast.kind(rhs) {
        NodeKind::BinaryExpr(bin) => {
            let rhs_children = ast.children_of(rhs);
            let (l, r) = (rhs_children[0], rhs_children[1]);
            if structurally_equal(ast, l, target) {
                return Some(AugmentableForm::Direct);
            }
            if bin.op.is_commutative() && structurally_equal(ast, r, target) {
                return Some(AugmentableForm::Commuted);
            }
            if let NodeKind::BinaryExpr(inner) = ast.kind(l) {
                if inner.op == bin.op {
                    let inner_children = ast.children_of(l);
                    let leaves = [inner_children[0], inner_children[1], r];
                    if count_matches(ast, &leaves, target) == 1 {
                        return Some(AugmentableForm::TwoLevelSameOp);
                    }
                }
            }
            if let NodeKind::BinaryExpr(inner) = ast.kind(r) {
                if inner.op == bin.op {
                    let inner_children = ast.children_of(r);
                    let leaves = [l, inner_children[0], inner_children[1]];
                    if count_matches(ast, &leaves, target) == 1 {
                        return Some(AugmentableForm::TwoLevelSameOp);
                    }
                }
            }
            None
        }
        NodeKind::PrefixExpr(_) => prefix_or_cast_match(ast, rhs, target),
        NodeKind::TypeCast(_) => prefix_or_cast_match(ast, rhs, target),
        _ => None,
    }
}

fn prefix_or_cast_match(ast: &Ast, rhs: NodeId, target: NodeId) -> Option<AugmentableForm> {
    let sub = *ast.children_of(rhs).first()?;
    if structurally_equal(ast, sub, target) {
        return Some(AugmentableForm::PrefixOrCast);
    }
    if matches!(ast.kind(sub), NodeKind::TypeCast(_) | NodeKind::PrefixExpr(_)) {
        let inner = *ast.children_of(sub).first()?;
        if structurally_equal(ast, inner, target) {
            return Some(AugmentableForm::PrefixOrCast);
        }
    }
    None
}

fn count_matches(ast: &Ast, candidates: &[NodeId], target: NodeId) -> usize {
    candidates
        .iter()
        .filter(|&&c| structurally_equal(ast, c, target))
        .count()
}

/// Structural equality for assignment targets: the only shapes codegen
/// treats as addressable storage (spec.md §4.9 "storage kind"), compared
/// deeply so `a[i]` matches `a[i]` but not `a[j]`.
pub(crate) fn structurally_equal(ast: &Ast, a: NodeId, b: NodeId) -> bool {
    match (ast.kind(a), ast.kind(b)) {
        (NodeKind::IdentRef(_), NodeKind::IdentRef(_)) => {
            match (ast.resolved.get(&a), ast.resolved.get(&b)) {
                (Some(ta), Some(tb)) => ta == tb,
                _ => false,
            }
        }
        (NodeKind::ArrayIndex(_), NodeKind::ArrayIndex(_)) => {
            let (ca, cb) = (ast.children_of(a), ast.children_of(b));
            ca.len() == cb.len()
                && ca
                    .iter()
                    .zip(cb)
                    .all(|(&x, &y)| structurally_equal(ast, x, y))
        }
        (NodeKind::MemRead(_), NodeKind::MemRead(_)) => {
            structurally_equal(ast, ast.children_of(a)[0], ast.children_of(b)[0])
        }
        (NodeKind::NumberLit(x), NodeKind::NumberLit(y)) => x.value == y.value,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::{BinOp, IdentRef, NumberLit};
    use crate::ast::stmt::Assignment;
    use crate::util::Span;

    fn ident(ast: &mut Ast, parent: NodeId, target: NodeId, name: &str) -> NodeId {
        let id = ast.alloc(
            NodeKind::IdentRef(IdentRef {
                path: vec![name.into()],
            }),
            Span::SYNTHETIC,
            parent,
        );
        ast.resolved.insert(id, target);
        id
    }

    fn number(ast: &mut Ast, parent: NodeId, n: i64) -> NodeId {
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(n),
            }),
            Span::SYNTHETIC,
            parent,
        )
    }

    #[test]
    fn direct_form_matches_a_op_x() {
        let (mut ast, root) = Ast::new();
        let decl = ast.alloc(
            NodeKind::VarDecl(crate::ast::decl::VarDecl {
                name: "x".into(),
                data_type: DataType::Ubyte,
                zeropage: crate::ast::types::ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            root,
        );
        let assignment = ast.alloc(
            NodeKind::Assignment(Assignment { aug_op: None }),
            Span::SYNTHETIC,
            root,
        );
        let target = ident(&mut ast, assignment, decl, "x");
        let rhs = ast.alloc(
            NodeKind::BinaryExpr(crate::ast::expr::BinaryExpr { op: BinOp::Add }),
            Span::SYNTHETIC,
            assignment,
        );
        let _ = target;
        let lhs_in_rhs = ident(&mut ast, rhs, decl, "x");
        let _ = number(&mut ast, rhs, 3);
        let _ = lhs_in_rhs;

        assert_eq!(is_augmentable(&ast, assignment), Some(AugmentableForm::Direct));
    }

    #[test]
    fn commuted_form_requires_associative_op() {
        let (mut ast, root) = Ast::new();
        let decl = ast.alloc(
            NodeKind::VarDecl(crate::ast::decl::VarDecl {
                name: "x".into(),
                data_type: DataType::Ubyte,
                zeropage: crate::ast::types::ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            root,
        );
        let assignment = ast.alloc(
            NodeKind::Assignment(Assignment { aug_op: None }),
            Span::SYNTHETIC,
            root,
        );
        let _ = ident(&mut ast, assignment, decl, "x");
        let rhs = ast.alloc(
            NodeKind::BinaryExpr(crate::ast::expr::BinaryExpr { op: BinOp::Sub }),
            Span::SYNTHETIC,
            assignment,
        );
        let _ = number(&mut ast, rhs, 3);
        let _ = ident(&mut ast, rhs, decl, "x");

        // Sub is not commutative, so `3 - x` does not reshape to `x -= 3`.
        assert_eq!(is_augmentable(&ast, assignment), None);
    }
}
