//! The constant folder (spec.md §4.5): literal evaluation, identifier
//! inlining, algebraic re-association, range desugaring, for-loop iterable
//! retyping, and literal promotion on assignment. Runs to a fixpoint via
//! [`crate::walker::run_to_fixpoint`]; every individual rewrite strictly
//! reduces either term size or the count of remaining non-constant leaves,
//! which is what makes convergence guaranteed (spec.md §8 property 4).

use crate::ast::expr::{BinOp, NumberLit, NumericValue};
use crate::ast::types::DataType;
use crate::ast::{Ast, NodeId, NodeKind};
use crate::consts::MAX_CONSTFOLD_ROUNDS;
use crate::error::{CompileError, Diagnostics};
use crate::util::Span;
use crate::walker::{Modification, MutatingPass};

pub struct ConstFolder {
    diagnostics: Diagnostics<CompileError>,
    optimizations_done: usize,
}

impl ConstFolder {
    pub fn new(source: &str) -> Self {
        Self {
            diagnostics: Diagnostics::new(source.to_string()),
            optimizations_done: 0,
        }
    }

    pub fn run(mut self, ast: &mut Ast, root: NodeId) -> Diagnostics<CompileError> {
        crate::walker::run_to_fixpoint(&mut self, ast, root, MAX_CONSTFOLD_ROUNDS);
        self.diagnostics
    }

    /// How many rewrites this folder applied across its whole run — the
    /// counter spec.md §4.5 uses to detect the fixpoint.
    pub fn optimizations_done(&self) -> usize {
        self.optimizations_done
    }
}

impl MutatingPass for ConstFolder {
    fn visit_node(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
        match ast.kind(id).clone() {
            NodeKind::IdentRef(_) => self.try_inline_identifier(ast, id, mods),
            NodeKind::BinaryExpr(_) => {
                if !self.try_fold_literal_binary(ast, id, mods) {
                    self.try_reassociate(ast, id, mods);
                }
            }
            NodeKind::PrefixExpr(_) => self.try_fold_literal_prefix(ast, id, mods),
            NodeKind::RangeExpr(_) => self.try_desugar_range(ast, id, mods),
            NodeKind::ForLoop(_) => self.try_retype_for_iterable(ast, id, mods),
            NodeKind::Assignment(a) if a.aug_op.is_none() => self.try_promote_literal(ast, id, mods),
            _ => {}
        }
    }
}

fn as_const(ast: &Ast, id: NodeId) -> Option<NumberLit> {
    match ast.kind(id) {
        NodeKind::NumberLit(n) => Some(n.clone()),
        _ => None,
    }
}

/// Find a `VarDecl` named `name` reachable from `id`'s scope chain, the same
/// direct-children-of-a-scope lookup name resolution uses (spec.md §4.2).
/// A for-loop variable is never an arena node in its own right, so this is
/// the only way to learn its declared type, when one exists at all.
fn find_enclosing_var_decl_type(ast: &Ast, id: NodeId, name: &str) -> Option<DataType> {
    for scope in ast.scope_chain(id) {
        for &child in ast.children_of(scope) {
            if let NodeKind::VarDecl(v) = ast.kind(child) {
                if v.name == name {
                    return Some(v.data_type.clone());
                }
            }
        }
    }
    None
}

impl ConstFolder {
    fn replace_with_literal(&mut self, ast: &mut Ast, id: NodeId, lit: NumberLit, mods: &mut Vec<Modification>) {
        let parent = match ast.parent_of(id) {
            Some(p) => p,
            None => return,
        };
        let span = ast.span(id);
        let new = ast.alloc_detached_node(NodeKind::NumberLit(lit.clone()), span);
        ast.types.insert(new, lit.data_type);
        mods.push(Modification::Replace { parent, old: id, new });
        self.optimizations_done += 1;
    }

    /// Evaluate a binary expression whose operands are both literals.
    /// Returns true if the node was handled (folded or diagnosed), so the
    /// caller doesn't also attempt re-association on it.
    fn try_fold_literal_binary(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) -> bool {
        let children = ast.children_of(id).to_vec();
        let (lhs, rhs) = (children[0], children[1]);
        let (l, r) = match (as_const(ast, lhs), as_const(ast, rhs)) {
            (Some(l), Some(r)) => (l, r),
            _ => return false,
        };
        let op = match ast.kind(id) {
            NodeKind::BinaryExpr(b) => b.op,
            _ => return false,
        };
        match eval_binop(op, &l.value, &r.value) {
            Ok(value) => {
                let ty = ast.types.get(&id).cloned().unwrap_or_else(|| l.data_type.clone());
                self.replace_with_literal(ast, id, NumberLit { data_type: ty, value }, mods);
            }
            Err(err) => self.diagnostics.push(err, ast.span(id)),
        }
        true
    }

    fn try_fold_literal_prefix(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
        use crate::ast::expr::PrefixOp;
        let children = ast.children_of(id).to_vec();
        let sub = match as_const(ast, children[0]) {
            Some(s) => s,
            None => return,
        };
        let op = match ast.kind(id) {
            NodeKind::PrefixExpr(p) => p.op,
            _ => return,
        };
        let value = match (op, sub.value) {
            (PrefixOp::Plus, v) => v,
            (PrefixOp::Neg, NumericValue::Int(n)) => NumericValue::Int(-n),
            (PrefixOp::Neg, NumericValue::Float(f)) => NumericValue::Float(-f),
            (PrefixOp::BitNot, NumericValue::Int(n)) => NumericValue::Int(!n),
            (PrefixOp::LogNot, NumericValue::Int(n)) => NumericValue::Int(if n == 0 { 1 } else { 0 }),
            (PrefixOp::BitNot, NumericValue::Float(_)) | (PrefixOp::LogNot, NumericValue::Float(_)) => {
                self.diagnostics.push(
                    CompileError::DomainError {
                        detail: "bitwise/logical not is undefined on a float".into(),
                    },
                    ast.span(id),
                );
                return;
            }
        };
        let ty = ast.types.get(&id).cloned().unwrap_or(sub.data_type);
        self.replace_with_literal(ast, id, NumberLit { data_type: ty, value }, mods);
    }

    /// Identifier inlining: a reference to a simple-numeric `const`
    /// declaration is replaced by a copy of its literal value.
    fn try_inline_identifier(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
        let target = match ast.resolved.get(&id) {
            Some(&t) => t,
            None => return,
        };
        let is_const = matches!(ast.kind(target), NodeKind::VarDecl(v) if v.is_const);
        if !is_const {
            return;
        }
        let init = match ast.children_of(target).first() {
            Some(&i) => i,
            None => return,
        };
        if let Some(lit) = as_const(ast, init) {
            self.replace_with_literal(ast, id, lit, mods);
        }
    }

    /// Algebraic re-association for "group two constants" (spec.md §4.5):
    /// `X op1 (Y op2 Z)` where exactly one of X, Y, Z is non-constant,
    /// rewritten to bring the two constants adjacent.
    fn try_reassociate(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
        let outer_op = match ast.kind(id) {
            NodeKind::BinaryExpr(b) => b.op,
            _ => return,
        };
        let children = ast.children_of(id).to_vec();
        let (x, y_or_rhs) = (children[0], children[1]);
        let (inner, x, x_is_outer_lhs) = if matches!(ast.kind(y_or_rhs), NodeKind::BinaryExpr(_)) {
            (y_or_rhs, x, true)
        } else if matches!(ast.kind(x), NodeKind::BinaryExpr(_)) {
            (x, y_or_rhs, false)
        } else {
            return;
        };
        let inner_op = match ast.kind(inner) {
            NodeKind::BinaryExpr(b) => b.op,
            _ => return,
        };
        let inner_children = ast.children_of(inner).to_vec();
        let (y, z) = (inner_children[0], inner_children[1]);

        let (c1, c2, t, t_is_y) = match (as_const(ast, x), as_const(ast, y), as_const(ast, z)) {
            (Some(c1), Some(c2), None) => (c1, c2, z, false),
            (Some(c1), None, Some(c2)) => (c1, c2, y, true),
            _ => return,
        };
        // Only integer-with-integer or float-with-float reassociation; never
        // mix (spec.md §4.5: "mixing types is disallowed here because
        // semantics differ").
        if std::mem::discriminant(&c1.value) != std::mem::discriminant(&c2.value) {
            return;
        }

        let (new_op, combine) = match reassociation_rewrite(outer_op, inner_op, x_is_outer_lhs, t_is_y) {
            Some(r) => r,
            None => return,
        };
        let combined_value = match combine(&c1.value, &c2.value) {
            Ok(v) => v,
            Err(err) => {
                self.diagnostics.push(err, ast.span(id));
                return;
            }
        };

        let parent = match ast.parent_of(id) {
            Some(p) => p,
            None => return,
        };
        let span = ast.span(id);
        let combined_lit = ast.alloc_detached_node(
            NodeKind::NumberLit(NumberLit {
                data_type: c1.data_type.clone(),
                value: combined_value,
            }),
            span,
        );
        ast.types.insert(combined_lit, c1.data_type);

        ast.remove(inner, t);
        let new_expr = ast.alloc_detached_node(NodeKind::BinaryExpr(crate::ast::expr::BinaryExpr { op: new_op }), span);
        // Sub/Div are not commutative: every non-commutative rewrite above
        // puts the combined constant on the left, `T` on the right. Add/Mul
        // rewrites don't care about order.
        if matches!(new_op, BinOp::Sub | BinOp::Div) {
            ast.append_child(new_expr, combined_lit);
            ast.append_child(new_expr, t);
        } else {
            ast.append_child(new_expr, t);
            ast.append_child(new_expr, combined_lit);
        }
        if let Some(ty) = ast.types.get(&id).cloned() {
            ast.types.insert(new_expr, ty);
        }

        mods.push(Modification::Replace { parent, old: id, new: new_expr });
        self.optimizations_done += 1;
    }

    fn try_desugar_range(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
        // Range desugaring only applies when the range is an array
        // initializer; that context is the parent being a VarDecl of array
        // type. Bounds/step must all already be literals.
        let parent = match ast.parent_of(id) {
            Some(p) => p,
            None => return,
        };
        let declared_size = match ast.kind(parent) {
            NodeKind::VarDecl(v) => match &v.data_type {
                DataType::Array(_, size) => *size,
                _ => return,
            },
            _ => return,
        };

        let children = ast.children_of(id).to_vec();
        let start = match as_const(ast, children[0]) {
            Some(s) => s,
            None => return,
        };
        let end = match as_const(ast, children[1]) {
            Some(e) => e,
            None => return,
        };
        let step = if children.len() > 2 {
            match as_const(ast, children[2]).map(|s| s.value) {
                Some(NumericValue::Int(n)) => n,
                _ => return,
            }
        } else {
            1
        };
        let (start_n, end_n) = match (start.value, end.value) {
            (NumericValue::Int(a), NumericValue::Int(b)) => (a, b),
            _ => return,
        };
        if step == 0 {
            self.diagnostics.push(
                CompileError::DomainError {
                    detail: "range step cannot be zero".into(),
                },
                ast.span(id),
            );
            return;
        }
        let mut values = Vec::new();
        let mut v = start_n;
        while (step > 0 && v <= end_n) || (step < 0 && v >= end_n) {
            values.push(v);
            v += step;
        }

        if let Some(declared) = declared_size {
            if values.len() != declared {
                self.diagnostics.push(
                    CompileError::ArraySizeMismatch {
                        declared,
                        actual: values.len(),
                    },
                    ast.span(id),
                );
                return;
            }
        }

        let span = ast.span(id);
        let array_lit = ast.alloc_detached_node(
            NodeKind::ArrayLit(crate::ast::expr::ArrayLit {
                element_type: Some(start.data_type.clone()),
            }),
            span,
        );
        for value in &values {
            let lit = ast.alloc_detached_node(
                NodeKind::NumberLit(NumberLit {
                    data_type: start.data_type.clone(),
                    value: NumericValue::Int(*value),
                }),
                span,
            );
            ast.append_child(array_lit, lit);
        }
        ast.types.insert(
            array_lit,
            DataType::Array(Box::new(start.data_type), Some(values.len())),
        );

        mods.push(Modification::Replace { parent, old: id, new: array_lit });
        self.optimizations_done += 1;
    }

    /// For-loop iterable retyping (spec.md §4.5): when `var_name` names a
    /// declaration in an enclosing scope whose type differs from the
    /// range's element type, and the range's bounds/step are literals that
    /// all fit that declared type, retype them in place to match.
    fn try_retype_for_iterable(&mut self, ast: &mut Ast, for_loop: NodeId, mods: &mut Vec<Modification>) {
        let var_name = match ast.kind(for_loop) {
            NodeKind::ForLoop(f) => f.var_name.clone(),
            _ => return,
        };
        let iterable = match ast.children_of(for_loop).first() {
            Some(&i) => i,
            None => return,
        };
        if !matches!(ast.kind(iterable), NodeKind::RangeExpr(_)) {
            return;
        }
        let loop_var_ty = match find_enclosing_var_decl_type(ast, for_loop, &var_name) {
            Some(ty) => ty,
            None => return,
        };

        let range_children = ast.children_of(iterable).to_vec();
        let mut literals = Vec::with_capacity(range_children.len());
        for &child in &range_children {
            match as_const(ast, child) {
                Some(lit) => literals.push((child, lit)),
                None => return,
            }
        }
        let elem_ty = literals[0].1.data_type.clone();
        if elem_ty == loop_var_ty {
            return;
        }
        if !literals
            .iter()
            .all(|(_, lit)| crate::passes::typecheck::literal_fits(&lit.value, &loop_var_ty))
        {
            return;
        }

        for (child, lit) in literals {
            self.replace_with_literal(
                ast,
                child,
                NumberLit {
                    data_type: loop_var_ty.clone(),
                    value: lit.value,
                },
                mods,
            );
        }
    }

    fn try_promote_literal(&mut self, ast: &mut Ast, id: NodeId, mods: &mut Vec<Modification>) {
        let children = ast.children_of(id).to_vec();
        let (target, value) = (children[0], children[1]);
        let target_ty = match ast.types.get(&target) {
            Some(t) => t.clone(),
            None => return,
        };
        let value_ty = match ast.types.get(&value) {
            Some(t) => t.clone(),
            None => return,
        };
        if target_ty == value_ty || !target_ty.in_numeric_datatypes() {
            return;
        }
        let lit = match as_const(ast, value) {
            Some(l) => l,
            None => return,
        };
        self.replace_with_literal(
            ast,
            value,
            NumberLit {
                data_type: target_ty,
                value: lit.value,
            },
            mods,
        );
    }
}

type CombineFn = fn(&NumericValue, &NumericValue) -> Result<NumericValue, CompileError>;

/// The re-association table from spec.md §4.5, keyed by (outer op, inner
/// op, whether the lone constant sits on the outer expression's left, and
/// whether the non-constant leaf is the inner expression's left child).
/// Only the non-commutative families (`-`, `/`) actually need all four
/// flags to disambiguate; the additive/multiplicative-identity families
/// collapse several table rows onto the same rewrite.
fn reassociation_rewrite(
    outer: BinOp,
    inner: BinOp,
    x_is_outer_lhs: bool,
    t_is_y: bool,
) -> Option<(BinOp, CombineFn)> {
    use BinOp::*;
    match (outer, inner) {
        // c1 + (c2 + T), c1 + (T + c2), (c1 + T) + c2, (T + c1) + c2 -> T + (c1+c2)
        (Add, Add) => Some((Add, add as CombineFn)),
        // c1 * (c2 * T) and symmetric -> T * (c1*c2)
        (Mul, Mul) => Some((Mul, mul as CombineFn)),
        // c1 - (c2 + T), c1 - (T + c2) -> (c1-c2) - T
        (Sub, Add) if x_is_outer_lhs => Some((Sub, sub as CombineFn)),
        // (c1 + T) - c2, (T + c1) - c2 -> T + (c1-c2)
        (Sub, Add) if !x_is_outer_lhs => Some((Add, sub as CombineFn)),
        // c1 + (c2 - T) -> (c1+c2) - T
        (Add, Sub) if x_is_outer_lhs && !t_is_y => Some((Sub, add as CombineFn)),
        // c1 + (T - c2) -> T + (c1-c2)
        (Add, Sub) if x_is_outer_lhs && t_is_y => Some((Add, sub as CombineFn)),
        // (c1 - T) + c2 -> (c1+c2) - T
        (Add, Sub) if !x_is_outer_lhs && t_is_y => Some((Sub, add as CombineFn)),
        // c1 / (c2 * T), c1 / (T * c2) -> (c1/c2) / T
        (Div, Mul) if x_is_outer_lhs => Some((Div, div as CombineFn)),
        // (c1 * T) / c2, (T * c1) / c2 -> (c1/c2) * T
        (Div, Mul) if !x_is_outer_lhs => Some((Mul, div as CombineFn)),
        // c1 * (c2 / T) -> (c1*c2) / T
        (Mul, Div) if x_is_outer_lhs && !t_is_y => Some((Div, mul as CombineFn)),
        // c1 * (T / c2) -> (c1/c2) * T
        (Mul, Div) if x_is_outer_lhs && t_is_y => Some((Mul, div as CombineFn)),
        // (c1 / T) * c2 -> (c1*c2) / T
        (Mul, Div) if !x_is_outer_lhs && !t_is_y => Some((Div, mul as CombineFn)),
        // (T / c1) * c2 -> (c2/c1) * T
        (Mul, Div) if !x_is_outer_lhs && t_is_y => Some((Mul, |a, b| div(b, a))),
        _ => None,
    }
}

/// Diagnoses a float result whose magnitude overflows the 5-byte float
/// range (spec.md §4.5), the single choke point every float arithmetic
/// result passes through before it can be folded into the tree.
fn check_float_range(v: NumericValue) -> Result<NumericValue, CompileError> {
    if let NumericValue::Float(f) = v {
        if f.is_finite() && f.abs() > crate::consts::floats::MAX_MAGNITUDE {
            return Err(CompileError::FloatOverflow);
        }
    }
    Ok(v)
}

fn add(a: &NumericValue, b: &NumericValue) -> Result<NumericValue, CompileError> {
    match (a, b) {
        (NumericValue::Int(x), NumericValue::Int(y)) => Ok(NumericValue::Int(x + y)),
        (NumericValue::Float(x), NumericValue::Float(y)) => check_float_range(NumericValue::Float(x + y)),
        _ => unreachable!("mixed constant kinds are filtered out before combine runs"),
    }
}

fn sub(a: &NumericValue, b: &NumericValue) -> Result<NumericValue, CompileError> {
    match (a, b) {
        (NumericValue::Int(x), NumericValue::Int(y)) => Ok(NumericValue::Int(x - y)),
        (NumericValue::Float(x), NumericValue::Float(y)) => check_float_range(NumericValue::Float(x - y)),
        _ => unreachable!("mixed constant kinds are filtered out before combine runs"),
    }
}

fn mul(a: &NumericValue, b: &NumericValue) -> Result<NumericValue, CompileError> {
    match (a, b) {
        (NumericValue::Int(x), NumericValue::Int(y)) => Ok(NumericValue::Int(x * y)),
        (NumericValue::Float(x), NumericValue::Float(y)) => check_float_range(NumericValue::Float(x * y)),
        _ => unreachable!("mixed constant kinds are filtered out before combine runs"),
    }
}

fn div(a: &NumericValue, b: &NumericValue) -> Result<NumericValue, CompileError> {
    match (a, b) {
        (NumericValue::Int(_), NumericValue::Int(0)) => Err(CompileError::DomainError {
            detail: "division by zero while re-associating constants".into(),
        }),
        (NumericValue::Int(x), NumericValue::Int(y)) => Ok(NumericValue::Int(x / y)),
        (NumericValue::Float(x), NumericValue::Float(y)) => check_float_range(NumericValue::Float(x / y)),
        _ => unreachable!("mixed constant kinds are filtered out before combine runs"),
    }
}

fn eval_binop(op: BinOp, l: &NumericValue, r: &NumericValue) -> Result<NumericValue, CompileError> {
    use BinOp::*;
    match op {
        Add => add(l, r),
        Sub => sub(l, r),
        Mul => mul(l, r),
        Div => div(l, r),
        Mod => match (l, r) {
            (NumericValue::Int(_), NumericValue::Int(0)) => Err(CompileError::DomainError {
                detail: "division by zero".into(),
            }),
            (NumericValue::Int(x), NumericValue::Int(y)) => Ok(NumericValue::Int(x % y)),
            _ => Err(CompileError::DomainError {
                detail: "remainder is only defined on integers".into(),
            }),
        },
        Shl | Shr | And | Or | Xor => match (l, r) {
            (NumericValue::Int(x), NumericValue::Int(y)) => Ok(NumericValue::Int(match op {
                Shl => x.wrapping_shl(*y as u32),
                Shr => x.wrapping_shr(*y as u32),
                And => x & y,
                Or => x | y,
                Xor => x ^ y,
                _ => unreachable!(),
            })),
            _ => Err(CompileError::DomainError {
                detail: "bitwise operators require integer operands".into(),
            }),
        },
        LogAnd | LogOr | Eq | NotEq | Lt | LtEq | Gt | GtEq => eval_comparison(op, l, r),
    }
}

fn eval_comparison(op: BinOp, l: &NumericValue, r: &NumericValue) -> Result<NumericValue, CompileError> {
    use BinOp::*;
    let result = match (l, r) {
        (NumericValue::Int(x), NumericValue::Int(y)) => match op {
            LogAnd => *x != 0 && *y != 0,
            LogOr => *x != 0 || *y != 0,
            Eq => x == y,
            NotEq => x != y,
            Lt => x < y,
            LtEq => x <= y,
            Gt => x > y,
            GtEq => x >= y,
            _ => unreachable!(),
        },
        (NumericValue::Float(x), NumericValue::Float(y)) => match op {
            Eq => x == y,
            NotEq => x != y,
            Lt => x < y,
            LtEq => x <= y,
            Gt => x > y,
            GtEq => x >= y,
            _ => {
                return Err(CompileError::DomainError {
                    detail: "logical and/or require integer operands".into(),
                })
            }
        },
        _ => {
            return Err(CompileError::DomainError {
                detail: "comparison requires matching operand kinds".into(),
            })
        }
    };
    Ok(NumericValue::Int(if result { 1 } else { 0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::VarDecl;
    use crate::ast::expr::{BinaryExpr, IdentRef};
    use crate::ast::types::ZeropageWish;
    use crate::ast::Ast;

    fn lit(ast: &mut Ast, parent: NodeId, n: i64) -> NodeId {
        let id = ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(n),
            }),
            Span::SYNTHETIC,
            parent,
        );
        ast.types.insert(id, DataType::Ubyte);
        id
    }

    #[test]
    fn folds_literal_addition() {
        let (mut ast, root) = Ast::new();
        let expr = ast.alloc(
            NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }),
            Span::SYNTHETIC,
            root,
        );
        lit(&mut ast, expr, 2);
        lit(&mut ast, expr, 3);

        let folder = ConstFolder::new("");
        folder.run(&mut ast, root);

        let result = ast.children_of(root)[0];
        match ast.kind(result) {
            NodeKind::NumberLit(n) => assert_eq!(n.value, NumericValue::Int(5)),
            other => panic!("expected a folded literal, got {:?}", other),
        }
    }

    #[test]
    fn reassociates_t_plus_c1_plus_c2() {
        let (mut ast, root) = Ast::new();
        let var = ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "a".into(),
                data_type: DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            root,
        );

        // (a + 3) + 5
        let outer = ast.alloc(
            NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }),
            Span::SYNTHETIC,
            root,
        );
        let inner = ast.alloc(
            NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }),
            Span::SYNTHETIC,
            outer,
        );
        let ident = ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["a".into()] }),
            Span::SYNTHETIC,
            inner,
        );
        ast.resolved.insert(ident, var);
        ast.types.insert(ident, DataType::Ubyte);
        lit(&mut ast, inner, 3);
        lit(&mut ast, outer, 5);

        let folder = ConstFolder::new("");
        folder.run(&mut ast, root);

        let result = ast.children_of(root)[1];
        if let NodeKind::BinaryExpr(b) = ast.kind(result) {
            assert_eq!(b.op, BinOp::Add);
            let children = ast.children_of(result);
            assert!(matches!(ast.kind(children[0]), NodeKind::IdentRef(_)));
            match ast.kind(children[1]) {
                NodeKind::NumberLit(n) => assert_eq!(n.value, NumericValue::Int(8)),
                other => panic!("expected literal 8, got {:?}", other),
            }
        } else {
            panic!("expected a re-associated BinaryExpr");
        }
    }

    #[test]
    fn division_by_zero_is_diagnosed_not_evaluated() {
        let (mut ast, root) = Ast::new();
        let expr = ast.alloc(
            NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Div }),
            Span::SYNTHETIC,
            root,
        );
        lit(&mut ast, expr, 10);
        lit(&mut ast, expr, 0);

        let folder = ConstFolder::new("10 / 0");
        let diags = folder.run(&mut ast, root);
        assert_eq!(diags.errors().len(), 1);
        // The node is left as-is, not silently evaluated.
        assert!(matches!(ast.kind(expr), NodeKind::BinaryExpr(_)));
    }

    #[test]
    fn for_loop_retypes_range_bounds_to_loop_variable_type() {
        use crate::ast::expr::RangeExpr;
        use crate::ast::stmt::ForLoop;

        let (mut ast, root) = Ast::new();
        ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "i".into(),
                data_type: DataType::Uword,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            root,
        );

        let for_loop = ast.alloc(
            NodeKind::ForLoop(ForLoop {
                var_name: "i".into(),
                body_len: 0,
            }),
            Span::SYNTHETIC,
            root,
        );
        let range = ast.alloc(NodeKind::RangeExpr(RangeExpr { has_step: false }), Span::SYNTHETIC, for_loop);
        let start = lit(&mut ast, range, 0);
        let end = lit(&mut ast, range, 5);

        let folder = ConstFolder::new("");
        folder.run(&mut ast, root);

        for bound in [start, end] {
            match ast.kind(bound) {
                NodeKind::NumberLit(n) => assert_eq!(n.data_type, DataType::Uword),
                other => panic!("expected a retyped literal, got {:?}", other),
            }
        }
    }

    #[test]
    fn for_loop_leaves_range_untouched_without_a_matching_var_decl() {
        use crate::ast::expr::RangeExpr;
        use crate::ast::stmt::ForLoop;

        let (mut ast, root) = Ast::new();
        let for_loop = ast.alloc(
            NodeKind::ForLoop(ForLoop {
                var_name: "i".into(),
                body_len: 0,
            }),
            Span::SYNTHETIC,
            root,
        );
        let range = ast.alloc(NodeKind::RangeExpr(RangeExpr { has_step: false }), Span::SYNTHETIC, for_loop);
        let start = lit(&mut ast, range, 0);

        let folder = ConstFolder::new("");
        folder.run(&mut ast, root);

        match ast.kind(start) {
            NodeKind::NumberLit(n) => assert_eq!(n.data_type, DataType::Ubyte),
            other => panic!("expected the literal untouched, got {:?}", other),
        }
    }

    #[test]
    fn range_array_size_mismatch_is_diagnosed() {
        use crate::ast::expr::RangeExpr;

        let (mut ast, root) = Ast::new();
        let var = ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "buf".into(),
                data_type: DataType::Array(Box::new(DataType::Ubyte), Some(10)),
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            root,
        );
        let range = ast.alloc(NodeKind::RangeExpr(RangeExpr { has_step: false }), Span::SYNTHETIC, var);
        lit(&mut ast, range, 0);
        lit(&mut ast, range, 4);

        let folder = ConstFolder::new("0..4");
        let diags = folder.run(&mut ast, root);
        assert_eq!(diags.errors().len(), 1);
        // The range is left undesugared rather than silently accepted.
        assert!(matches!(ast.kind(range), NodeKind::RangeExpr(_)));
    }

    #[test]
    fn matching_range_array_size_desugars_to_an_array_literal() {
        use crate::ast::expr::{ArrayLit, RangeExpr};

        let (mut ast, root) = Ast::new();
        let var = ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "buf".into(),
                data_type: DataType::Array(Box::new(DataType::Ubyte), Some(5)),
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            root,
        );
        let range = ast.alloc(NodeKind::RangeExpr(RangeExpr { has_step: false }), Span::SYNTHETIC, var);
        lit(&mut ast, range, 0);
        lit(&mut ast, range, 4);

        let folder = ConstFolder::new("0..4");
        let diags = folder.run(&mut ast, root);
        assert_eq!(diags.errors().len(), 0);

        let result = ast.children_of(var)[0];
        assert!(matches!(ast.kind(result), NodeKind::ArrayLit(ArrayLit { .. })));
        assert_eq!(
            ast.types.get(&result),
            Some(&DataType::Array(Box::new(DataType::Ubyte), Some(5)))
        );
    }

    #[test]
    fn float_addition_overflowing_the_5_byte_range_is_diagnosed() {
        let (mut ast, root) = Ast::new();
        let expr = ast.alloc(
            NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }),
            Span::SYNTHETIC,
            root,
        );
        for n in [1.7e38_f64, 1.7e38_f64] {
            let id = ast.alloc(
                NodeKind::NumberLit(NumberLit {
                    data_type: DataType::Float,
                    value: NumericValue::Float(n),
                }),
                Span::SYNTHETIC,
                expr,
            );
            ast.types.insert(id, DataType::Float);
        }

        let folder = ConstFolder::new("1.7e38 + 1.7e38");
        let diags = folder.run(&mut ast, root);
        assert_eq!(diags.errors().len(), 1);
        // The node is left as-is, not silently folded into an overflowing literal.
        assert!(matches!(ast.kind(expr), NodeKind::BinaryExpr(_)));
    }
}
