//! Expression node payloads (spec.md §3 "Expressions"). Operand/argument
//! sub-expressions live as the node's children in the arena rather than as
//! fields here; each payload documents the convention for its children.

use serde::Serialize;

use super::types::DataType;

/// A numeric literal value, kept in a width-agnostic form; `data_type` on
/// the literal's [`NumberLit`] says how it's meant to be interpreted/emitted.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub enum NumericValue {
    Int(i64),
    Float(f64),
}

/// A literal numeric value, already tagged with its smallest-fitting type by
/// the front-end (spec.md §6). No children.
#[derive(Clone, Debug, Serialize)]
pub struct NumberLit {
    pub data_type: DataType,
    pub value: NumericValue,
}

/// A string literal. No children.
#[derive(Clone, Debug, Serialize)]
pub struct StringLit {
    pub value: String,
}

/// `[ e1, e2, .. ]`. Elements are the node's children, in order.
#[derive(Clone, Debug, Serialize)]
pub struct ArrayLit {
    pub element_type: Option<DataType>,
}

/// A (possibly dotted) identifier reference, e.g. `a.b.c`. No children;
/// resolution attaches the target via [`super::Ast::resolved`].
#[derive(Clone, Debug, Serialize)]
pub struct IdentRef {
    pub path: Vec<String>,
}

/// Binary operators, covering arithmetic, comparison, and bitwise/logical
/// forms. `is_associative` backs the `AugAssign.isAugmentable` predicate's
/// "commuted" case (spec.md §4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    LogAnd,
    LogOr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinOp {
    pub fn is_associative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor)
    }

    pub fn is_commutative(self) -> bool {
        self.is_associative()
    }

    /// True for operators whose result is always a boolean-valued `ubyte`
    /// regardless of operand type.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::NotEq
                | Self::Lt
                | Self::LtEq
                | Self::Gt
                | Self::GtEq
                | Self::LogAnd
                | Self::LogOr
        )
    }
}

/// `lhs op rhs`. Children: `[lhs, rhs]`.
#[derive(Clone, Debug, Serialize)]
pub struct BinaryExpr {
    pub op: BinOp,
}

/// Prefix operators: `+`, `-`, `~` (bitwise not), `not` (logical not).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PrefixOp {
    Plus,
    Neg,
    BitNot,
    LogNot,
}

/// `op sub`. Children: `[sub]`.
#[derive(Clone, Debug, Serialize)]
pub struct PrefixExpr {
    pub op: PrefixOp,
}

/// `sub as DataType`. Children: `[sub]`.
#[derive(Clone, Debug, Serialize)]
pub struct TypeCast {
    pub target: DataType,
}

/// `callee(args..)`, used as an expression (produces a value). Children:
/// `[callee, arg1, .., argN]`, where `callee` is typically an [`IdentRef`].
#[derive(Clone, Debug, Serialize)]
pub struct FunctionCall;

/// `@(addr)` — a direct memory read, always `ubyte` (spec.md §4.3). Children:
/// `[addr]`.
#[derive(Clone, Debug, Serialize)]
pub struct MemRead;

/// `&target` — address-of, always `uword`. Children: `[target]`.
#[derive(Clone, Debug, Serialize)]
pub struct AddressOf;

/// `start..end step k`. Children: `[start, end]`, plus `[step]` if present
/// (the step child is optional and is the third child when it exists).
#[derive(Clone, Debug, Serialize)]
pub struct RangeExpr {
    pub has_step: bool,
}

/// `array[index]`. Children: `[array, index]`.
#[derive(Clone, Debug, Serialize)]
pub struct ArrayIndex;
