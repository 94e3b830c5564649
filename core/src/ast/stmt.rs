//! Statement node payloads (spec.md §3 "Statements"). As in `expr.rs`,
//! sub-nodes live as arena children; each payload documents the convention.

use serde::Serialize;

use super::expr::{BinOp, NumericValue};

/// A (possibly augmented) assignment. Children: `[target, value]`. Before
/// desugaring, `aug_op` may be `Some`; after the reorderer/desugarer runs
/// (spec.md §4.4 step 5) every remaining assignment has `aug_op == None`.
#[derive(Clone, Debug, Serialize)]
pub struct Assignment {
    pub aug_op: Option<BinOp>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum IncDec {
    Inc,
    Dec,
}

/// `target++` / `target--`. Children: `[target]`.
#[derive(Clone, Debug, Serialize)]
pub struct PostIncDec {
    pub op: IncDec,
}

/// A function call used as a statement (return value discarded). Children:
/// `[callee, arg1, .., argN]`.
#[derive(Clone, Debug, Serialize)]
pub struct CallStatement;

/// `return [v1, .., vN]`. Children: the returned values, in order.
#[derive(Clone, Debug, Serialize)]
pub struct Return;

/// `break`. No children.
#[derive(Clone, Debug, Serialize)]
pub struct Break;

/// `jump <address-or-label>`.
#[derive(Clone, Debug, Serialize)]
pub enum JumpTarget {
    Address(u32),
    Label(String),
}

/// Children: none (the target is embedded in the payload, not the tree, since
/// it is never itself a general expression).
#[derive(Clone, Debug, Serialize)]
pub struct Jump {
    pub target: JumpTarget,
}

/// `if cond { then } [else { else }]`. Children:
/// `[cond, then_1..then_m, else_1..else_n]`; `then_len`/`else_len` say where
/// the split points are.
#[derive(Clone, Debug, Serialize)]
pub struct If {
    pub then_len: usize,
    pub else_len: usize,
}

/// `if_cs { .. }` and friends — branch taken when a named CPU status flag is
/// set. Children: `[body_1..body_n]`.
#[derive(Clone, Debug, Serialize)]
pub struct BranchOnFlag {
    pub flag: String,
}

/// `for var in iterable { body }`. Children: `[iterable, body_1..body_n]`.
#[derive(Clone, Debug, Serialize)]
pub struct ForLoop {
    pub var_name: String,
    pub body_len: usize,
}

/// `while cond { body }`. Children: `[cond, body_1..body_n]`.
#[derive(Clone, Debug, Serialize)]
pub struct While {
    pub body_len: usize,
}

/// `do { body } until cond` — condition tested after the body, unlike
/// `While`. Children: `[cond, body_1..body_n]`.
#[derive(Clone, Debug, Serialize)]
pub struct Until {
    pub body_len: usize,
}

/// `repeat n { body }`. Children: `[count, body_1..body_n]`.
#[derive(Clone, Debug, Serialize)]
pub struct RepeatN {
    pub body_len: usize,
}

/// One arm of a `when` statement: a list of matching constant values (empty
/// for the default `else` arm) and how many of the node's flattened children
/// belong to this arm's body.
#[derive(Clone, Debug, Serialize)]
pub struct WhenArm {
    pub values: Vec<NumericValue>,
    pub is_default: bool,
    pub body_len: usize,
}

/// `when subject { v1, v2 -> body; else -> body }`. Children:
/// `[subject, arm_1_body.., arm_2_body.., ..]`, sliced per `arms[i].body_len`
/// in order.
#[derive(Clone, Debug, Serialize)]
pub struct When {
    pub arms: Vec<WhenArm>,
}

/// A verbatim block of target assembly, delivered as raw text by the
/// front-end (spec.md §6). No children.
#[derive(Clone, Debug, Serialize)]
pub struct InlineAsm {
    pub text: String,
}

/// An explicit no-op statement. No children.
#[derive(Clone, Debug, Serialize)]
pub struct NoOp;
