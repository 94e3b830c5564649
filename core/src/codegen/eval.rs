//! Generic evaluation of an "arbitrary expression" RHS operand (spec.md
//! §4.9's fifth RHS form) down into a scratch location, so that it can then
//! be fed back through [`crate::codegen::byte`]/[`crate::codegen::word`] as
//! an ordinary variable operand. Recursion bottoms out at the same leaf
//! shapes [`crate::codegen::storage::classify`] already recognizes for
//! assignment targets, since a sub-expression used as an addressable operand
//! (an identifier, a memory read, an indexed element) has exactly the same
//! shapes.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::codegen::storage::{self, Storage};
use crate::codegen::{byte, classify_operand, word, AsmLine};
use crate::consts;
use crate::error::CodegenError;
use crate::target::CompileTarget;

pub fn eval_byte(ast: &Ast, id: NodeId, signed: bool) -> Result<Vec<AsmLine>, CodegenError> {
    let scratch = Storage::Variable {
        label: consts::SCRATCH_B1.to_string(),
    };
    match ast.kind(id) {
        NodeKind::BinaryExpr(b) => {
            let op = b.op;
            let children = ast.children_of(id).to_vec();
            let mut lines = eval_byte(ast, children[0], signed)?;
            let operand = classify_operand(ast, children[1]);
            lines.extend(byte::emit(op, &scratch, &operand, signed, CompileTarget::default())?);
            Ok(lines)
        }
        NodeKind::PrefixExpr(p) => {
            use crate::ast::expr::PrefixOp;
            let sub = ast.children_of(id)[0];
            let mut lines = eval_byte(ast, sub, signed)?;
            match p.op {
                PrefixOp::Plus => {}
                PrefixOp::Neg => {
                    lines.push(AsmLine::new("    lda  #0"));
                    lines.push(AsmLine::new("    sec"));
                    lines.push(AsmLine::new(format!("    sbc  {}", consts::SCRATCH_B1)));
                    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
                }
                PrefixOp::BitNot => {
                    lines.push(AsmLine::new(format!("    lda  {}", consts::SCRATCH_B1)));
                    lines.push(AsmLine::new("    eor  #$ff"));
                    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
                }
                PrefixOp::LogNot => {
                    lines.push(AsmLine::new(format!("    lda  {}", consts::SCRATCH_B1)));
                    lines.push(AsmLine::new("    beq  +"));
                    lines.push(AsmLine::new("    lda  #0"));
                    lines.push(AsmLine::new("    beq  ++"));
                    lines.push(AsmLine::new("+"));
                    lines.push(AsmLine::new("    lda  #1"));
                    lines.push(AsmLine::new("++"));
                    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
                }
            }
            Ok(lines)
        }
        NodeKind::TypeCast(_) => eval_byte(ast, ast.children_of(id)[0], signed),
        _ => leaf_to_scratch_byte(ast, id),
    }
}

fn leaf_to_scratch_byte(ast: &Ast, id: NodeId) -> Result<Vec<AsmLine>, CodegenError> {
    let source = storage::classify(ast, id)?;
    let mut lines = Vec::new();
    storage::load_byte_to_a(&source, &mut lines);
    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
    Ok(lines)
}

pub fn eval_word(ast: &Ast, id: NodeId, signed: bool) -> Result<Vec<AsmLine>, CodegenError> {
    let scratch = Storage::Variable {
        label: consts::SCRATCH_W1.to_string(),
    };
    match ast.kind(id) {
        NodeKind::BinaryExpr(b) => {
            let op = b.op;
            let children = ast.children_of(id).to_vec();
            let mut lines = eval_word(ast, children[0], signed)?;
            let operand = classify_operand(ast, children[1]);
            lines.extend(word::emit(op, &scratch, &operand, signed, CompileTarget::default())?);
            Ok(lines)
        }
        NodeKind::AddressOf(_) => {
            let sub = ast.children_of(id)[0];
            let label = match ast.kind(sub) {
                NodeKind::IdentRef(_) => ast.scoped_name(ast.resolved_target(sub)).to_string(),
                _ => {
                    return Err(CodegenError::UnsupportedStorage {
                        detail: "address-of requires a named variable".into(),
                    })
                }
            };
            Ok(vec![
                AsmLine::new(format!("    lda  #<{}", label)),
                AsmLine::new(format!("    sta  {}", consts::SCRATCH_W1)),
                AsmLine::new(format!("    lda  #>{}", label)),
                AsmLine::new(format!("    sta  {}+1", consts::SCRATCH_W1)),
            ])
        }
        NodeKind::TypeCast(_) => eval_word(ast, ast.children_of(id)[0], signed),
        _ => leaf_to_scratch_word(ast, id),
    }
}

fn leaf_to_scratch_word(ast: &Ast, id: NodeId) -> Result<Vec<AsmLine>, CodegenError> {
    let source = storage::classify(ast, id)?;
    let (lo, hi) = storage::word_byte_labels(&source)?;
    Ok(vec![
        AsmLine::new(format!("    lda  {}", lo)),
        AsmLine::new(format!("    sta  {}", consts::SCRATCH_W1)),
        AsmLine::new(format!("    lda  {}", hi)),
        AsmLine::new(format!("    sta  {}+1", consts::SCRATCH_W1)),
    ])
}
