//! In-place float operation emission (spec.md §4.9): loads through `MOVFM`,
//! invokes the runtime float routine, stores back via `MOVMF`. No tuned
//! idioms exist for floats; every combination routes through the library.

use crate::ast::expr::{BinOp, NumericValue};
use crate::codegen::storage::Storage;
use crate::codegen::{AsmLine, Operand};
use crate::consts::floats;
use crate::error::CodegenError;

pub fn emit(op: BinOp, storage: &Storage, operand: &Operand) -> Result<Vec<AsmLine>, CodegenError> {
    let label = match storage {
        Storage::Variable { label } => label.clone(),
        Storage::ArrayLiteralIndex { base_label, offset } => format!("{}+{}", base_label, offset * 5),
        _ => {
            return Err(CodegenError::UnsupportedStorage {
                detail: "float in-place update requires a directly addressable location".into(),
            })
        }
    };

    if let Operand::Literal(NumericValue::Float(f)) = operand {
        if *f == 0.0 && op == BinOp::Div {
            return Err(CodegenError::DivisionByZero);
        }
    }

    let routine = match op {
        BinOp::Add => floats::FADD,
        BinOp::Sub => floats::FSUB,
        BinOp::Mul => floats::FMULT,
        BinOp::Div => floats::FDIV,
        _ => {
            return Err(CodegenError::UnsupportedStorage {
                detail: "operator is not defined on float operands".into(),
            })
        }
    };

    let mut lines = Vec::new();
    lines.push(AsmLine::new(format!("    lda  #<{}", label)));
    lines.push(AsmLine::new(format!("    ldy  #>{}", label)));
    lines.push(AsmLine::new(format!("    jsr  {}", floats::MOVFM)));
    load_operand(operand, &mut lines);
    lines.push(AsmLine::new(format!("    jsr  {}", routine)));
    lines.push(AsmLine::new(format!("    lda  #<{}", label)));
    lines.push(AsmLine::new(format!("    ldy  #>{}", label)));
    lines.push(AsmLine::new(format!("    jsr  {}", floats::MOVMF)));
    Ok(lines)
}

/// Flip the sign bit of the float's representation in place (spec.md §4.9:
/// "no call required"). Byte 1 of the 5-byte layout carries the sign in its
/// high bit.
pub fn negate(storage: &Storage) -> Result<Vec<AsmLine>, CodegenError> {
    let label = match storage {
        Storage::Variable { label } => label.clone(),
        Storage::ArrayLiteralIndex { base_label, offset } => format!("{}+{}", base_label, offset * 5),
        _ => {
            return Err(CodegenError::UnsupportedStorage {
                detail: "float negation requires a directly addressable location".into(),
            })
        }
    };
    Ok(vec![
        AsmLine::new(format!("    lda  {}+1", label)),
        AsmLine::new("    eor  #$80"),
        AsmLine::new(format!("    sta  {}+1", label)),
    ])
}

fn load_operand(operand: &Operand, lines: &mut Vec<AsmLine>) {
    match operand {
        Operand::Variable(label) => {
            lines.push(AsmLine::new(format!("    lda  #<{}", label)));
            lines.push(AsmLine::new(format!("    ldy  #>{}", label)));
            lines.push(AsmLine::new(format!("    jsr  {}", floats::MOVFM)));
            lines.push(AsmLine::new(format!("    jsr  {}", floats::CONUPK)));
        }
        _ => {
            lines.push(AsmLine::new(format!("    jsr  {}", floats::CONUPK)));
        }
    }
}
