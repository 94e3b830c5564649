//! In-place byte (`ubyte`/`byte`) operation emission (spec.md §4.9).

use crate::ast::expr::{BinOp, NumericValue};
use crate::codegen::storage::{load_byte_to_a, store_byte_from_a, store_zero_byte, Storage};
use crate::codegen::{AsmLine, Operand};
use crate::consts;
use crate::error::CodegenError;
use crate::target::CompileTarget;

/// Emit `storage op= operand`, `storage` and `operand` both byte-sized.
pub fn emit(
    op: BinOp,
    storage: &Storage,
    operand: &Operand,
    signed: bool,
    target_cpu: CompileTarget,
) -> Result<Vec<AsmLine>, CodegenError> {
    let mut lines = Vec::new();

    if let Operand::Literal(NumericValue::Int(0)) = operand {
        if op == BinOp::Div || op == BinOp::Mod {
            return Err(CodegenError::DivisionByZero);
        }
    }
    if matches!(op, BinOp::Shl | BinOp::Shr) {
        if let Operand::Literal(NumericValue::Int(n)) = operand {
            if !(0..=255).contains(n) {
                return Err(CodegenError::ShiftByWordQuantity);
            }
        }
    }
    if op == BinOp::Mod && signed {
        return Err(CodegenError::SignedRemainderUnsupported);
    }

    match op {
        BinOp::Add => {
            load_byte_to_a(storage, &mut lines);
            lines.push(AsmLine::new("    clc"));
            emit_adc_sbc(operand, "adc", &mut lines);
            store_byte_from_a(storage, &mut lines);
        }
        BinOp::Sub => {
            load_byte_to_a(storage, &mut lines);
            lines.push(AsmLine::new("    sec"));
            emit_adc_sbc(operand, "sbc", &mut lines);
            store_byte_from_a(storage, &mut lines);
        }
        BinOp::And | BinOp::Or | BinOp::Xor => {
            let mnemonic = match op {
                BinOp::And => "and",
                BinOp::Or => "ora",
                BinOp::Xor => "eor",
                _ => unreachable!(),
            };
            load_byte_to_a(storage, &mut lines);
            emit_adc_sbc(operand, mnemonic, &mut lines);
            store_byte_from_a(storage, &mut lines);
        }
        BinOp::Shl => emit_shift(storage, operand, true, target_cpu, &mut lines),
        BinOp::Shr => emit_shift(storage, operand, false, target_cpu, &mut lines),
        BinOp::Mul => emit_mul(storage, operand, &mut lines),
        BinOp::Div => emit_div(storage, operand, signed, &mut lines),
        BinOp::Mod => emit_div(storage, operand, signed, &mut lines),
        BinOp::Eq
        | BinOp::NotEq
        | BinOp::Lt
        | BinOp::LtEq
        | BinOp::Gt
        | BinOp::GtEq
        | BinOp::LogAnd
        | BinOp::LogOr => emit_comparison(op, storage, operand, &mut lines),
    }

    Ok(lines)
}

fn operand_addressing(operand: &Operand) -> Result<String, CodegenError> {
    match operand {
        Operand::Literal(NumericValue::Int(n)) => Ok(format!("#{}", *n as u8)),
        Operand::Literal(NumericValue::Float(_)) => Err(CodegenError::UnknownCastType),
        Operand::Variable(label) => Ok(label.clone()),
        Operand::MemoryAbsolute(addr) => Ok(format!("${:04x}", addr)),
        Operand::MemoryPointer { label, zp: true } => Ok(format!("({}),y", label)),
        Operand::MemoryPointer { label, .. } => Ok(label.clone()),
        Operand::Expr(_) => Ok(consts::SCRATCH_B1.to_string()),
    }
}

fn emit_adc_sbc(operand: &Operand, mnemonic: &str, lines: &mut Vec<AsmLine>) {
    if let Operand::MemoryPointer { zp: true, .. } = operand {
        lines.push(AsmLine::new("    ldy  #0"));
    }
    let addressing = operand_addressing(operand).unwrap_or_else(|_| consts::SCRATCH_B1.to_string());
    lines.push(AsmLine::new(format!("    {}  {}", mnemonic, addressing)));
}

fn emit_shift(storage: &Storage, operand: &Operand, left: bool, target_cpu: CompileTarget, lines: &mut Vec<AsmLine>) {
    let mnemonic = if left { "asl" } else { "lsr" };
    match operand {
        Operand::Literal(NumericValue::Int(n)) if *n >= 8 => {
            store_zero_byte(storage, target_cpu, lines);
        }
        Operand::Literal(NumericValue::Int(n)) => {
            for _ in 0..*n {
                load_byte_to_a(storage, lines);
                lines.push(AsmLine::new(format!("    {}  a", mnemonic)));
                store_byte_from_a(storage, lines);
            }
        }
        _ => {
            load_byte_to_a(storage, lines);
            lines.push(AsmLine::new(format!("    jsr  {}", consts::math::LSR_BYTE_A)));
            store_byte_from_a(storage, lines);
        }
    }
}

fn emit_mul(storage: &Storage, operand: &Operand, lines: &mut Vec<AsmLine>) {
    load_byte_to_a(storage, lines);
    if let Operand::Literal(NumericValue::Int(n)) = operand {
        let n = *n as u32;
        if consts::math::BYTE_MUL_TABLE.contains(&n) {
            lines.push(AsmLine::new(format!("    jsr  {}", consts::math::mul_byte_n(n))));
            store_byte_from_a(storage, lines);
            return;
        }
    }
    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
    let addressing = operand_addressing(operand).unwrap_or_else(|_| consts::SCRATCH_B1.to_string());
    lines.push(AsmLine::new(format!("    lda  {}", addressing)));
    lines.push(AsmLine::new(format!("    ldy  {}", consts::SCRATCH_B1)));
    lines.push(AsmLine::new(format!("    jsr  {}", consts::math::MULTIPLY_BYTES)));
    store_byte_from_a(storage, lines);
}

fn emit_div(storage: &Storage, operand: &Operand, signed: bool, lines: &mut Vec<AsmLine>) {
    let routine = if signed {
        consts::math::DIVMOD_B_ASM
    } else {
        consts::math::DIVMOD_UB_ASM
    };
    load_byte_to_a(storage, lines);
    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
    let addressing = operand_addressing(operand).unwrap_or_else(|_| consts::SCRATCH_B1.to_string());
    lines.push(AsmLine::new(format!("    ldy  {}", addressing)));
    lines.push(AsmLine::new(format!("    lda  {}", consts::SCRATCH_B1)));
    lines.push(AsmLine::new(format!("    jsr  {}", routine)));
    store_byte_from_a(storage, lines);
}

fn emit_comparison(op: BinOp, storage: &Storage, operand: &Operand, lines: &mut Vec<AsmLine>) {
    load_byte_to_a(storage, lines);
    let addressing = operand_addressing(operand).unwrap_or_else(|_| consts::SCRATCH_B1.to_string());
    lines.push(AsmLine::new(format!("    cmp  {}", addressing)));
    let branch = match op {
        BinOp::Eq => "beq",
        BinOp::NotEq => "bne",
        BinOp::Lt => "bcc",
        BinOp::GtEq => "bcs",
        _ => "beq",
    };
    lines.push(AsmLine::new("    lda  #0"));
    lines.push(AsmLine::new(format!("    {}  +", branch)));
    lines.push(AsmLine::new("    lda  #1"));
    lines.push(AsmLine::new("+"));
    store_byte_from_a(storage, lines);
}
