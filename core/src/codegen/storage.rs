//! Classifies an assignment target into the storage kind spec.md §4.9
//! dispatches on, and the handful of load/store idioms shared by the byte,
//! word, and float emitters for each kind.

use crate::ast::expr::NumericValue;
use crate::ast::types::ZeropageWish;
use crate::ast::{Ast, NodeId, NodeKind};
use crate::codegen::AsmLine;
use crate::consts;
use crate::error::CodegenError;
use crate::target::CompileTarget;

/// Where an assignment target actually lives, independent of its data type.
/// `Register` and `Stack` storage (spec.md §4.9) never appear here: nothing
/// in this AST models a target as living in a register or on the expression
/// stack, so reaching neither variant is possible; any node shape that isn't
/// one of the ones below falls through to `UnsupportedStorage`.
#[derive(Clone, Debug)]
pub enum Storage {
    Variable {
        label: String,
    },
    MemoryAbsolute {
        address: u32,
    },
    MemoryPointer {
        pointer_label: String,
        zp: bool,
    },
    MemoryComputed {
        address_expr: NodeId,
    },
    ArrayLiteralIndex {
        base_label: String,
        offset: u32,
    },
    ArrayComputedIndex {
        base_label: String,
        index_expr: NodeId,
    },
}

pub fn classify(ast: &Ast, target: NodeId) -> Result<Storage, CodegenError> {
    match ast.kind(target) {
        NodeKind::IdentRef(_) => {
            let decl = ast.resolved_target(target);
            Ok(Storage::Variable {
                label: ast.scoped_name(decl).to_string(),
            })
        }
        NodeKind::MemRead(_) => {
            let addr_expr = ast.children_of(target)[0];
            classify_memory(ast, addr_expr)
        }
        NodeKind::ArrayIndex(_) => {
            let children = ast.children_of(target);
            let (array_expr, index_expr) = (children[0], children[1]);
            let base_label = match ast.kind(array_expr) {
                NodeKind::IdentRef(_) => ast.scoped_name(ast.resolved_target(array_expr)).to_string(),
                _ => {
                    return Err(CodegenError::UnsupportedStorage {
                        detail: "array base must be a named variable".into(),
                    })
                }
            };
            match as_literal_int(ast, index_expr) {
                Some(n) if n >= 0 => Ok(Storage::ArrayLiteralIndex {
                    base_label,
                    offset: n as u32,
                }),
                _ => Ok(Storage::ArrayComputedIndex { base_label, index_expr }),
            }
        }
        _ => Err(CodegenError::UnsupportedStorage {
            detail: "target is not an addressable storage location".into(),
        }),
    }
}

fn classify_memory(ast: &Ast, addr_expr: NodeId) -> Result<Storage, CodegenError> {
    match ast.kind(addr_expr) {
        NodeKind::NumberLit(_) => match as_literal_int(ast, addr_expr) {
            Some(n) if n >= 0 => Ok(Storage::MemoryAbsolute { address: n as u32 }),
            _ => Err(CodegenError::UnsupportedStorage {
                detail: "memory address literal out of range".into(),
            }),
        },
        NodeKind::IdentRef(_) => {
            let decl = ast.resolved_target(addr_expr);
            let zp = matches!(ast.kind(decl), NodeKind::VarDecl(v) if v.zeropage == ZeropageWish::Require);
            Ok(Storage::MemoryPointer {
                pointer_label: ast.scoped_name(decl).to_string(),
                zp,
            })
        }
        _ => Ok(Storage::MemoryComputed { address_expr: addr_expr }),
    }
}

fn as_literal_int(ast: &Ast, id: NodeId) -> Option<i64> {
    match ast.kind(id) {
        NodeKind::NumberLit(n) => match n.value {
            NumericValue::Int(v) => Some(v),
            NumericValue::Float(_) => None,
        },
        _ => None,
    }
}

/// Emit the idiom that loads the current byte value of `storage` into `A`.
pub fn load_byte_to_a(storage: &Storage, lines: &mut Vec<AsmLine>) {
    match storage {
        Storage::Variable { label } => lines.push(AsmLine::new(format!("    lda  {}", label))),
        Storage::MemoryAbsolute { address } => {
            lines.push(AsmLine::new(format!("    lda  ${:04x}", address)))
        }
        Storage::MemoryPointer { pointer_label, zp } if *zp => {
            lines.push(AsmLine::new("    ldy  #0"));
            lines.push(AsmLine::new(format!("    lda  ({}),y", pointer_label)));
        }
        Storage::MemoryPointer { pointer_label, .. } => {
            lines.push(AsmLine::new(format!("    lda  {}", pointer_label)));
            lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_W1)));
            lines.push(AsmLine::new(format!("    lda  {}+1", pointer_label)));
            lines.push(AsmLine::new(format!("    sta  {}+1", consts::SCRATCH_W1)));
            lines.push(AsmLine::new("    ldy  #0"));
            lines.push(AsmLine::new(format!("    lda  ({}),y", consts::SCRATCH_W1)));
        }
        Storage::MemoryComputed { .. } => {
            lines.push(AsmLine::new(format!("    jsr  {}", consts::prog8_lib::READ_BYTE_FROM_ADDRESS_ON_STACK)));
        }
        Storage::ArrayLiteralIndex { base_label, offset } => {
            lines.push(AsmLine::new(format!("    lda  {}+{}", base_label, offset)))
        }
        Storage::ArrayComputedIndex { base_label, .. } => {
            lines.push(AsmLine::new(format!("    lda  {},y", base_label)))
        }
    }
}

/// Store a literal zero into `storage`. On a 65C02 target, a directly
/// addressable location (`Variable`/`MemoryAbsolute`) gets `stz` instead of
/// `lda #0` + a store, per the target's zeroing idiom; everything else falls
/// back to the general load-then-store sequence since `stz` has no indirect
/// or indexed-by-Y addressing mode.
pub fn store_zero_byte(storage: &Storage, target_cpu: CompileTarget, lines: &mut Vec<AsmLine>) {
    if target_cpu.is_65c02() {
        match storage {
            Storage::Variable { label } => {
                lines.push(AsmLine::new(format!("    stz  {}", label)));
                return;
            }
            Storage::MemoryAbsolute { address } => {
                lines.push(AsmLine::new(format!("    stz  ${:04x}", address)));
                return;
            }
            Storage::ArrayLiteralIndex { base_label, offset } => {
                lines.push(AsmLine::new(format!("    stz  {}+{}", base_label, offset)));
                return;
            }
            _ => {}
        }
    }
    lines.push(AsmLine::new("    lda  #0"));
    store_byte_from_a(storage, lines);
}

/// Emit the idiom that stores `A` back into `storage`.
pub fn store_byte_from_a(storage: &Storage, lines: &mut Vec<AsmLine>) {
    match storage {
        Storage::Variable { label } => lines.push(AsmLine::new(format!("    sta  {}", label))),
        Storage::MemoryAbsolute { address } => {
            lines.push(AsmLine::new(format!("    sta  ${:04x}", address)))
        }
        Storage::MemoryPointer { pointer_label, zp } if *zp => {
            lines.push(AsmLine::new("    ldy  #0"));
            lines.push(AsmLine::new(format!("    sta  ({}),y", pointer_label)));
        }
        Storage::MemoryPointer { pointer_label, .. } => {
            lines.push(AsmLine::new("    pha"));
            lines.push(AsmLine::new(format!("    lda  {}", pointer_label)));
            lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_W1)));
            lines.push(AsmLine::new(format!("    lda  {}+1", pointer_label)));
            lines.push(AsmLine::new(format!("    sta  {}+1", consts::SCRATCH_W1)));
            lines.push(AsmLine::new("    ldy  #0"));
            lines.push(AsmLine::new("    pla"));
            lines.push(AsmLine::new(format!("    sta  ({}),y", consts::SCRATCH_W1)));
        }
        Storage::MemoryComputed { .. } => {
            lines.push(AsmLine::new(format!("    jsr  {}", consts::prog8_lib::WRITE_BYTE_TO_ADDRESS_ON_STACK)));
        }
        Storage::ArrayLiteralIndex { base_label, offset } => {
            lines.push(AsmLine::new(format!("    sta  {}+{}", base_label, offset)))
        }
        Storage::ArrayComputedIndex { base_label, .. } => {
            lines.push(AsmLine::new(format!("    sta  {},y", base_label)))
        }
    }
}

/// Load the low/high byte labels of a word-sized variable/array storage. Only
/// meaningful for the storage kinds word codegen actually supports (variable
/// and literal-indexed array); computed/pointer word storage is rejected by
/// the caller before this is reached.
pub fn word_byte_labels(storage: &Storage) -> Result<(String, String), CodegenError> {
    match storage {
        Storage::Variable { label } => Ok((label.clone(), format!("{}+1", label))),
        Storage::ArrayLiteralIndex { base_label, offset } => Ok((
            format!("{}+{}", base_label, offset),
            format!("{}+{}", base_label, offset + 1),
        )),
        Storage::MemoryAbsolute { address } => Ok((format!("${:04x}", address), format!("${:04x}", address + 1))),
        _ => Err(CodegenError::UnsupportedStorage {
            detail: "word in-place update requires a directly addressable two-byte location".into(),
        }),
    }
}
