//! The 6502 augmented-assignment code generator (spec.md §4.9): the only
//! component in this crate that produces assembly text rather than a
//! rewritten AST. Walks the tree for desugared assignments whose RHS is
//! `AugAssign::is_augmentable` and emits an in-place update, dispatching on
//! storage kind, operand type, and RHS form.

pub mod byte;
pub mod eval;
pub mod float;
pub mod storage;
pub mod word;

use crate::ast::expr::{BinOp, NumericValue, PrefixOp};
use crate::ast::types::{DataType, ZeropageWish};
use crate::ast::{Ast, NodeId, NodeKind};
use crate::consts;
use crate::error::{CodegenError, Diagnostics};
use crate::passes::typecheck::{self, AugmentableForm};
use crate::target::CompileTarget;
use crate::walker::Visitor;
use storage::Storage;

/// One line of emitted assembly, with no trailing newline (spec.md §8: a
/// thin newtype so indentation/label conventions have one place to live).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsmLine(String);

impl AsmLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AsmLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The RHS form of a single primitive in-place operation (spec.md §4.9).
#[derive(Clone, Debug)]
pub enum Operand {
    Literal(NumericValue),
    Variable(String),
    MemoryAbsolute(u32),
    MemoryPointer { label: String, zp: bool },
    /// Anything that isn't one of the four forms above: evaluated through
    /// [`eval`] into a scratch location before the in-place op runs.
    Expr(NodeId),
}

pub fn classify_operand(ast: &Ast, id: NodeId) -> Operand {
    match ast.kind(id) {
        NodeKind::NumberLit(n) => Operand::Literal(n.value),
        NodeKind::IdentRef(_) => Operand::Variable(ast.scoped_name(ast.resolved_target(id)).to_string()),
        NodeKind::MemRead(_) => {
            let addr = ast.children_of(id)[0];
            match ast.kind(addr) {
                NodeKind::NumberLit(n) => match n.value {
                    NumericValue::Int(v) if v >= 0 => Operand::MemoryAbsolute(v as u32),
                    _ => Operand::Expr(id),
                },
                NodeKind::IdentRef(_) => {
                    let decl = ast.resolved_target(addr);
                    let zp = matches!(ast.kind(decl), NodeKind::VarDecl(v) if v.zeropage == ZeropageWish::Require);
                    Operand::MemoryPointer {
                        label: ast.scoped_name(decl).to_string(),
                        zp,
                    }
                }
                _ => Operand::Expr(id),
            }
        }
        _ => Operand::Expr(id),
    }
}

enum UnaryStep {
    Prefix(PrefixOp),
    Cast(DataType),
}

/// Decompose a `Direct`/`Commuted`/`TwoLevelSameOp` RHS into the ordered
/// list of `(operator, operand)` primitive updates to apply to the target
/// in sequence.
fn binary_operands(ast: &Ast, rhs: NodeId, target: NodeId, form: AugmentableForm) -> Option<Vec<(BinOp, NodeId)>> {
    let outer_op = match ast.kind(rhs) {
        NodeKind::BinaryExpr(b) => b.op,
        _ => return None,
    };
    let children = ast.children_of(rhs).to_vec();
    let (l, r) = (children[0], children[1]);

    match form {
        AugmentableForm::Direct => Some(vec![(outer_op, r)]),
        AugmentableForm::Commuted => Some(vec![(outer_op, l)]),
        AugmentableForm::TwoLevelSameOp => {
            let (inner, other) = if matches!(ast.kind(r), NodeKind::BinaryExpr(ib) if ib.op == outer_op) {
                (r, l)
            } else if matches!(ast.kind(l), NodeKind::BinaryExpr(ib) if ib.op == outer_op) {
                (l, r)
            } else {
                return None;
            };
            let inner_children = ast.children_of(inner).to_vec();
            let leaves = [inner_children[0], inner_children[1], other];
            let mut ops = Vec::new();
            let mut skipped_target = false;
            for leaf in leaves {
                if !skipped_target && typecheck::structurally_equal(ast, leaf, target) {
                    skipped_target = true;
                } else {
                    ops.push((outer_op, leaf));
                }
            }
            if skipped_target && ops.len() == 2 {
                Some(ops)
            } else {
                None
            }
        }
        AugmentableForm::PrefixOrCast => None,
    }
}

/// Decompose a `PrefixOrCast` RHS into the chain of wrapping prefix/cast
/// operations applied to the target, innermost (closest to the target)
/// first.
fn unary_chain(ast: &Ast, rhs: NodeId, target: NodeId) -> Option<Vec<UnaryStep>> {
    let sub = *ast.children_of(rhs).first()?;
    let outer_step = match ast.kind(rhs) {
        NodeKind::PrefixExpr(p) => UnaryStep::Prefix(p.op),
        NodeKind::TypeCast(c) => UnaryStep::Cast(c.target.clone()),
        _ => return None,
    };
    if typecheck::structurally_equal(ast, sub, target) {
        return Some(vec![outer_step]);
    }
    if matches!(ast.kind(sub), NodeKind::TypeCast(_) | NodeKind::PrefixExpr(_)) {
        let inner = *ast.children_of(sub).first()?;
        if typecheck::structurally_equal(ast, inner, target) {
            let inner_step = match ast.kind(sub) {
                NodeKind::PrefixExpr(p) => UnaryStep::Prefix(p.op),
                NodeKind::TypeCast(c) => UnaryStep::Cast(c.target.clone()),
                _ => unreachable!(),
            };
            return Some(vec![inner_step, outer_step]);
        }
    }
    None
}

pub struct CodeGenerator {
    target: CompileTarget,
    diagnostics: Diagnostics<CodegenError>,
    lines: Vec<AsmLine>,
}

impl CodeGenerator {
    pub fn new(source: &str, target: CompileTarget) -> Self {
        Self {
            target,
            diagnostics: Diagnostics::new(source.to_string()),
            lines: Vec::new(),
        }
    }

    pub fn run(mut self, ast: &Ast, root: NodeId) -> (Vec<AsmLine>, Diagnostics<CodegenError>) {
        let mut walker = GenWalker { gen: &mut self };
        walker.visit(ast, root);
        (self.lines, self.diagnostics)
    }

    fn emit_assignment(&mut self, ast: &Ast, id: NodeId) {
        let augmented = matches!(ast.kind(id), NodeKind::Assignment(a) if a.aug_op.is_none());
        if !augmented {
            return;
        }
        let form = match typecheck::is_augmentable(ast, id) {
            Some(f) => f,
            None => return,
        };
        let children = ast.children_of(id).to_vec();
        let (target, rhs) = (children[0], children[1]);
        let ty = ast.type_of(target).clone();
        let signed = ty.is_signed();

        let result = match form {
            AugmentableForm::PrefixOrCast => self.emit_unary_plan(ast, target, rhs, &ty),
            other => self.emit_binary_plan(ast, target, rhs, target, other, &ty, signed),
        };

        match result {
            Ok(lines) => self.lines.extend(lines),
            Err(err) => self.diagnostics.push(err, ast.span(id)),
        }
    }

    fn emit_binary_plan(
        &self,
        ast: &Ast,
        target: NodeId,
        rhs: NodeId,
        structural_target: NodeId,
        form: AugmentableForm,
        ty: &DataType,
        signed: bool,
    ) -> Result<Vec<AsmLine>, CodegenError> {
        let ops = binary_operands(ast, rhs, structural_target, form).ok_or_else(|| CodegenError::UnsupportedStorage {
            detail: "augmentable shape did not decompose into primitive operations".into(),
        })?;
        let storage = storage::classify(ast, target)?;
        let mut lines = Vec::new();
        for (op, operand_node) in ops {
            let mut operand = classify_operand(ast, operand_node);
            if let Operand::Expr(expr_id) = operand {
                if ty.in_word_datatypes() {
                    lines.extend(eval::eval_word(ast, expr_id, signed)?);
                    operand = Operand::Variable(consts::SCRATCH_W1.to_string());
                } else if matches!(ty, DataType::Float) {
                    return Err(CodegenError::UnsupportedStorage {
                        detail: "arbitrary float sub-expressions are not supported as augmented-assignment operands".into(),
                    });
                } else {
                    lines.extend(eval::eval_byte(ast, expr_id, signed)?);
                    operand = Operand::Variable(consts::SCRATCH_B1.to_string());
                }
            }
            let mut step = if ty.in_word_datatypes() {
                word::emit(op, &storage, &operand, signed, self.target)?
            } else if matches!(ty, DataType::Float) {
                float::emit(op, &storage, &operand)?
            } else {
                byte::emit(op, &storage, &operand, signed, self.target)?
            };
            lines.append(&mut step);
        }
        Ok(lines)
    }

    fn emit_unary_plan(&self, ast: &Ast, target: NodeId, rhs: NodeId, ty: &DataType) -> Result<Vec<AsmLine>, CodegenError> {
        let steps = unary_chain(ast, rhs, target).ok_or_else(|| CodegenError::UnsupportedStorage {
            detail: "prefix/cast chain did not resolve to the target".into(),
        })?;
        let storage = storage::classify(ast, target)?;
        let mut lines = Vec::new();
        let mut current_ty = ty.clone();
        for step in steps {
            match step {
                UnaryStep::Cast(cast_ty) => {
                    if matches!(cast_ty, DataType::Struct { resolved: None, .. }) {
                        return Err(CodegenError::UnknownCastType);
                    }
                    let redundant = cast_ty.element_size() >= current_ty.element_size() && !matches!(cast_ty, DataType::Float);
                    if redundant {
                        current_ty = cast_ty;
                        continue;
                    }
                    return Err(CodegenError::UnsupportedStorage {
                        detail: format!(
                            "narrowing/float cast from {} to {} in an augmented assignment requires a runtime conversion",
                            current_ty, cast_ty
                        ),
                    });
                }
                UnaryStep::Prefix(op) => lines.extend(emit_prefix(op, &storage, &current_ty)?),
            }
        }
        Ok(lines)
    }
}

fn emit_prefix(op: PrefixOp, storage: &Storage, ty: &DataType) -> Result<Vec<AsmLine>, CodegenError> {
    match op {
        PrefixOp::Plus => Ok(Vec::new()),
        PrefixOp::Neg if matches!(ty, DataType::Float) => float::negate(storage),
        PrefixOp::Neg if ty.in_word_datatypes() => emit_neg_word(storage),
        PrefixOp::Neg => Ok(emit_neg_byte(storage)),
        PrefixOp::BitNot if matches!(ty, DataType::Float) => Err(CodegenError::UnsupportedStorage {
            detail: "bitwise not is undefined on a float".into(),
        }),
        PrefixOp::BitNot if ty.in_word_datatypes() => emit_bitnot_word(storage),
        PrefixOp::BitNot => Ok(emit_bitnot_byte(storage)),
        PrefixOp::LogNot if ty.in_word_datatypes() => emit_lognot_word(storage),
        PrefixOp::LogNot => Ok(emit_lognot_byte(storage)),
    }
}

fn emit_neg_byte(storage: &Storage) -> Vec<AsmLine> {
    let mut lines = Vec::new();
    storage::load_byte_to_a(storage, &mut lines);
    lines.push(AsmLine::new(format!("    sta  {}", consts::SCRATCH_B1)));
    lines.push(AsmLine::new("    lda  #0"));
    lines.push(AsmLine::new("    sec"));
    lines.push(AsmLine::new(format!("    sbc  {}", consts::SCRATCH_B1)));
    storage::store_byte_from_a(storage, &mut lines);
    lines
}

fn emit_bitnot_byte(storage: &Storage) -> Vec<AsmLine> {
    let mut lines = Vec::new();
    storage::load_byte_to_a(storage, &mut lines);
    lines.push(AsmLine::new("    eor  #$ff"));
    storage::store_byte_from_a(storage, &mut lines);
    lines
}

fn emit_lognot_byte(storage: &Storage) -> Vec<AsmLine> {
    let mut lines = Vec::new();
    storage::load_byte_to_a(storage, &mut lines);
    lines.push(AsmLine::new("    beq  +"));
    lines.push(AsmLine::new("    lda  #0"));
    lines.push(AsmLine::new("    beq  ++"));
    lines.push(AsmLine::new("+"));
    lines.push(AsmLine::new("    lda  #1"));
    lines.push(AsmLine::new("++"));
    storage::store_byte_from_a(storage, &mut lines);
    lines
}

fn emit_neg_word(storage: &Storage) -> Result<Vec<AsmLine>, CodegenError> {
    let (lo, hi) = storage::word_byte_labels(storage)?;
    Ok(vec![
        AsmLine::new("    lda  #0"),
        AsmLine::new("    sec"),
        AsmLine::new(format!("    sbc  {}", lo)),
        AsmLine::new(format!("    sta  {}", lo)),
        AsmLine::new("    lda  #0"),
        AsmLine::new(format!("    sbc  {}", hi)),
        AsmLine::new(format!("    sta  {}", hi)),
    ])
}

fn emit_bitnot_word(storage: &Storage) -> Result<Vec<AsmLine>, CodegenError> {
    let (lo, hi) = storage::word_byte_labels(storage)?;
    Ok(vec![
        AsmLine::new(format!("    lda  {}", lo)),
        AsmLine::new("    eor  #$ff"),
        AsmLine::new(format!("    sta  {}", lo)),
        AsmLine::new(format!("    lda  {}", hi)),
        AsmLine::new("    eor  #$ff"),
        AsmLine::new(format!("    sta  {}", hi)),
    ])
}

fn emit_lognot_word(storage: &Storage) -> Result<Vec<AsmLine>, CodegenError> {
    let (lo, hi) = storage::word_byte_labels(storage)?;
    Ok(vec![
        AsmLine::new(format!("    lda  {}", lo)),
        AsmLine::new(format!("    ora  {}", hi)),
        AsmLine::new("    beq  +"),
        AsmLine::new("    lda  #0"),
        AsmLine::new("    beq  ++"),
        AsmLine::new("+"),
        AsmLine::new("    lda  #1"),
        AsmLine::new("++"),
        AsmLine::new(format!("    sta  {}", lo)),
        AsmLine::new("    lda  #0"),
        AsmLine::new(format!("    sta  {}", hi)),
    ])
}

struct GenWalker<'a> {
    gen: &'a mut CodeGenerator,
}

impl Visitor for GenWalker<'_> {
    fn visit(&mut self, ast: &Ast, id: NodeId) {
        if matches!(ast.kind(id), NodeKind::Assignment(_)) {
            self.gen.emit_assignment(ast, id);
        }
        self.visit_children(ast, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::VarDecl;
    use crate::ast::expr::{BinaryExpr, IdentRef, NumberLit};
    use crate::ast::stmt::Assignment;
    use crate::util::Span;

    fn var(ast: &mut Ast, parent: NodeId, name: &str, ty: DataType) -> NodeId {
        ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: name.into(),
                data_type: ty,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            parent,
        )
    }

    fn ident(ast: &mut Ast, parent: NodeId, decl: NodeId, name: &str, ty: DataType) -> NodeId {
        let id = ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec![name.into()] }),
            Span::SYNTHETIC,
            parent,
        );
        ast.resolved.insert(id, decl);
        ast.types.insert(id, ty);
        id
    }

    /// `ubyte x; x = x + 8` (spec.md §8 scenario S5's shape, pre-simplified)
    /// emits a plain `lda`/`clc`/`adc`/`sta` sequence.
    #[test]
    fn direct_byte_add_emits_adc_sequence() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(crate::ast::decl::Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let decl = var(&mut ast, module, "x", DataType::Ubyte);
        ast.scoped_names.insert(decl, "m.x".into());

        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, module);
        let target = ident(&mut ast, assignment, decl, "x", DataType::Ubyte);
        let rhs = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }), Span::SYNTHETIC, assignment);
        ident(&mut ast, rhs, decl, "x", DataType::Ubyte);
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(8),
            }),
            Span::SYNTHETIC,
            rhs,
        );
        ast.types.insert(target, DataType::Ubyte);
        ast.types.insert(assignment, DataType::Ubyte);

        let gen = CodeGenerator::new("", CompileTarget::Mos6502);
        let (lines, diags) = gen.run(&ast, root);
        assert!(diags.is_empty());
        let text: Vec<&str> = lines.iter().map(AsmLine::text).collect();
        assert_eq!(text, vec!["    lda  m.x", "    clc", "    adc  #8", "    sta  m.x"]);
    }

    /// `uword w; w += 0x0200` (spec.md §8 scenario S4) emits two `inc w+1`.
    #[test]
    fn word_add_with_zero_low_byte_emits_inc_high_byte() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(crate::ast::decl::Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let decl = var(&mut ast, module, "w", DataType::Uword);
        ast.scoped_names.insert(decl, "m.w".into());

        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, module);
        let target = ident(&mut ast, assignment, decl, "w", DataType::Uword);
        let rhs = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }), Span::SYNTHETIC, assignment);
        ident(&mut ast, rhs, decl, "w", DataType::Uword);
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Uword,
                value: NumericValue::Int(0x0200),
            }),
            Span::SYNTHETIC,
            rhs,
        );
        ast.types.insert(target, DataType::Uword);
        ast.types.insert(assignment, DataType::Uword);

        let gen = CodeGenerator::new("", CompileTarget::Mos6502);
        let (lines, diags) = gen.run(&ast, root);
        assert!(diags.is_empty());
        let text: Vec<&str> = lines.iter().map(AsmLine::text).collect();
        assert_eq!(text, vec!["    inc  m.w+1", "    inc  m.w+1"]);
    }

    /// Constant-folded shift of 8 or more clears the byte outright (spec.md
    /// §8 scenario S3).
    #[test]
    fn byte_shift_by_8_or_more_clears_target() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(crate::ast::decl::Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let decl = var(&mut ast, module, "x", DataType::Ubyte);
        ast.scoped_names.insert(decl, "m.x".into());

        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, module);
        let target = ident(&mut ast, assignment, decl, "x", DataType::Ubyte);
        let rhs = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Shl }), Span::SYNTHETIC, assignment);
        ident(&mut ast, rhs, decl, "x", DataType::Ubyte);
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(8),
            }),
            Span::SYNTHETIC,
            rhs,
        );
        ast.types.insert(target, DataType::Ubyte);
        ast.types.insert(assignment, DataType::Ubyte);

        let gen = CodeGenerator::new("", CompileTarget::Mos6502);
        let (lines, diags) = gen.run(&ast, root);
        assert!(diags.is_empty());
        let text: Vec<&str> = lines.iter().map(AsmLine::text).collect();
        assert_eq!(text, vec!["    lda  #0", "    sta  m.x"]);
    }

    /// The same shift-clear as `byte_shift_by_8_or_more_clears_target`, but
    /// on a 65C02 target: `stz` replaces the `lda #0`/`sta` pair.
    #[test]
    fn byte_shift_clear_uses_stz_on_65c02() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(crate::ast::decl::Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let decl = var(&mut ast, module, "x", DataType::Ubyte);
        ast.scoped_names.insert(decl, "m.x".into());

        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, module);
        let target = ident(&mut ast, assignment, decl, "x", DataType::Ubyte);
        let rhs = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Shr }), Span::SYNTHETIC, assignment);
        ident(&mut ast, rhs, decl, "x", DataType::Ubyte);
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(8),
            }),
            Span::SYNTHETIC,
            rhs,
        );
        ast.types.insert(target, DataType::Ubyte);
        ast.types.insert(assignment, DataType::Ubyte);

        let gen = CodeGenerator::new("", CompileTarget::Wdc65C02);
        let (lines, diags) = gen.run(&ast, root);
        assert!(diags.is_empty());
        let text: Vec<&str> = lines.iter().map(AsmLine::text).collect();
        assert_eq!(text, vec!["    stz  m.x"]);
    }

    /// Division by a literal zero is a compile error, not a crash.
    #[test]
    fn division_by_literal_zero_is_a_codegen_error() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(crate::ast::decl::Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let decl = var(&mut ast, module, "x", DataType::Ubyte);
        ast.scoped_names.insert(decl, "m.x".into());

        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, module);
        let target = ident(&mut ast, assignment, decl, "x", DataType::Ubyte);
        let rhs = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Div }), Span::SYNTHETIC, assignment);
        ident(&mut ast, rhs, decl, "x", DataType::Ubyte);
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(0),
            }),
            Span::SYNTHETIC,
            rhs,
        );
        ast.types.insert(target, DataType::Ubyte);
        ast.types.insert(assignment, DataType::Ubyte);

        let gen = CodeGenerator::new("", CompileTarget::Mos6502);
        let (lines, diags) = gen.run(&ast, root);
        assert!(lines.is_empty());
        assert_eq!(diags.errors().len(), 1);
    }
}
