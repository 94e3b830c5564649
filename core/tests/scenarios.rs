//! End-to-end exercises of `Pipeline::compile` (spec.md §8's S1-S6 plus the
//! properties they're meant to demonstrate), each hand-building the minimal
//! AST a front-end would have produced for the described program. There's no
//! parser in this crate, so every test plays that role itself.

use p8c::ast::decl::{Module, Param, StructDecl, Subroutine, VarDecl};
use p8c::ast::expr::{BinOp, BinaryExpr, IdentRef, NumberLit, NumericValue};
use p8c::ast::stmt::Assignment;
use p8c::ast::types::{DataType, ZeropageWish};
use p8c::ast::{Ast, NodeId, NodeKind};
use p8c::util::Span;
use p8c::{CompileOutput, CompilerOptions, Pipeline};

fn module(ast: &mut Ast, root: NodeId, name: &str) -> NodeId {
    ast.alloc(
        NodeKind::Module(Module {
            name: name.into(),
            is_library: true,
            imports: vec![],
        }),
        Span::SYNTHETIC,
        root,
    )
}

fn var(ast: &mut Ast, parent: NodeId, name: &str, ty: DataType, is_const: bool) -> NodeId {
    ast.alloc(
        NodeKind::VarDecl(VarDecl {
            name: name.into(),
            data_type: ty,
            zeropage: ZeropageWish::DontCare,
            is_const,
        }),
        Span::SYNTHETIC,
        parent,
    )
}

fn number(ast: &mut Ast, parent: NodeId, ty: DataType, n: i64) -> NodeId {
    ast.alloc(
        NodeKind::NumberLit(NumberLit {
            data_type: ty,
            value: NumericValue::Int(n),
        }),
        Span::SYNTHETIC,
        parent,
    )
}

fn ident(ast: &mut Ast, parent: NodeId, name: &str) -> NodeId {
    ast.alloc(
        NodeKind::IdentRef(IdentRef { path: vec![name.into()] }),
        Span::SYNTHETIC,
        parent,
    )
}

fn compile(ast: &mut Ast, root: NodeId) -> CompileOutput {
    Pipeline::new(String::new(), CompilerOptions::default()).compile(ast, root)
}

fn asm_text(output: &CompileOutput) -> Vec<&str> {
    output.assembly.iter().map(|l| l.text()).collect()
}

/// S1: `const ubyte N = 2 + 3 * 4` folds all the way to the literal `14`.
#[test]
fn s1_constant_expression_folds_to_a_single_literal() {
    let (mut ast, root) = Ast::new();
    let m = module(&mut ast, root, "m");
    let n_decl = var(&mut ast, m, "N", DataType::Ubyte, true);
    let add = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }), Span::SYNTHETIC, n_decl);
    number(&mut ast, add, DataType::Ubyte, 2);
    let mul = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Mul }), Span::SYNTHETIC, add);
    number(&mut ast, mul, DataType::Ubyte, 3);
    number(&mut ast, mul, DataType::Ubyte, 4);
    // n_decl's only child is `add`: 2 + (3 * 4).

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);

    let init = ast.children_of(n_decl)[0];
    match ast.kind(init) {
        NodeKind::NumberLit(lit) => {
            assert_eq!(lit.value, NumericValue::Int(14));
            assert_eq!(lit.data_type, DataType::Ubyte);
        }
        other => panic!("expected a folded literal, got {:?}", other),
    }
}

/// S2: `ubyte x; x = 1; x = 1` dedups to a single assignment once dead-code
/// removal runs.
#[test]
fn s2_duplicate_trivial_assignments_collapse_to_one() {
    let (mut ast, root) = Ast::new();
    let m = module(&mut ast, root, "m");
    let decl = var(&mut ast, m, "x", DataType::Ubyte, false);

    let make_assignment = |ast: &mut Ast| {
        let a = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, m);
        let target = ident(ast, a, "x");
        ast.resolved.insert(target, decl);
        number(ast, a, DataType::Ubyte, 1);
        a
    };
    let a1 = make_assignment(&mut ast);
    let _a2 = make_assignment(&mut ast);

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);
    assert!(!ast.children_of(m).contains(&a1));
    let remaining: Vec<NodeId> = ast
        .children_of(m)
        .iter()
        .copied()
        .filter(|&c| matches!(ast.kind(c), NodeKind::Assignment(_)))
        .collect();
    assert_eq!(remaining.len(), 1);
}

/// S3: `ubyte x; x <<= 9` desugars to `x = x << 9` and, since the shift
/// amount is 8 or more, codegen clears the byte instead of unrolling a loop.
#[test]
fn s3_shift_by_9_clears_the_target_byte() {
    let (mut ast, root) = Ast::new();
    let m = module(&mut ast, root, "m");
    let decl = var(&mut ast, m, "x", DataType::Ubyte, false);

    let assignment = ast.alloc(
        NodeKind::Assignment(Assignment { aug_op: Some(BinOp::Shl) }),
        Span::SYNTHETIC,
        m,
    );
    let target = ident(&mut ast, assignment, "x");
    ast.resolved.insert(target, decl);
    number(&mut ast, assignment, DataType::Ubyte, 9);

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);
    assert_eq!(asm_text(&output), vec!["    lda  #0", "    sta  m.x"]);
}

/// S4: `uword w; w += 0x0200` — the low byte of the literal is zero, so
/// codegen emits a run of `inc w+1` rather than the general add sequence.
#[test]
fn s4_word_add_with_zero_low_byte_emits_inc_high_byte() {
    let (mut ast, root) = Ast::new();
    let m = module(&mut ast, root, "m");
    let decl = var(&mut ast, m, "w", DataType::Uword, false);

    let assignment = ast.alloc(
        NodeKind::Assignment(Assignment { aug_op: Some(BinOp::Add) }),
        Span::SYNTHETIC,
        m,
    );
    let target = ident(&mut ast, assignment, "w");
    ast.resolved.insert(target, decl);
    number(&mut ast, assignment, DataType::Uword, 0x0200);

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);
    assert_eq!(asm_text(&output), vec!["    inc  m.w+1", "    inc  m.w+1"]);
}

/// S5: `ubyte a; a = (a + 3) + 5` re-associates to `a + 8` before codegen
/// ever sees it, so the emitted assembly is the plain direct-add sequence.
#[test]
fn s5_reassociated_constants_emit_a_direct_add() {
    let (mut ast, root) = Ast::new();
    let m = module(&mut ast, root, "m");
    let decl = var(&mut ast, m, "a", DataType::Ubyte, false);

    let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, m);
    let target = ident(&mut ast, assignment, "a");
    ast.resolved.insert(target, decl);

    let outer = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }), Span::SYNTHETIC, assignment);
    let inner = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }), Span::SYNTHETIC, outer);
    let a_in_rhs = ident(&mut ast, inner, "a");
    ast.resolved.insert(a_in_rhs, decl);
    number(&mut ast, inner, DataType::Ubyte, 3);
    number(&mut ast, outer, DataType::Ubyte, 5);

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);
    assert_eq!(asm_text(&output), vec!["    lda  m.a", "    clc", "    adc  #8", "    sta  m.a"]);
}

/// S6: `p1 = p2` on a struct-typed pair expands into flattened memberwise
/// assignments well before codegen, so the struct itself never reaches the
/// in-place-update machinery, which only understands primitive storage.
#[test]
fn s6_struct_assignment_desugars_into_member_assignments_before_codegen() {
    let (mut ast, root) = Ast::new();
    let m = module(&mut ast, root, "m");
    let struct_decl = ast.alloc(
        NodeKind::StructDecl(StructDecl {
            name: "Point".into(),
            members: vec![
                Param { name: "x".into(), data_type: DataType::Ubyte },
                Param { name: "y".into(), data_type: DataType::Ubyte },
            ],
        }),
        Span::SYNTHETIC,
        m,
    );
    var(&mut ast, struct_decl, "x", DataType::Ubyte, false);
    var(&mut ast, struct_decl, "y", DataType::Ubyte, false);

    let point_ty = DataType::Struct {
        name: "Point".into(),
        resolved: Some(struct_decl),
    };
    let p1 = var(&mut ast, m, "p1", point_ty.clone(), false);
    let p2 = var(&mut ast, m, "p2", point_ty.clone(), false);

    let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, m);
    let target = ident(&mut ast, assignment, "p1");
    ast.resolved.insert(target, p1);
    let value = ident(&mut ast, assignment, "p2");
    ast.resolved.insert(value, p2);

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);
    assert_eq!(
        asm_text(&output),
        vec!["    lda  m.p2$x", "    sta  m.p1$x", "    lda  m.p2$y", "    sta  m.p1$y"]
    );
}

/// A module containing the entry point survives dead-code removal even
/// though nothing imports it, and its assembly is non-empty (spec.md §8
/// property 6 applied at module granularity).
#[test]
fn entry_point_module_survives_the_full_pipeline() {
    let (mut ast, root) = Ast::new();
    let m = ast.alloc(
        NodeKind::Module(Module {
            name: "m".into(),
            is_library: false,
            imports: vec![],
        }),
        Span::SYNTHETIC,
        root,
    );
    let decl = var(&mut ast, m, "x", DataType::Ubyte, false);
    let start = ast.alloc(
        NodeKind::Subroutine(Subroutine {
            name: "start".into(),
            params: vec![],
            return_types: vec![],
            asm_registers: None,
            clobbers: None,
            address: None,
            inline: false,
            is_asm: false,
        }),
        Span::SYNTHETIC,
        m,
    );
    let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, start);
    let target = ident(&mut ast, assignment, "x");
    ast.resolved.insert(target, decl);
    number(&mut ast, assignment, DataType::Ubyte, 1);

    let output = compile(&mut ast, root);
    assert!(!output.has_errors(), "{:#?}", output);
    assert!(!output.assembly.is_empty());
    assert!(ast.children_of(root).contains(&m));
}
