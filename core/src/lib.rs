//! Semantic middle-end for the P8 systems language: everything that runs
//! between an already-parsed AST and the final 6502 assembly text for
//! augmented assignments. The lexer/parser front-end and the textual
//! assembler are external collaborators; this crate's entry point is
//! [`Pipeline`], which takes an [`Ast`] someone else built and drives it
//! through name resolution, type checking, statement desugaring, constant
//! folding, dead-code removal, program-level checks, and finally codegen.
//!
//! ```text
//! let options = p8c::CompilerOptions { target: p8c::target::CompileTarget::Mos6502 };
//! let pipeline = p8c::Pipeline::new(source_text, options);
//! let output = pipeline.compile(&mut ast, root);
//! if !output.has_errors() {
//!     for line in &output.assembly {
//!         println!("{}", line);
//!     }
//! }
//! ```

#![deny(clippy::all)]

pub mod ast;
pub mod callgraph;
pub mod checks;
pub mod codegen;
pub mod consts;
pub mod error;
pub mod passes;
pub mod target;
pub mod util;
pub mod walker;

use ast::{Ast, NodeId};
use checks::ProgramChecker;
use crate::debug;
use codegen::{AsmLine, CodeGenerator};
use error::{CodegenError, CompileError, Diagnostics};
use passes::constfold::ConstFolder;
use passes::deadcode::DeadCodeRemover;
use passes::reorder::Reorderer;
use passes::resolve::Resolver;
use passes::typecheck::TypeChecker;
use target::CompileTarget;

/// Hardware-independent knobs for one compilation. Currently just the
/// active CPU, since it's the only pipeline-wide setting codegen needs
/// (spec.md §6); modeled as a plain `Copy` struct the way the teacher models
/// its own `HardwareSpec`/`ProgramSpec`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompilerOptions {
    pub target: CompileTarget,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: CompileTarget::default(),
        }
    }
}

/// Everything a compile produced: the emitted assembly (empty if any earlier
/// stage reported an error) and each stage's diagnostics, kept separate
/// rather than merged so a caller can tell which stage a given diagnostic
/// came from.
#[derive(Debug)]
pub struct CompileOutput {
    pub assembly: Vec<AsmLine>,
    pub resolve_diagnostics: Diagnostics<CompileError>,
    pub typecheck_diagnostics: Diagnostics<CompileError>,
    pub reorder_diagnostics: Diagnostics<CompileError>,
    pub constfold_diagnostics: Diagnostics<CompileError>,
    pub deadcode_diagnostics: Diagnostics<CompileError>,
    pub check_diagnostics: Diagnostics<CompileError>,
    pub codegen_diagnostics: Diagnostics<CodegenError>,
}

impl CompileOutput {
    /// Whether any stage reported a diagnostic. Codegen only ran if this is
    /// false going into it, but a caller should still check it afterward:
    /// codegen reports its own errors for augmented assignments it can't
    /// emit (spec.md §7).
    pub fn has_errors(&self) -> bool {
        !self.resolve_diagnostics.is_empty()
            || !self.typecheck_diagnostics.is_empty()
            || !self.reorder_diagnostics.is_empty()
            || !self.constfold_diagnostics.is_empty()
            || !self.deadcode_diagnostics.is_empty()
            || !self.check_diagnostics.is_empty()
            || !self.codegen_diagnostics.is_empty()
    }
}

/// Drives one AST through every semantic pass in order, then codegen.
/// Mirrors the teacher's `Compiler<T>` staged pipeline, generalized from a
/// type-parameterized chain of `self -> Self` methods (gdlk compiles from
/// source text, so each stage's output type documents how far along the
/// program is) into one method over an already-built AST, since parsing
/// here is an external concern (spec.md §1).
pub struct Pipeline {
    source: String,
    options: CompilerOptions,
}

impl Pipeline {
    pub fn new(source: String, options: CompilerOptions) -> Self {
        Self { source, options }
    }

    /// Run every stage in turn: resolve, typecheck, reorder/desugar,
    /// constant-fold to a fixpoint, remove dead code to a fixpoint,
    /// program-level checks, then codegen. Codegen only runs if every
    /// earlier stage reported zero diagnostics, since it relies on
    /// invariants (every identifier resolved, every expression typed) that a
    /// broken tree doesn't satisfy; a diagnostic from any of those stages
    /// still reaches the caller through the corresponding field.
    pub fn compile(self, ast: &mut Ast, root: NodeId) -> CompileOutput {
        let mut resolver = Resolver::new(&self.source);
        let resolve_diagnostics = resolver.run(ast, root);
        debug!(println!("p8c: after resolve:\n{:#?}", ast.kind(root)));

        let typecheck_diagnostics = TypeChecker::new(&self.source).run(ast, root);
        debug!(println!("p8c: after typecheck:\n{:#?}", ast.kind(root)));

        let reorder_diagnostics = Reorderer::new(&self.source).run(ast, root);
        debug!(println!("p8c: after reorder:\n{:#?}", ast.kind(root)));

        let constfold_diagnostics = ConstFolder::new(&self.source).run(ast, root);
        debug!(println!("p8c: after constfold:\n{:#?}", ast.kind(root)));

        let mut deadcode_diagnostics = Diagnostics::new(self.source.clone());
        loop {
            let (diags, changed) = DeadCodeRemover::new(&self.source).run(ast, root);
            deadcode_diagnostics = diags;
            if !changed {
                break;
            }
        }
        debug!(println!("p8c: after deadcode:\n{:#?}", ast.kind(root)));

        let check_diagnostics = ProgramChecker::new(&self.source).run(ast, root);

        let clean = resolve_diagnostics.is_empty()
            && typecheck_diagnostics.is_empty()
            && reorder_diagnostics.is_empty()
            && constfold_diagnostics.is_empty()
            && deadcode_diagnostics.is_empty()
            && check_diagnostics.is_empty();

        let (assembly, codegen_diagnostics) = if clean {
            CodeGenerator::new(&self.source, self.options.target).run(ast, root)
        } else {
            (Vec::new(), Diagnostics::new(self.source.clone()))
        };

        CompileOutput {
            assembly,
            resolve_diagnostics,
            typecheck_diagnostics,
            reorder_diagnostics,
            constfold_diagnostics,
            deadcode_diagnostics,
            check_diagnostics,
            codegen_diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::decl::{Block, Module, Subroutine, VarDecl};
    use ast::expr::{BinOp, BinaryExpr, IdentRef, NumberLit, NumericValue};
    use ast::stmt::Assignment;
    use ast::types::{DataType, ZeropageWish};
    use ast::NodeKind;
    use util::Span;

    /// A minimal program (one module, one block, one non-inline `start`
    /// subroutine with a single augmentable assignment) makes it all the way
    /// through the pipeline with no diagnostics and produces assembly.
    #[test]
    fn full_pipeline_emits_assembly_for_a_trivial_program() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(Module {
                name: "m".into(),
                is_library: false,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let block = ast.alloc(
            NodeKind::Block(Block {
                name: "main".into(),
                address: None,
                options: vec![],
            }),
            Span::SYNTHETIC,
            module,
        );
        ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "x".into(),
                data_type: DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            block,
        );
        let sub = ast.alloc(
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
            block,
        );
        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, sub);
        ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["x".into()] }),
            Span::SYNTHETIC,
            assignment,
        );
        let rhs = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op: BinOp::Add }), Span::SYNTHETIC, assignment);
        ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["x".into()] }),
            Span::SYNTHETIC,
            rhs,
        );
        ast.alloc(
            NodeKind::NumberLit(NumberLit {
                data_type: DataType::Ubyte,
                value: NumericValue::Int(1),
            }),
            Span::SYNTHETIC,
            rhs,
        );

        let pipeline = Pipeline::new(String::new(), CompilerOptions::default());
        let output = pipeline.compile(&mut ast, root);
        assert!(!output.has_errors(), "{:#?}", output);
        assert!(!output.assembly.is_empty());
    }

    #[test]
    fn compiler_options_default_targets_mos6502() {
        assert_eq!(CompilerOptions::default().target, CompileTarget::Mos6502);
    }
}
