//! Declaration-carrying node payloads: variables, subroutines, labels,
//! structs, modules, and blocks (spec.md §3 "Declarations").

use serde::Serialize;

use super::types::{DataType, ZeropageWish};

/// `var name: DataType [= initializer]`. The initializer, if any, is the
/// node's single child.
#[derive(Clone, Debug, Serialize)]
pub struct VarDecl {
    pub name: String,
    pub data_type: DataType,
    pub zeropage: ZeropageWish,
    pub is_const: bool,
}

/// One parameter of a subroutine signature.
#[derive(Clone, Debug, Serialize)]
pub struct Param {
    pub name: String,
    pub data_type: DataType,
}

/// A subroutine declaration. Its body statements are its children.
#[derive(Clone, Debug, Serialize)]
pub struct Subroutine {
    pub name: String,
    pub params: Vec<Param>,
    pub return_types: Vec<DataType>,
    /// Explicit asm register/status-flag bindings, if this is declared with
    /// `clobbers`/register-parameter syntax.
    pub asm_registers: Option<Vec<String>>,
    pub clobbers: Option<Vec<String>>,
    /// Present for ROM stub declarations that bind to a fixed address rather
    /// than being assembled.
    pub address: Option<u32>,
    pub inline: bool,
    /// True for `asm subroutine` declarations whose body is raw assembly
    /// text rather than statements; exempt from dead-code removal
    /// (spec.md §4.6).
    pub is_asm: bool,
}

impl Subroutine {
    pub fn is_start(&self) -> bool {
        self.name == "start"
    }

    pub fn is_exit(&self) -> bool {
        self.name == "exit"
    }
}

/// `label:` — a jump target. Carries no children.
#[derive(Clone, Debug, Serialize)]
pub struct Label {
    pub name: String,
}

/// A struct type declaration. Its member declarations (in the order used for
/// `s = { v1, .., vN }` expansion) are its children.
#[derive(Clone, Debug, Serialize)]
pub struct StructDecl {
    pub name: String,
    pub members: Vec<Param>,
}

/// A compilation unit. Its top-level statements (blocks and non-blocks) are
/// its children.
#[derive(Clone, Debug, Serialize)]
pub struct Module {
    pub name: String,
    pub is_library: bool,
    pub imports: Vec<String>,
}

/// A named group of declarations and subroutines, optionally placed at a
/// fixed load address. Its declarations are its children.
#[derive(Clone, Debug, Serialize)]
pub struct Block {
    pub name: String,
    pub address: Option<u32>,
    /// Directive-derived options, e.g. `force_output`.
    pub options: Vec<String>,
}

impl Block {
    pub fn force_output(&self) -> bool {
        self.options.iter().any(|o| o == "force_output")
    }

    pub fn is_library(&self) -> bool {
        self.options.iter().any(|o| o == "library")
    }
}

/// An anonymous nested scope introduced by e.g. a bare `{ ... }` block
/// inside a subroutine body. Its statements are its children.
#[derive(Clone, Debug, Serialize)]
pub struct AnonymousScope;

/// A compiler directive, e.g. `%output`, `%zeropage`, `%option`. No
/// children; reordered above declarations in its enclosing scope
/// (spec.md §4.4 step 2).
#[derive(Clone, Debug, Serialize)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
}

impl Directive {
    /// The fixed set of directive names the reorderer hoists (spec.md
    /// §4.4 step 2).
    pub const HOISTED_NAMES: &'static [&'static str] =
        &["output", "launcher", "zeropage", "zpreserved", "address", "option"];
}

/// The tree root. Its modules are its children.
#[derive(Clone, Debug, Serialize)]
pub struct Program;
