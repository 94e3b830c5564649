//! Fixed names the codegen depends on: the runtime library's entry points and
//! the zero-page scratch locations reserved for it. See spec.md §6.

/// Default number of constant-folding rounds allowed before we give up and
/// treat non-convergence as an internal error (it never should happen, since
/// every rewrite in the fold strictly reduces term size or literal count, but
/// a bound keeps a buggy rewrite from hanging the compiler).
pub const MAX_CONSTFOLD_ROUNDS: usize = 1_000;

/// Two word-sized zero-page scratch registers, always available to the
/// codegen for intermediate pointer/word math.
pub const SCRATCH_W1: &str = "P8ZP_SCRATCH_W1";
pub const SCRATCH_W2: &str = "P8ZP_SCRATCH_W2";
/// A byte-sized zero-page scratch register.
pub const SCRATCH_B1: &str = "P8ZP_SCRATCH_B1";
/// A register-sized (word) zero-page scratch used for passing values into
/// runtime library calls.
pub const SCRATCH_REG: &str = "P8ZP_SCRATCH_REG";

/// Name of virtual register `n` (`r0`..`r15`), each a zero-page word.
pub fn virtual_register(n: u8) -> String {
    format!("r{}", n)
}

/// Runtime library routine names, namespaced the way the assembler expects
/// (`module.routine`).
pub mod math {
    pub const MULTIPLY_BYTES: &str = "math.multiply_bytes";
    pub const DIVMOD_B_ASM: &str = "math.divmod_b_asm";
    pub const DIVMOD_UB_ASM: &str = "math.divmod_ub_asm";
    pub const MULTIPLY_WORDS: &str = "math.multiply_words";
    pub const DIVMOD_W_ASM: &str = "math.divmod_w_asm";
    pub const DIVMOD_UW_ASM: &str = "math.divmod_uw_asm";
    pub const LSR_BYTE_A: &str = "math.lsr_byte_A";

    /// Name of the small-multiplier lookup routine for `byte * n`, if one
    /// exists for that multiplier (the optimized-product table in spec.md
    /// §4.9). Multipliers with a tuned routine are enumerated in
    /// [`BYTE_MUL_TABLE`].
    pub fn mul_byte_n(n: u32) -> String {
        format!("math.mul_byte_{}", n)
    }

    /// Name of the small-multiplier lookup routine for `word * n`.
    pub fn mul_word_n(n: u32) -> String {
        format!("math.mul_word_{}", n)
    }

    /// Multipliers for which the runtime ships a tuned `mul_byte_N` routine.
    /// Anything else routes through [`MULTIPLY_BYTES`].
    pub const BYTE_MUL_TABLE: &[u32] = &[2, 3, 4, 5, 6, 7, 8, 10, 16, 20, 32, 100];
    /// Multipliers for which the runtime ships a tuned `mul_word_N` routine.
    pub const WORD_MUL_TABLE: &[u32] = &[2, 3, 4, 5, 8, 10, 16, 100];
}

pub mod prog8_lib {
    pub const READ_BYTE_FROM_ADDRESS_ON_STACK: &str =
        "prog8_lib.read_byte_from_address_on_stack";
    pub const WRITE_BYTE_TO_ADDRESS_ON_STACK: &str =
        "prog8_lib.write_byte_to_address_on_stack";
}

pub mod floats {
    pub const MOVFM: &str = "floats.MOVFM";
    pub const MOVMF: &str = "floats.MOVMF";
    pub const CONUPK: &str = "floats.CONUPK";
    pub const FADD: &str = "floats.FADD";
    pub const FSUB: &str = "floats.FSUB";
    pub const FMULT: &str = "floats.FMULT";
    pub const FDIV: &str = "floats.FDIV";
    pub const FPWR: &str = "floats.FPWR";
    pub const FPWRT: &str = "floats.FPWRT";

    /// Largest finite magnitude the 5-byte MFLPT layout (1 exponent byte,
    /// 4 mantissa bytes) can hold, the same bound CBM/Applesoft BASIC's
    /// float routines enforce. A folded float result past this is diagnosed
    /// rather than silently stored (spec.md §4.5).
    pub const MAX_MAGNITUDE: f64 = 1.7014118346e38;
}
