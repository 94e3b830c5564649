//! The active compilation target, queried by the emitter to gate 65C02-only
//! idioms (spec.md §6).

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileTarget {
    Mos6502,
    Wdc65C02,
}

impl CompileTarget {
    /// Whether `stz`/`bra` and other 65C02-only idioms may be emitted.
    pub fn is_65c02(self) -> bool {
        matches!(self, Self::Wdc65C02)
    }
}

impl Default for CompileTarget {
    fn default() -> Self {
        Self::Mos6502
    }
}
