//! Data types and the zero-page placement wish for variable declarations.
//! See spec.md §3 "Data types" and §4.3.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

use super::NodeId;

/// A P8 data type. Arrays and structs nest the element/name information they
/// need; `Struct` additionally carries the resolved declaration once the
/// resolver has run (spec.md §9's "late-bound cross-reference" note — this
/// field is `None` until resolution and must not be read before then).
/// `Array`'s second field is the declared element count, `None` when the
/// array's type was inferred rather than explicitly sized (spec.md §3:
/// "arrays' declared sizes equal their literal-initializer length when both
/// are present").
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DataType {
    Ubyte,
    Byte,
    Uword,
    Word,
    Float,
    Str,
    Array(Box<DataType>, Option<usize>),
    Struct {
        name: String,
        resolved: Option<NodeId>,
    },
}

impl DataType {
    pub fn in_byte_datatypes(&self) -> bool {
        matches!(self, Self::Ubyte | Self::Byte)
    }

    pub fn in_word_datatypes(&self) -> bool {
        matches!(self, Self::Uword | Self::Word)
    }

    pub fn in_numeric_datatypes(&self) -> bool {
        self.in_byte_datatypes() || self.in_word_datatypes() || matches!(self, Self::Float)
    }

    pub fn in_iterable_datatypes(&self) -> bool {
        matches!(self, Self::Array(_, _) | Self::Str)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Byte | Self::Word)
    }

    /// Size in bytes of a single value of this type, ignoring array length.
    /// Structs have no fixed size: they are flattened before this would be
    /// asked.
    pub fn element_size(&self) -> usize {
        match self {
            Self::Ubyte | Self::Byte => 1,
            Self::Uword | Self::Word => 2,
            Self::Float => 5,
            Self::Str => 1,
            Self::Array(elem, _) => elem.element_size(),
            Self::Struct { .. } => 0,
        }
    }

    /// Position in the promotion lattice `ubyte < byte < uword < word <
    /// float` (spec.md §4.3). Used to compute the common type of a binary
    /// expression's operands.
    fn promotion_rank(&self) -> Option<u8> {
        match self {
            Self::Ubyte => Some(0),
            Self::Byte => Some(1),
            Self::Uword => Some(2),
            Self::Word => Some(3),
            Self::Float => Some(4),
            _ => None,
        }
    }

    /// The type of `self op other` under the usual numeric promotion, or
    /// `None` if neither type is on the lattice.
    pub fn promote_with(&self, other: &DataType) -> Option<DataType> {
        let (a, b) = (self.promotion_rank()?, other.promotion_rank()?);
        let winner = if a >= b { self } else { other };
        Some(winner.clone())
    }

    /// True when a value of type `from` can be implicitly widened to `to`
    /// (spec.md §4.3: `ubyte->uword`, `byte->word`, `integer->float`).
    pub fn widens_to(&self, to: &DataType) -> bool {
        matches!(
            (self, to),
            (Self::Ubyte, Self::Uword)
                | (Self::Byte, Self::Word)
                | (Self::Ubyte, Self::Float)
                | (Self::Byte, Self::Float)
                | (Self::Uword, Self::Float)
                | (Self::Word, Self::Float)
        ) || self == to
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ubyte => write!(f, "ubyte"),
            Self::Byte => write!(f, "byte"),
            Self::Uword => write!(f, "uword"),
            Self::Word => write!(f, "word"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::Array(elem, Some(n)) => write!(f, "{}[{}]", elem, n),
            Self::Array(elem, None) => write!(f, "{}[]", elem),
            Self::Struct { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Zero-page placement preference for a variable declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ZeropageWish {
    Require,
    Prefer,
    DontCare,
    Forbid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_picks_wider_type() {
        assert_eq!(
            DataType::Ubyte.promote_with(&DataType::Word),
            Some(DataType::Word)
        );
        assert_eq!(
            DataType::Float.promote_with(&DataType::Ubyte),
            Some(DataType::Float)
        );
    }

    #[test]
    fn widening_rules() {
        assert!(DataType::Ubyte.widens_to(&DataType::Uword));
        assert!(DataType::Byte.widens_to(&DataType::Float));
        assert!(!DataType::Uword.widens_to(&DataType::Ubyte));
    }

    #[test]
    fn array_element_size_ignores_declared_length() {
        assert_eq!(
            DataType::Array(Box::new(DataType::Uword), Some(10)).element_size(),
            2
        );
    }

    #[test]
    fn struct_has_no_fixed_size() {
        assert_eq!(
            DataType::Struct {
                name: "Point".into(),
                resolved: None
            }
            .element_size(),
            0
        );
    }
}
