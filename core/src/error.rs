//! All diagnostic types produced by the compiler. Mirrors the teacher
//! crate's `SourceError` / `SourceErrorWrapper` / `WithSource` split: an error
//! that knows how to format itself against a slice of source, a wrapper that
//! attaches the span and that slice, and a collection wrapper that attaches
//! the whole source file for `{:#}`-style rendering with carets.

use crate::util::{self, Span};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;

/// A trait for any error that originates in source code. Implementors rely
/// on the caller providing the spanned source slice at format time, rather
/// than carrying it themselves, so that [`Diagnostics`] can own the source
/// text exactly once.
pub trait SourceError: 'static + Send + Sync + Debug + Serialize {
    /// A short label for the error category, shown before the message, e.g.
    /// `"Name resolution"` or `"Codegen"`.
    fn type_label(&self) -> &'static str;

    /// Format this error into a human-readable message. `spanned_src` is the
    /// slice of source that corresponds to the error's span.
    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result;
}

/// Recoverable errors: syntax/structural, name resolution, and type errors
/// (spec.md §7). These are collected across a whole pass instead of
/// aborting on the first one, so that a single compile surfaces as many
/// problems as possible.
#[derive(Clone, Debug, Serialize, Error)]
pub enum CompileError {
    #[error("unresolved name")]
    UnresolvedName { path: String },
    #[error("ambiguous name")]
    AmbiguousName { path: String },
    #[error("type mismatch")]
    TypeMismatch { expected: String, found: String },
    #[error("narrowing requires cast")]
    NarrowingRequiresCast { from: String, to: String },
    #[error("array size mismatch")]
    ArraySizeMismatch { declared: usize, actual: usize },
    #[error("struct element count mismatch")]
    StructElementCountMismatch { expected: usize, actual: usize },
    #[error("recursive initializer")]
    RecursiveInitializer { name: String },
    #[error("invalid string literal length")]
    StringLiteralLengthInvalid { length: usize },
    #[error("numeric literal overflow")]
    NumericLiteralOverflow { type_name: String },
    #[error("reference to unknown struct")]
    UnknownStruct { name: String },
    #[error("duplicate module name")]
    DuplicateModule { name: String },
    #[error("domain error")]
    DomainError { detail: String },
    #[error("float literal overflows the 5-byte float range")]
    FloatOverflow,
    #[error("unreachable code")]
    UnreachableCode,
}

impl SourceError for CompileError {
    fn type_label(&self) -> &'static str {
        match self {
            Self::UnresolvedName { .. } | Self::AmbiguousName { .. } => {
                "Name resolution"
            }
            Self::TypeMismatch { .. }
            | Self::NarrowingRequiresCast { .. }
            | Self::NumericLiteralOverflow { .. }
            | Self::FloatOverflow => "Type",
            _ => "Validation",
        }
    }

    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result {
        match self {
            Self::UnresolvedName { path } => {
                write!(f, "Cannot resolve name `{}`", path)
            }
            Self::AmbiguousName { path } => write!(
                f,
                "Reference to `{}` is ambiguous; multiple declarations are reachable",
                path
            ),
            Self::TypeMismatch { expected, found } => write!(
                f,
                "Expected a value of type {}, found {} (`{}`)",
                expected, found, spanned_src
            ),
            Self::NarrowingRequiresCast { from, to } => write!(
                f,
                "Narrowing `{}` to `{}` requires an explicit cast",
                from, to
            ),
            Self::ArraySizeMismatch { declared, actual } => write!(
                f,
                "Array initializer has {} elements, but the declared size is {}",
                actual, declared
            ),
            Self::StructElementCountMismatch { expected, actual } => write!(
                f,
                "Struct literal has {} elements, struct declares {}",
                actual, expected
            ),
            Self::RecursiveInitializer { name } => write!(
                f,
                "Initializer for `{}` refers to itself",
                name
            ),
            Self::StringLiteralLengthInvalid { length } => write!(
                f,
                "String literal length {} is outside the allowed range 1..255",
                length
            ),
            Self::NumericLiteralOverflow { type_name } => write!(
                f,
                "Numeric literal `{}` does not fit in type {}",
                spanned_src, type_name
            ),
            Self::UnknownStruct { name } => {
                write!(f, "Reference to unknown struct `{}`", name)
            }
            Self::DuplicateModule { name } => {
                write!(f, "Duplicate module name `{}`", name)
            }
            Self::DomainError { detail } => write!(f, "{}", detail),
            Self::FloatOverflow => write!(
                f,
                "Float literal `{}` overflows the 5-byte float range",
                spanned_src
            ),
            Self::UnreachableCode => write!(
                f,
                "Unreachable code after an unconditional exit (`{}`)",
                spanned_src
            ),
        }
    }
}

/// Fatal-for-the-current-function codegen errors (spec.md §4.9, §7). When
/// one of these occurs the codegen produces no output for the enclosing
/// subroutine but compilation continues elsewhere to surface more
/// diagnostics.
#[derive(Clone, Debug, Serialize, Error)]
pub enum CodegenError {
    #[error("division by a literal zero")]
    DivisionByZero,
    #[error("shift amount must fit in a byte")]
    ShiftByWordQuantity,
    #[error("remainder of signed integers is undefined")]
    SignedRemainderUnsupported,
    #[error("unknown data type in cast")]
    UnknownCastType,
    #[error("unsupported storage combination")]
    UnsupportedStorage { detail: String },
}

impl SourceError for CodegenError {
    fn type_label(&self) -> &'static str {
        "Codegen"
    }

    fn fmt_msg(&self, f: &mut Formatter<'_>, spanned_src: &str) -> fmt::Result {
        match self {
            Self::DivisionByZero => {
                write!(f, "Division by zero in `{}`", spanned_src)
            }
            Self::ShiftByWordQuantity => write!(
                f,
                "Shift amount `{}` does not fit in a byte (max shift is 255)",
                spanned_src
            ),
            Self::SignedRemainderUnsupported => write!(
                f,
                "Remainder of signed integers is not supported (`{}`)",
                spanned_src
            ),
            Self::UnknownCastType => write!(
                f,
                "Cannot determine the data type of `{}`",
                spanned_src
            ),
            Self::UnsupportedStorage { detail } => write!(
                f,
                "Unsupported storage combination for `{}`: {}",
                spanned_src, detail
            ),
        }
    }
}

/// A single error, tagged with the span it occurred at and the literal
/// source text under that span.
#[derive(Clone, Debug, Error, Serialize)]
pub struct Diagnostic<E: SourceError> {
    error: E,
    span: Span,
    spanned_source: String,
}

impl<E: SourceError> Diagnostic<E> {
    pub fn new(error: E, span: Span, src: &str) -> Self {
        Self {
            error,
            span,
            spanned_source: span.get_source_slice(src).into(),
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// A key used to suppress duplicate diagnostics: the same textual
    /// message at the same position is reported only once (spec.md §7).
    fn dedup_key(&self) -> (usize, usize, String) {
        (self.span.offset, self.span.length, self.to_string())
    }
}

impl<E: SourceError> Display for Diagnostic<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error at {}:{}:{}: ",
            self.error.type_label(),
            self.span.file,
            self.span.start_line,
            self.span.start_col,
        )?;
        self.error.fmt_msg(f, &self.spanned_source)
    }
}

/// A collection of diagnostics plus the source they refer to, so the whole
/// batch can be rendered with highlights via `{:#}`.
#[derive(Clone, Debug, Error, Serialize)]
pub struct Diagnostics<E: SourceError> {
    errors: Vec<Diagnostic<E>>,
    #[serde(skip)]
    source_code: String,
}

impl<E: SourceError> Diagnostics<E> {
    pub fn new(source: String) -> Self {
        Self {
            errors: Vec::new(),
            source_code: source,
        }
    }

    /// Push a diagnostic unless an identical one (same message, same
    /// position) has already been recorded.
    pub fn push(&mut self, error: E, span: Span) {
        let candidate = Diagnostic::new(error, span, &self.source_code);
        let key = candidate.dedup_key();
        let mut seen = HashSet::new();
        for existing in &self.errors {
            seen.insert(existing.dedup_key());
        }
        if !seen.contains(&key) {
            self.errors.push(candidate);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic<E>] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<E: SourceError> Display for Diagnostics<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
            if f.alternate() {
                util::fmt_src_highlights(f, &error.span, &self.source_code)?;
            }
        }
        Ok(())
    }
}

/// Panics with a message identifying an internal invariant violation (spec.md
/// §7: "null parent link, child-not-found in replace"). These are compiler
/// bugs, never user errors, and abort the whole compilation immediately by
/// design — there is no recovery path for a tree that the compiler itself
/// cannot navigate.
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        panic!("internal compiler error: {}", format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(offset: usize, length: usize) -> Span {
        Span {
            file: "a.p8",
            offset,
            length,
            start_line: 1,
            start_col: offset + 1,
            end_line: 1,
            end_col: offset + length + 1,
        }
    }

    #[test]
    fn dedups_identical_diagnostics() {
        let mut diags: Diagnostics<CompileError> =
            Diagnostics::new("foo bar".into());
        diags.push(
            CompileError::UnresolvedName { path: "foo".into() },
            span(0, 3),
        );
        diags.push(
            CompileError::UnresolvedName { path: "foo".into() },
            span(0, 3),
        );
        assert_eq!(diags.errors().len(), 1);
    }

    #[test]
    fn keeps_distinct_diagnostics() {
        let mut diags: Diagnostics<CompileError> =
            Diagnostics::new("foo bar".into());
        diags.push(
            CompileError::UnresolvedName { path: "foo".into() },
            span(0, 3),
        );
        diags.push(
            CompileError::UnresolvedName { path: "bar".into() },
            span(4, 3),
        );
        assert_eq!(diags.errors().len(), 2);
    }

    #[test]
    fn into_result_ok_when_empty() {
        let diags: Diagnostics<CompileError> = Diagnostics::new(String::new());
        assert!(diags.into_result().is_ok());
    }
}
