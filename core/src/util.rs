//! Small helpers shared across the crate: source spans and debug tracing.

use serde::Serialize;
use std::fmt;

/// A location in a source file. Carries enough to both point at a CLI error
/// message (`file:line:col`) and to slice the original source for
/// highlighting, which is why both the line/col pair and the raw byte offset
/// and length are kept around.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    /// Name of the source file this span points into. The front-end is
    /// expected to deliver this on every node (see spec.md §6).
    pub file: &'static str,
    pub offset: usize,
    pub length: usize,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    /// A span that doesn't point anywhere real. Used for synthetic nodes
    /// introduced by rewriting passes (e.g. a hoisted variable declaration)
    /// that have no corresponding source text.
    pub const SYNTHETIC: Span = Span {
        file: "<synthetic>",
        offset: 0,
        length: 0,
        start_line: 0,
        start_col: 0,
        end_line: 0,
        end_col: 0,
    };

    /// Slice the given source string to the text this span covers. Returns
    /// an empty string if the offsets don't fit the given source (e.g. a
    /// synthetic span), rather than panicking.
    pub fn get_source_slice<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.offset..self.offset + self.length).unwrap_or("")
    }
}

/// Writes a source-highlight block under an already-written error message:
/// the offending line, followed by a line of spaces and carets under the
/// span's columns.
pub fn fmt_src_highlights(
    f: &mut fmt::Formatter<'_>,
    span: &Span,
    source: &str,
) -> fmt::Result {
    if let Some(line) = source.lines().nth(span.start_line.saturating_sub(1)) {
        writeln!(f)?;
        writeln!(f, "  {}", line)?;
        let mut carets = String::new();
        for _ in 0..span.start_col.saturating_sub(1) {
            carets.push(' ');
        }
        let width = if span.end_line == span.start_line {
            (span.end_col.max(span.start_col + 1)) - span.start_col
        } else {
            1
        };
        for _ in 0..width {
            carets.push('^');
        }
        write!(f, "  {}", carets)?;
    }
    Ok(())
}

/// Prints the given expression's `Debug` output, but only when the
/// environment variable `P8C_DEBUG` is set to `true`. Compiles away entirely
/// in release builds. Used between pipeline stages to trace how the AST
/// changes from pass to pass.
#[macro_export]
macro_rules! debug {
    ($arg:expr) => {
        #[cfg(debug_assertions)]
        {
            if let Ok(debug_val) = std::env::var("P8C_DEBUG") {
                if debug_val.to_lowercase().as_str() == "true" {
                    $arg
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_slice_extracts_span() {
        let span = Span {
            file: "a.p8",
            offset: 2,
            length: 3,
            start_line: 1,
            start_col: 3,
            end_line: 1,
            end_col: 6,
        };
        assert_eq!(span.get_source_slice("ubyte xyz"), "yte");
    }

    #[test]
    fn source_slice_out_of_range_is_empty() {
        let span = Span::SYNTHETIC;
        assert_eq!(span.get_source_slice("hi"), "");
    }

    #[test]
    fn highlight_writes_caret_line() {
        struct Wrap(Span, &'static str);
        impl fmt::Display for Wrap {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_src_highlights(f, &self.0, self.1)
            }
        }
        let span = Span {
            file: "a.p8",
            offset: 6,
            length: 1,
            start_line: 1,
            start_col: 7,
            end_line: 1,
            end_col: 8,
        };
        let out = format!("{}", Wrap(span, "ubyte x = 1"));
        assert!(out.contains("ubyte x = 1"));
        assert!(out.trim_end().ends_with('^'));
    }
}
