//! Source location tracking for diagnostics.
//!
//! Declaration trees arrive already parsed; every node carries the [`Span`] the
//! parser assigned to it so diagnostics can point back at the source.

use std::fmt;

/// Position and extent of a node in its source file.
///
/// Lines and columns are 1-based. A default span (`0:0`) marks synthesized
/// declarations that have no source text of their own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Whether this span was synthesized rather than parsed.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}+{}", self.line, self.col, self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_span_is_default() {
        assert!(Span::default().is_synthetic());
        assert!(!Span::new(3, 1, 0).is_synthetic());
    }

    #[test]
    fn display_is_line_and_column() {
        assert_eq!(Span::new(12, 7, 4).to_string(), "12:7");
        assert_eq!(format!("{:?}", Span::new(12, 7, 4)), "12:7+4");
    }
}
