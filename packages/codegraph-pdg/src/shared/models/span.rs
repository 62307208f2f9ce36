//! Source location types
//!
//! Lines are 1-based, columns 0-based (tree-sitter columns are byte offsets).

use serde::{Deserialize, Serialize};

/// Span in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a zero span (0:0-0:0), used for synthetic nodes
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Single-line span helper, mostly for hand-built trees in tests
    pub fn line(line: u32) -> Self {
        Self::new(line, 0, line, 0)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    /// Smallest span covering both
    pub fn merge(&self, other: &Span) -> Span {
        if self.is_zero() {
            return *other;
        }
        if other.is_zero() {
            return *self;
        }
        let (start_line, start_col) =
            (self.start_line, self.start_col).min((other.start_line, other.start_col));
        let (end_line, end_col) = (self.end_line, self.end_col).max((other.end_line, other.end_col));
        Span::new(start_line, start_col, end_line, end_col)
    }

    pub fn line_count(&self) -> u32 {
        if self.end_line >= self.start_line {
            self.end_line - self.start_line + 1
        } else {
            0
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains_line() {
        let span = Span::new(10, 0, 20, 0);
        assert!(span.contains_line(10));
        assert!(span.contains_line(15));
        assert!(span.contains_line(20));
        assert!(!span.contains_line(9));
        assert!(!span.contains_line(21));
    }

    #[test]
    fn test_span_line_count() {
        let span = Span::new(10, 0, 20, 0);
        assert_eq!(span.line_count(), 11);
    }

    #[test]
    fn test_span_merge_ignores_zero() {
        let a = Span::new(3, 4, 3, 10);
        assert_eq!(a.merge(&Span::zero()), a);
        assert_eq!(Span::zero().merge(&a), a);

        let b = Span::new(5, 0, 6, 2);
        assert_eq!(a.merge(&b), Span::new(3, 4, 6, 2));
    }
}
