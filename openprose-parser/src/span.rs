//! Source position and span tracking.
//!
//! Every token and AST node carries a [`Span`]: a pair of [`Position`]s with
//! 1-based line/column and a 0-based byte offset. `end` is exclusive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based line/column position plus its 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// The position at the very start of a source buffer.
    pub fn start_of_file() -> Self {
        Self::new(1, 1, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start_of_file()
    }
}

/// A source range, exclusive at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `pos`, used for synthesized nodes.
    pub fn point(pos: Position) -> Self {
        Self::new(pos, pos)
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start.offset <= offset && offset < self.end.offset
    }

    /// Build a bounding span that contains all provided spans.
    pub fn bounding_box<'a, I>(mut spans: I) -> Option<Span>
    where
        I: Iterator<Item = &'a Span>,
    {
        let first = *spans.next()?;
        let mut start = first.start;
        let mut end = first.end;
        for span in spans {
            if span.start.offset < start.offset {
                start = span.start;
            }
            if span.end.offset > end.offset {
                end = span.end;
            }
        }
        Some(Span::new(start, end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::point(Position::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_display() {
        let pos = Position::new(5, 10, 42);
        assert_eq!(format!("{}", pos), "5:10");
    }

    #[test]
    fn span_contains_offset() {
        let span = Span::new(Position::new(1, 1, 0), Position::new(1, 6, 5));
        assert!(span.contains_offset(0));
        assert!(span.contains_offset(4));
        assert!(!span.contains_offset(5));
    }

    #[test]
    fn bounding_box_picks_extremes() {
        let a = Span::new(Position::new(1, 1, 2), Position::new(1, 4, 5));
        let b = Span::new(Position::new(3, 1, 10), Position::new(4, 4, 20));
        let bbox = Span::bounding_box([a, b].iter()).unwrap();
        assert_eq!(bbox.start.offset, 2);
        assert_eq!(bbox.end.offset, 20);
    }

    #[test]
    fn bounding_box_empty_iter_is_none() {
        let spans: Vec<Span> = Vec::new();
        assert!(Span::bounding_box(spans.iter()).is_none());
    }
}
