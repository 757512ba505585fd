//! Abstract Syntax Tree (AST) definitions for saferec source programs.
//!
//! The tree describes a small imperative language with functions, partial
//! modules and a `#[safe_recursion]` marker attribute. The rewriting passes
//! extend the same tree with suspension nodes (`suspend`, `suspend return`,
//! result slots), so an original function body and its generated step
//! procedure share one representation.

mod declarations;
mod display;
mod expressions;
mod program;
mod statements;
mod types;

use serde::{Deserialize, Serialize};

pub use declarations::*;
pub use display::{write_block, write_signature, write_statement};
pub use expressions::*;
pub use program::*;
pub use statements::*;
pub use types::*;

/// Span information for source location tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// Stable identity of a function declaration.
///
/// Ids are handed out by the parser in declaration order and never change
/// afterwards; every later pass refers to functions through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
