//! saferec library
//!
//! This library rewrites recursive functions of a small imperative language
//! into trampolined state machines that run on an explicit heap stack, and
//! provides the runtime that executes both the original and generated code.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;

// Re-export commonly used types
pub use analyzer::{classify, collect_groups, CallSiteKind, NodesToReplace, Resolver};
pub use ast::{Expression, Program, Statement};
pub use codegen::{CodeGenerator, GeneratedUnit};
pub use compiler::{CompilationOutput, CompilationPipeline, CompilationState};
pub use config::RecursionConfig;
pub use error::{Diagnostic, DiagnosticKind, DiagnosticSink, ErrorCollector, SafeRecError, SafeRecResult};
pub use lexer::{Lexer, Token, TokenWithPosition};
pub use parser::{ParseError, ParseResult, Parser};
pub use runtime::{GroupRunner, Interpreter, RecursionRunner, Value};
