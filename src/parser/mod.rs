//! パーサーモジュール
//!
//! このモジュールはトークンを抽象構文木（AST）に解析する責任を持ちます。
//! 再帰下降構文解析を使用し、適切な優先順位処理を行います。
//!
//! ## ソースの形
//!
//! ```text
//! package demo
//!
//! partial module Trees {
//!     #[safe_recursion(name = "max_safe", access = public)]
//!     fn find_max(tree: [int], i: int) -> int {
//!         if i >= len(tree) { return 0; }
//!         let l = find_max(tree, 2 * i + 1), r = find_max(tree, 2 * i + 2);
//!         ...
//!     }
//! }
//! ```
//!
//! 関数には宣言順に `FunctionId` が振られる。以降のパスはすべてこのIDで
//! 関数を参照する。

mod decl_parser;
mod expr_parser;
mod parser_impl;
mod stmt_parser;
mod type_parser;

// 公開API
pub use parser_impl::Parser;

use crate::error::ParserError;
pub type ParseError = ParserError;
pub type ParseResult<T> = Result<T, ParseError>;
