//! Lexical analysis module for saferec source programs.
//!
//! This module is responsible for tokenizing source code into a stream of tokens.
//! Newlines are kept as tokens (the parser drops them) so that positions stay
//! easy to reason about in tests.

use logos::{Lexer as LogosLexer, Logos};
use std::fmt;

/// Token types for the source language
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\f]+")] // Skip whitespace (except newlines)
pub enum Token {
    // Keywords
    #[token("package")]
    Package,
    #[token("module")]
    Module,
    #[token("partial")]
    Partial,
    #[token("fn")]
    Fn,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("yield")]
    Yield,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Visibility modifiers
    #[token("pub")]
    Pub,
    #[token("protected")]
    Protected,
    #[token("internal")]
    Internal,
    #[token("private")]
    Private,

    // Basic types
    #[token("int")]
    Int,
    #[token("bool")]
    Bool,
    #[token("string")]
    StringType,
    #[token("unit")]
    Unit,

    // Identifiers (must come after keywords to avoid conflicts)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_owned(), priority = 1)]
    Identifier(String),

    // Unsigned only: `n-1` must lex as three tokens
    #[regex(r"[0-9]+", parse_integer)]
    Integer(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    String(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // Delimiters
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,
    #[token("#")]
    Hash,

    // Special
    #[regex(r"\r?\n")]
    Newline,

    // Comments (skip them)
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    // Error token for unrecognized input
    Error,
}

/// Parse an integer literal, rejecting values that do not fit in i64
fn parse_integer(lex: &mut LogosLexer<Token>) -> Option<i64> {
    lex.slice().parse::<i64>().ok()
}

/// Unescape a string literal
fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('0') => result.push('\0'),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(value) => write!(f, "Integer({})", value),
            Token::String(s) => write!(f, "String(\"{}\")", s),
            Token::Identifier(s) => write!(f, "Identifier({})", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Position tracking for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new() -> Self {
        Position { line: 1, column: 1 }
    }

    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

/// A token with its position information
#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithPosition {
    pub token: Token,
    pub position: Position,
    pub span: logos::Span,
}

/// Lexer over a source string
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, Token>,
    position: Position,
    input: &'a str,
    last_end: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: Token::lexer(input),
            position: Position::new(),
            input,
            last_end: 0,
        }
    }

    /// Collect every token, including `Token::Error` entries for bad input
    pub fn collect_tokens(self) -> Vec<TokenWithPosition> {
        self.collect()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = TokenWithPosition;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;
        let span = self.inner.span();

        // Update position for any skipped content since last token
        if span.start > self.last_end {
            for ch in self.input[self.last_end..span.start].chars() {
                self.position.advance(ch);
            }
        }

        let position = self.position;
        for ch in self.input[span.start..span.end].chars() {
            self.position.advance(ch);
        }
        self.last_end = span.end;

        let token = result.unwrap_or(Token::Error);
        Some(TokenWithPosition {
            token,
            position,
            span,
        })
    }
}

/// Debug helper: render a token stream one token per line
pub fn format_tokens(tokens: &[TokenWithPosition]) -> String {
    tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Newline))
        .map(|t| format!("{}:{} {}", t.position.line, t.position.column, t.token))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).map(|t| t.token).collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            lex("package module partial fn let if else for while return throw try catch finally yield this"),
            vec![
                Token::Package,
                Token::Module,
                Token::Partial,
                Token::Fn,
                Token::Let,
                Token::If,
                Token::Else,
                Token::For,
                Token::While,
                Token::Return,
                Token::Throw,
                Token::Try,
                Token::Catch,
                Token::Finally,
                Token::Yield,
                Token::This,
            ]
        );
    }

    #[test]
    fn test_minus_is_not_part_of_literal() {
        assert_eq!(
            lex("n-1"),
            vec![
                Token::Identifier("n".to_string()),
                Token::Minus,
                Token::Integer(1),
            ]
        );
    }

    #[test]
    fn test_attribute_tokens() {
        assert_eq!(
            lex(r#"#[safe_recursion(group = "parity")]"#),
            vec![
                Token::Hash,
                Token::LeftBracket,
                Token::Identifier("safe_recursion".to_string()),
                Token::LeftParen,
                Token::Identifier("group".to_string()),
                Token::Assign,
                Token::String("parity".to_string()),
                Token::RightParen,
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("+ - * / % = += -= *= == != < > <= >= && || ! ->"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Assign,
                Token::PlusAssign,
                Token::MinusAssign,
                Token::StarAssign,
                Token::Equal,
                Token::NotEqual,
                Token::Less,
                Token::Greater,
                Token::LessEqual,
                Token::GreaterEqual,
                Token::And,
                Token::Or,
                Token::Not,
                Token::Arrow,
            ]
        );
    }

    #[test]
    fn test_integer_overflow_is_error() {
        assert_eq!(lex("99999999999999999999"), vec![Token::Error]);
    }

    #[test]
    fn test_comments_and_position_tracking() {
        let input = "fn f() { // comment\n    return 1; /* block */\n}";
        let tokens: Vec<_> = Lexer::new(input).collect();
        assert!(tokens.iter().all(|t| !matches!(t.token, Token::Error)));

        let ret = tokens
            .iter()
            .find(|t| t.token == Token::Return)
            .map(|t| t.position);
        assert_eq!(ret, Some(Position { line: 2, column: 5 }));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r#""a\"b\n""#),
            vec![Token::String("a\"b\n".to_string())]
        );
    }
}
