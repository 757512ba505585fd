//! メインパーサー構造とユーティリティ

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::{Token, TokenWithPosition};

use super::{ParseError, ParseResult};

/// ソースプログラムのパーサー
pub struct Parser {
    pub(super) tokens: Vec<TokenWithPosition>,
    pub(super) current: usize,
    pub(super) next_function_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithPosition>) -> Self {
        // 改行トークンは意味を持たないのでフィルタリング
        let tokens: Vec<_> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Newline))
            .collect();
        Self {
            tokens,
            current: 0,
            next_function_id: 0,
        }
    }

    /// 完全なプログラムを解析
    pub fn parse(&mut self) -> ParseResult<Program> {
        let package = self.parse_package_decl()?;

        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_item()?);
        }

        let span = match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
            _ => Span::dummy(),
        };

        Ok(Program {
            package,
            items,
            span,
        })
    }

    /// 単一の式を解析
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_expression_internal()
    }

    /// 単一の文を解析
    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.parse_statement_internal()
    }

    /// パッケージ宣言（省略可能）
    fn parse_package_decl(&mut self) -> ParseResult<Option<PackageDecl>> {
        if !self.check(&Token::Package) {
            return Ok(None);
        }
        let start = self.current_span().start;
        self.advance();
        let name = self.expect_identifier()?;
        // 末尾のセミコロンは任意
        self.match_token(&Token::Semicolon);
        Ok(Some(PackageDecl {
            name,
            span: self.span_from(start),
        }))
    }

    // ==================== ユーティリティメソッド ====================

    /// 現在のトークンを取得
    pub(super) fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|t| &t.token)
    }

    /// 特定のオフセット先のトークンを取得
    pub(super) fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset).map(|t| &t.token)
    }

    /// 現在のスパンを取得（終端では最後のトークンの直後）
    pub(super) fn current_span(&self) -> logos::Span {
        match self.tokens.get(self.current) {
            Some(t) => t.span.clone(),
            None => {
                let end = self.tokens.last().map(|t| t.span.end).unwrap_or(0);
                end..end
            }
        }
    }

    /// 開始位置から現在位置までのスパンを作成
    pub(super) fn span_from(&self, start: usize) -> Span {
        let end = if self.current > 0 {
            // 前のトークンの終了位置を使用
            self.tokens
                .get(self.current - 1)
                .map(|t| t.span.end)
                .unwrap_or(start)
        } else {
            self.current_span().end
        };
        Span::new(start, end.max(start))
    }

    /// 次のトークンに進む
    pub(super) fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    /// 終端に到達したかチェック
    pub(super) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    /// 特定のトークンをチェック（進まない）
    pub(super) fn check(&self, token_type: &Token) -> bool {
        if let Some(token) = self.current_token() {
            std::mem::discriminant(token) == std::mem::discriminant(token_type)
        } else {
            false
        }
    }

    /// 特定のトークンにマッチしたら進む
    pub(super) fn match_token(&mut self, token_type: &Token) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// 特定のトークンを期待
    pub(super) fn expect(&mut self, token_type: Token) -> ParseResult<()> {
        if self.check(&token_type) {
            self.advance();
            return Ok(());
        }
        let span: Span = self.current_span().into();
        match self.current_token() {
            Some(found) => Err(ParserError::UnexpectedToken {
                expected: format!("{:?}", token_type),
                found: found.to_string(),
                span,
            }),
            None => Err(ParserError::UnexpectedEof {
                expected: format!("{:?}", token_type),
                span,
            }),
        }
    }

    /// 識別子を期待
    pub(super) fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.current_token() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            Some(found) => Err(ParserError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: found.to_string(),
                span: self.current_span().into(),
            }),
            None => Err(ParserError::UnexpectedEof {
                expected: "identifier".to_string(),
                span: self.current_span().into(),
            }),
        }
    }

    /// エラーを作成
    pub(super) fn error(&self, message: String) -> ParseError {
        ParserError::InvalidSyntax {
            message,
            span: self.current_span().into(),
        }
    }

    /// 関数IDを払い出す
    pub(super) fn fresh_function_id(&mut self) -> FunctionId {
        let id = FunctionId(self.next_function_id);
        self.next_function_id += 1;
        id
    }
}
