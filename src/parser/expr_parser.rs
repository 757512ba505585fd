//! 式のパース処理
//!
//! 優先順位の低い順に `||`, `&&`, 等価, 比較, 加減, 乗除, 単項, 後置。

use crate::ast::*;
use crate::lexer::Token;

use super::parser_impl::Parser;
use super::ParseResult;

const BINARY_LEVELS: usize = 6;

/// レベル `level` で有効な二項演算子
fn binary_op(level: usize, token: &Token) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::Or) => BinaryOp::Or,
        (1, Token::And) => BinaryOp::And,
        (2, Token::Equal) => BinaryOp::Equal,
        (2, Token::NotEqual) => BinaryOp::NotEqual,
        (3, Token::Less) => BinaryOp::Less,
        (3, Token::LessEqual) => BinaryOp::LessEqual,
        (3, Token::Greater) => BinaryOp::Greater,
        (3, Token::GreaterEqual) => BinaryOp::GreaterEqual,
        (4, Token::Plus) => BinaryOp::Add,
        (4, Token::Minus) => BinaryOp::Subtract,
        (5, Token::Star) => BinaryOp::Multiply,
        (5, Token::Slash) => BinaryOp::Divide,
        (5, Token::Percent) => BinaryOp::Modulo,
        _ => return None,
    };
    Some(op)
}

impl Parser {
    /// 式を解析（内部実装）
    pub(super) fn parse_expression_internal(&mut self) -> ParseResult<Expression> {
        self.parse_binary_level(0)
    }

    /// 優先順位レベルごとの左結合二項演算
    fn parse_binary_level(&mut self, level: usize) -> ParseResult<Expression> {
        if level >= BINARY_LEVELS {
            return self.parse_unary();
        }

        let start = self.current_span().start;
        let mut left = self.parse_binary_level(level + 1)?;

        while let Some(op) = self.current_token().and_then(|t| binary_op(level, t)) {
            self.advance();
            let right = self.parse_binary_level(level + 1)?;
            left = Expression::Binary(BinaryExpr {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span: self.span_from(start),
            });
        }

        Ok(left)
    }

    /// 単項演算子を解析
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let start = self.current_span().start;
        let op = if self.match_token(&Token::Not) {
            UnaryOp::Not
        } else if self.match_token(&Token::Minus) {
            UnaryOp::Negate
        } else {
            return self.parse_postfix();
        };

        let operand = self.parse_unary()?;
        Ok(Expression::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
            span: self.span_from(start),
        }))
    }

    /// 後置演算子（インデックス）を解析
    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let start = self.current_span().start;
        let mut expr = self.parse_primary()?;

        while self.match_token(&Token::LeftBracket) {
            let index = self.parse_expression_internal()?;
            self.expect(Token::RightBracket)?;
            expr = Expression::Index(IndexExpr {
                object: Box::new(expr),
                index: Box::new(index),
                span: self.span_from(start),
            });
        }

        Ok(expr)
    }

    /// 一次式を解析
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let start = self.current_span().start;
        let span: Span = self.current_span().into();

        match self.current_token().cloned() {
            Some(Token::Integer(value)) => {
                self.advance();
                Ok(Expression::Integer(IntegerLit { value, span }))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expression::Boolean(BooleanLit { value: true, span }))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expression::Boolean(BooleanLit { value: false, span }))
            }
            Some(Token::String(value)) => {
                self.advance();
                Ok(Expression::String(StringLit { value, span }))
            }
            Some(Token::Identifier(name)) => {
                if matches!(self.peek(1), Some(Token::LeftParen)) {
                    return self.parse_call(name, start);
                }
                self.advance();
                Ok(Expression::Identifier(Identifier { name, span }))
            }
            Some(Token::LeftParen) => {
                self.advance();
                let expr = self.parse_expression_internal()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::LeftBracket) => {
                self.advance();
                let elements = self.parse_comma_separated(&Token::RightBracket)?;
                self.expect(Token::RightBracket)?;
                Ok(Expression::Array(ArrayExpr {
                    elements,
                    span: self.span_from(start),
                }))
            }
            Some(token) => Err(self.error(format!("Unexpected token in expression: {}", token))),
            None => Err(self.error("Unexpected end of input in expression".to_string())),
        }
    }

    /// `name(args...)` を解析（呼び出し先は名前解決で確定する）
    fn parse_call(&mut self, callee: String, start: usize) -> ParseResult<Expression> {
        self.advance();
        self.expect(Token::LeftParen)?;
        let args = self.parse_comma_separated(&Token::RightParen)?;
        self.expect(Token::RightParen)?;
        Ok(Expression::Call(CallExpr {
            callee,
            args,
            target: CallTarget::Unresolved,
            span: self.span_from(start),
        }))
    }

    fn parse_comma_separated(&mut self, terminator: &Token) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        while !self.check(terminator) {
            items.push(self.parse_expression_internal()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }
}
