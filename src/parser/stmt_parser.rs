//! 文の解析

use crate::ast::*;
use crate::lexer::Token;

use super::parser_impl::Parser;
use super::ParseResult;

impl Parser {
    /// 文を解析（内部実装）
    pub(super) fn parse_statement_internal(&mut self) -> ParseResult<Statement> {
        match self.current_token() {
            Some(Token::Let) => {
                let stmt = self.parse_let_declarators()?;
                self.expect(Token::Semicolon)?;
                Ok(Statement::Let(stmt))
            }
            Some(Token::Return) => Ok(Statement::Return(self.parse_return_statement()?)),
            Some(Token::If) => Ok(Statement::If(self.parse_if_statement()?)),
            Some(Token::While) => Ok(Statement::While(self.parse_while_statement()?)),
            Some(Token::For) => Ok(Statement::For(self.parse_for_statement()?)),
            Some(Token::LeftBrace) => Ok(Statement::Block(self.parse_block()?)),
            Some(Token::Throw) => Ok(Statement::Throw(self.parse_throw_statement()?)),
            Some(Token::Try) => Ok(Statement::Try(self.parse_try_statement()?)),
            Some(Token::Yield) => Ok(Statement::Yield(self.parse_yield_statement()?)),
            _ => {
                // 式文または代入文として解析を試みる
                let stmt = self.parse_simple_statement()?;
                self.expect(Token::Semicolon)?;
                Ok(stmt)
            }
        }
    }

    /// `let a: T = e, b = f(x), c` を解析（セミコロンは呼び出し側）
    pub(super) fn parse_let_declarators(&mut self) -> ParseResult<LetStatement> {
        let start = self.current_span().start;
        self.expect(Token::Let)?;

        let mut declarators = Vec::new();
        loop {
            let decl_start = self.current_span().start;
            let name = self.expect_identifier()?;
            let ty = if self.match_token(&Token::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let init = if self.match_token(&Token::Assign) {
                Some(self.parse_expression_internal()?)
            } else {
                None
            };
            declarators.push(Declarator {
                name,
                ty,
                init,
                span: self.span_from(decl_start),
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(LetStatement {
            declarators,
            span: self.span_from(start),
        })
    }

    /// 式文または代入文（セミコロンなし）
    fn parse_simple_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current_span().start;
        let expr = self.parse_expression_internal()?;

        let op = match self.current_token() {
            Some(Token::Assign) => AssignOp::Assign,
            Some(Token::PlusAssign) => AssignOp::AddAssign,
            Some(Token::MinusAssign) => AssignOp::SubAssign,
            Some(Token::StarAssign) => AssignOp::MulAssign,
            _ => return Ok(Statement::Expression(expr)),
        };
        self.advance();

        if !matches!(expr, Expression::Identifier(_) | Expression::Index(_)) {
            return Err(self.error(format!("Invalid assignment target: {}", expr)));
        }

        let value = self.parse_expression_internal()?;
        Ok(Statement::Assignment(AssignStatement {
            target: expr,
            op,
            value,
            span: self.span_from(start),
        }))
    }

    /// return文を解析
    fn parse_return_statement(&mut self) -> ParseResult<ReturnStatement> {
        let start = self.current_span().start;
        self.expect(Token::Return)?;

        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression_internal()?)
        };

        self.expect(Token::Semicolon)?;
        Ok(ReturnStatement {
            value,
            span: self.span_from(start),
        })
    }

    /// if文を解析
    fn parse_if_statement(&mut self) -> ParseResult<IfStatement> {
        let start = self.current_span().start;
        self.expect(Token::If)?;

        let condition = self.parse_expression_internal()?;
        // if文の条件式の後は必ずブロックが来るため、{を明示的にチェック
        if !self.check(&Token::LeftBrace) {
            return Err(self.error("Expected '{' after if condition".to_string()));
        }
        let then_branch = self.parse_block()?;

        let else_branch = if self.match_token(&Token::Else) {
            if self.check(&Token::If) {
                Some(ElseBranch::If(Box::new(self.parse_if_statement()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(IfStatement {
            condition,
            then_branch,
            else_branch,
            span: self.span_from(start),
        })
    }

    /// while文を解析
    fn parse_while_statement(&mut self) -> ParseResult<WhileStatement> {
        let start = self.current_span().start;
        self.expect(Token::While)?;

        let condition = self.parse_expression_internal()?;
        let body = self.parse_block()?;

        Ok(WhileStatement {
            condition,
            body,
            span: self.span_from(start),
        })
    }

    /// for文を解析
    fn parse_for_statement(&mut self) -> ParseResult<ForStatement> {
        let start = self.current_span().start;
        self.expect(Token::For)?;

        // 初期化部
        let init = if self.check(&Token::Semicolon) {
            None
        } else if self.check(&Token::Let) {
            Some(Statement::Let(self.parse_let_declarators()?))
        } else {
            Some(self.parse_simple_statement()?)
        };
        self.expect(Token::Semicolon)?;

        // 条件部
        let condition = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression_internal()?)
        };
        self.expect(Token::Semicolon)?;

        // 更新部
        let update = if self.check(&Token::LeftBrace) {
            None
        } else {
            Some(self.parse_simple_statement()?)
        };

        let body = self.parse_block()?;

        Ok(ForStatement {
            init: init.map(Box::new),
            condition,
            update: update.map(Box::new),
            body,
            span: self.span_from(start),
        })
    }

    /// throw文を解析
    fn parse_throw_statement(&mut self) -> ParseResult<ThrowStatement> {
        let start = self.current_span().start;
        self.expect(Token::Throw)?;
        let value = self.parse_expression_internal()?;
        self.expect(Token::Semicolon)?;
        Ok(ThrowStatement {
            value,
            span: self.span_from(start),
        })
    }

    /// try文を解析（catch と finally の少なくとも一方が必要）
    fn parse_try_statement(&mut self) -> ParseResult<TryStatement> {
        let start = self.current_span().start;
        self.expect(Token::Try)?;
        let body = self.parse_block()?;

        let catch = if self.check(&Token::Catch) {
            let catch_start = self.current_span().start;
            self.advance();
            let binding = self.expect_identifier()?;
            let catch_body = self.parse_block()?;
            Some(CatchClause {
                binding,
                body: catch_body,
                span: self.span_from(catch_start),
            })
        } else {
            None
        };

        let finally = if self.match_token(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            return Err(self.error("Expected 'catch' or 'finally' after try block".to_string()));
        }

        Ok(TryStatement {
            body,
            catch,
            finally,
            span: self.span_from(start),
        })
    }

    /// yield文を解析
    fn parse_yield_statement(&mut self) -> ParseResult<YieldStatement> {
        let start = self.current_span().start;
        self.expect(Token::Yield)?;
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression_internal()?)
        };
        self.expect(Token::Semicolon)?;
        Ok(YieldStatement {
            value,
            span: self.span_from(start),
        })
    }

    /// ブロックを解析
    pub(super) fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.current_span().start;
        self.expect(Token::LeftBrace)?;

        let mut statements = Vec::new();
        while !self.check(&Token::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement_internal()?);
        }

        self.expect(Token::RightBrace)?;
        Ok(Block {
            statements,
            span: self.span_from(start),
        })
    }
}
