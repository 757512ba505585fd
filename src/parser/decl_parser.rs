//! 宣言のパース処理

use crate::ast::*;
use crate::lexer::Token;

use super::parser_impl::Parser;
use super::ParseResult;

impl Parser {
    /// トップレベル（またはモジュール内）のアイテムを解析
    pub(super) fn parse_item(&mut self) -> ParseResult<Item> {
        let start = self.current_span().start;
        let attributes = self.parse_attributes()?;
        let visibility = self.parse_visibility();

        match self.current_token() {
            Some(Token::Fn) => Ok(Item::Function(self.parse_function(attributes, visibility, start)?)),
            Some(Token::Partial) | Some(Token::Module) => {
                if !attributes.is_empty() {
                    return Err(self.error("Attributes are only allowed on functions".to_string()));
                }
                Ok(Item::Module(self.parse_module(start)?))
            }
            _ => Err(self.error("Expected function or module declaration".to_string())),
        }
    }

    /// `#[name(key = value, ...)]` の並びを解析
    fn parse_attributes(&mut self) -> ParseResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        while self.check(&Token::Hash) {
            let start = self.current_span().start;
            self.advance();
            self.expect(Token::LeftBracket)?;
            let name = self.expect_identifier()?;

            let mut args = Vec::new();
            if self.match_token(&Token::LeftParen) {
                while !self.check(&Token::RightParen) {
                    args.push(self.parse_attribute_arg()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RightParen)?;
            }
            self.expect(Token::RightBracket)?;

            attributes.push(Attribute {
                name,
                args,
                span: self.span_from(start),
            });
        }
        Ok(attributes)
    }

    fn parse_attribute_arg(&mut self) -> ParseResult<AttributeArg> {
        let start = self.current_span().start;
        let key = self.expect_identifier()?;
        self.expect(Token::Assign)?;

        let value = match self.current_token() {
            Some(Token::String(s)) => AttributeValue::Str(s.clone()),
            Some(Token::Identifier(s)) => AttributeValue::Ident(s.clone()),
            Some(Token::Integer(n)) => AttributeValue::Int(*n),
            Some(Token::True) => AttributeValue::Bool(true),
            Some(Token::False) => AttributeValue::Bool(false),
            // 可視性のキーワードは識別子として受け付ける
            Some(Token::Pub) => AttributeValue::Ident("pub".to_string()),
            Some(Token::Protected) => AttributeValue::Ident("protected".to_string()),
            Some(Token::Internal) => AttributeValue::Ident("internal".to_string()),
            Some(Token::Private) => AttributeValue::Ident("private".to_string()),
            _ => return Err(self.error(format!("Expected attribute value for '{}'", key))),
        };
        self.advance();

        Ok(AttributeArg {
            key,
            value,
            span: self.span_from(start),
        })
    }

    /// 可視性修飾子（省略時は private）
    fn parse_visibility(&mut self) -> Visibility {
        if self.match_token(&Token::Pub) {
            Visibility::Public
        } else if self.match_token(&Token::Protected) {
            if self.match_token(&Token::Internal) {
                Visibility::ProtectedInternal
            } else {
                Visibility::Protected
            }
        } else if self.match_token(&Token::Internal) {
            Visibility::Internal
        } else {
            self.match_token(&Token::Private);
            Visibility::Private
        }
    }

    /// 関数宣言を解析
    fn parse_function(
        &mut self,
        attributes: Vec<Attribute>,
        visibility: Visibility,
        start: usize,
    ) -> ParseResult<FunctionDecl> {
        self.expect(Token::Fn)?;
        let id = self.fresh_function_id();
        let name = self.expect_identifier()?;

        let type_params = if self.check(&Token::Less) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        self.expect(Token::LeftParen)?;
        let mut params = Vec::new();
        while !self.check(&Token::RightParen) {
            let param_start = self.current_span().start;
            let is_receiver = self.match_token(&Token::This);
            if is_receiver && !params.is_empty() {
                return Err(self.error("`this` is only allowed on the first parameter".to_string()));
            }
            let param_name = self.expect_identifier()?;
            self.expect(Token::Colon)?;
            let ty = self.parse_type()?;
            params.push(Param {
                name: param_name,
                ty,
                is_receiver,
                span: self.span_from(param_start),
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RightParen)?;

        let return_type = if self.match_token(&Token::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(FunctionDecl {
            id,
            attributes,
            visibility,
            name,
            type_params,
            params,
            return_type,
            body,
            span: self.span_from(start),
        })
    }

    /// `<T: Ord + Copy, U>` を解析
    fn parse_type_params(&mut self) -> ParseResult<Vec<TypeParam>> {
        self.expect(Token::Less)?;
        let mut params = Vec::new();
        while !self.check(&Token::Greater) {
            let start = self.current_span().start;
            let name = self.expect_identifier()?;
            let mut bounds = Vec::new();
            if self.match_token(&Token::Colon) {
                bounds.push(self.expect_identifier()?);
                while self.match_token(&Token::Plus) {
                    bounds.push(self.expect_identifier()?);
                }
            }
            params.push(TypeParam {
                name,
                bounds,
                span: self.span_from(start),
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Greater)?;
        Ok(params)
    }

    /// `[partial] module Name { ... }` を解析
    fn parse_module(&mut self, start: usize) -> ParseResult<ModuleDecl> {
        let is_partial = self.match_token(&Token::Partial);
        self.expect(Token::Module)?;
        let name = self.expect_identifier()?;
        self.expect(Token::LeftBrace)?;

        let mut items = Vec::new();
        while !self.check(&Token::RightBrace) && !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        self.expect(Token::RightBrace)?;

        Ok(ModuleDecl {
            name,
            is_partial,
            items,
            span: self.span_from(start),
        })
    }
}
