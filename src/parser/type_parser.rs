//! 型のパース処理

use crate::ast::Type;
use crate::lexer::Token;

use super::parser_impl::Parser;
use super::ParseResult;

impl Parser {
    /// 型を解析
    pub(super) fn parse_type(&mut self) -> ParseResult<Type> {
        let ty = match self.current_token() {
            Some(Token::Int) => Type::Int,
            Some(Token::Bool) => Type::Bool,
            Some(Token::StringType) => Type::Str,
            Some(Token::Unit) => Type::Unit,
            Some(Token::Identifier(name)) => Type::Named(name.clone()),
            Some(Token::LeftBracket) => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(Token::RightBracket)?;
                return Ok(Type::Array(Box::new(inner)));
            }
            _ => return Err(self.error("Expected type".to_string())),
        };
        self.advance();
        Ok(ty)
    }
}
