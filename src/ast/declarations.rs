//! 宣言の定義

use serde::{Deserialize, Serialize};

use super::{Block, FunctionId, Span, Type};

/// 関数宣言
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub id: FunctionId,
    pub attributes: Vec<Attribute>,
    pub visibility: Visibility,
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub body: Block,
    pub span: Span,
}

impl FunctionDecl {
    /// 戻り値を持つ関数かどうか（`unit` は戻り値なしとして扱う）
    pub fn returns_value(&self) -> bool {
        !matches!(self.return_type, None | Some(Type::Unit))
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// 可視性修飾子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Private,
    Public,
    Protected,
    Internal,
    ProtectedInternal,
}

/// 属性 `#[name(key = value, ...)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<AttributeArg>,
    pub span: Span,
}

/// 属性の引数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeArg {
    pub key: String,
    pub value: AttributeValue,
    pub span: Span,
}

/// 属性引数の値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Str(String),
    Ident(String),
    Int(i64),
    Bool(bool),
}

/// 型パラメータ `T: Bound + Other`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<String>,
    pub span: Span,
}

/// 関数パラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    /// `this` 付きのレシーバ引数（先頭パラメータのみ）
    pub is_receiver: bool,
    pub span: Span,
}
