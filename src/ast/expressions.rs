//! 式の定義

use serde::{Deserialize, Serialize};

use super::{FunctionId, Span};

/// 式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Integer(IntegerLit),
    Boolean(BooleanLit),
    String(StringLit),
    Identifier(Identifier),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    Index(IndexExpr),
    Array(ArrayExpr),
    /// 書き換えパスが生成する結果スロットの読み出し
    ResultSlot(ResultSlotExpr),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Integer(e) => e.span,
            Expression::Boolean(e) => e.span,
            Expression::String(e) => e.span,
            Expression::Identifier(e) => e.span,
            Expression::Binary(e) => e.span,
            Expression::Unary(e) => e.span,
            Expression::Call(e) => e.span,
            Expression::Index(e) => e.span,
            Expression::Array(e) => e.span,
            Expression::ResultSlot(e) => e.span,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            Expression::Call(call) => Some(call),
            _ => None,
        }
    }
}

/// 整数リテラル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerLit {
    pub value: i64,
    pub span: Span,
}

/// 真偽値リテラル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanLit {
    pub value: bool,
    pub span: Span,
}

/// 文字列リテラル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLit {
    pub value: String,
    pub span: Span,
}

/// 識別子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

/// 二項演算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub left: Box<Expression>,
    pub op: BinaryOp,
    pub right: Box<Expression>,
    pub span: Span,
}

/// 単項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// 単項演算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expression>,
    pub span: Span,
}

/// 組み込み関数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Len,
    Push,
    Trace,
    Print,
    Abs,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "len" => Some(Builtin::Len),
            "push" => Some(Builtin::Push),
            "trace" => Some(Builtin::Trace),
            "print" => Some(Builtin::Print),
            "abs" => Some(Builtin::Abs),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Push => 2,
            _ => 1,
        }
    }
}

/// 呼び出し先（名前解決で確定する）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CallTarget {
    #[default]
    Unresolved,
    Function(FunctionId),
    Builtin(Builtin),
}

/// 関数呼び出し
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: String,
    pub args: Vec<Expression>,
    pub target: CallTarget,
    pub span: Span,
}

impl CallExpr {
    pub fn target_function(&self) -> Option<FunctionId> {
        match self.target {
            CallTarget::Function(id) => Some(id),
            _ => None,
        }
    }
}

/// インデックスアクセス `a[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExpr {
    pub object: Box<Expression>,
    pub index: Box<Expression>,
    pub span: Span,
}

/// 配列リテラル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpr {
    pub elements: Vec<Expression>,
    pub span: Span,
}

/// `result(function)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSlotExpr {
    pub function: FunctionId,
    pub name: String,
    pub span: Span,
}
