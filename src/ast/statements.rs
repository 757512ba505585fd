//! 文の定義

use serde::{Deserialize, Serialize};

use super::{Expression, FunctionId, Span, Type};

/// 文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Let(LetStatement),
    Assignment(AssignStatement),
    Return(ReturnStatement),
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
    Expression(Expression),
    Block(Block),
    Throw(ThrowStatement),
    Try(TryStatement),
    Yield(YieldStatement),

    // 以下は書き換えパスだけが生成する中断構文
    /// 呼び出しフレームを駆動ループへ渡して中断する
    Suspend(SuspendStatement),
    /// 呼び出し元の結果スロットへ値を書き込む
    StoreResult(StoreResultStatement),
    /// 現在のステップ手続きを完了させる
    SuspendReturn(Span),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Let(s) => s.span,
            Statement::Assignment(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::If(s) => s.span,
            Statement::While(s) => s.span,
            Statement::For(s) => s.span,
            Statement::Expression(e) => e.span(),
            Statement::Block(b) => b.span,
            Statement::Throw(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Yield(s) => s.span,
            Statement::Suspend(s) => s.span,
            Statement::StoreResult(s) => s.span,
            Statement::SuspendReturn(span) => *span,
        }
    }

    /// 書き換えパスが生成した構文かどうか
    pub fn is_synthesized(&self) -> bool {
        matches!(
            self,
            Statement::Suspend(_) | Statement::StoreResult(_) | Statement::SuspendReturn(_)
        )
    }
}

/// let文（複数の宣言子を持てる）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetStatement {
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

/// 宣言子 `name: T = init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declarator {
    pub name: String,
    pub ty: Option<Type>,
    pub init: Option<Expression>,
    pub span: Span,
}

/// 代入演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
}

/// 代入文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStatement {
    pub target: Expression,
    pub op: AssignOp,
    pub value: Expression,
    pub span: Span,
}

/// return文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub value: Option<Expression>,
    pub span: Span,
}

/// if文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

/// elseブランチ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElseBranch {
    Block(Block),
    If(Box<IfStatement>),
}

/// while文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Block,
    pub span: Span,
}

/// for文 `for init; cond; update { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub init: Option<Box<Statement>>,
    pub condition: Option<Expression>,
    pub update: Option<Box<Statement>>,
    pub body: Block,
    pub span: Span,
}

/// ブロック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Statement>, span: Span) -> Self {
        Self { statements, span }
    }
}

/// throw文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub value: Expression,
    pub span: Span,
}

/// try文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    pub body: Block,
    pub catch: Option<CatchClause>,
    pub finally: Option<Block>,
    pub span: Span,
}

/// catch節 `catch e { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub binding: String,
    pub body: Block,
    pub span: Span,
}

/// yield文（ソース側の中断構文。変換対象の関数では使えない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldStatement {
    pub value: Option<Expression>,
    pub span: Span,
}

/// `suspend callee_frame(args);`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendStatement {
    pub target: FunctionId,
    pub callee: String,
    pub args: Vec<Expression>,
    /// レイアウトが決まるまでは None
    pub packing: Option<SuspendPacking>,
    pub span: Span,
}

/// 中断時に引数を詰めるフレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendPacking {
    /// 呼び出しフレーム名
    pub frame: String,
    /// 相互再帰グループではディスパッチフレーム名とバリアント名
    pub dispatch: Option<(String, String)>,
}

/// `result(function) = value;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreResultStatement {
    pub function: FunctionId,
    pub name: String,
    pub value: Expression,
    pub span: Span,
}
