//! 再帰呼び出し箇所の分類
//!
//! 関数本体を走査して、グループのメンバーを呼び出している箇所をすべて見つけ、
//! それぞれが置かれている構文上の位置で分類する。書き換えできない位置にある
//! 呼び出しが一つでもあれば、その関数全体を変換不能として記録する。
//!
//! 文は前順（pre-order）の通し番号で識別する。番号の振り方は
//! `rewriter` と一致していなければならない:
//!
//! - ブロック内の文は出現順に番号を持つ
//! - `for` は自身の後に init, update, 本体の順
//! - `else if` の入れ子の if は番号を持たない（外側の if に属する）
//! - `try` は本体, catch, finally の順

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ast::*;
use crate::error::DiagnosticSink;

use super::groups::GroupMembers;

/// 呼び出し箇所の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallSiteKind {
    /// `f(args);`
    VoidCall,
    /// `x = f(args);`
    Assignment,
    /// `let a = v, b = f(args);` の `declarator` 番目
    Declaration { declarator: usize },
    /// `return f(args);`
    ReturnCall,
}

/// 分類済みの呼び出し箇所
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// 呼び出しを含む文の通し番号
    pub statement: usize,
    pub kind: CallSiteKind,
    pub target: FunctionId,
    pub callee: String,
    pub span: Span,
}

/// 呼び出しを含まない return 文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSite {
    pub statement: usize,
    pub has_value: bool,
    pub span: Span,
}

/// 分類結果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodesToReplace {
    pub call_sites: Vec<CallSite>,
    pub returns: Vec<ReturnSite>,
    pub contains_critical_failure: bool,
}

impl NodesToReplace {
    pub fn count(&self, kind: CallSiteKind) -> usize {
        self.call_sites.iter().filter(|site| site.kind == kind).count()
    }

    /// 通し番号 `statement` の文に属する呼び出し箇所
    pub fn sites_at(&self, statement: usize) -> impl Iterator<Item = &CallSite> {
        self.call_sites
            .iter()
            .filter(move |site| site.statement == statement)
    }

    pub fn return_at(&self, statement: usize) -> Option<&ReturnSite> {
        self.returns.iter().find(|ret| ret.statement == statement)
    }
}

/// 文がどこに置かれているか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementPosition {
    Block,
    ForHeader,
}

/// 式がどこに置かれているか
#[derive(Debug, Clone, Copy)]
enum ExprContext {
    StatementRoot { ordinal: usize, in_block: bool },
    AssignValue { ordinal: usize, in_block: bool, compound: bool },
    DeclInit { ordinal: usize, declarator: usize, in_block: bool },
    ReturnValue { ordinal: usize },
    Nested(&'static str),
}

/// 呼び出し箇所の分類器
pub struct CallSiteClassifier<'a, S: DiagnosticSink> {
    function: &'a FunctionDecl,
    group: &'a GroupMembers,
    sink: &'a mut S,
    next_ordinal: usize,
    nodes: NodesToReplace,
}

/// 関数本体を分類する。入力は変更しない
pub fn classify<S: DiagnosticSink>(
    function: &FunctionDecl,
    group: &GroupMembers,
    sink: &mut S,
) -> NodesToReplace {
    CallSiteClassifier::new(function, group, sink).run()
}

impl<'a, S: DiagnosticSink> CallSiteClassifier<'a, S> {
    pub fn new(function: &'a FunctionDecl, group: &'a GroupMembers, sink: &'a mut S) -> Self {
        Self {
            function,
            group,
            sink,
            next_ordinal: 0,
            nodes: NodesToReplace::default(),
        }
    }

    pub fn run(mut self) -> NodesToReplace {
        let function = self.function;
        self.visit_block(&function.body);
        debug!(
            "{}: 再帰呼び出し {} 箇所, return {} 箇所, 失敗 {}",
            self.function.name,
            self.nodes.call_sites.len(),
            self.nodes.returns.len(),
            self.nodes.contains_critical_failure
        );
        self.nodes
    }

    fn fail(&mut self, span: Span, message: String) {
        self.nodes.contains_critical_failure = true;
        self.sink.unsupported_syntax(span, message);
    }

    fn visit_block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.visit_statement(stmt, StatementPosition::Block);
        }
    }

    fn visit_statement(&mut self, stmt: &Statement, position: StatementPosition) {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        let in_block = position == StatementPosition::Block;

        match stmt {
            Statement::Let(let_stmt) => {
                for (index, decl) in let_stmt.declarators.iter().enumerate() {
                    if let Some(init) = &decl.init {
                        self.visit_expression(
                            init,
                            ExprContext::DeclInit {
                                ordinal,
                                declarator: index,
                                in_block,
                            },
                        );
                    }
                }
            }
            Statement::Assignment(assign) => {
                self.visit_expression(&assign.target, ExprContext::Nested("assignment target"));
                self.visit_expression(
                    &assign.value,
                    ExprContext::AssignValue {
                        ordinal,
                        in_block,
                        compound: assign.op != AssignOp::Assign,
                    },
                );
            }
            Statement::Return(ret) => self.visit_return(ret, ordinal),
            Statement::If(if_stmt) => self.visit_if(if_stmt),
            Statement::While(while_stmt) => {
                self.visit_expression(&while_stmt.condition, ExprContext::Nested("while condition"));
                self.visit_block(&while_stmt.body);
            }
            Statement::For(for_stmt) => {
                if let Some(init) = &for_stmt.init {
                    self.visit_statement(init, StatementPosition::ForHeader);
                }
                if let Some(cond) = &for_stmt.condition {
                    self.visit_expression(cond, ExprContext::Nested("for condition"));
                }
                if let Some(update) = &for_stmt.update {
                    self.visit_statement(update, StatementPosition::ForHeader);
                }
                self.visit_block(&for_stmt.body);
            }
            Statement::Expression(expr) => {
                self.visit_expression(expr, ExprContext::StatementRoot { ordinal, in_block });
            }
            Statement::Block(block) => self.visit_block(block),
            Statement::Throw(throw) => {
                self.visit_expression(&throw.value, ExprContext::Nested("throw operand"));
                self.sink.syntax_warning(
                    throw.span,
                    format!(
                        "Throwing and catching exceptions is not fully supported yet. The code might produce unexpected results: `{}`",
                        stmt
                    ),
                );
            }
            Statement::Try(try_stmt) => {
                self.visit_block(&try_stmt.body);
                if let Some(catch) = &try_stmt.catch {
                    self.visit_block(&catch.body);
                    self.sink.syntax_warning(
                        catch.span,
                        format!(
                            "Throwing and catching exceptions is not fully supported yet. The code might produce unexpected results: `catch {}`",
                            catch.binding
                        ),
                    );
                }
                if let Some(finally) = &try_stmt.finally {
                    self.visit_block(finally);
                    self.sink.syntax_warning(
                        finally.span,
                        "Throwing and catching exceptions is not fully supported yet. The code might produce unexpected results: `finally`",
                    );
                }
            }
            Statement::Yield(y) => {
                if let Some(value) = &y.value {
                    self.visit_expression(value, ExprContext::Nested("yield operand"));
                }
                self.fail(
                    y.span,
                    format!("yield inside recursive functions is not supported: `{}`", stmt),
                );
            }
            Statement::Suspend(_) | Statement::StoreResult(_) | Statement::SuspendReturn(_) => {
                self.fail(
                    stmt.span(),
                    format!("Function already contains a suspension point: `{}`", stmt),
                );
            }
        }
    }

    fn visit_if(&mut self, if_stmt: &IfStatement) {
        self.visit_expression(&if_stmt.condition, ExprContext::Nested("if condition"));
        self.visit_block(&if_stmt.then_branch);
        match &if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.visit_block(block),
            Some(ElseBranch::If(nested)) => self.visit_if(nested),
            None => {}
        }
    }

    fn visit_return(&mut self, ret: &ReturnStatement, ordinal: usize) {
        let returns_value = self.function.returns_value();
        match &ret.value {
            Some(value) => {
                if !returns_value {
                    self.fail(
                        ret.span,
                        format!(
                            "Returning a value from `{}` which has no return type: `return {};`",
                            self.function.name, value
                        ),
                    );
                }
                let is_group_call = value
                    .as_call()
                    .and_then(|call| call.target_function())
                    .is_some_and(|id| self.group.contains(id));
                self.visit_expression(value, ExprContext::ReturnValue { ordinal });
                if !is_group_call {
                    self.nodes.returns.push(ReturnSite {
                        statement: ordinal,
                        has_value: true,
                        span: ret.span,
                    });
                }
            }
            None => {
                if returns_value {
                    self.fail(
                        ret.span,
                        format!("Missing return value in `{}`", self.function.name),
                    );
                }
                self.nodes.returns.push(ReturnSite {
                    statement: ordinal,
                    has_value: false,
                    span: ret.span,
                });
            }
        }
    }

    fn visit_expression(&mut self, expr: &Expression, context: ExprContext) {
        match expr {
            Expression::Call(call) => {
                for arg in &call.args {
                    self.visit_expression(arg, ExprContext::Nested("argument of a call"));
                }
                if let Some(target) = call.target_function().filter(|id| self.group.contains(*id)) {
                    self.add_invocation(call, target, context);
                }
            }
            Expression::Binary(bin) => {
                self.visit_expression(&bin.left, ExprContext::Nested("operand of a binary expression"));
                self.visit_expression(&bin.right, ExprContext::Nested("operand of a binary expression"));
            }
            Expression::Unary(un) => {
                self.visit_expression(&un.operand, ExprContext::Nested("operand of a unary expression"));
            }
            Expression::Index(index) => {
                self.visit_expression(&index.object, ExprContext::Nested("indexed expression"));
                self.visit_expression(&index.index, ExprContext::Nested("index"));
            }
            Expression::Array(array) => {
                for element in &array.elements {
                    self.visit_expression(element, ExprContext::Nested("array element"));
                }
            }
            Expression::ResultSlot(slot) => {
                self.fail(
                    slot.span,
                    format!("Function already reads a result slot: `{}`", expr),
                );
            }
            Expression::Integer(_)
            | Expression::Boolean(_)
            | Expression::String(_)
            | Expression::Identifier(_) => {}
        }
    }

    fn add_invocation(&mut self, call: &CallExpr, target: FunctionId, context: ExprContext) {
        let callee_returns_value = self
            .group
            .get(target)
            .map(|member| member.returns_value)
            .unwrap_or(false);

        let (statement, kind) = match context {
            ExprContext::StatementRoot { in_block: true, ordinal } => (ordinal, CallSiteKind::VoidCall),
            ExprContext::AssignValue {
                in_block: true,
                compound: false,
                ordinal,
            } => (ordinal, CallSiteKind::Assignment),
            ExprContext::AssignValue { compound: true, .. } => {
                return self.fail(
                    call.span,
                    format!("Recursive invocation in a compound assignment is not supported: `{}`", call_text(call)),
                );
            }
            ExprContext::DeclInit {
                in_block: true,
                declarator,
                ordinal,
            } => (ordinal, CallSiteKind::Declaration { declarator }),
            ExprContext::ReturnValue { ordinal } => (ordinal, CallSiteKind::ReturnCall),
            ExprContext::StatementRoot { in_block: false, .. }
            | ExprContext::AssignValue { in_block: false, .. }
            | ExprContext::DeclInit { in_block: false, .. } => {
                return self.fail(
                    call.span,
                    format!("Recursive invocation should be in a block, not in a `for` header: `{}`", call_text(call)),
                );
            }
            ExprContext::Nested(location) => {
                return self.fail(
                    call.span,
                    format!("Unsupported location for recursive invocation ({}): `{}`", location, call_text(call)),
                );
            }
        };

        if kind != CallSiteKind::VoidCall && !callee_returns_value {
            return self.fail(
                call.span,
                format!("Result of `{}` is used but it does not return a value", call.callee),
            );
        }

        self.nodes.call_sites.push(CallSite {
            statement,
            kind,
            target,
            callee: call.callee.clone(),
            span: call.span,
        });
    }
}

fn call_text(call: &CallExpr) -> String {
    Expression::Call(call.clone()).to_string()
}
