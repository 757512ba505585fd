//! 文の書き換え
//!
//! 分類済みの呼び出し箇所を中断点（`suspend`）と結果スロットの読み書きに
//! 置き換えた新しい関数本体を作る。文の通し番号は `classifier` と同じ順で
//! 振る。置き換えは包含ブロックへのスプライスで行うので、複数宣言を分割しても
//! 後の宣言子から前の変数が見えたままになる。

use log::trace;

use crate::analyzer::{CallSite, CallSiteKind, GroupMembers, NodesToReplace};
use crate::ast::*;
use crate::error::TransformError;

/// 1つの関数本体の書き換え器
pub struct StatementRewriter<'a> {
    function: &'a FunctionDecl,
    nodes: &'a NodesToReplace,
    group: &'a GroupMembers,
    next_ordinal: usize,
}

/// 本体を書き換える。分類で致命的な失敗があった関数には何も生成しない
pub fn rewrite_body(
    function: &FunctionDecl,
    nodes: &NodesToReplace,
    group: &GroupMembers,
) -> Result<Option<Block>, TransformError> {
    if nodes.contains_critical_failure {
        return Ok(None);
    }
    StatementRewriter::new(function, nodes, group).run().map(Some)
}

impl<'a> StatementRewriter<'a> {
    pub fn new(function: &'a FunctionDecl, nodes: &'a NodesToReplace, group: &'a GroupMembers) -> Self {
        Self {
            function,
            nodes,
            group,
            next_ordinal: 0,
        }
    }

    pub fn run(mut self) -> Result<Block, TransformError> {
        let function = self.function;
        self.rewrite_block(&function.body)
    }

    fn rewrite_block(&mut self, block: &Block) -> Result<Block, TransformError> {
        let mut statements = Vec::with_capacity(block.statements.len());
        for stmt in &block.statements {
            statements.extend(self.rewrite_statement(stmt)?);
        }
        Ok(Block::new(statements, block.span))
    }

    fn rewrite_statement(&mut self, stmt: &Statement) -> Result<Vec<Statement>, TransformError> {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        let sites: Vec<&'a CallSite> = self.nodes.sites_at(ordinal).collect();

        let rewritten = match stmt {
            Statement::Let(let_stmt) if !sites.is_empty() => self.split_declaration(let_stmt, &sites)?,
            Statement::Assignment(assign) if !sites.is_empty() => {
                let site = single_site(&sites, stmt)?;
                expect_kind(site, CallSiteKind::Assignment, stmt)?;
                let call = expect_call(&assign.value, stmt)?;
                vec![
                    suspend(site, call),
                    Statement::Assignment(AssignStatement {
                        target: assign.target.clone(),
                        op: assign.op,
                        value: self.slot_of(site),
                        span: assign.span,
                    }),
                ]
            }
            Statement::Expression(expr) if !sites.is_empty() => {
                let site = single_site(&sites, stmt)?;
                expect_kind(site, CallSiteKind::VoidCall, stmt)?;
                vec![suspend(site, expect_call(expr, stmt)?)]
            }
            Statement::Return(ret) => self.rewrite_return(ret, &sites, stmt, ordinal)?,
            _ if !sites.is_empty() => {
                return Err(TransformError::Internal {
                    message: format!("Unexpected statement with a recursive call: `{}`", stmt),
                    span: Some(stmt.span()),
                })
            }
            Statement::Let(_) | Statement::Assignment(_) | Statement::Expression(_) | Statement::Throw(_) => {
                vec![stmt.clone()]
            }
            Statement::If(if_stmt) => vec![Statement::If(self.rewrite_if(if_stmt)?)],
            Statement::While(while_stmt) => vec![Statement::While(WhileStatement {
                condition: while_stmt.condition.clone(),
                body: self.rewrite_block(&while_stmt.body)?,
                span: while_stmt.span,
            })],
            Statement::For(for_stmt) => {
                let init = match &for_stmt.init {
                    Some(init) => Some(Box::new(self.header_statement(init)?)),
                    None => None,
                };
                let update = match &for_stmt.update {
                    Some(update) => Some(Box::new(self.header_statement(update)?)),
                    None => None,
                };
                vec![Statement::For(ForStatement {
                    init,
                    condition: for_stmt.condition.clone(),
                    update,
                    body: self.rewrite_block(&for_stmt.body)?,
                    span: for_stmt.span,
                })]
            }
            Statement::Block(block) => vec![Statement::Block(self.rewrite_block(block)?)],
            Statement::Try(try_stmt) => {
                let body = self.rewrite_block(&try_stmt.body)?;
                let catch = match &try_stmt.catch {
                    Some(catch) => Some(CatchClause {
                        binding: catch.binding.clone(),
                        body: self.rewrite_block(&catch.body)?,
                        span: catch.span,
                    }),
                    None => None,
                };
                let finally = match &try_stmt.finally {
                    Some(finally) => Some(self.rewrite_block(finally)?),
                    None => None,
                };
                vec![Statement::Try(TryStatement {
                    body,
                    catch,
                    finally,
                    span: try_stmt.span,
                })]
            }
            Statement::Yield(_)
            | Statement::Suspend(_)
            | Statement::StoreResult(_)
            | Statement::SuspendReturn(_) => {
                return Err(TransformError::Internal {
                    message: format!("Unexpected statement reached the rewriter: `{}`", stmt),
                    span: Some(stmt.span()),
                })
            }
        };

        if rewritten.len() > 1 {
            trace!("#{}: `{}` -> {} 文", ordinal, stmt, rewritten.len());
        }
        Ok(rewritten)
    }

    /// for ヘッダの文。番号だけ進めて、そのまま残す
    fn header_statement(&mut self, stmt: &Statement) -> Result<Statement, TransformError> {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        if self.nodes.sites_at(ordinal).next().is_some() {
            return Err(TransformError::Internal {
                message: format!("Recursive call in a `for` header survived classification: `{}`", stmt),
                span: Some(stmt.span()),
            });
        }
        Ok(stmt.clone())
    }

    fn rewrite_if(&mut self, if_stmt: &IfStatement) -> Result<IfStatement, TransformError> {
        let then_branch = self.rewrite_block(&if_stmt.then_branch)?;
        let else_branch = match &if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => Some(ElseBranch::Block(self.rewrite_block(block)?)),
            Some(ElseBranch::If(nested)) => Some(ElseBranch::If(Box::new(self.rewrite_if(nested)?))),
            None => None,
        };
        Ok(IfStatement {
            condition: if_stmt.condition.clone(),
            then_branch,
            else_branch,
            span: if_stmt.span,
        })
    }

    /// `let a = v1, b = f(x), c = v2;` を宣言子ごとの let に分ける
    fn split_declaration(
        &self,
        let_stmt: &LetStatement,
        sites: &[&CallSite],
    ) -> Result<Vec<Statement>, TransformError> {
        let mut out = Vec::with_capacity(let_stmt.declarators.len() + sites.len());
        for (index, declarator) in let_stmt.declarators.iter().enumerate() {
            let site = sites
                .iter()
                .find(|site| site.kind == CallSiteKind::Declaration { declarator: index });
            match site {
                Some(site) => {
                    let init = declarator.init.as_ref().ok_or_else(|| TransformError::Internal {
                        message: format!("Declarator `{}` has no initializer", declarator.name),
                        span: Some(declarator.span),
                    })?;
                    let call = expect_call(init, &Statement::Let(let_stmt.clone()))?;
                    out.push(suspend(site, call));
                    out.push(single_let(Declarator {
                        name: declarator.name.clone(),
                        ty: declarator.ty.clone(),
                        init: Some(self.slot_of(site)),
                        span: declarator.span,
                    }));
                }
                None => out.push(single_let(declarator.clone())),
            }
        }

        let matched = sites
            .iter()
            .filter(|site| matches!(site.kind, CallSiteKind::Declaration { declarator } if declarator < let_stmt.declarators.len()))
            .count();
        if matched != sites.len() {
            return Err(TransformError::Internal {
                message: format!("Call sites do not match the declaration: `{}`", Statement::Let(let_stmt.clone())),
                span: Some(let_stmt.span),
            });
        }
        Ok(out)
    }

    fn rewrite_return(
        &self,
        ret: &ReturnStatement,
        sites: &[&CallSite],
        stmt: &Statement,
        ordinal: usize,
    ) -> Result<Vec<Statement>, TransformError> {
        if !sites.is_empty() {
            let site = single_site(sites, stmt)?;
            expect_kind(site, CallSiteKind::ReturnCall, stmt)?;
            let value = ret.value.as_ref().ok_or_else(|| TransformError::internal("Return call without a value"))?;
            let call = expect_call(value, stmt)?;

            let mut out = vec![suspend(site, call)];
            let callee_returns_value = self
                .group
                .get(site.target)
                .is_some_and(|member| member.returns_value);
            // 自己呼び出しなら子が同じスロットに書いているので転記は不要
            if site.target != self.function.id && callee_returns_value && self.function.returns_value() {
                out.push(self.store_result(self.slot_of(site), ret.span));
            }
            out.push(Statement::SuspendReturn(ret.span));
            return Ok(out);
        }

        match self.nodes.return_at(ordinal) {
            Some(site) if site.has_value => {
                let value = ret.value.clone().ok_or_else(|| TransformError::Internal {
                    message: "Recorded return value is missing".to_string(),
                    span: Some(ret.span),
                })?;
                Ok(vec![self.store_result(value, ret.span), Statement::SuspendReturn(ret.span)])
            }
            Some(_) => Ok(vec![Statement::SuspendReturn(ret.span)]),
            None => Err(TransformError::Internal {
                message: format!("Return statement was not classified: `{}`", stmt),
                span: Some(ret.span),
            }),
        }
    }

    fn slot_of(&self, site: &CallSite) -> Expression {
        Expression::ResultSlot(ResultSlotExpr {
            function: site.target,
            name: site.callee.clone(),
            span: site.span,
        })
    }

    fn store_result(&self, value: Expression, span: Span) -> Statement {
        Statement::StoreResult(StoreResultStatement {
            function: self.function.id,
            name: self.function.name.clone(),
            value,
            span,
        })
    }
}

fn suspend(site: &CallSite, call: &CallExpr) -> Statement {
    Statement::Suspend(SuspendStatement {
        target: site.target,
        callee: call.callee.clone(),
        args: call.args.clone(),
        packing: None,
        span: call.span,
    })
}

fn single_let(declarator: Declarator) -> Statement {
    let span = declarator.span;
    Statement::Let(LetStatement {
        declarators: vec![declarator],
        span,
    })
}

fn single_site<'s>(sites: &[&'s CallSite], stmt: &Statement) -> Result<&'s CallSite, TransformError> {
    match sites {
        [site] => Ok(*site),
        _ => Err(TransformError::Internal {
            message: format!("Expected exactly one recursive call in `{}`, found {}", stmt, sites.len()),
            span: Some(stmt.span()),
        }),
    }
}

fn expect_kind(site: &CallSite, kind: CallSiteKind, stmt: &Statement) -> Result<(), TransformError> {
    if site.kind == kind {
        Ok(())
    } else {
        Err(TransformError::Internal {
            message: format!("Call site kind {:?} does not fit `{}`", site.kind, stmt),
            span: Some(site.span),
        })
    }
}

fn expect_call<'e>(expr: &'e Expression, stmt: &Statement) -> Result<&'e CallExpr, TransformError> {
    expr.as_call().ok_or_else(|| TransformError::Internal {
        message: format!("Expected a call in `{}`", stmt),
        span: Some(expr.span()),
    })
}
