//! 名前解決
//!
//! すべての呼び出し式の呼び出し先を `CallTarget::Function` か
//! `CallTarget::Builtin` に確定させ、引数の数を検証する。

use log::debug;

use crate::ast::*;
use crate::error::ResolveError;

use super::symbol::{FunctionSignature, FunctionTable};

/// 名前解決器
pub struct Resolver {
    table: FunctionTable,
    errors: Vec<ResolveError>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            table: FunctionTable::new(),
            errors: Vec::new(),
        }
    }

    /// プログラム全体を解決する。エラーはすべて集めて返す
    pub fn resolve(mut self, program: &mut Program) -> Result<FunctionTable, Vec<ResolveError>> {
        for (decl, container) in program.functions() {
            if let Err(e) = self.table.insert(FunctionSignature::from_decl(decl, &container)) {
                self.errors.push(e);
            }
        }
        debug!("名前解決: {} 個の関数を登録", self.table.len());

        self.resolve_items(&mut program.items, &[]);

        if self.errors.is_empty() {
            Ok(self.table)
        } else {
            Err(self.errors)
        }
    }

    fn resolve_items(&mut self, items: &mut [Item], container: &[String]) {
        for item in items {
            match item {
                Item::Function(func) => self.resolve_block(&mut func.body, container),
                Item::Module(module) => {
                    let mut inner = container.to_vec();
                    inner.push(module.name.clone());
                    self.resolve_items(&mut module.items, &inner);
                }
            }
        }
    }

    fn resolve_block(&mut self, block: &mut Block, container: &[String]) {
        for stmt in &mut block.statements {
            self.resolve_statement(stmt, container);
        }
    }

    fn resolve_statement(&mut self, stmt: &mut Statement, container: &[String]) {
        match stmt {
            Statement::Let(let_stmt) => {
                for decl in &mut let_stmt.declarators {
                    if let Some(init) = &mut decl.init {
                        self.resolve_expression(init, container);
                    }
                }
            }
            Statement::Assignment(assign) => {
                self.resolve_expression(&mut assign.target, container);
                self.resolve_expression(&mut assign.value, container);
            }
            Statement::Return(ret) => {
                if let Some(value) = &mut ret.value {
                    self.resolve_expression(value, container);
                }
            }
            Statement::If(if_stmt) => self.resolve_if(if_stmt, container),
            Statement::While(while_stmt) => {
                self.resolve_expression(&mut while_stmt.condition, container);
                self.resolve_block(&mut while_stmt.body, container);
            }
            Statement::For(for_stmt) => {
                if let Some(init) = &mut for_stmt.init {
                    self.resolve_statement(init, container);
                }
                if let Some(cond) = &mut for_stmt.condition {
                    self.resolve_expression(cond, container);
                }
                if let Some(update) = &mut for_stmt.update {
                    self.resolve_statement(update, container);
                }
                self.resolve_block(&mut for_stmt.body, container);
            }
            Statement::Expression(expr) => self.resolve_expression(expr, container),
            Statement::Block(block) => self.resolve_block(block, container),
            Statement::Throw(throw) => self.resolve_expression(&mut throw.value, container),
            Statement::Try(try_stmt) => {
                self.resolve_block(&mut try_stmt.body, container);
                if let Some(catch) = &mut try_stmt.catch {
                    self.resolve_block(&mut catch.body, container);
                }
                if let Some(finally) = &mut try_stmt.finally {
                    self.resolve_block(finally, container);
                }
            }
            Statement::Yield(y) => {
                if let Some(value) = &mut y.value {
                    self.resolve_expression(value, container);
                }
            }
            Statement::Suspend(suspend) => {
                for arg in &mut suspend.args {
                    self.resolve_expression(arg, container);
                }
            }
            Statement::StoreResult(store) => self.resolve_expression(&mut store.value, container),
            Statement::SuspendReturn(_) => {}
        }
    }

    fn resolve_if(&mut self, if_stmt: &mut IfStatement, container: &[String]) {
        self.resolve_expression(&mut if_stmt.condition, container);
        self.resolve_block(&mut if_stmt.then_branch, container);
        match &mut if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.resolve_block(block, container),
            Some(ElseBranch::If(nested)) => self.resolve_if(nested, container),
            None => {}
        }
    }

    fn resolve_expression(&mut self, expr: &mut Expression, container: &[String]) {
        match expr {
            Expression::Binary(bin) => {
                self.resolve_expression(&mut bin.left, container);
                self.resolve_expression(&mut bin.right, container);
            }
            Expression::Unary(un) => self.resolve_expression(&mut un.operand, container),
            Expression::Index(index) => {
                self.resolve_expression(&mut index.object, container);
                self.resolve_expression(&mut index.index, container);
            }
            Expression::Array(array) => {
                for element in &mut array.elements {
                    self.resolve_expression(element, container);
                }
            }
            Expression::Call(call) => {
                for arg in &mut call.args {
                    self.resolve_expression(arg, container);
                }
                self.resolve_call(call, container);
            }
            Expression::Integer(_)
            | Expression::Boolean(_)
            | Expression::String(_)
            | Expression::Identifier(_)
            | Expression::ResultSlot(_) => {}
        }
    }

    fn resolve_call(&mut self, call: &mut CallExpr, container: &[String]) {
        // ユーザー定義関数は組み込み関数より優先する
        let (target, expected) = if let Some(sig) = self.table.lookup(container, &call.callee) {
            (CallTarget::Function(sig.id), sig.arity)
        } else if let Some(builtin) = Builtin::from_name(&call.callee) {
            (CallTarget::Builtin(builtin), builtin.arity())
        } else {
            self.errors.push(ResolveError::UndefinedFunction {
                name: call.callee.clone(),
                span: call.span,
            });
            return;
        };

        if expected != call.args.len() {
            self.errors.push(ResolveError::ArgumentCountMismatch {
                name: call.callee.clone(),
                expected,
                found: call.args.len(),
                span: call.span,
            });
            return;
        }
        call.target = target;
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
