//! 再開可能なステップ手続きの実行
//!
//! 書き換え済みの本体を、自前の制御スタックを持つ状態機械として実行する。
//! `suspend` に達するとディスパッチフレームを返して一時停止し、次に
//! `resume` されたときはその直後の文から続ける。ローカル変数と制御状態は
//! カーソルが持つので、ネイティブの呼び出しスタックは深くならない。
//!
//! `try` / `catch` / `finally` は同じ活性化の中でだけ働く。子の呼び出しで
//! 起きたエラーは実行全体を止める。

use crate::ast::*;
use crate::codegen::{GeneratedUnit, StepProcedure};
use crate::error::RuntimeError;

use super::interpreter::{Env, Interpreter, ResultSlots};
use super::trampoline::Step;
use super::Value;

/// 実行時のディスパッチフレーム（判別子と呼び出しフレームの値）
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFrame {
    pub tag: u32,
    pub args: Vec<Value>,
}

/// カーソルを進めるのに必要な、ランナー側の状態
pub struct CursorContext<'c, 'p> {
    pub interpreter: &'c mut Interpreter<'p>,
    pub slots: &'c mut ResultSlots,
    pub unit: &'c GeneratedUnit,
}

#[derive(Debug)]
enum Pending {
    Nothing,
    Return,
    Error(RuntimeError),
}

#[derive(Debug)]
enum TryPhase {
    Body,
    Catch,
    Finally(Pending),
}

#[derive(Debug)]
enum ExecFrame<'u> {
    Block {
        statements: &'u [Statement],
        next: usize,
        mark: usize,
    },
    While {
        stmt: &'u WhileStatement,
    },
    For {
        stmt: &'u ForStatement,
        mark: usize,
        started: bool,
    },
    Try {
        stmt: &'u TryStatement,
        mark: usize,
        phase: TryPhase,
    },
}

enum Control {
    Suspend(DispatchFrame),
    Return,
}

/// 1つのステップ手続きの活性化
#[derive(Debug)]
pub struct Cursor<'u> {
    step: &'u StepProcedure,
    env: Env<'u>,
    frames: Vec<ExecFrame<'u>>,
}

impl<'u> Cursor<'u> {
    pub fn new(step: &'u StepProcedure, args: Vec<Value>) -> Result<Self, RuntimeError> {
        if args.len() != step.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                name: step.function.clone(),
                expected: step.params.len(),
                found: args.len(),
            });
        }
        let mut env = Env::new();
        for (param, value) in step.params.iter().zip(args) {
            env.define(&param.name, value);
        }
        let mut cursor = Self {
            step,
            env,
            frames: Vec::new(),
        };
        cursor.push_block(&step.body);
        Ok(cursor)
    }

    pub fn function(&self) -> &'u str {
        &self.step.function
    }

    /// 次の中断点か完了まで進める
    pub fn resume(&mut self, ctx: &mut CursorContext<'_, '_>) -> Result<Step<DispatchFrame>, RuntimeError> {
        loop {
            if self.frames.is_empty() {
                return self.fall_off_end();
            }
            match self.advance(ctx) {
                Ok(None) => {}
                Ok(Some(Control::Suspend(frame))) => return Ok(Step::Call(frame)),
                Ok(Some(Control::Return)) => {
                    if self.unwind_return() {
                        return Ok(Step::Return);
                    }
                }
                Err(err) => self.unwind_error(err)?,
            }
        }
    }

    fn fall_off_end(&self) -> Result<Step<DispatchFrame>, RuntimeError> {
        if self.step.returns_value {
            Err(RuntimeError::MissingReturn {
                function: self.step.function.clone(),
            })
        } else {
            Ok(Step::Return)
        }
    }

    fn push_block(&mut self, block: &'u Block) {
        self.frames.push(ExecFrame::Block {
            statements: &block.statements,
            next: 0,
            mark: self.env.mark(),
        });
    }

    /// 最上位のフレームを1単位だけ進める
    fn advance(&mut self, ctx: &mut CursorContext<'_, '_>) -> Result<Option<Control>, RuntimeError> {
        let Some(frame) = self.frames.pop() else {
            return Ok(None);
        };

        match frame {
            ExecFrame::Block { statements, next, mark } => match statements.get(next) {
                Some(stmt) => {
                    self.frames.push(ExecFrame::Block {
                        statements,
                        next: next + 1,
                        mark,
                    });
                    self.exec(stmt, ctx)
                }
                None => {
                    self.env.truncate(mark);
                    Ok(None)
                }
            },
            ExecFrame::While { stmt } => {
                if ctx.interpreter.condition(&stmt.condition, &self.env, ctx.slots)? {
                    self.frames.push(ExecFrame::While { stmt });
                    self.push_block(&stmt.body);
                }
                Ok(None)
            }
            ExecFrame::For { stmt, mark, started } => {
                if started {
                    if let Some(update) = &stmt.update {
                        ctx.interpreter.exec_simple(update, &mut self.env, ctx.slots)?;
                    }
                }
                let proceed = match &stmt.condition {
                    Some(cond) => ctx.interpreter.condition(cond, &self.env, ctx.slots)?,
                    None => true,
                };
                if proceed {
                    self.frames.push(ExecFrame::For {
                        stmt,
                        mark,
                        started: true,
                    });
                    self.push_block(&stmt.body);
                } else {
                    self.env.truncate(mark);
                }
                Ok(None)
            }
            ExecFrame::Try { stmt, mark, phase } => {
                self.env.truncate(mark);
                match phase {
                    TryPhase::Body | TryPhase::Catch => {
                        if let Some(finally) = &stmt.finally {
                            self.frames.push(ExecFrame::Try {
                                stmt,
                                mark,
                                phase: TryPhase::Finally(Pending::Nothing),
                            });
                            self.push_block(finally);
                        }
                        Ok(None)
                    }
                    TryPhase::Finally(Pending::Nothing) => Ok(None),
                    TryPhase::Finally(Pending::Return) => Ok(Some(Control::Return)),
                    TryPhase::Finally(Pending::Error(err)) => Err(err),
                }
            }
        }
    }

    fn exec(&mut self, stmt: &'u Statement, ctx: &mut CursorContext<'_, '_>) -> Result<Option<Control>, RuntimeError> {
        match stmt {
            Statement::Let(_) | Statement::Assignment(_) | Statement::Expression(_) => {
                ctx.interpreter.exec_simple(stmt, &mut self.env, ctx.slots)?;
            }
            Statement::If(if_stmt) => {
                let mut current = if_stmt;
                loop {
                    if ctx.interpreter.condition(&current.condition, &self.env, ctx.slots)? {
                        self.push_block(&current.then_branch);
                        break;
                    }
                    match &current.else_branch {
                        Some(ElseBranch::Block(block)) => {
                            self.push_block(block);
                            break;
                        }
                        Some(ElseBranch::If(nested)) => current = nested.as_ref(),
                        None => break,
                    }
                }
            }
            Statement::While(while_stmt) => self.frames.push(ExecFrame::While { stmt: while_stmt }),
            Statement::For(for_stmt) => {
                let mark = self.env.mark();
                if let Some(init) = &for_stmt.init {
                    ctx.interpreter.exec_simple(init, &mut self.env, ctx.slots)?;
                }
                self.frames.push(ExecFrame::For {
                    stmt: for_stmt,
                    mark,
                    started: false,
                });
            }
            Statement::Block(block) => self.push_block(block),
            Statement::Throw(throw) => {
                return Err(RuntimeError::Thrown {
                    value: ctx.interpreter.eval(&throw.value, &self.env, ctx.slots)?,
                    span: throw.span,
                })
            }
            Statement::Try(try_stmt) => {
                self.frames.push(ExecFrame::Try {
                    stmt: try_stmt,
                    mark: self.env.mark(),
                    phase: TryPhase::Body,
                });
                self.push_block(&try_stmt.body);
            }
            Statement::Suspend(suspend) => {
                let mut args = Vec::with_capacity(suspend.args.len());
                for arg in &suspend.args {
                    args.push(ctx.interpreter.eval(arg, &self.env, ctx.slots)?);
                }
                let tag = ctx.unit.layout.tag_of(suspend.target).ok_or_else(|| RuntimeError::Internal {
                    message: format!("`{}` is not a member of group '{}'", suspend.callee, ctx.unit.group),
                })?;
                return Ok(Some(Control::Suspend(DispatchFrame { tag, args })));
            }
            Statement::StoreResult(store) => {
                let value = ctx.interpreter.eval(&store.value, &self.env, ctx.slots)?;
                ctx.slots.write(store.function, value);
            }
            Statement::SuspendReturn(_) => return Ok(Some(Control::Return)),
            Statement::Return(_) | Statement::Yield(_) => {
                return Err(RuntimeError::Internal {
                    message: format!("Statement was not rewritten: `{}`", stmt),
                })
            }
        }
        Ok(None)
    }

    /// `suspend return` を外側へ伝える。途中の `finally` は実行する。
    /// 活性化が終わったら true
    fn unwind_return(&mut self) -> bool {
        while let Some(frame) = self.frames.pop() {
            if let ExecFrame::Try {
                stmt,
                mark,
                phase: TryPhase::Body | TryPhase::Catch,
            } = frame
            {
                if let Some(finally) = &stmt.finally {
                    self.env.truncate(mark);
                    self.frames.push(ExecFrame::Try {
                        stmt,
                        mark,
                        phase: TryPhase::Finally(Pending::Return),
                    });
                    self.push_block(finally);
                    return false;
                }
            }
        }
        true
    }

    /// `throw` された値を最も内側の `catch` まで伝える。捕捉できなければエラーを返す
    fn unwind_error(&mut self, err: RuntimeError) -> Result<(), RuntimeError> {
        let value = match &err {
            RuntimeError::Thrown { value, .. } => value.clone(),
            _ => return Err(err),
        };

        while let Some(frame) = self.frames.pop() {
            let ExecFrame::Try { stmt, mark, phase } = frame else {
                continue;
            };
            self.env.truncate(mark);
            match phase {
                TryPhase::Body => {
                    if let Some(catch) = &stmt.catch {
                        self.frames.push(ExecFrame::Try {
                            stmt,
                            mark,
                            phase: TryPhase::Catch,
                        });
                        self.push_block(&catch.body);
                        self.env.define(&catch.binding, value);
                        return Ok(());
                    }
                }
                TryPhase::Catch => {}
                // finally の中で起きたエラーは保留中のものを置き換える
                TryPhase::Finally(_) => continue,
            }
            if let Some(finally) = &stmt.finally {
                self.frames.push(ExecFrame::Try {
                    stmt,
                    mark,
                    phase: TryPhase::Finally(Pending::Error(err)),
                });
                self.push_block(finally);
                return Ok(());
            }
        }
        Err(err)
    }
}
