//! 直接実行インタプリタ
//!
//! 元のプログラムをネイティブの再帰でそのまま評価する。呼び出しの深さには
//! 上限があり、超えるとプロセスを落とさずに `StackOverflow` を返す。
//! 式の評価と単純な文の実行は `cursor` からも使われる。

use std::cmp::Ordering;
use std::sync::Arc;

use log::debug;

use crate::ast::*;
use crate::error::RuntimeError;

use super::Value;

/// 直接実行での呼び出しの深さの既定の上限
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// 変数環境。後から定義したものが優先される
#[derive(Debug, Default)]
pub struct Env<'a> {
    vars: Vec<(&'a str, Value)>,
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn mark(&self) -> usize {
        self.vars.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.vars.truncate(mark);
    }

    pub fn define(&mut self, name: &'a str, value: Value) {
        self.vars.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.iter().rev().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.vars.iter_mut().rev().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// 関数ごとの結果スロット
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultSlots {
    values: Vec<(FunctionId, Value)>,
}

impl ResultSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, function: FunctionId) -> Option<&Value> {
        self.values.iter().find(|(id, _)| *id == function).map(|(_, v)| v)
    }

    pub fn write(&mut self, function: FunctionId, value: Value) {
        match self.values.iter_mut().find(|(id, _)| *id == function) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((function, value)),
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// 組み込み関数が残した副作用の記録
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    /// `trace(v)` に渡された値（呼ばれた順）
    pub trace: Vec<Value>,
    /// `print(v)` の出力行
    pub output: Vec<String>,
}

/// 文の実行結果
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Option<Value>),
}

/// 直接実行インタプリタ
pub struct Interpreter<'p> {
    program: &'p Program,
    max_call_depth: usize,
    depth: usize,
    effects: Effects,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            depth: 0,
            effects: Effects::default(),
        }
    }

    pub fn with_max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    pub fn take_effects(&mut self) -> Effects {
        std::mem::take(&mut self.effects)
    }

    /// 名前（`a::b::f` のようなモジュールパスも可）で関数を呼ぶ
    pub fn call_by_name(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        let function = find_function(self.program, name).ok_or_else(|| RuntimeError::UnknownFunction {
            name: name.to_string(),
        })?;
        self.call_decl(function, args)
    }

    pub fn call(&mut self, id: FunctionId, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        let function = self.program.function(id).ok_or_else(|| RuntimeError::UnknownFunction {
            name: id.to_string(),
        })?;
        self.call_decl(function, args)
    }

    fn call_decl(&mut self, function: &'p FunctionDecl, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        if args.len() != function.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                name: function.name.clone(),
                expected: function.params.len(),
                found: args.len(),
            });
        }
        if self.depth >= self.max_call_depth {
            debug!("呼び出しの深さが上限に達しました: {}", function.name);
            return Err(RuntimeError::StackOverflow {
                limit: self.max_call_depth,
            });
        }

        let mut env = Env::new();
        for (param, value) in function.params.iter().zip(args) {
            env.define(&param.name, value);
        }

        self.depth += 1;
        let flow = self.exec_block(&function.body, &mut env, &ResultSlots::new());
        self.depth -= 1;

        match (flow?, function.returns_value()) {
            (Flow::Return(Some(value)), true) => Ok(Some(value)),
            (_, true) => Err(RuntimeError::MissingReturn {
                function: function.name.clone(),
            }),
            (_, false) => Ok(None),
        }
    }

    fn exec_block<'a>(&mut self, block: &'a Block, env: &mut Env<'a>, slots: &ResultSlots) -> Result<Flow, RuntimeError> {
        let mark = env.mark();
        let mut flow = Ok(Flow::Normal);
        for stmt in &block.statements {
            flow = self.exec_statement(stmt, env, slots);
            if !matches!(flow, Ok(Flow::Normal)) {
                break;
            }
        }
        env.truncate(mark);
        flow
    }

    fn exec_statement<'a>(
        &mut self,
        stmt: &'a Statement,
        env: &mut Env<'a>,
        slots: &ResultSlots,
    ) -> Result<Flow, RuntimeError> {
        match stmt {
            Statement::Let(_) | Statement::Assignment(_) | Statement::Expression(_) => {
                self.exec_simple(stmt, env, slots)?;
                Ok(Flow::Normal)
            }
            Statement::Return(ret) => {
                let value = match &ret.value {
                    Some(expr) => Some(self.eval(expr, env, slots)?),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            Statement::If(if_stmt) => {
                let mut current = if_stmt;
                loop {
                    if self.condition(&current.condition, env, slots)? {
                        return self.exec_block(&current.then_branch, env, slots);
                    }
                    match &current.else_branch {
                        Some(ElseBranch::Block(block)) => return self.exec_block(block, env, slots),
                        Some(ElseBranch::If(nested)) => current = nested.as_ref(),
                        None => return Ok(Flow::Normal),
                    }
                }
            }
            Statement::While(while_stmt) => {
                while self.condition(&while_stmt.condition, env, slots)? {
                    if let flow @ Flow::Return(_) = self.exec_block(&while_stmt.body, env, slots)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For(for_stmt) => {
                let mark = env.mark();
                let result = self.exec_for(for_stmt, env, slots);
                env.truncate(mark);
                result
            }
            Statement::Block(block) => self.exec_block(block, env, slots),
            Statement::Throw(throw) => Err(RuntimeError::Thrown {
                value: self.eval(&throw.value, env, slots)?,
                span: throw.span,
            }),
            Statement::Try(try_stmt) => self.exec_try(try_stmt, env, slots),
            Statement::Yield(y) => Err(RuntimeError::TypeError {
                message: "yield cannot be executed".to_string(),
                span: y.span,
            }),
            Statement::Suspend(_) | Statement::StoreResult(_) | Statement::SuspendReturn(_) => {
                Err(RuntimeError::Internal {
                    message: format!("Synthesized statement in a direct-style body: `{}`", stmt),
                })
            }
        }
    }

    fn exec_for<'a>(
        &mut self,
        for_stmt: &'a ForStatement,
        env: &mut Env<'a>,
        slots: &ResultSlots,
    ) -> Result<Flow, RuntimeError> {
        if let Some(init) = &for_stmt.init {
            self.exec_simple(init, env, slots)?;
        }
        loop {
            if let Some(cond) = &for_stmt.condition {
                if !self.condition(cond, env, slots)? {
                    return Ok(Flow::Normal);
                }
            }
            if let flow @ Flow::Return(_) = self.exec_block(&for_stmt.body, env, slots)? {
                return Ok(flow);
            }
            if let Some(update) = &for_stmt.update {
                self.exec_simple(update, env, slots)?;
            }
        }
    }

    /// 例外として捕捉できるのは `throw` された値だけ
    fn exec_try<'a>(
        &mut self,
        try_stmt: &'a TryStatement,
        env: &mut Env<'a>,
        slots: &ResultSlots,
    ) -> Result<Flow, RuntimeError> {
        let mark = env.mark();
        let mut result = self.exec_block(&try_stmt.body, env, slots);
        env.truncate(mark);

        let thrown = match &result {
            Err(RuntimeError::Thrown { value, .. }) => Some(value.clone()),
            _ => None,
        };
        if let (Some(value), Some(catch)) = (thrown, &try_stmt.catch) {
            env.define(&catch.binding, value);
            result = self.exec_block(&catch.body, env, slots);
            env.truncate(mark);
        }

        if let Some(finally) = &try_stmt.finally {
            if matches!(result, Ok(_) | Err(RuntimeError::Thrown { .. })) {
                if let flow @ Flow::Return(_) = self.exec_block(finally, env, slots)? {
                    return Ok(flow);
                }
            }
        }
        result
    }

    /// let・代入・式文（for ヘッダにも置ける文）を実行する
    pub(crate) fn exec_simple<'a>(
        &mut self,
        stmt: &'a Statement,
        env: &mut Env<'a>,
        slots: &ResultSlots,
    ) -> Result<(), RuntimeError> {
        match stmt {
            Statement::Let(let_stmt) => {
                for decl in &let_stmt.declarators {
                    let value = match &decl.init {
                        Some(init) => self.eval(init, env, slots)?,
                        None => Value::Unit,
                    };
                    env.define(&decl.name, value);
                }
                Ok(())
            }
            Statement::Assignment(assign) => self.assign(assign, env, slots),
            Statement::Expression(expr) => self.eval(expr, env, slots).map(|_| ()),
            other => Err(RuntimeError::Internal {
                message: format!("Not a simple statement: `{}`", other),
            }),
        }
    }

    /// 右辺を先に評価してから代入先に書く
    fn assign(&mut self, assign: &AssignStatement, env: &mut Env<'_>, slots: &ResultSlots) -> Result<(), RuntimeError> {
        let value = self.eval(&assign.value, env, slots)?;
        match &assign.target {
            Expression::Identifier(id) => {
                let slot = env.get_mut(&id.name).ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: id.name.clone(),
                    span: id.span,
                })?;
                *slot = combine(assign.op, slot, value, assign.span)?;
                Ok(())
            }
            Expression::Index(index) => {
                let position = self.eval(&index.index, env, slots)?;
                let Expression::Identifier(id) = index.object.as_ref() else {
                    return Err(RuntimeError::TypeError {
                        message: format!("Cannot assign to `{}`", assign.target),
                        span: assign.target.span(),
                    });
                };
                let slot = env.get_mut(&id.name).ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: id.name.clone(),
                    span: id.span,
                })?;
                let Value::Array(items) = slot else {
                    return Err(RuntimeError::TypeError {
                        message: format!("`{}` is not an array", id.name),
                        span: id.span,
                    });
                };
                let offset = element_offset(&position, items.len(), index.span)?;
                let items = Arc::make_mut(items);
                items[offset] = combine(assign.op, &items[offset], value, assign.span)?;
                Ok(())
            }
            other => Err(RuntimeError::TypeError {
                message: format!("Cannot assign to `{}`", other),
                span: other.span(),
            }),
        }
    }

    pub(crate) fn condition(&mut self, expr: &Expression, env: &Env<'_>, slots: &ResultSlots) -> Result<bool, RuntimeError> {
        let value = self.eval(expr, env, slots)?;
        value.as_bool().ok_or_else(|| RuntimeError::TypeError {
            message: format!("Condition must be a bool, found {}", value.type_name()),
            span: expr.span(),
        })
    }

    pub(crate) fn eval(&mut self, expr: &Expression, env: &Env<'_>, slots: &ResultSlots) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Integer(lit) => Ok(Value::Int(lit.value)),
            Expression::Boolean(lit) => Ok(Value::Bool(lit.value)),
            Expression::String(lit) => Ok(Value::str(&lit.value)),
            Expression::Identifier(id) => env.get(&id.name).cloned().ok_or_else(|| RuntimeError::UndefinedVariable {
                name: id.name.clone(),
                span: id.span,
            }),
            Expression::Binary(bin) => match bin.op {
                BinaryOp::And | BinaryOp::Or => {
                    let left = self.condition(&bin.left, env, slots)?;
                    if left == (bin.op == BinaryOp::Or) {
                        return Ok(Value::Bool(left));
                    }
                    self.condition(&bin.right, env, slots).map(Value::Bool)
                }
                op => {
                    let left = self.eval(&bin.left, env, slots)?;
                    let right = self.eval(&bin.right, env, slots)?;
                    binary(op, left, right, bin.span)
                }
            },
            Expression::Unary(un) => {
                let operand = self.eval(&un.operand, env, slots)?;
                match (un.op, operand) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, Value::Int(n)) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or(RuntimeError::Overflow { span: un.span }),
                    (op, other) => Err(RuntimeError::TypeError {
                        message: format!("Cannot apply {:?} to {}", op, other.type_name()),
                        span: un.span,
                    }),
                }
            }
            Expression::Call(call) => {
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.eval(arg, env, slots)?);
                }
                match call.target {
                    CallTarget::Function(id) => Ok(self.call(id, args)?.unwrap_or_default()),
                    CallTarget::Builtin(builtin) => self.builtin(builtin, args, call.span),
                    CallTarget::Unresolved => Err(RuntimeError::UnknownFunction {
                        name: call.callee.clone(),
                    }),
                }
            }
            Expression::Index(index) => {
                let object = self.eval(&index.object, env, slots)?;
                let position = self.eval(&index.index, env, slots)?;
                match &object {
                    Value::Array(items) => {
                        let offset = element_offset(&position, items.len(), index.span)?;
                        Ok(items[offset].clone())
                    }
                    other => Err(RuntimeError::TypeError {
                        message: format!("Cannot index into {}", other.type_name()),
                        span: index.span,
                    }),
                }
            }
            Expression::Array(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    items.push(self.eval(element, env, slots)?);
                }
                Ok(Value::array(items))
            }
            Expression::ResultSlot(slot) => slots.read(slot.function).cloned().ok_or_else(|| RuntimeError::Internal {
                message: format!("Result slot of `{}` was read before it was written", slot.name),
            }),
        }
    }

    fn builtin(&mut self, builtin: Builtin, args: Vec<Value>, span: Span) -> Result<Value, RuntimeError> {
        let mut args = args.into_iter();
        let first = args.next().unwrap_or_default();
        match builtin {
            Builtin::Len => match &first {
                Value::Array(items) => Ok(Value::Int(items.len() as i64)),
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                other => Err(RuntimeError::TypeError {
                    message: format!("len() expects an array or a string, found {}", other.type_name()),
                    span,
                }),
            },
            Builtin::Push => match first {
                Value::Array(mut items) => {
                    Arc::make_mut(&mut items).push(args.next().unwrap_or_default());
                    Ok(Value::Array(items))
                }
                other => Err(RuntimeError::TypeError {
                    message: format!("push() expects an array, found {}", other.type_name()),
                    span,
                }),
            },
            Builtin::Trace => {
                self.effects.trace.push(first.clone());
                Ok(first)
            }
            Builtin::Print => {
                self.effects.output.push(first.to_string());
                Ok(Value::Unit)
            }
            Builtin::Abs => match first {
                Value::Int(n) => n.checked_abs().map(Value::Int).ok_or(RuntimeError::Overflow { span }),
                other => Err(RuntimeError::TypeError {
                    message: format!("abs() expects an int, found {}", other.type_name()),
                    span,
                }),
            },
        }
    }
}

fn find_function<'p>(program: &'p Program, path: &str) -> Option<&'p FunctionDecl> {
    let mut segments: Vec<&str> = path.split("::").collect();
    let name = segments.pop()?;
    program
        .functions()
        .into_iter()
        .find(|(decl, container)| {
            decl.name == name && (segments.is_empty() || container.segments.iter().map(String::as_str).eq(segments.iter().copied()))
        })
        .map(|(decl, _)| decl)
}

fn element_offset(position: &Value, len: usize, span: Span) -> Result<usize, RuntimeError> {
    let index = position.as_int().ok_or_else(|| RuntimeError::TypeError {
        message: format!("Index must be an int, found {}", position.type_name()),
        span,
    })?;
    usize::try_from(index)
        .ok()
        .filter(|offset| *offset < len)
        .ok_or(RuntimeError::IndexOutOfBounds { index, len, span })
}

fn combine(op: AssignOp, current: &Value, value: Value, span: Span) -> Result<Value, RuntimeError> {
    let binary_op = match op {
        AssignOp::Assign => return Ok(value),
        AssignOp::AddAssign => BinaryOp::Add,
        AssignOp::SubAssign => BinaryOp::Subtract,
        AssignOp::MulAssign => BinaryOp::Multiply,
    };
    binary(binary_op, current.clone(), value, span)
}

/// 短絡評価しない二項演算
fn binary(op: BinaryOp, left: Value, right: Value, span: Span) -> Result<Value, RuntimeError> {
    let overflow = || RuntimeError::Overflow { span };
    match (op, &left, &right) {
        (BinaryOp::Equal, _, _) => Ok(Value::Bool(left == right)),
        (BinaryOp::NotEqual, _, _) => Ok(Value::Bool(left != right)),
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Subtract, Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Multiply, Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Divide | BinaryOp::Modulo, Value::Int(_), Value::Int(0)) => {
            Err(RuntimeError::DivisionByZero { span })
        }
        (BinaryOp::Divide, Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Modulo, Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Add, Value::Str(a), _) => Ok(Value::str(&format!("{}{}", a, right))),
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            Ok(Value::array(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual, _, _) => {
            let ordering = match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => return Err(type_mismatch(op, &left, &right, span)),
            };
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        _ => Err(type_mismatch(op, &left, &right, span)),
    }
}

fn type_mismatch(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeError {
    RuntimeError::TypeError {
        message: format!("Cannot apply `{}` to {} and {}", op, left.type_name(), right.type_name()),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn span() -> Span {
        Span::dummy()
    }

    #[test_case(BinaryOp::Add, 7, 3, 10 ; "add")]
    #[test_case(BinaryOp::Subtract, 7, 3, 4 ; "subtract")]
    #[test_case(BinaryOp::Modulo, -7, 2, -1 ; "remainder keeps the dividend sign")]
    #[test_case(BinaryOp::Divide, -7, 2, -3 ; "division truncates")]
    fn test_int_arithmetic(op: BinaryOp, a: i64, b: i64, expected: i64) {
        assert_eq!(binary(op, Value::Int(a), Value::Int(b), span()), Ok(Value::Int(expected)));
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(
            binary(BinaryOp::Add, Value::Int(i64::MAX), Value::Int(1), span()),
            Err(RuntimeError::Overflow { span: span() })
        );
        assert_eq!(
            binary(BinaryOp::Modulo, Value::Int(1), Value::Int(0), span()),
            Err(RuntimeError::DivisionByZero { span: span() })
        );
    }

    #[test]
    fn test_env_shadowing() {
        let mut env = Env::new();
        env.define("x", Value::Int(1));
        let mark = env.mark();
        env.define("x", Value::Int(2));
        assert_eq!(env.get("x"), Some(&Value::Int(2)));
        env.truncate(mark);
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_result_slots_overwrite() {
        let mut slots = ResultSlots::new();
        slots.write(FunctionId(1), Value::Int(1));
        slots.write(FunctionId(1), Value::Int(2));
        assert_eq!(slots.read(FunctionId(1)), Some(&Value::Int(2)));
        assert_eq!(slots.read(FunctionId(0)), None);
    }
}
