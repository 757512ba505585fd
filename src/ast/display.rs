//! Source-like rendering of AST nodes.
//!
//! Used for diagnostics (quoting the offending call) and for the textual
//! listing of generated units.

use std::fmt::{self, Write};

use super::*;

const INDENT: &str = "    ";

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::Unit => write!(f, "unit"),
            Type::Array(inner) => write!(f, "[{}]", inner),
            Type::Named(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::Public => write!(f, "pub"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::ProtectedInternal => write!(f, "protected internal"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(s)
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
        };
        f.write_str(s)
    }
}

impl BinaryOp {
    /// 結合の強さ（大きいほど強い）
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal | BinaryOp::NotEqual => 3,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => 4,
            BinaryOp::Add | BinaryOp::Subtract => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 6,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression, min_prec: u8) -> fmt::Result {
    match expr {
        Expression::Binary(bin) if bin.op.precedence() < min_prec => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Integer(lit) => write!(f, "{}", lit.value),
            Expression::Boolean(lit) => write!(f, "{}", lit.value),
            Expression::String(lit) => write!(f, "{:?}", lit.value),
            Expression::Identifier(id) => write!(f, "{}", id.name),
            Expression::Binary(bin) => {
                let prec = bin.op.precedence();
                write_operand(f, &bin.left, prec)?;
                write!(f, " {} ", bin.op)?;
                // 左結合なので右辺は同じ優先度でも括弧が必要
                write_operand(f, &bin.right, prec + 1)
            }
            Expression::Unary(un) => {
                let op = match un.op {
                    UnaryOp::Not => "!",
                    UnaryOp::Negate => "-",
                };
                f.write_str(op)?;
                write_operand(f, &un.operand, u8::MAX)
            }
            Expression::Call(call) => {
                write!(f, "{}(", call.callee)?;
                write_list(f, &call.args)?;
                write!(f, ")")
            }
            Expression::Index(index) => {
                write_operand(f, &index.object, u8::MAX)?;
                write!(f, "[{}]", index.index)
            }
            Expression::Array(array) => {
                write!(f, "[")?;
                write_list(f, &array.elements)?;
                write!(f, "]")
            }
            Expression::ResultSlot(slot) => write!(f, "result({})", slot.name),
        }
    }
}

impl fmt::Display for Declarator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, ": {}", ty)?;
        }
        if let Some(init) = &self.init {
            write!(f, " = {}", init)?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.bounds.is_empty() {
            write!(f, ": {}", self.bounds.join(" + "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_receiver {
            write!(f, "this ")?;
        }
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// 文をインデント付きで書き出す
pub fn write_statement(out: &mut String, stmt: &Statement, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match stmt {
        Statement::Let(let_stmt) => {
            write!(out, "{}let ", pad)?;
            write_inline_let(out, let_stmt)?;
            writeln!(out, ";")
        }
        Statement::Assignment(assign) => {
            writeln!(out, "{}{} {} {};", pad, assign.target, assign.op, assign.value)
        }
        Statement::Return(ret) => match &ret.value {
            Some(value) => writeln!(out, "{}return {};", pad, value),
            None => writeln!(out, "{}return;", pad),
        },
        Statement::If(if_stmt) => {
            write!(out, "{}", pad)?;
            write_if(out, if_stmt, depth)?;
            writeln!(out)
        }
        Statement::While(while_stmt) => {
            write!(out, "{}while {} ", pad, while_stmt.condition)?;
            write_block(out, &while_stmt.body, depth)?;
            writeln!(out)
        }
        Statement::For(for_stmt) => {
            write!(out, "{}for ", pad)?;
            if let Some(init) = &for_stmt.init {
                write_inline_statement(out, init)?;
            }
            write!(out, "; ")?;
            if let Some(cond) = &for_stmt.condition {
                write!(out, "{}", cond)?;
            }
            write!(out, "; ")?;
            if let Some(update) = &for_stmt.update {
                write_inline_statement(out, update)?;
            }
            write!(out, " ")?;
            write_block(out, &for_stmt.body, depth)?;
            writeln!(out)
        }
        Statement::Expression(expr) => writeln!(out, "{}{};", pad, expr),
        Statement::Block(block) => {
            write!(out, "{}", pad)?;
            write_block(out, block, depth)?;
            writeln!(out)
        }
        Statement::Throw(throw) => writeln!(out, "{}throw {};", pad, throw.value),
        Statement::Try(try_stmt) => {
            write!(out, "{}try ", pad)?;
            write_block(out, &try_stmt.body, depth)?;
            if let Some(catch) = &try_stmt.catch {
                write!(out, " catch {} ", catch.binding)?;
                write_block(out, &catch.body, depth)?;
            }
            if let Some(finally) = &try_stmt.finally {
                write!(out, " finally ")?;
                write_block(out, finally, depth)?;
            }
            writeln!(out)
        }
        Statement::Yield(y) => match &y.value {
            Some(value) => writeln!(out, "{}yield {};", pad, value),
            None => writeln!(out, "{}yield;", pad),
        },
        Statement::Suspend(suspend) => {
            let (open, close) = match &suspend.packing {
                None => (suspend.callee.clone(), ")"),
                Some(SuspendPacking { frame, dispatch: None }) => (frame.clone(), ")"),
                Some(SuspendPacking {
                    frame,
                    dispatch: Some((dispatch, variant)),
                }) => (format!("{}::{}({}", dispatch, variant, frame), "))"),
            };
            write!(out, "{}suspend {}(", pad, open)?;
            for (i, arg) in suspend.args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{}", arg)?;
            }
            writeln!(out, "{};", close)
        }
        Statement::StoreResult(store) => {
            writeln!(out, "{}result({}) = {};", pad, store.name, store.value)
        }
        Statement::SuspendReturn(_) => writeln!(out, "{}suspend return;", pad),
    }
}

/// `{ ... }` を書き出す（末尾の改行なし）
pub fn write_block(out: &mut String, block: &Block, depth: usize) -> fmt::Result {
    writeln!(out, "{{")?;
    for stmt in &block.statements {
        write_statement(out, stmt, depth + 1)?;
    }
    write!(out, "{}}}", INDENT.repeat(depth))
}

fn write_if(out: &mut String, if_stmt: &IfStatement, depth: usize) -> fmt::Result {
    write!(out, "if {} ", if_stmt.condition)?;
    write_block(out, &if_stmt.then_branch, depth)?;
    match &if_stmt.else_branch {
        Some(ElseBranch::Block(block)) => {
            write!(out, " else ")?;
            write_block(out, block, depth)
        }
        Some(ElseBranch::If(nested)) => {
            write!(out, " else ")?;
            write_if(out, nested, depth)
        }
        None => Ok(()),
    }
}

fn write_inline_let(out: &mut String, let_stmt: &LetStatement) -> fmt::Result {
    for (i, decl) in let_stmt.declarators.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", decl)?;
    }
    Ok(())
}

// forヘッダ内の文（セミコロンなし）
fn write_inline_statement(out: &mut String, stmt: &Statement) -> fmt::Result {
    match stmt {
        Statement::Let(let_stmt) => {
            write!(out, "let ")?;
            write_inline_let(out, let_stmt)
        }
        Statement::Assignment(assign) => {
            write!(out, "{} {} {}", assign.target, assign.op, assign.value)
        }
        Statement::Expression(expr) => write!(out, "{}", expr),
        other => {
            let mut buf = String::new();
            write_statement(&mut buf, other, 0)?;
            write!(out, "{}", buf.trim_end().trim_end_matches(';'))
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_statement(&mut out, self, 0)?;
        f.write_str(out.trim_end())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_block(&mut out, self, 0)?;
        f.write_str(&out)
    }
}

/// 関数シグネチャ `pub fn name<T>(a: int) -> int`
pub fn write_signature(
    out: &mut String,
    visibility: Visibility,
    name: &str,
    type_params: &[TypeParam],
    params: &[Param],
    return_type: Option<&Type>,
) -> fmt::Result {
    if visibility != Visibility::Private {
        write!(out, "{} ", visibility)?;
    }
    write!(out, "fn {}", name)?;
    if !type_params.is_empty() {
        write!(out, "<")?;
        for (i, tp) in type_params.iter().enumerate() {
            if i > 0 {
                write!(out, ", ")?;
            }
            write!(out, "{}", tp)?;
        }
        write!(out, ">")?;
    }
    write!(out, "(")?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", param)?;
    }
    write!(out, ")")?;
    if let Some(ty) = return_type {
        write!(out, " -> {}", ty)?;
    }
    Ok(())
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_signature(
            &mut out,
            self.visibility,
            &self.name,
            &self.type_params,
            &self.params,
            self.return_type.as_ref(),
        )?;
        write!(out, " ")?;
        write_block(&mut out, &self.body, 0)?;
        f.write_str(&out)
    }
}
