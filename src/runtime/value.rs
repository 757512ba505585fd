//! 実行時の値と、CLI 引数用の値リテラルパーサー

use std::fmt;
use std::sync::Arc;

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag};
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value as constant};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;
use thiserror::Error;

/// 実行時の値
///
/// 値はすべて値渡しのセマンティクスを持つ。配列と文字列は共有され、
/// 変更時にだけ複製される。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Int(i64),
    Bool(bool),
    Str(Arc<String>),
    Array(Arc<Vec<Value>>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::new(s.to_string()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Arc::new(values))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// 値リテラルの解析エラー
#[derive(Error, Debug, Clone, PartialEq)]
#[error("不正な値リテラル: '{input}'")]
pub struct ValueParseError {
    pub input: String,
}

/// `42`, `-3`, `true`, `"text"`, `[1, [2]]`, `()` を値として解析する
pub fn parse_value(input: &str) -> Result<Value, ValueParseError> {
    all_consuming(value_literal)(input)
        .map(|(_, value)| value)
        .map_err(|_| ValueParseError {
            input: input.to_string(),
        })
}

fn value_literal(input: &str) -> IResult<&str, Value> {
    delimited(
        multispace0,
        alt((array_literal, string_literal, bool_literal, int_literal, unit_literal)),
        multispace0,
    )(input)
}

fn int_literal(input: &str) -> IResult<&str, Value> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>().map(Value::Int)
    })(input)
}

fn bool_literal(input: &str) -> IResult<&str, Value> {
    alt((
        constant(Value::Bool(true), tag("true")),
        constant(Value::Bool(false), tag("false")),
    ))(input)
}

fn unit_literal(input: &str) -> IResult<&str, Value> {
    constant(Value::Unit, tag("()"))(input)
}

fn string_literal(input: &str) -> IResult<&str, Value> {
    let body = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((
            constant("\\", tag("\\")),
            constant("\"", tag("\"")),
            constant("\n", tag("n")),
            constant("\t", tag("t")),
        )),
    );
    map(delimited(char('"'), opt(body), char('"')), |s: Option<String>| {
        Value::str(&s.unwrap_or_default())
    })(input)
}

fn array_literal(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('['),
            separated_list0(char(','), value_literal),
            preceded(multispace0, char(']')),
        ),
        Value::array,
    )(input)
}
