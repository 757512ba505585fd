//! 型定義

use serde::{Deserialize, Serialize};

/// 型の表現
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Bool,
    Str,
    Unit,
    Array(Box<Type>),
    /// ジェネリック型パラメータまたはユーザー定義名
    Named(String),
}

impl Type {
    /// 固定サイズでポインタを含まない型（コンパクトな共用体に詰められる）
    pub fn is_plain_data(&self) -> bool {
        matches!(self, Type::Int | Type::Bool | Type::Unit)
    }
}
