//! 関数テーブル
//!
//! コンテナ（モジュールのパス）ごとに関数名からシグネチャを引けるようにする。

use std::collections::HashMap;

use crate::ast::{ContainerPath, FunctionDecl, FunctionId, Span};
use crate::error::ResolveError;

/// 関数シグネチャ情報
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub id: FunctionId,
    pub name: String,
    pub arity: usize,
    pub returns_value: bool,
    pub container: ContainerPath,
    pub span: Span,
}

impl FunctionSignature {
    pub fn from_decl(decl: &FunctionDecl, container: &ContainerPath) -> Self {
        Self {
            id: decl.id,
            name: decl.name.clone(),
            arity: decl.params.len(),
            returns_value: decl.returns_value(),
            container: container.clone(),
            span: decl.span,
        }
    }
}

/// プログラム中の全関数
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    scopes: HashMap<Vec<String>, HashMap<String, FunctionId>>,
    signatures: HashMap<FunctionId, FunctionSignature>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 関数を登録する（同じコンテナに同名があればエラー）
    pub fn insert(&mut self, signature: FunctionSignature) -> Result<(), ResolveError> {
        let scope = self
            .scopes
            .entry(signature.container.segments.clone())
            .or_default();
        if scope.contains_key(&signature.name) {
            return Err(ResolveError::DuplicateFunction {
                name: signature.name.clone(),
                span: signature.span,
            });
        }
        scope.insert(signature.name.clone(), signature.id);
        self.signatures.insert(signature.id, signature);
        Ok(())
    }

    /// 内側のコンテナから外側へ向かって名前を探す
    pub fn lookup(&self, container: &[String], name: &str) -> Option<&FunctionSignature> {
        (0..=container.len()).rev().find_map(|depth| {
            self.scopes
                .get(&container[..depth])
                .and_then(|scope| scope.get(name))
                .and_then(|id| self.signatures.get(id))
        })
    }

    pub fn get(&self, id: FunctionId) -> Option<&FunctionSignature> {
        self.signatures.get(&id)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(id: u32, name: &str, segments: &[&str]) -> FunctionSignature {
        FunctionSignature {
            id: FunctionId(id),
            name: name.to_string(),
            arity: 1,
            returns_value: true,
            container: ContainerPath {
                segments: segments.iter().map(|s| s.to_string()).collect(),
                is_partial: true,
            },
            span: Span::dummy(),
        }
    }

    #[test]
    fn test_lookup_prefers_innermost_container() {
        let mut table = FunctionTable::new();
        table.insert(sig(0, "f", &[])).unwrap();
        table.insert(sig(1, "f", &["M"])).unwrap();
        table.insert(sig(2, "g", &[])).unwrap();

        let inner = vec!["M".to_string()];
        assert_eq!(table.lookup(&inner, "f").map(|s| s.id), Some(FunctionId(1)));
        assert_eq!(table.lookup(&inner, "g").map(|s| s.id), Some(FunctionId(2)));
        assert_eq!(table.lookup(&[], "f").map(|s| s.id), Some(FunctionId(0)));
        assert!(table.lookup(&[], "h").is_none());
    }

    #[test]
    fn test_duplicate_in_same_container() {
        let mut table = FunctionTable::new();
        table.insert(sig(0, "f", &["M"])).unwrap();
        let err = table.insert(sig(1, "f", &["M"]));
        assert!(matches!(err, Err(ResolveError::DuplicateFunction { .. })));
    }
}
