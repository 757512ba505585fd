//! プログラムとトップレベルアイテムの定義

use serde::{Deserialize, Serialize};

use super::{FunctionDecl, FunctionId, Span};

/// Root node of the AST representing a complete source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub package: Option<PackageDecl>,
    pub items: Vec<Item>,
    pub span: Span,
}

/// パッケージ宣言
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDecl {
    pub name: String,
    pub span: Span,
}

/// トップレベル（またはモジュール内）のアイテム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionDecl),
    Module(ModuleDecl),
}

/// モジュール宣言
///
/// `partial module` だけが生成コードを受け入れられるコンテナになる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub name: String,
    pub is_partial: bool,
    pub items: Vec<Item>,
    pub span: Span,
}

/// 関数が置かれているコンテナの情報
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerPath {
    /// パッケージ直下なら空
    pub segments: Vec<String>,
    /// 最も内側のモジュールが partial かどうか（パッケージ直下は常に true）
    pub is_partial: bool,
}

impl ContainerPath {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            is_partial: true,
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, module: &ModuleDecl) -> Self {
        let mut segments = self.segments.clone();
        segments.push(module.name.clone());
        Self {
            segments,
            is_partial: module.is_partial,
        }
    }
}

impl std::fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            write!(f, "<package>")
        } else {
            write!(f, "{}", self.segments.join("::"))
        }
    }
}

impl Program {
    /// すべての関数をコンテナ情報付きで宣言順に列挙する
    pub fn functions(&self) -> Vec<(&FunctionDecl, ContainerPath)> {
        let mut out = Vec::new();
        collect_functions(&self.items, &ContainerPath::root(), &mut out);
        out
    }

    /// IDから関数を探す
    pub fn function(&self, id: FunctionId) -> Option<&FunctionDecl> {
        find_function(&self.items, id)
    }
}

fn collect_functions<'p>(
    items: &'p [Item],
    container: &ContainerPath,
    out: &mut Vec<(&'p FunctionDecl, ContainerPath)>,
) {
    for item in items {
        match item {
            Item::Function(func) => out.push((func, container.clone())),
            Item::Module(module) => collect_functions(&module.items, &container.child(module), out),
        }
    }
}

fn find_function(items: &[Item], id: FunctionId) -> Option<&FunctionDecl> {
    items.iter().find_map(|item| match item {
        Item::Function(func) if func.id == id => Some(func),
        Item::Function(_) => None,
        Item::Module(module) => find_function(&module.items, id),
    })
}
