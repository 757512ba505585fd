//! 関数ごとの変換設定
//!
//! `#[safe_recursion(...)]` 属性の引数を `RecursionConfig` に読み替える。

use serde::{Deserialize, Serialize};

use crate::ast::{Attribute, AttributeValue, Visibility};
use crate::error::DiagnosticSink;

/// 変換対象を示すマーカー属性の名前
pub const MARKER_ATTRIBUTE: &str = "safe_recursion";

/// 生成されるエントリポイント名の既定の接尾辞
pub const GENERATED_NAME_SUFFIX: &str = "_safe_rec";

/// 生成されるエントリポイントの可視性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessLevel {
    /// 元の関数の修飾子をそのまま使う
    #[default]
    CopyExisting,
    Public,
    Protected,
    Internal,
    ProtectedInternal,
    Private,
}

impl AccessLevel {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "copy" | "copy_existing" => Some(AccessLevel::CopyExisting),
            "pub" | "public" => Some(AccessLevel::Public),
            "protected" => Some(AccessLevel::Protected),
            "internal" => Some(AccessLevel::Internal),
            "protected_internal" => Some(AccessLevel::ProtectedInternal),
            "private" => Some(AccessLevel::Private),
            _ => None,
        }
    }
}

/// 先頭パラメータをレシーバ（`this`）として公開するかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtensionMode {
    #[default]
    CopyExisting,
    ForceExtension,
    ForcePlain,
}

impl ExtensionMode {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "copy" | "copy_existing" => Some(ExtensionMode::CopyExisting),
            "force" | "extension" => Some(ExtensionMode::ForceExtension),
            "plain" | "usual" => Some(ExtensionMode::ForcePlain),
            _ => None,
        }
    }
}

/// 関数ごとの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursionConfig {
    pub generated_name: Option<String>,
    pub access: AccessLevel,
    pub extension: ExtensionMode,
    /// 空でなければ相互再帰グループのID
    pub group_id: Option<String>,
    /// グループ内でエントリポイントを公開するか（単独の関数では常に公開）
    pub expose_as_entry_point: bool,
}

impl Default for RecursionConfig {
    fn default() -> Self {
        Self {
            generated_name: None,
            access: AccessLevel::default(),
            extension: ExtensionMode::default(),
            group_id: None,
            expose_as_entry_point: true,
        }
    }
}

impl RecursionConfig {
    /// 属性から設定を読み取る。読めない引数は内部エラーとして報告し、既定値のまま進める
    pub fn from_attribute<S: DiagnosticSink>(attr: &Attribute, sink: &mut S) -> Self {
        let mut config = Self::default();

        for arg in &attr.args {
            let applied = match (arg.key.as_str(), &arg.value) {
                ("name", AttributeValue::Str(name)) | ("name", AttributeValue::Ident(name)) => {
                    config.generated_name = Some(name.clone()).filter(|n| !n.is_empty());
                    true
                }
                ("access", AttributeValue::Ident(name)) | ("access", AttributeValue::Str(name)) => {
                    AccessLevel::from_name(name)
                        .map(|access| config.access = access)
                        .is_some()
                }
                ("extension", AttributeValue::Ident(name))
                | ("extension", AttributeValue::Str(name)) => ExtensionMode::from_name(name)
                    .map(|mode| config.extension = mode)
                    .is_some(),
                ("group", AttributeValue::Str(id)) | ("group", AttributeValue::Ident(id)) => {
                    config.group_id = Some(id.clone()).filter(|id| !id.is_empty());
                    true
                }
                ("expose", AttributeValue::Bool(expose)) => {
                    config.expose_as_entry_point = *expose;
                    true
                }
                _ => false,
            };

            if !applied {
                sink.internal_error(
                    Some(arg.span),
                    format!(
                        "Unknown or ill-typed property '{}' on #[{}]",
                        arg.key, attr.name
                    ),
                );
            }
        }

        config
    }

    pub fn is_mutual(&self) -> bool {
        self.group_id.is_some()
    }

    /// 生成されるエントリポイントの名前
    pub fn entry_point_name(&self, original: &str) -> String {
        match &self.generated_name {
            Some(name) => name.clone(),
            None => format!("{}{}", original, GENERATED_NAME_SUFFIX),
        }
    }

    /// エントリポイントの可視性
    pub fn resolve_visibility(&self, original: Visibility) -> Visibility {
        match self.access {
            AccessLevel::CopyExisting => original,
            AccessLevel::Public => Visibility::Public,
            AccessLevel::Protected => Visibility::Protected,
            AccessLevel::Internal => Visibility::Internal,
            AccessLevel::ProtectedInternal => Visibility::ProtectedInternal,
            AccessLevel::Private => Visibility::Private,
        }
    }

    /// エントリポイントの先頭パラメータをレシーバにするか
    pub fn resolve_receiver(&self, original_is_receiver: bool) -> bool {
        match self.extension {
            ExtensionMode::CopyExisting => original_is_receiver,
            ExtensionMode::ForceExtension => true,
            ExtensionMode::ForcePlain => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeArg, Span};
    use crate::error::{DiagnosticKind, ErrorCollector};

    fn attr(args: Vec<(&str, AttributeValue)>) -> Attribute {
        Attribute {
            name: MARKER_ATTRIBUTE.to_string(),
            args: args
                .into_iter()
                .map(|(key, value)| AttributeArg {
                    key: key.to_string(),
                    value,
                    span: Span::dummy(),
                })
                .collect(),
            span: Span::dummy(),
        }
    }

    #[test]
    fn test_defaults() {
        let mut sink = ErrorCollector::new();
        let config = RecursionConfig::from_attribute(&attr(vec![]), &mut sink);
        assert_eq!(config, RecursionConfig::default());
        assert!(config.expose_as_entry_point);
        assert_eq!(config.entry_point_name("gcd"), "gcd_safe_rec");
        assert_eq!(config.resolve_visibility(Visibility::Internal), Visibility::Internal);
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_all_properties() {
        let mut sink = ErrorCollector::new();
        let config = RecursionConfig::from_attribute(
            &attr(vec![
                ("name", AttributeValue::Str("fast".to_string())),
                ("access", AttributeValue::Ident("protected_internal".to_string())),
                ("extension", AttributeValue::Ident("force".to_string())),
                ("group", AttributeValue::Str("g".to_string())),
                ("expose", AttributeValue::Bool(false)),
            ]),
            &mut sink,
        );
        assert_eq!(config.entry_point_name("f"), "fast");
        assert_eq!(config.access, AccessLevel::ProtectedInternal);
        assert!(config.resolve_receiver(false));
        assert_eq!(config.group_id.as_deref(), Some("g"));
        assert!(!config.expose_as_entry_point);
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_empty_group_means_simple_recursion() {
        let mut sink = ErrorCollector::new();
        let config = RecursionConfig::from_attribute(
            &attr(vec![("group", AttributeValue::Str(String::new()))]),
            &mut sink,
        );
        assert!(!config.is_mutual());
    }

    #[test]
    fn test_unknown_property_is_internal_error() {
        let mut sink = ErrorCollector::new();
        let config = RecursionConfig::from_attribute(
            &attr(vec![("colour", AttributeValue::Int(3))]),
            &mut sink,
        );
        assert_eq!(config, RecursionConfig::default());
        assert_eq!(sink.of_kind(DiagnosticKind::InternalError).count(), 1);
    }
}
