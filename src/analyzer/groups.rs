//! 再帰グループの発見
//!
//! マーカー属性の付いた関数を集め、グループIDを持たない関数は単独で、
//! グループIDを持つ関数は（コンテナ, ID）ごとにまとめる。

use indexmap::IndexMap;
use log::{debug, info};

use crate::ast::{ContainerPath, FunctionDecl, FunctionId, Program, Span};
use crate::config::{RecursionConfig, MARKER_ATTRIBUTE};
use crate::error::DiagnosticSink;

/// 変換対象の関数
#[derive(Debug, Clone)]
pub struct RecursiveFunction<'p> {
    pub decl: &'p FunctionDecl,
    pub config: RecursionConfig,
    pub container: ContainerPath,
    pub marker_span: Span,
}

impl<'p> RecursiveFunction<'p> {
    pub fn id(&self) -> FunctionId {
        self.decl.id
    }

    pub fn name(&self) -> &'p str {
        &self.decl.name
    }

    pub fn entry_point_name(&self) -> String {
        self.config.entry_point_name(&self.decl.name)
    }

    /// 型パラメータと制約の文字列表現（グループ内の整合性チェック用）
    pub fn generic_signature(&self) -> String {
        self.decl
            .type_params
            .iter()
            .map(|tp| tp.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// グループのキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Simple(FunctionId),
    Mutual { container: Vec<String>, id: String },
}

/// 一緒に変換される関数の集まり
#[derive(Debug, Clone)]
pub struct RecursionGroup<'p> {
    pub key: GroupKey,
    pub container: ContainerPath,
    pub members: Vec<RecursiveFunction<'p>>,
}

impl<'p> RecursionGroup<'p> {
    /// グループ名（相互再帰ならID、単独なら関数名）
    pub fn name(&self) -> String {
        match &self.key {
            GroupKey::Mutual { id, .. } => id.clone(),
            GroupKey::Simple(_) => self
                .members
                .first()
                .map(|m| m.decl.name.clone())
                .unwrap_or_default(),
        }
    }

    pub fn is_mutual(&self) -> bool {
        matches!(self.key, GroupKey::Mutual { .. })
    }

    pub fn member(&self, id: FunctionId) -> Option<&RecursiveFunction<'p>> {
        self.members.iter().find(|m| m.id() == id)
    }

    /// 分類器に渡すグループメンバーの一覧
    pub fn targets(&self) -> GroupMembers {
        GroupMembers {
            members: self
                .members
                .iter()
                .map(|m| {
                    (
                        m.id(),
                        MemberInfo {
                            name: m.decl.name.clone(),
                            returns_value: m.decl.returns_value(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// グループメンバーの情報
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub returns_value: bool,
}

/// グループに属する関数のID集合（発見順）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupMembers {
    members: IndexMap<FunctionId, MemberInfo>,
}

impl GroupMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: FunctionId, name: impl Into<String>, returns_value: bool) {
        self.members.insert(
            id,
            MemberInfo {
                name: name.into(),
                returns_value,
            },
        );
    }

    pub fn contains(&self, id: FunctionId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn get(&self, id: FunctionId) -> Option<&MemberInfo> {
        self.members.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.members.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// マーカー属性の付いた関数をグループにまとめる
pub fn collect_groups<'p, S: DiagnosticSink>(
    program: &'p Program,
    sink: &mut S,
) -> Vec<RecursionGroup<'p>> {
    let mut groups: IndexMap<GroupKey, RecursionGroup<'p>> = IndexMap::new();
    let mut simple_count = 0usize;

    for (decl, container) in program.functions() {
        let Some(marker) = decl.attribute(MARKER_ATTRIBUTE) else {
            continue;
        };
        let config = RecursionConfig::from_attribute(marker, sink);
        let key = match &config.group_id {
            Some(id) => GroupKey::Mutual {
                container: container.segments.clone(),
                id: id.clone(),
            },
            None => {
                simple_count += 1;
                GroupKey::Simple(decl.id)
            }
        };
        debug!("変換対象の関数: {} ({:?})", decl.name, key);

        let member = RecursiveFunction {
            decl,
            config,
            container: container.clone(),
            marker_span: marker.span,
        };
        groups
            .entry(key.clone())
            .or_insert_with(|| RecursionGroup {
                key,
                container,
                members: Vec::new(),
            })
            .members
            .push(member);
    }

    let mutual_count = groups.len() - simple_count;
    let message = format!(
        "Found {} function(s) for simple recursion and {} group(s) for mutual recursion",
        simple_count, mutual_count
    );
    info!("{}", message);
    sink.log(None, message);

    groups.into_values().collect()
}
