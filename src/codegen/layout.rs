//! 呼び出しフレームのレイアウト
//!
//! グループの各メンバーについて引数をまとめた呼び出しフレームを決め、
//! メンバーが複数あるグループでは判別子付きのディスパッチフレームを決める。

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analyzer::RecursionGroup;
use crate::ast::{
    Block, ElseBranch, FunctionId, IfStatement, Param, Statement, SuspendPacking, Type, TypeParam,
};
use crate::error::DiagnosticSink;

/// 呼び出しフレームの1フィールド（元の関数の引数1つ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameField {
    pub name: String,
    pub ty: Type,
}

/// 1つの関数の呼び出しフレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrameLayout {
    pub member: FunctionId,
    /// 元の関数名
    pub function: String,
    /// フレーム型の名前
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// 宣言順
    pub fields: Vec<FrameField>,
}

impl CallFrameLayout {
    fn from_params(
        member: FunctionId,
        function: &str,
        base: &str,
        type_params: &[TypeParam],
        params: &[Param],
    ) -> Self {
        Self {
            member,
            function: function.to_string(),
            name: format!("{}Frame", base),
            type_params: type_params.to_vec(),
            fields: params
                .iter()
                .map(|p| FrameField {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                })
                .collect(),
        }
    }

    pub fn is_plain_data(&self) -> bool {
        self.fields.iter().all(|f| f.ty.is_plain_data())
    }
}

/// ディスパッチフレームの表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchRepr {
    /// 判別子と重ね合わせたペイロード（非ジェネリックかつ単純データのみ）
    CompactUnion,
    /// 判別子ごとに別のペイロードを持つ安全な表現
    TaggedVariant,
}

/// ディスパッチフレームの1つのバリアント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchVariant {
    pub tag: u32,
    /// 判別子の列挙子名
    pub name: String,
    pub member: FunctionId,
    /// ペイロードの呼び出しフレーム名
    pub frame: String,
}

/// 相互再帰グループのディスパッチフレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFrameLayout {
    pub name: String,
    pub discriminant_enum: String,
    pub type_params: Vec<TypeParam>,
    pub variants: Vec<DispatchVariant>,
    pub repr: DispatchRepr,
}

/// グループ全体のレイアウト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub frames: Vec<CallFrameLayout>,
    pub dispatch: Option<DispatchFrameLayout>,
}

impl FrameLayout {
    /// レイアウトを決める。設定の誤りらしきものは警告して続行する
    pub fn build<S: DiagnosticSink>(group: &RecursionGroup<'_>, sink: &mut S) -> Self {
        let bases = type_name_bases(group);
        let frames: Vec<CallFrameLayout> = group
            .members
            .iter()
            .zip(&bases)
            .map(|(m, base)| {
                CallFrameLayout::from_params(m.id(), m.name(), base, &m.decl.type_params, &m.decl.params)
            })
            .collect();

        if group.is_mutual() && group.members.len() == 1 {
            let member = &group.members[0];
            sink.configuration_warning(
                member.marker_span,
                format!(
                    "Suspiciously only one method in the recursion group '{}': `{}`. Check the group id",
                    group.name(),
                    member.name()
                ),
            );
        }

        // 型パラメータの整合性は文字列で比べるだけ
        if let Some(first) = group.members.first() {
            let expected = first.generic_signature();
            for member in group.members.iter().skip(1) {
                let actual = member.generic_signature();
                if actual != expected {
                    sink.configuration_warning(
                        member.marker_span,
                        format!(
                            "Generic parameters of `{}` <{}> differ from `{}` <{}> in group '{}'",
                            member.name(),
                            actual,
                            first.name(),
                            expected,
                            group.name()
                        ),
                    );
                }
            }
        }

        let dispatch = (frames.len() > 1).then(|| {
            let generic = group.members.iter().any(|m| m.decl.is_generic());
            let repr = if !generic && frames.iter().all(CallFrameLayout::is_plain_data) {
                DispatchRepr::CompactUnion
            } else {
                DispatchRepr::TaggedVariant
            };
            let group_name = camel_case(&group.name());
            DispatchFrameLayout {
                name: format!("{}DispatchFrame", group_name),
                discriminant_enum: format!("{}CallSite", group_name),
                type_params: group
                    .members
                    .first()
                    .map(|m| m.decl.type_params.clone())
                    .unwrap_or_default(),
                variants: frames
                    .iter()
                    .zip(&bases)
                    .enumerate()
                    .map(|(tag, (frame, base))| DispatchVariant {
                        tag: tag as u32,
                        name: base.clone(),
                        member: frame.member,
                        frame: frame.name.clone(),
                    })
                    .collect(),
                repr,
            }
        });

        debug!(
            "{}: フレーム {} 個, ディスパッチ {:?}",
            group.name(),
            frames.len(),
            dispatch.as_ref().map(|d| d.repr)
        );

        Self { frames, dispatch }
    }

    pub fn frame_for(&self, member: FunctionId) -> Option<&CallFrameLayout> {
        self.frames.iter().find(|f| f.member == member)
    }

    /// メンバーの判別子。単独の関数は常に0
    pub fn tag_of(&self, member: FunctionId) -> Option<u32> {
        self.frames
            .iter()
            .position(|f| f.member == member)
            .map(|index| index as u32)
    }

    pub fn member_of_tag(&self, tag: u32) -> Option<FunctionId> {
        self.frames.get(tag as usize).map(|f| f.member)
    }

    /// `member` を呼ぶときに引数を詰めるフレーム
    pub fn packing_for(&self, member: FunctionId) -> Option<SuspendPacking> {
        let frame = self.frame_for(member)?;
        let dispatch = match &self.dispatch {
            Some(dispatch) => {
                let variant = dispatch.variants.iter().find(|v| v.member == member)?;
                Some((dispatch.name.clone(), variant.name.clone()))
            }
            None => None,
        };
        Some(SuspendPacking {
            frame: frame.name.clone(),
            dispatch,
        })
    }

    /// 書き換え後の本体にあるすべての `suspend` にフレームを書き込む
    pub fn pack_suspends(&self, block: &mut Block) {
        for stmt in &mut block.statements {
            self.pack_statement(stmt);
        }
    }

    fn pack_statement(&self, stmt: &mut Statement) {
        match stmt {
            Statement::Suspend(suspend) => suspend.packing = self.packing_for(suspend.target),
            Statement::If(if_stmt) => self.pack_if(if_stmt),
            Statement::While(while_stmt) => self.pack_suspends(&mut while_stmt.body),
            Statement::For(for_stmt) => self.pack_suspends(&mut for_stmt.body),
            Statement::Block(block) => self.pack_suspends(block),
            Statement::Try(try_stmt) => {
                self.pack_suspends(&mut try_stmt.body);
                if let Some(catch) = &mut try_stmt.catch {
                    self.pack_suspends(&mut catch.body);
                }
                if let Some(finally) = &mut try_stmt.finally {
                    self.pack_suspends(finally);
                }
            }
            _ => {}
        }
    }

    fn pack_if(&self, if_stmt: &mut IfStatement) {
        self.pack_suspends(&mut if_stmt.then_branch);
        match &mut if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.pack_suspends(block),
            Some(ElseBranch::If(nested)) => self.pack_if(nested),
            None => {}
        }
    }
}

/// メンバーごとの型名の元。`is_odd` と `isOdd` のように同じ名前になるものには
/// メンバーの番号を付ける
fn type_name_bases(group: &RecursionGroup<'_>) -> Vec<String> {
    let mut used = HashSet::new();
    group
        .members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let base = camel_case(member.name());
            let mut candidate = base.clone();
            let mut suffix = index;
            while used.contains(&candidate) {
                candidate = format!("{}{}", base, suffix);
                suffix += 1;
            }
            if candidate != base {
                debug!("`{}` の型名を {} にしました", member.name(), candidate);
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// `is_odd` → `IsOdd`
pub fn camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("is_odd"), "IsOdd");
        assert_eq!(camel_case("gcd"), "Gcd");
        assert_eq!(camel_case("tree__max_"), "TreeMax");
        assert_eq!(camel_case("sumSafe"), "SumSafe");
    }
}
