//! エントリポイントとディスパッチャの生成
//!
//! 公開される関数ごとに、引数を呼び出しフレームに詰めてランナーを起動し、
//! 結果スロットの値を返す転送関数を作る。相互再帰グループでは
//! 判別子からステップ手続きへ振り分けるディスパッチャも作る。

use serde::{Deserialize, Serialize};

use crate::analyzer::{RecursionGroup, RecursiveFunction};
use crate::ast::{FunctionId, Param, Type, TypeParam, Visibility};
use crate::config::ExtensionMode;
use crate::error::TransformError;

use super::layout::FrameLayout;

/// 利用者向けの転送関数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub member: FunctionId,
    pub name: String,
    /// 元の関数名
    pub function: String,
    pub visibility: Visibility,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    /// 引数を詰める呼び出しフレーム
    pub frame: String,
    /// ディスパッチフレームの判別子
    pub tag: u32,
    /// 結果を読むスロット（値を返さない関数では None）
    pub result_slot: Option<String>,
}

/// ディスパッチャの1つの分岐
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchArm {
    pub tag: u32,
    pub variant: String,
    pub step: String,
}

/// 判別子からステップ手続きへの振り分け。どの分岐にも当たらない判別子は内部エラー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatcher {
    pub name: String,
    pub discriminant_enum: String,
    pub arms: Vec<DispatchArm>,
}

/// グループのエントリポイントを作る
///
/// メンバーが1つならそのメンバーは常に公開し、複数なら設定で公開を選んだものだけ
pub fn build_entry_points(
    group: &RecursionGroup<'_>,
    layout: &FrameLayout,
) -> Result<Vec<EntryPoint>, TransformError> {
    let single = group.members.len() == 1;
    group
        .members
        .iter()
        .filter(|member| single || member.config.expose_as_entry_point)
        .map(|member| build_entry_point(member, layout))
        .collect()
}

fn build_entry_point(member: &RecursiveFunction<'_>, layout: &FrameLayout) -> Result<EntryPoint, TransformError> {
    let decl = member.decl;
    if member.config.extension == ExtensionMode::ForceExtension && decl.params.is_empty() {
        return Err(TransformError::Unsupported {
            message: format!(
                "Cannot generate an extension entry point for `{}`: it has no parameters",
                decl.name
            ),
            span: member.marker_span,
        });
    }

    let params = decl
        .params
        .iter()
        .enumerate()
        .map(|(index, param)| Param {
            is_receiver: index == 0 && member.config.resolve_receiver(param.is_receiver),
            ..param.clone()
        })
        .collect();

    let frame = layout
        .frame_for(member.id())
        .ok_or_else(|| TransformError::internal(format!("No call frame for `{}`", decl.name)))?;
    let tag = layout
        .tag_of(member.id())
        .ok_or_else(|| TransformError::internal(format!("No discriminant for `{}`", decl.name)))?;

    Ok(EntryPoint {
        member: member.id(),
        name: member.entry_point_name(),
        function: decl.name.clone(),
        visibility: member.config.resolve_visibility(decl.visibility),
        type_params: decl.type_params.clone(),
        params,
        return_type: decl.return_type.clone(),
        frame: frame.name.clone(),
        tag,
        result_slot: decl.returns_value().then(|| result_slot_name(&decl.name)),
    })
}

/// 相互再帰グループのディスパッチャ
pub fn build_dispatcher(layout: &FrameLayout) -> Option<Dispatcher> {
    let dispatch = layout.dispatch.as_ref()?;
    Some(Dispatcher {
        name: "dispatch".to_string(),
        discriminant_enum: dispatch.discriminant_enum.clone(),
        arms: dispatch
            .variants
            .iter()
            .map(|variant| DispatchArm {
                tag: variant.tag,
                variant: variant.name.clone(),
                step: layout
                    .frame_for(variant.member)
                    .map(|frame| step_name(&frame.function))
                    .unwrap_or_default(),
            })
            .collect(),
    })
}

pub fn result_slot_name(function: &str) -> String {
    format!("{}_result", function)
}

pub fn step_name(function: &str) -> String {
    format!("{}_step", function)
}
