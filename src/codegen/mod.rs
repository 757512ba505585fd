//! Code generation module.
//!
//! Turns every recursion group into a `GeneratedUnit`: call frames, an
//! optional dispatch frame, a runner declaration holding the rewritten step
//! procedures, and the user-facing entry points.

mod entry_point;
mod layout;
mod printer;
mod rewriter;

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analyzer::{classify, collect_groups, RecursionGroup};
use crate::ast::{Block, ContainerPath, FunctionId, Param, Program, Type, TypeParam};
use crate::error::{DiagnosticSink, SafeRecError, TransformError};

pub use entry_point::{
    build_dispatcher, build_entry_points, result_slot_name, step_name, DispatchArm, Dispatcher, EntryPoint,
};
pub use layout::{
    camel_case, CallFrameLayout, DispatchFrameLayout, DispatchRepr, DispatchVariant, FrameField, FrameLayout,
};
pub use rewriter::{rewrite_body, StatementRewriter};

/// One value-returning member's result slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSlotDecl {
    pub member: FunctionId,
    pub name: String,
    pub ty: Type,
}

/// A rewritten function body, executed one resumable step at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProcedure {
    pub member: FunctionId,
    pub function: String,
    pub name: String,
    pub tag: u32,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub returns_value: bool,
    pub body: Block,
}

/// Per-group runner: the state shared by all step procedures of the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerDecl {
    pub name: String,
    pub result_slots: Vec<ResultSlotDecl>,
    pub steps: Vec<StepProcedure>,
    pub dispatcher: Option<Dispatcher>,
}

impl RunnerDecl {
    pub fn step_for_tag(&self, tag: u32) -> Option<&StepProcedure> {
        self.steps.iter().find(|step| step.tag == tag)
    }

    pub fn slot_for(&self, member: FunctionId) -> Option<&ResultSlotDecl> {
        self.result_slots.iter().find(|slot| slot.member == member)
    }
}

/// Everything generated for one recursion group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedUnit {
    pub group: String,
    pub container: ContainerPath,
    pub layout: FrameLayout,
    pub runner: RunnerDecl,
    pub entry_points: Vec<EntryPoint>,
}

impl GeneratedUnit {
    pub fn entry_point(&self, name: &str) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|entry| entry.name == name)
    }

    pub fn is_mutual(&self) -> bool {
        self.layout.dispatch.is_some()
    }
}

/// Drives classification, layout and rewriting for every group in a program.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        CodeGenerator
    }

    /// Generates every group that transforms cleanly. Failures stay local to
    /// their group and are reported to `sink`.
    pub fn generate_all<S: DiagnosticSink>(&self, program: &Program, sink: &mut S) -> Vec<GeneratedUnit> {
        let groups = collect_groups(program, sink);
        let mut units = Vec::with_capacity(groups.len());

        let mut claimed: EntryNames = program
            .functions()
            .into_iter()
            .map(|(decl, container)| {
                (
                    (container.segments, decl.name.clone()),
                    format!("the function `{}`", decl.name),
                )
            })
            .collect();

        for group in &groups {
            let name = group.name();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.generate_group(group, sink)));
            match outcome {
                Ok(Ok(Some(unit))) => match claim_entry_names(&unit, group, &mut claimed) {
                    Ok(()) => units.push(unit),
                    Err(err) => sink.report(SafeRecError::from(err).to_diagnostic()),
                },
                Ok(Ok(None)) => debug!("group '{}' skipped", name),
                Ok(Err(err)) => sink.report(SafeRecError::from(err).to_diagnostic()),
                Err(payload) => {
                    let detail = panic_detail(payload.as_ref());
                    warn!("transforming '{}' panicked: {}", name, detail);
                    sink.internal_error(
                        group.members.first().map(|m| m.marker_span),
                        format!("Internal error while transforming '{}': {}", name, detail),
                    );
                }
            }
        }

        info!("generated {} of {} group(s)", units.len(), groups.len());
        units
    }

    /// Generates one group. `Ok(None)` means a member could not be rewritten;
    /// the reasons were already reported to `sink`.
    pub fn generate_group<S: DiagnosticSink>(
        &self,
        group: &RecursionGroup<'_>,
        sink: &mut S,
    ) -> Result<Option<GeneratedUnit>, TransformError> {
        let first = group
            .members
            .first()
            .ok_or_else(|| TransformError::internal(format!("Group '{}' has no members", group.name())))?;

        if !group.container.is_partial {
            return Err(TransformError::Unsupported {
                message: format!(
                    "Target module '{}' for '{}' is not partial",
                    group.container,
                    first.name()
                ),
                span: first.marker_span,
            });
        }

        let layout = FrameLayout::build(group, sink);
        let targets = group.targets();

        let mut steps = Vec::with_capacity(group.members.len());
        let mut failed = false;
        for member in &group.members {
            let nodes = classify(member.decl, &targets, sink);
            match rewrite_body(member.decl, &nodes, &targets)? {
                Some(mut body) => {
                    layout.pack_suspends(&mut body);
                    let tag = layout
                        .tag_of(member.id())
                        .ok_or_else(|| TransformError::internal(format!("No discriminant for `{}`", member.name())))?;
                    steps.push(StepProcedure {
                        member: member.id(),
                        function: member.name().to_string(),
                        name: step_name(member.name()),
                        tag,
                        type_params: member.decl.type_params.clone(),
                        params: member.decl.params.clone(),
                        returns_value: member.decl.returns_value(),
                        body,
                    });
                }
                None => failed = true,
            }
        }
        if failed {
            return Ok(None);
        }

        let result_slots = group
            .members
            .iter()
            .filter_map(|member| {
                let ty = member.decl.return_type.clone().filter(|_| member.decl.returns_value())?;
                Some(ResultSlotDecl {
                    member: member.id(),
                    name: result_slot_name(member.name()),
                    ty,
                })
            })
            .collect();

        let entry_points = build_entry_points(group, &layout)?;
        let runner = RunnerDecl {
            name: format!("{}Runner", camel_case(&group.name())),
            result_slots,
            steps,
            dispatcher: build_dispatcher(&layout),
        };

        debug!(
            "group '{}': {} step(s), {} entry point(s)",
            group.name(),
            runner.steps.len(),
            entry_points.len()
        );

        Ok(Some(GeneratedUnit {
            group: group.name(),
            container: group.container.clone(),
            layout,
            runner,
            entry_points,
        }))
    }
}

/// (container path, name) -> what already owns the name
type EntryNames = HashMap<(Vec<String>, String), String>;

/// Entry points land next to the original functions, so their names must not
/// clash with a function or another entry point of the same container.
fn claim_entry_names(
    unit: &GeneratedUnit,
    group: &RecursionGroup<'_>,
    claimed: &mut EntryNames,
) -> Result<(), TransformError> {
    let mut local: HashSet<&str> = HashSet::new();
    for entry in &unit.entry_points {
        let key = (unit.container.segments.clone(), entry.name.clone());
        let owner = match claimed.get(&key) {
            Some(owner) => Some(owner.clone()),
            None if !local.insert(entry.name.as_str()) => {
                Some(format!("another entry point of group '{}'", unit.group))
            }
            None => None,
        };
        if let Some(owner) = owner {
            let message = format!(
                "Entry point `{}` for '{}' collides with {} in {}",
                entry.name, entry.function, owner, unit.container
            );
            let span = group
                .member(entry.member)
                .or_else(|| group.members.first())
                .map(|m| m.marker_span);
            return Err(match span {
                Some(span) => TransformError::Unsupported { message, span },
                None => TransformError::Internal { message, span: None },
            });
        }
    }

    for entry in &unit.entry_points {
        claimed.insert(
            (unit.container.segments.clone(), entry.name.clone()),
            format!("the entry point for '{}' in group '{}'", entry.function, unit.group),
        );
    }
    Ok(())
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
