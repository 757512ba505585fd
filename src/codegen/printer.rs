//! 生成物のテキスト表示
//!
//! 元の言語に `suspend` / `suspend return` / `result(f)` を加えた形で書き出す。

use std::fmt::{self, Write};

use crate::ast::{write_block, write_signature, Visibility};

use super::{DispatchRepr, GeneratedUnit};

const INDENT: &str = "    ";

fn type_params_text(params: &[crate::ast::TypeParam]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        let joined = params.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
        format!("<{}>", joined)
    }
}

impl GeneratedUnit {
    fn write_frames(&self, out: &mut String) -> fmt::Result {
        for frame in &self.layout.frames {
            writeln!(out, "struct {}{} {{", frame.name, type_params_text(&frame.type_params))?;
            for field in &frame.fields {
                writeln!(out, "{}{}: {},", INDENT, field.name, field.ty)?;
            }
            writeln!(out, "}}")?;
            writeln!(out)?;
        }

        if let Some(dispatch) = &self.layout.dispatch {
            writeln!(out, "enum {} {{", dispatch.discriminant_enum)?;
            for variant in &dispatch.variants {
                writeln!(out, "{}{} = {},", INDENT, variant.name, variant.tag)?;
            }
            writeln!(out, "}}")?;
            writeln!(out)?;

            let keyword = match dispatch.repr {
                DispatchRepr::CompactUnion => "union",
                DispatchRepr::TaggedVariant => "variant",
            };
            writeln!(
                out,
                "{} {}{} {{",
                keyword,
                dispatch.name,
                type_params_text(&dispatch.type_params)
            )?;
            writeln!(out, "{}call_site: {},", INDENT, dispatch.discriminant_enum)?;
            for variant in &dispatch.variants {
                writeln!(out, "{}{}({}),", INDENT, variant.name, variant.frame)?;
            }
            writeln!(out, "}}")?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_runner(&self, out: &mut String) -> fmt::Result {
        let runner = &self.runner;
        writeln!(out, "runner {} {{", runner.name)?;
        for slot in &runner.result_slots {
            writeln!(out, "{}{}: {};", INDENT, slot.name, slot.ty)?;
        }

        for step in &runner.steps {
            writeln!(out)?;
            write!(out, "{}", INDENT)?;
            write_signature(
                out,
                Visibility::Private,
                &step.name,
                &step.type_params,
                &step.params,
                None,
            )?;
            write!(out, " ")?;
            write_block(out, &step.body, 1)?;
            writeln!(out)?;
        }

        if let (Some(dispatcher), Some(dispatch)) = (&runner.dispatcher, &self.layout.dispatch) {
            writeln!(out)?;
            writeln!(out, "{}fn {}(frame: {}) {{", INDENT, dispatcher.name, dispatch.name)?;
            writeln!(out, "{0}{0}match frame.call_site {{", INDENT)?;
            for arm in &dispatcher.arms {
                writeln!(
                    out,
                    "{0}{0}{0}{1}::{2} => {3}(frame.{2}),",
                    INDENT, dispatcher.discriminant_enum, arm.variant, arm.step
                )?;
            }
            writeln!(out, "{0}{0}{0}_ => bad_dispatch(frame.call_site),", INDENT)?;
            writeln!(out, "{0}{0}}}", INDENT)?;
            writeln!(out, "{}}}", INDENT)?;
        }
        writeln!(out, "}}")
    }

    fn write_entry_points(&self, out: &mut String) -> fmt::Result {
        for entry in &self.entry_points {
            writeln!(out)?;
            write_signature(
                out,
                entry.visibility,
                &entry.name,
                &entry.type_params,
                &entry.params,
                entry.return_type.as_ref(),
            )?;
            writeln!(out, " {{")?;

            let args = entry
                .params
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let frame = match &self.layout.dispatch {
                Some(dispatch) => {
                    let variant = dispatch
                        .variants
                        .iter()
                        .find(|v| v.tag == entry.tag)
                        .map(|v| v.name.as_str())
                        .unwrap_or_default();
                    format!("{}::{}({}({}))", dispatch.name, variant, entry.frame, args)
                }
                None => format!("{}({})", entry.frame, args),
            };
            writeln!(out, "{}let runner = {}();", INDENT, self.runner.name)?;
            writeln!(out, "{}runner.run_recursion({});", INDENT, frame)?;
            if let Some(slot) = &entry.result_slot {
                writeln!(out, "{}return runner.{};", INDENT, slot)?;
            }
            writeln!(out, "}}")?;
        }
        Ok(())
    }
}

impl fmt::Display for GeneratedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        writeln!(out, "// recursion group '{}' in {}", self.group, self.container)?;
        writeln!(out)?;
        self.write_frames(&mut out)?;
        self.write_runner(&mut out)?;
        self.write_entry_points(&mut out)?;
        f.write_str(&out)
    }
}
