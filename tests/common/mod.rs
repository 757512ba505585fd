//! 統合テストの共通ヘルパー
//!
//! ソース文字列から変換パイプラインを通し、元の関数と生成物の両方を
//! 実行できるようにする。

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use saferec::analyzer::{collect_groups, Resolver};
use saferec::ast::{FunctionDecl, Program};
use saferec::codegen::GeneratedUnit;
use saferec::compiler::{CompilationOutput, CompilationPipeline};
use saferec::error::{DiagnosticKind, ErrorCollector};
use saferec::lexer::Lexer;
use saferec::parser::Parser;
use saferec::runtime::{self, RunOutcome, Value, DEFAULT_MAX_CALL_DEPTH};

/// パイプラインの成果物と診断
pub struct Transformed {
    pub output: CompilationOutput,
    pub diagnostics: ErrorCollector,
}

impl Transformed {
    pub fn program(&self) -> &Program {
        &self.output.program
    }

    pub fn units(&self) -> &[GeneratedUnit] {
        &self.output.units
    }

    /// グループ名で生成物を探す
    pub fn unit(&self, group: &str) -> &GeneratedUnit {
        self.output
            .units
            .iter()
            .find(|unit| unit.group == group)
            .unwrap_or_else(|| panic!("no generated unit for group '{}'", group))
    }

    pub fn messages(&self, kind: DiagnosticKind) -> Vec<String> {
        self.diagnostics.of_kind(kind).map(|d| d.message.clone()).collect()
    }

    pub fn run_direct(&self, function: &str, args: Vec<Value>) -> RunOutcome {
        runtime::run_direct(self.program(), function, args, DEFAULT_MAX_CALL_DEPTH)
            .unwrap_or_else(|e| panic!("direct run of {} failed: {}", function, e))
    }

    pub fn run_generated(&self, entry_point: &str, args: Vec<Value>) -> RunOutcome {
        runtime::run_generated(self.program(), self.units(), entry_point, args)
            .unwrap_or_else(|e| panic!("generated run of {} failed: {}", entry_point, e))
    }
}

/// ソースを変換する。字句・構文・名前解決のエラーがあれば panic
pub fn transform(source: &str) -> Transformed {
    let mut pipeline = CompilationPipeline::from_source("test.rec", source);
    let output = pipeline.process();
    let diagnostics = pipeline.diagnostics().clone();
    match output {
        Some(output) => Transformed { output, diagnostics },
        None => panic!(
            "front end failed:\n{}",
            pipeline.state().render_diagnostics().unwrap_or_default()
        ),
    }
}

/// 名前解決まで済ませたプログラム
pub fn resolved(source: &str) -> Program {
    let tokens = Lexer::new(source).collect_tokens();
    let mut program = Parser::new(tokens).parse().expect("Parsing should succeed");
    Resolver::new()
        .resolve(&mut program)
        .unwrap_or_else(|errors| panic!("resolve failed: {:?}", errors));
    program
}

/// 名前で関数宣言を探す
pub fn function<'p>(program: &'p Program, name: &str) -> &'p FunctionDecl {
    program
        .functions()
        .into_iter()
        .map(|(decl, _)| decl)
        .find(|decl| decl.name == name)
        .unwrap_or_else(|| panic!("no function named {}", name))
}

/// 診断を捨ててグループを集めるときの数
pub fn group_count(program: &Program) -> usize {
    collect_groups(program, &mut ErrorCollector::new()).len()
}

pub fn demo_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(format!("{}.rec", name))
}

pub fn demo_source(name: &str) -> String {
    fs::read_to_string(demo_path(name)).unwrap_or_else(|e| panic!("cannot read demo {}: {}", name, e))
}

pub fn int(n: i64) -> Value {
    Value::Int(n)
}

pub fn ints(values: &[i64]) -> Value {
    Value::array(values.iter().copied().map(Value::Int).collect())
}
