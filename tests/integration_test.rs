//! 統合テスト
//!
//! ファイルからの読み込み、診断の表示、生成物のシリアライズまで
//! パイプライン全体を通して確認する。

mod common;

use std::io::Write;

use pretty_assertions::assert_eq;
use saferec::codegen::GeneratedUnit;
use saferec::compiler::{CompilationPipeline, CompilationState};
use saferec::error::{DiagnosticKind, Severity};
use tempfile::NamedTempFile;
use test_case::test_case;

fn source_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temporary file");
    file.write_all(source.as_bytes()).expect("write source");
    file
}

#[test]
fn test_pipeline_from_file() {
    let file = source_file(&common::demo_source("gcd"));

    let state = CompilationState::new(file.path()).expect("source should load");
    let mut pipeline = CompilationPipeline::new(state);
    let output = pipeline.process().expect("front end should succeed");

    assert!(!pipeline.state().has_errors());
    assert_eq!(output.units.len(), 1);
    assert_eq!(output.units[0].group, "gcd");
    assert_eq!(output.functions.len(), 1);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let result = CompilationState::new(dir.path().join("absent.rec"));
    assert!(result.is_err());
}

#[test]
fn test_lexer_error_stops_before_transform() {
    let mut pipeline = CompilationPipeline::from_source("bad.rec", "fn f() { let x = 1; @ }");

    assert!(pipeline.process().is_none());
    let errors = pipeline.diagnostics().errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Frontend);

    let rendered = pipeline.state().render_diagnostics().expect("render");
    assert!(rendered.contains("error[SR1]"), "{}", rendered);
    assert!(rendered.contains("bad.rec"), "{}", rendered);
}

#[test]
fn test_resolve_error_stops_before_transform() {
    let mut pipeline = CompilationPipeline::from_source("bad.rec", "#[safe_recursion] fn f() { g(); }");

    assert!(pipeline.process().is_none());
    assert!(pipeline.state().has_errors());
}

#[test]
fn test_unsupported_call_is_rendered_with_code() {
    let mut pipeline = CompilationPipeline::from_source("rejected.rec", common::demo_source("rejected"));
    let output = pipeline.process().expect("front end should succeed");

    let groups: Vec<&str> = output.units.iter().map(|unit| unit.group.as_str()).collect();
    assert_eq!(groups, vec!["countdown_ok"]);

    let rendered = pipeline.state().render_diagnostics().expect("render");
    assert!(rendered.contains("error[SR2]"), "{}", rendered);
    assert!(rendered.contains("countdown(n - 1)"), "{}", rendered);
}

#[test_case("gcd", 1, 0 ; "gcd")]
#[test_case("sum", 1, 0 ; "sum")]
#[test_case("fib", 1, 0 ; "fib")]
#[test_case("parity", 1, 0 ; "parity")]
#[test_case("tree_max", 1, 0 ; "tree max")]
#[test_case("dfs", 1, 0 ; "dfs")]
#[test_case("rejected", 1, 1 ; "rejected")]
fn test_check_demos(name: &str, units: usize, errors: usize) {
    let t = common::transform(&common::demo_source(name));

    assert_eq!(t.units().len(), units);
    assert_eq!(t.diagnostics.error_count(), errors);
    assert_eq!(t.diagnostics.warning_count(), 0);
}

#[test]
fn test_warnings_do_not_block_generation() {
    let t = common::transform(
        r#"
        #[safe_recursion(group = "lonely")]
        fn f(n: int) -> int {
            if n == 0 {
                throw "done";
            }
            let x = f(n - 1);
            return x;
        }
        "#,
    );

    assert_eq!(t.units().len(), 1);
    assert!(!t.diagnostics.has_errors());
    assert!(t
        .diagnostics
        .warnings()
        .iter()
        .all(|d| d.severity == Severity::Warning));
    assert_eq!(t.messages(DiagnosticKind::ConfigurationWarning).len(), 1);
    assert_eq!(t.messages(DiagnosticKind::SyntaxWarning).len(), 1);
}

#[test]
fn test_progress_is_logged() {
    let t = common::transform(&common::demo_source("parity"));

    let logs = t.messages(DiagnosticKind::Log);
    assert!(
        logs.iter()
            .any(|m| m == "Found 0 function(s) for simple recursion and 1 group(s) for mutual recursion"),
        "{:?}",
        logs
    );
}

#[test]
fn test_units_serialize_to_json() {
    let t = common::transform(&common::demo_source("dfs"));

    let json = serde_json::to_string_pretty(t.units()).expect("serialize");
    let units: Vec<GeneratedUnit> = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(units, t.units());
    assert!(json.contains("\"visit_safe_rec\""));
}

#[test]
fn test_listing_for_every_unit() {
    let t = common::transform(&common::demo_source("parity"));
    let listing: String = t.units().iter().map(|unit| unit.to_string()).collect();

    assert!(listing.starts_with("// recursion group 'parity' in Parity"), "{}", listing);
    assert!(listing.contains("fn is_odd_safe_rec("), "{}", listing);
    assert!(listing.contains("fn is_even_safe_rec("), "{}", listing);
}
