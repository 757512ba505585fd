//! パーサーテスト
//!
//! 属性・モジュール・複数宣言子など、変換に関わる構文の解析を検証する。

mod common;

use pretty_assertions::assert_eq;
use saferec::ast::*;
use saferec::lexer::Lexer;
use saferec::parser::{ParseError, Parser};

fn parse_source(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).collect_tokens();
    Parser::new(tokens).parse()
}

fn assert_parse_success(source: &str) -> Program {
    parse_source(source).expect("Parsing should succeed")
}

fn assert_parse_error(source: &str) {
    assert!(parse_source(source).is_err(), "Parsing should fail");
}

fn body_of(program: &Program, name: &str) -> Vec<Statement> {
    common::function(program, name).body.statements.clone()
}

#[test]
fn test_package_and_partial_module() {
    let program = assert_parse_success(
        r#"
        package demo;

        partial module Outer {
            module Inner {
                fn f() {}
            }
        }
        "#,
    );

    assert_eq!(program.package.as_ref().map(|p| p.name.as_str()), Some("demo"));
    let Item::Module(outer) = &program.items[0] else {
        panic!("expected a module");
    };
    assert!(outer.is_partial);
    let Item::Module(inner) = &outer.items[0] else {
        panic!("expected a nested module");
    };
    assert!(!inner.is_partial);

    let functions = program.functions();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].1.segments, vec!["Outer".to_string(), "Inner".to_string()]);
    assert!(!functions[0].1.is_partial);
}

#[test]
fn test_marker_attribute_arguments() {
    let program = assert_parse_success(
        r#"
        #[safe_recursion(name = "fast", access = pub, group = parity, expose = false, depth = 3)]
        protected internal fn f(n: int) -> int { return n; }
        "#,
    );
    let f = common::function(&program, "f");
    assert_eq!(f.visibility, Visibility::ProtectedInternal);

    let attr = f.attribute("safe_recursion").expect("marker");
    let values: Vec<(&str, &AttributeValue)> = attr.args.iter().map(|a| (a.key.as_str(), &a.value)).collect();
    assert_eq!(
        values,
        vec![
            ("name", &AttributeValue::Str("fast".to_string())),
            ("access", &AttributeValue::Ident("pub".to_string())),
            ("group", &AttributeValue::Ident("parity".to_string())),
            ("expose", &AttributeValue::Bool(false)),
            ("depth", &AttributeValue::Int(3)),
        ]
    );
}

#[test]
fn test_function_ids_follow_declaration_order() {
    let program = assert_parse_success(
        r#"
        fn a() {}
        partial module M {
            fn b() {}
            fn c() {}
        }
        fn d() {}
        "#,
    );
    let ids: Vec<(String, FunctionId)> = program
        .functions()
        .into_iter()
        .map(|(decl, _)| (decl.name.clone(), decl.id))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("a".to_string(), FunctionId(0)),
            ("b".to_string(), FunctionId(1)),
            ("c".to_string(), FunctionId(2)),
            ("d".to_string(), FunctionId(3)),
        ]
    );
}

#[test]
fn test_generic_signature_and_receiver() {
    let program = assert_parse_success("fn max<T: Ord + Copy, U>(this xs: [T], fallback: U) -> T { return fallback; }");
    let f = common::function(&program, "max");

    assert_eq!(f.type_params.len(), 2);
    assert_eq!(f.type_params[0].to_string(), "T: Ord + Copy");
    assert_eq!(f.type_params[1].to_string(), "U");
    assert!(f.params[0].is_receiver);
    assert_eq!(f.params[0].ty, Type::Array(Box::new(Type::Named("T".to_string()))));
    assert_eq!(f.return_type, Some(Type::Named("T".to_string())));
    assert!(f.is_generic());
}

#[test]
fn test_receiver_only_on_first_parameter() {
    assert_parse_error("fn f(a: int, this b: int) {}");
}

#[test]
fn test_multi_declarator_let() {
    let program = assert_parse_success("fn f() { let a: int = 1, b = g(a), c; }");
    let body = body_of(&program, "f");
    let Statement::Let(let_stmt) = &body[0] else {
        panic!("expected let");
    };

    assert_eq!(let_stmt.declarators.len(), 3);
    assert_eq!(let_stmt.declarators[0].ty, Some(Type::Int));
    assert!(matches!(let_stmt.declarators[1].init, Some(Expression::Call(_))));
    assert!(let_stmt.declarators[2].init.is_none());
    assert_eq!(body[0].to_string(), "let a: int = 1, b = g(a), c;");
}

#[test]
fn test_for_header_and_else_if() {
    let program = assert_parse_success(
        r#"
        fn f(n: int) -> int {
            for let i = 0; i < n; i += 1 {
                if i == 2 { return i; } else if i == 3 { return 0; } else { trace(i); }
            }
            return n;
        }
        "#,
    );
    let body = body_of(&program, "f");
    let Statement::For(for_stmt) = &body[0] else {
        panic!("expected for");
    };
    assert!(matches!(for_stmt.init.as_deref(), Some(Statement::Let(_))));
    assert!(matches!(
        for_stmt.update.as_deref(),
        Some(Statement::Assignment(AssignStatement {
            op: AssignOp::AddAssign,
            ..
        }))
    ));
    let Statement::If(if_stmt) = &for_stmt.body.statements[0] else {
        panic!("expected if");
    };
    assert!(matches!(if_stmt.else_branch, Some(ElseBranch::If(_))));
}

#[test]
fn test_try_catch_finally() {
    let program = assert_parse_success("fn f() { try { throw 1; } catch e { trace(e); } finally { trace(0); } }");
    let body = body_of(&program, "f");
    let Statement::Try(try_stmt) = &body[0] else {
        panic!("expected try");
    };
    assert_eq!(try_stmt.catch.as_ref().map(|c| c.binding.as_str()), Some("e"));
    assert!(try_stmt.finally.is_some());

    assert_parse_error("fn f() { try { throw 1; } }");
}

#[test]
fn test_operator_precedence_round_trips_through_display() {
    let program = assert_parse_success("fn f(a: int, b: int) -> int { return (a + b) * 2 - a % b - (a - b); }");
    let body = body_of(&program, "f");
    assert_eq!(body[0].to_string(), "return (a + b) * 2 - a % b - (a - b);");
}

#[test]
fn test_index_assignment_and_invalid_target() {
    let program = assert_parse_success("fn f(xs: [int]) { xs[0] = 1; }");
    assert!(matches!(
        body_of(&program, "f")[0],
        Statement::Assignment(AssignStatement {
            target: Expression::Index(_),
            ..
        })
    ));

    assert_parse_error("fn f() { g() = 1; }");
}

#[test]
fn test_attributes_rejected_on_modules() {
    assert_parse_error("#[safe_recursion] partial module M {}");
}

#[test]
fn test_missing_semicolon_is_error() {
    let err = parse_source("fn f() { let x = 1 }").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedToken { .. }), "{:?}", err);
}

#[test]
fn test_all_demos_parse() {
    for name in ["gcd", "sum", "fib", "parity", "tree_max", "dfs", "rejected"] {
        let source = common::demo_source(name);
        assert!(parse_source(&source).is_ok(), "demo {} should parse", name);
    }
}
