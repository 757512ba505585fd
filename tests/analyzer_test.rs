//! 解析パスのテスト
//!
//! 名前解決、再帰グループの発見、呼び出し箇所の分類を検証する。

mod common;

use pretty_assertions::assert_eq;
use saferec::analyzer::{classify, collect_groups, CallSiteKind, GroupKey, NodesToReplace, Resolver};
use saferec::ast::*;
use saferec::error::{DiagnosticKind, ErrorCollector, ResolveError};
use saferec::lexer::Lexer;
use saferec::parser::Parser;
use test_case::test_case;

/// 最初のグループの `name` を分類する
fn classify_member(source: &str, name: &str) -> (NodesToReplace, ErrorCollector) {
    let program = common::resolved(source);
    let mut sink = ErrorCollector::new();
    let groups = collect_groups(&program, &mut sink);
    let group = groups
        .iter()
        .find(|g| g.members.iter().any(|m| m.name() == name))
        .expect("function should be in a group");
    let member = group.members.iter().find(|m| m.name() == name).expect("member");
    let nodes = classify(member.decl, &group.targets(), &mut sink);
    (nodes, sink)
}

fn resolve_errors(source: &str) -> Vec<ResolveError> {
    let tokens = Lexer::new(source).collect_tokens();
    let mut program = Parser::new(tokens).parse().expect("Parsing should succeed");
    match Resolver::new().resolve(&mut program) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    }
}

mod resolver {
    use super::*;
    use pretty_assertions::assert_eq;
    #[allow(unused_imports)]
    use test_case::test_case;

    #[test]
    fn test_calls_resolve_to_innermost_module() {
        let program = common::resolved(
            r#"
            fn f() -> int { return 0; }
            partial module M {
                fn f() -> int { return 1; }
                fn g() -> int { return f(); }
            }
            fn h() -> int { return f(); }
            "#,
        );
        let target_of = |name: &str| {
            let Statement::Return(ret) = &common::function(&program, name).body.statements[0] else {
                panic!("expected return");
            };
            ret.value.as_ref().and_then(|v| v.as_call()).map(|c| c.target)
        };
        assert_eq!(target_of("g"), Some(CallTarget::Function(FunctionId(1))));
        assert_eq!(target_of("h"), Some(CallTarget::Function(FunctionId(0))));
    }

    #[test]
    fn test_user_functions_shadow_builtins() {
        let program = common::resolved(
            r#"
            fn len(x: int) -> int { return x; }
            fn f() -> int { return len(3); }
            fn g(xs: [int]) { trace(xs); }
            "#,
        );
        let Statement::Return(ret) = &common::function(&program, "f").body.statements[0] else {
            panic!("expected return");
        };
        let call = ret.value.as_ref().and_then(|v| v.as_call()).expect("call");
        assert_eq!(call.target, CallTarget::Function(FunctionId(0)));

        let Statement::Expression(Expression::Call(trace)) = &common::function(&program, "g").body.statements[0] else {
            panic!("expected call statement");
        };
        assert_eq!(trace.target, CallTarget::Builtin(Builtin::Trace));
    }

    #[test]
    fn test_resolution_errors_are_collected() {
        let errors = resolve_errors(
            r#"
            fn f(n: int) -> int { return missing(n) + f(n, n); }
            fn f() {}
            "#,
        );
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors.iter().any(|e| matches!(e, ResolveError::DuplicateFunction { name, .. } if name == "f")));
        assert!(errors.iter().any(|e| matches!(e, ResolveError::UndefinedFunction { name, .. } if name == "missing")));
        assert!(errors.iter().any(|e| matches!(e, ResolveError::ArgumentCountMismatch { expected: 1, found: 2, .. })));
    }

    #[test]
    fn test_same_name_in_different_modules_is_allowed() {
        assert!(resolve_errors("partial module A { fn f() {} } partial module B { fn f() {} }").is_empty());
    }
}

mod groups {
    use super::*;
    use pretty_assertions::assert_eq;
    #[allow(unused_imports)]
    use test_case::test_case;

    #[test]
    fn test_simple_and_mutual_groups() {
        let program = common::resolved(
            r#"
            #[safe_recursion]
            fn a(n: int) -> int { return n; }

            partial module M {
                #[safe_recursion(group = "g")]
                fn b(n: int) -> int { return c(n); }
                fn plain() {}
                #[safe_recursion(group = "g")]
                fn c(n: int) -> int { return b(n); }
                #[safe_recursion]
                fn d(n: int) -> int { return n; }
            }

            partial module N {
                #[safe_recursion(group = "g")]
                fn e(n: int) -> int { return n; }
            }
            "#,
        );
        let mut sink = ErrorCollector::new();
        let groups = collect_groups(&program, &mut sink);

        let summary: Vec<(String, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.name(), g.members.iter().map(|m| m.name()).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a".to_string(), vec!["a"]),
                ("g".to_string(), vec!["b", "c"]),
                ("d".to_string(), vec!["d"]),
                ("g".to_string(), vec!["e"]),
            ]
        );
        assert_eq!(
            groups[1].key,
            GroupKey::Mutual {
                container: vec!["M".to_string()],
                id: "g".to_string()
            }
        );
        assert!(groups[1].is_mutual());
        assert!(!groups[2].is_mutual());

        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(
            logs[0].message,
            "Found 2 function(s) for simple recursion and 2 group(s) for mutual recursion"
        );
        assert_eq!(logs[0].kind.code(), "SRLog");
    }

    #[test]
    fn test_unmarked_program_has_no_groups() {
        let program = common::resolved("fn f(n: int) -> int { return f(n); }");
        assert_eq!(common::group_count(&program), 0);
    }

    #[test]
    fn test_unknown_marker_property_is_reported() {
        let program = common::resolved("#[safe_recursion(colour = 3)] fn f(n: int) -> int { return f(n); }");
        let mut sink = ErrorCollector::new();
        let groups = collect_groups(&program, &mut sink);

        assert_eq!(groups.len(), 1);
        let internal: Vec<_> = sink.of_kind(DiagnosticKind::InternalError).collect();
        assert_eq!(internal.len(), 1);
        assert!(internal[0].message.contains("'colour'"));
    }
}

mod classifier {
    use super::*;
    use pretty_assertions::assert_eq;
    #[allow(unused_imports)]
    use test_case::test_case;

    #[test]
    fn test_all_call_site_kinds() {
        let (nodes, sink) = classify_member(
            r#"
            #[safe_recursion]
            fn f(n: int) -> int {
                if n <= 0 {
                    return 0;
                }
                f(n - 1);
                let x = 1, y = f(n - 1), z = x;
                y = f(n - 2);
                return f(n - 3);
            }
            "#,
            "f",
        );

        assert!(!nodes.contains_critical_failure);
        assert!(!sink.has_errors());
        let kinds: Vec<(usize, CallSiteKind)> = nodes.call_sites.iter().map(|s| (s.statement, s.kind)).collect();
        // 0: if, 1: return 0, 2: f(), 3: let, 4: y =, 5: return f()
        assert_eq!(
            kinds,
            vec![
                (2, CallSiteKind::VoidCall),
                (3, CallSiteKind::Declaration { declarator: 1 }),
                (4, CallSiteKind::Assignment),
                (5, CallSiteKind::ReturnCall),
            ]
        );
        assert_eq!(nodes.returns.len(), 1);
        assert_eq!(nodes.returns[0].statement, 1);
        assert!(nodes.returns[0].has_value);
    }

    #[test]
    fn test_ordinals_cover_for_headers_else_if_and_try() {
        let (nodes, _) = classify_member(
            r#"
            #[safe_recursion]
            fn f(n: int) -> int {
                for let i = 0; i < n; i += 1 {
                    f(i);
                }
                if n == 1 {
                    f(1);
                } else if n == 2 {
                    f(2);
                } else {
                    f(3);
                }
                try {
                    f(4);
                } catch e {
                    f(5);
                } finally {
                    f(6);
                }
                return 0;
            }
            "#,
            "f",
        );
        let ordinals: Vec<usize> = nodes.call_sites.iter().map(|s| s.statement).collect();
        // for=0 init=1 update=2 body=3 | if=4 then=5 (else if) then=6 else=7 | try=8 body=9 catch=10 finally=11 | return=12
        assert_eq!(ordinals, vec![3, 5, 6, 7, 9, 10, 11]);
        assert_eq!(nodes.returns[0].statement, 12);
    }

    #[test_case("if f(n - 1) > 0 { return 1; }", "operand of a binary expression" ; "call in if condition")]
    #[test_case("while f(n - 1) { n = n - 1; }", "while condition" ; "call as while condition")]
    #[test_case("let x = -f(n - 1);", "operand of a unary expression" ; "call under negation")]
    #[test_case("let x = [1, 2][f(n - 1)];", "index" ; "call as index")]
    #[test_case("let x = abs(f(n - 1));", "argument of a call" ; "call as argument")]
    #[test_case("let xs = [f(n - 1)];", "array element" ; "call in array literal")]
    #[test_case("trace(f(n - 1));", "argument of a call" ; "call as builtin argument")]
    fn test_nested_call_is_hard_failure(statement: &str, location: &str) {
        let source = format!(
            "#[safe_recursion] fn f(n: int) -> int {{ if n <= 0 {{ return 0; }} {} return 0; }}",
            statement
        );
        let (nodes, sink) = classify_member(&source, "f");

        assert!(nodes.contains_critical_failure);
        let errors: Vec<_> = sink.of_kind(DiagnosticKind::UnsupportedSyntax).collect();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(
            errors[0].message.contains(location),
            "message `{}` should mention {}",
            errors[0].message,
            location
        );
        assert_eq!(errors[0].kind.code(), "SR2");
    }

    #[test]
    fn test_for_header_call_is_hard_failure() {
        let (nodes, sink) = classify_member(
            "#[safe_recursion] fn f(n: int) -> int { for let i = f(n); i < n; i += 1 { } return 0; }",
            "f",
        );
        assert!(nodes.contains_critical_failure);
        assert!(sink.errors()[0].message.contains("not in a `for` header"));
    }

    #[test]
    fn test_compound_assignment_is_hard_failure() {
        let (nodes, sink) = classify_member(
            "#[safe_recursion] fn f(n: int) -> int { let x = 0; x += f(n - 1); return x; }",
            "f",
        );
        assert!(nodes.contains_critical_failure);
        assert!(sink.errors()[0].message.contains("compound assignment"));
    }

    #[test]
    fn test_yield_is_hard_failure() {
        let (nodes, sink) = classify_member("#[safe_recursion] fn f(n: int) { yield n; f(n); }", "f");
        assert!(nodes.contains_critical_failure);
        assert!(sink.errors()[0].message.starts_with("yield inside recursive functions"));
    }

    #[test]
    fn test_using_result_of_void_member_is_hard_failure() {
        let (nodes, sink) = classify_member(
            r#"
            partial module M {
                #[safe_recursion(group = "g")]
                fn a(n: int) -> int { let x = b(n); return x; }
                #[safe_recursion(group = "g")]
                fn b(n: int) { a(n); }
            }
            "#,
            "a",
        );
        assert!(nodes.contains_critical_failure);
        assert_eq!(
            sink.errors()[0].message,
            "Result of `b` is used but it does not return a value"
        );
    }

    #[test]
    fn test_exceptions_only_warn() {
        let (nodes, sink) = classify_member(
            r#"
            #[safe_recursion]
            fn f(n: int) -> int {
                try {
                    throw n;
                } catch e {
                    return e;
                } finally {
                    trace(n);
                }
                return 0;
            }
            "#,
            "f",
        );
        assert!(!nodes.contains_critical_failure);
        assert!(!sink.has_errors());
        let warnings: Vec<_> = sink.of_kind(DiagnosticKind::SyntaxWarning).collect();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.message.starts_with("Throwing and catching exceptions is not fully supported yet")));
        assert_eq!(warnings[0].kind.code(), "SR3");
    }

    #[test]
    fn test_calls_outside_the_group_are_ignored() {
        let (nodes, _) = classify_member(
            r#"
            fn helper(n: int) -> int { return n; }
            #[safe_recursion]
            fn f(n: int) -> int {
                if helper(n) > 0 { return helper(n) + 1; }
                return 0;
            }
            "#,
            "f",
        );
        assert!(!nodes.contains_critical_failure);
        assert!(nodes.call_sites.is_empty());
        assert_eq!(nodes.returns.len(), 2);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let source = common::demo_source("tree_max");
        let (first, _) = classify_member(&source, "tree_max");
        let (second, _) = classify_member(&source, "tree_max");
        assert_eq!(first, second);
        assert_eq!(first.count(CallSiteKind::Declaration { declarator: 1 }), 1);
        assert_eq!(first.count(CallSiteKind::Declaration { declarator: 2 }), 1);

        // 同じ宣言に対して同じ入力で二度走らせても結果は変わらない
        let program = common::resolved(&source);
        let mut sink = ErrorCollector::new();
        let groups = collect_groups(&program, &mut sink);
        let member = &groups[0].members[0];
        let targets = groups[0].targets();
        let again = classify(member.decl, &targets, &mut sink);
        let once_more = classify(member.decl, &targets, &mut sink);
        assert_eq!(again, once_more);
    }
}
