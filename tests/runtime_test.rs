//! 実行時テスト
//!
//! 元の関数（ネイティブ再帰）と生成物（明示的スタック）の実行結果と
//! 副作用の順序が一致することを確かめる。

mod common;

use common::{int, ints, transform};
use pretty_assertions::assert_eq;
use saferec::error::RuntimeError;
use saferec::runtime::{self, parse_value, DispatchFrame, GroupRunner, RecursionRunner, Value};
use test_case::test_case;

#[test_case(48, 18, 6 ; "common divisor")]
#[test_case(17, 5, 1 ; "coprime")]
#[test_case(0, 7, 7 ; "zero first")]
#[test_case(7, 0, 7 ; "zero second")]
fn test_gcd_matches_direct(a: i64, b: i64, expected: i64) {
    let t = transform(&common::demo_source("gcd"));

    let direct = t.run_direct("gcd", vec![int(a), int(b)]);
    let generated = t.run_generated("gcd_safe_rec", vec![int(a), int(b)]);

    assert_eq!(direct.value, Some(int(expected)));
    assert_eq!(generated.value, direct.value);
}

#[test]
fn test_fib_trace_order_matches_direct() {
    let t = transform(&common::demo_source("fib"));

    let direct = t.run_direct("fib", vec![int(10)]);
    let generated = t.run_generated("fib_safe_rec", vec![int(10)]);

    assert_eq!(generated.value, Some(int(55)));
    assert_eq!(generated.value, direct.value);
    // a の呼び出しが b より先に評価される
    assert_eq!(generated.effects.trace[..3], [int(9), int(8), int(7)]);
    assert_eq!(generated.effects, direct.effects);
}

#[test]
fn test_parity_over_range() {
    let t = transform(&common::demo_source("parity"));

    for n in -40..=40 {
        let odd = t.run_generated("is_odd_safe_rec", vec![int(n)]);
        let even = t.run_generated("is_even_safe_rec", vec![int(n)]);
        assert_eq!(odd.value, Some(Value::Bool(n % 2 != 0)), "is_odd({})", n);
        assert_eq!(even.value, Some(Value::Bool(n % 2 == 0)), "is_even({})", n);
    }
}

#[test]
fn test_deep_recursion_only_overflows_direct() {
    let t = transform(&common::demo_source("sum"));

    let generated = t.run_generated("sum_safe", vec![int(1_000_000)]);
    assert_eq!(generated.value, Some(int(500_000_500_000)));

    let direct = runtime::run_direct(t.program(), "sum", vec![int(1_000_000)], runtime::DEFAULT_MAX_CALL_DEPTH);
    assert_eq!(
        direct,
        Err(RuntimeError::StackOverflow {
            limit: runtime::DEFAULT_MAX_CALL_DEPTH
        })
    );
}

#[test]
fn test_run_stats_count_calls_and_depth() {
    let t = transform(&common::demo_source("sum"));

    let outcome = t.run_generated("sum_safe", vec![int(10)]);
    let stats = outcome.stats.expect("trampolined run records stats");

    assert_eq!(outcome.value, Some(int(55)));
    assert_eq!(stats.calls, 11);
    assert_eq!(stats.max_depth, 10);
    assert_eq!(t.run_direct("sum", vec![int(10)]).stats, None);
}

#[test_case(&[3, 9, 4, 1, 12, 7], -1, 12 ; "max in subtree")]
#[test_case(&[5], 8, 8 ; "floor wins")]
#[test_case(&[], 0, 0 ; "empty tree")]
fn test_tree_max_sees_earlier_declarators(tree: &[i64], floor: i64, expected: i64) {
    let t = transform(&common::demo_source("tree_max"));

    let args = || vec![ints(tree), int(0), int(floor)];
    let direct = t.run_direct("tree_max", args());
    let generated = t.run_generated("max_safe", args());

    assert_eq!(generated.value, Some(int(expected)));
    assert_eq!(generated.value, direct.value);
}

#[test]
fn test_dfs_visits_in_pre_order() {
    let t = transform(&common::demo_source("dfs"));
    let graph = || Value::array(vec![ints(&[1, 2]), ints(&[3]), ints(&[3]), ints(&[])]);

    let direct = t.run_direct("visit", vec![graph(), int(0)]);
    let generated = t.run_generated("visit_safe_rec", vec![graph(), int(0)]);

    assert_eq!(generated.value, None);
    assert_eq!(generated.effects.trace, vec![int(0), int(1), int(3), int(2), int(3)]);
    assert_eq!(generated.effects, direct.effects);
}

#[test]
fn test_hidden_member_has_no_entry_point() {
    let t = transform(&common::demo_source("dfs"));

    let result = runtime::run_generated(t.program(), t.units(), "visit_children_safe_rec", vec![]);
    assert_eq!(
        result.map(|o| o.value),
        Err(RuntimeError::UnknownFunction {
            name: "visit_children_safe_rec".to_string()
        })
    );
}

#[test]
fn test_bad_dispatch_tag() {
    let t = transform(&common::demo_source("parity"));
    let unit = t.unit("parity");

    let mut runner = GroupRunner::new(t.program(), unit);
    let result = runner.run_recursion(DispatchFrame { tag: 7, args: vec![] });

    assert_eq!(result, Err(RuntimeError::BadDispatch { tag: 7 }));
}

#[test]
fn test_argument_count_is_checked() {
    let t = transform(&common::demo_source("gcd"));

    let result = runtime::run_generated(t.program(), t.units(), "gcd_safe_rec", vec![int(1)]);
    assert_eq!(
        result.map(|o| o.value),
        Err(RuntimeError::ArgumentCountMismatch {
            name: "gcd_safe_rec".to_string(),
            expected: 2,
            found: 1,
        })
    );
}

#[test]
fn test_missing_return_in_both_modes() {
    let t = transform(
        r#"
        #[safe_recursion]
        fn f(n: int) -> int {
            if n > 0 {
                let x = f(n - 1);
                return x;
            }
        }
        "#,
    );
    let expected = Err(RuntimeError::MissingReturn {
        function: "f".to_string(),
    });

    let direct = runtime::run_direct(t.program(), "f", vec![int(0)], 16).map(|o| o.value);
    let generated = runtime::run_generated(t.program(), t.units(), "f_safe_rec", vec![int(0)]).map(|o| o.value);

    assert_eq!(direct, expected);
    assert_eq!(generated, expected);
}

#[test_case(1, 6 ; "no throw")]
#[test_case(0, 0 ; "caught every level")]
fn test_try_catch_within_activation(d: i64, expected: i64) {
    let t = transform(
        r#"
        #[safe_recursion]
        fn safe_div(n: int, d: int) -> int {
            if n <= 0 {
                return 0;
            }
            let rest = safe_div(n - 1, d);
            try {
                if d == 0 {
                    throw "zero";
                }
                return rest + n / d;
            } catch e {
                trace(e);
                return rest;
            } finally {
                trace(n);
            }
        }
        "#,
    );
    // 例外は同じ活性化の中で捕捉されるので警告だけで変換される
    assert_eq!(t.units().len(), 1);

    let direct = t.run_direct("safe_div", vec![int(3), int(d)]);
    let generated = t.run_generated("safe_div_safe_rec", vec![int(3), int(d)]);

    assert_eq!(generated.value, Some(int(expected)));
    assert_eq!(generated.value, direct.value);
    assert_eq!(generated.effects, direct.effects);
}

#[test]
fn test_uncaught_error_propagates_from_child() {
    let t = transform(
        r#"
        #[safe_recursion]
        fn f(n: int) -> int {
            if n == 0 {
                return 1 / n;
            }
            let x = f(n - 1);
            return x;
        }
        "#,
    );

    let generated = runtime::run_generated(t.program(), t.units(), "f_safe_rec", vec![int(5)]);
    assert!(
        matches!(generated, Err(RuntimeError::DivisionByZero { .. })),
        "{:?}",
        generated
    );
}

#[test]
fn test_output_builtin_is_recorded() {
    let t = transform(
        r#"
        #[safe_recursion]
        fn count(n: int) {
            if n == 0 {
                return;
            }
            print(n);
            count(n - 1);
        }
        "#,
    );

    let direct = t.run_direct("count", vec![int(3)]);
    let generated = t.run_generated("count_safe_rec", vec![int(3)]);

    assert_eq!(generated.effects.output, vec!["3", "2", "1"]);
    assert_eq!(generated.effects, direct.effects);
}

#[test_case("42", int(42))]
#[test_case("-3", int(-3))]
#[test_case("true", Value::Bool(true))]
#[test_case("\"hi\"", Value::str("hi"))]
#[test_case("[1, [2]]", Value::array(vec![int(1), ints(&[2])]))]
#[test_case("()", Value::Unit)]
fn test_parse_value(input: &str, expected: Value) {
    assert_eq!(parse_value(input), Ok(expected));
}

#[test]
fn test_parse_value_rejects_garbage() {
    assert!(parse_value("1 2").is_err());
    assert!(parse_value("[1,").is_err());
}

#[test]
fn test_direct_depth_is_capped() {
    let t = transform(&common::demo_source("sum"));

    let small = runtime::run_direct(t.program(), "sum", vec![int(10)], usize::MAX).map(|o| o.value);
    assert_eq!(small, Ok(Some(int(55))));

    let deep = runtime::run_direct(t.program(), "sum", vec![int(2_000_000)], 2_000_000);
    assert_eq!(
        deep.map(|o| o.value),
        Err(RuntimeError::StackOverflow {
            limit: runtime::MAX_DIRECT_CALL_DEPTH
        })
    );
}

#[test]
fn test_entry_points_resolve_by_module_path() {
    let t = transform(
        r#"
        partial module A {
            #[safe_recursion]
            fn f(n: int) -> int { if n <= 0 { return 1; } return f(n - 1); }
        }
        partial module B {
            #[safe_recursion]
            fn f(n: int) -> int { if n <= 0 { return 2; } return f(n - 1); }
        }
        "#,
    );
    assert_eq!(t.units().len(), 2);

    assert_eq!(t.run_generated("A::f_safe_rec", vec![int(3)]).value, Some(int(1)));
    assert_eq!(t.run_generated("B::f_safe_rec", vec![int(3)]).value, Some(int(2)));
    assert_eq!(t.run_generated("B::f", vec![int(3)]).value, Some(int(2)));
    assert_eq!(t.run_direct("B::f", vec![int(3)]).value, Some(int(2)));

    let ambiguous = runtime::run_generated(t.program(), t.units(), "f_safe_rec", vec![int(3)]);
    assert_eq!(
        ambiguous.map(|o| o.value),
        Err(RuntimeError::AmbiguousEntryPoint {
            name: "f_safe_rec".to_string(),
            candidates: "A::f_safe_rec, B::f_safe_rec".to_string(),
        })
    );
}
