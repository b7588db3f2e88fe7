//! End-to-end template evaluation.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use proptest::prelude::*;
use test_case::test_case;

use fmgen_core::test_support::StaticQuery;
use fmgen_core::{metadata, Document, DocumentId, Value};
use fmgen_expr::{evaluate, EvalError, EvaluationContext, LimitError, Sandbox, SandboxLimits};

fn note_context() -> EvaluationContext {
    let doc = Document::new(DocumentId::new("Projects/Alpha/plan.md"));
    let props = metadata! { "status" => "draft", "priority" => 2i64 };
    EvaluationContext::for_document(&doc, &["work".to_string(), "alpha/q1".to_string()], Some(&props))
        .with_clock(DateTime::parse_from_rfc3339("2024-05-06T10:30:00+02:00").unwrap())
}

fn eval(expression: &str) -> fmgen_core::Metadata {
    evaluate(expression, &note_context()).unwrap()
}

#[test]
fn test_empty_object() {
    assert!(eval("{}").is_empty());
}

#[test]
fn test_file_facts() {
    let meta = eval("{ title: file.basename, folder: file.parent.name, tagCount: file.tags.length }");
    assert_eq!(meta["title"], Value::from("plan"));
    assert_eq!(meta["folder"], Value::from("Alpha"));
    assert_eq!(meta["tagCount"], Value::Integer(2));
}

#[test]
fn test_existing_properties_are_visible() {
    let meta = eval("({ next: file.properties.priority + 1, done: file.properties.status === 'done' })");
    assert_eq!(meta["next"], Value::Integer(3));
    assert_eq!(meta["done"], Value::Bool(false));
}

#[test]
fn test_template_strings_and_methods() {
    let meta = eval(
        "{ slug: `${file.parent.name}-${file.basename}`.toLowerCase(), \
           area: file.tags.find(t => t.startsWith('alpha/'))?.split('/')[1] ?? 'none' }",
    );
    assert_eq!(meta["slug"], Value::from("alpha-plan"));
    assert_eq!(meta["area"], Value::from("q1"));
}

#[test]
fn test_dates_use_context_clock() {
    let meta = eval("{ created: today(), year: now().year, stamp: date('2024-01-02') }");
    assert_eq!(meta["created"], Value::Date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()));
    assert_eq!(meta["year"], Value::Integer(2024));
    assert_eq!(meta["stamp"], Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
}

#[test]
fn test_invalid_date_is_null() {
    assert_eq!(eval("{ d: date('not a date') }")["d"], Value::Null);
}

#[test]
fn test_null_values_survive_evaluation() {
    // null is meaningful to the merge step
    assert_eq!(eval("{ remove: null }")["remove"], Value::Null);
}

#[test_case("'text'" ; "string")]
#[test_case("42" ; "number")]
#[test_case("true" ; "boolean")]
#[test_case("undefined" ; "undefined")]
#[test_case("x => x" ; "function")]
fn test_non_object_results(expression: &str) {
    let err = evaluate(expression, &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::NotAnObject { .. }));
    assert_eq!(err.to_string(), "The expression must return an object");
}

#[test_case("null" ; "null")]
#[test_case("[1, 2]" ; "array")]
#[test_case("today()" ; "date")]
fn test_object_typed_non_maps_fail_schema(expression: &str) {
    let err = evaluate(expression, &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::Schema(_)), "{err:?}");
}

#[test]
fn test_function_value_rejected() {
    let err = evaluate("{ fn: () => 1 }", &note_context()).unwrap_err();
    let EvalError::Schema(schema) = &err else {
        panic!("expected schema error, got {err:?}");
    };
    assert_eq!(schema.path, "fn");
    assert!(err.to_string().starts_with("Invalid value in template result: fn:"));
}

#[test]
fn test_syntax_error_has_location() {
    let err = evaluate("{\n  a: 1,\n  b: }", &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::Syntax(_)));
    assert!(err.to_string().contains("line 3"), "{err}");
}

#[test]
fn test_runtime_error_keeps_cause() {
    let err = evaluate("{ a: file.missing.deeper }", &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::Runtime(_)));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_context_shadows_builtins() {
    let ctx = note_context().with_binding("Math", "shadowed");
    let meta = evaluate("{ m: Math }", &ctx).unwrap();
    assert_eq!(meta["m"], Value::from("shadowed"));
}

#[test]
fn test_dv_undefined_without_query() {
    let meta = eval("{ has: typeof dv, pages: dv?.pages() }");
    assert_eq!(meta["has"], Value::from("undefined"));
    assert_eq!(meta["pages"], Value::Undefined);
}

#[test]
fn test_dv_queries_host() {
    let pages = vec![
        Value::from(metadata! {
            "file" => metadata! { "path" => "Projects/Alpha/a.md", "tags" => vec!["work"] },
            "status" => "open",
        }),
        Value::from(metadata! {
            "file" => metadata! { "path" => "Archive/b.md", "tags" => Vec::<Value>::new() },
            "status" => "done",
        }),
    ];
    let ctx = note_context().with_query(Arc::new(StaticQuery::new(pages)));
    let meta = evaluate(
        "{ open: dv.pages('\"Projects\"').length, tagged: dv.pages('#work').map(p => p.status), \
           archived: dv.page('Archive/b.md')?.status }",
        &ctx,
    )
    .unwrap();
    assert_eq!(meta["open"], Value::Integer(1));
    assert_eq!(meta["tagged"], Value::List(vec![Value::from("open")]));
    assert_eq!(meta["archived"], Value::from("done"));
}

#[test]
fn test_json_builtins() {
    let meta = eval("{ s: JSON.stringify({ a: [1, null] }), p: JSON.parse('{\"x\": 1.5}').x }");
    assert_eq!(meta["s"], Value::from("{\"a\":[1,null]}"));
    assert_eq!(meta["p"], Value::Float(1.5));
}

#[test]
fn test_object_helpers() {
    let meta = eval(
        "Object.fromEntries(Object.entries({ b: 1, a: 2 }).map(e => [e[0].toUpperCase(), e[1] * 10]))",
    );
    assert_eq!(meta["B"], Value::Integer(10));
    assert_eq!(meta["A"], Value::Integer(20));
}

#[test]
fn test_limits_abort_evaluation() {
    let sandbox = Sandbox::new(SandboxLimits {
        max_steps: 1_000,
        ..SandboxLimits::default()
    });
    let err = sandbox
        .evaluate("{ n: Array.from('x'.repeat(5000)).map(c => c + c).length }", &note_context())
        .unwrap_err();
    assert!(err.is_limit());
}

#[test]
fn test_check_reports_syntax_only() {
    let sandbox = Sandbox::default();
    assert!(sandbox.check("{ a: missing.value }").is_ok());
    assert!(sandbox.check("{ a: }").is_err());
}

#[test]
fn test_deeply_nested_template_strings_fail_cleanly() {
    let levels = 50_000;
    let source = format!("{{ x: {}1{} }}", "`${".repeat(levels), "}`".repeat(levels));
    let err = evaluate(&source, &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::Syntax(_)), "{err}");
    assert!(err.to_string().contains("nested too deeply"));
}

#[test_case("(acc, _) => [acc]" ; "lists")]
#[test_case("(acc, _) => ({ acc })" ; "objects")]
#[test_case("(acc, _) => () => acc" ; "closures")]
fn test_value_depth_is_bounded(reducer: &str) {
    let source = format!("{{ x: 'a'.repeat(90000).split('').reduce({reducer}, 0) }}");
    let err = evaluate(&source, &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::Limit(LimitError::ValueDepth(256))), "{err}");
}

#[test]
fn test_value_depth_limit_is_configurable() {
    let sandbox = Sandbox::new(SandboxLimits {
        max_value_depth: 3,
        ..SandboxLimits::default()
    });
    let ctx = note_context();
    assert!(sandbox.evaluate("{ a: { b: [1] } }", &ctx).is_ok());
    assert!(sandbox.evaluate("{ a: { b: [[1]] } }", &ctx).unwrap_err().is_limit());
    assert!(sandbox.evaluate("{ a: JSON.parse('[[[1]]]') }", &ctx).unwrap_err().is_limit());
}

#[test_case("(s => 'a'.repeat(100000).split('').join(s))('x'.repeat(1000000))" ; "join")]
#[test_case("(s => `${'a'.repeat(100000).split('').map(_ => s)}`)('x'.repeat(1000000))" ; "template substitution")]
#[test_case("(s => 'a'.repeat(100000).split('').map(_ => s) + '')('x'.repeat(1000000))" ; "concatenation")]
#[test_case("(s => JSON.stringify('a'.repeat(100000).split('').map(_ => s)))('x'.repeat(1000000))" ; "json")]
#[test_case("(s => ({})['a'.repeat(100000).split('').map(_ => s)])('x'.repeat(1000000))" ; "property key")]
fn test_oversized_text_is_refused_before_building(expression: &str) {
    let source = format!("{{ x: {expression} }}");
    let err = evaluate(&source, &note_context()).unwrap_err();
    assert!(matches!(err, EvalError::Limit(LimitError::StringLength(_))), "{err}");
}

#[test]
fn test_padding_limit_counts_bytes() {
    let sandbox = Sandbox::new(SandboxLimits {
        max_string_len: 16,
        ..SandboxLimits::default()
    });
    let ctx = note_context();
    assert!(sandbox.evaluate("{ x: 'a'.padStart(10, 'e') }", &ctx).is_ok());
    let err = sandbox.evaluate("{ x: 'a'.padStart(10, '\u{00e9}') }", &ctx).unwrap_err();
    assert!(matches!(err, EvalError::Limit(LimitError::StringLength(16))), "{err}");
}

#[test]
fn test_default_sort_orders_by_text() {
    let meta = eval("{ s: [10, 'b', [2, 1], 9, 'a'].sort() }");
    assert_eq!(
        meta["s"],
        Value::List(vec![
            Value::Integer(10),
            Value::List(vec![Value::Integer(2), Value::Integer(1)]),
            Value::Integer(9),
            Value::from("a"),
            Value::from("b"),
        ])
    );
}

fn scalar_literal() -> impl Strategy<Value = (String, Value)> {
    prop_oneof![
        (-1_000_000_000_000i64..1_000_000_000_000).prop_map(|n| (n.to_string(), Value::Integer(n))),
        any::<bool>().prop_map(|b| (b.to_string(), Value::Bool(b))),
        "[a-zA-Z0-9 ]{0,12}".prop_map(|s| (format!("'{s}'"), Value::String(s))),
        Just(("null".to_string(), Value::Null)),
    ]
}

proptest! {
    #[test]
    fn prop_scalar_object_literal_evaluates_to_itself(
        entries in proptest::collection::btree_map("[a-z_][a-z0-9_]{0,8}", scalar_literal(), 0..12)
    ) {
        let body = entries
            .iter()
            .map(|(key, (literal, _))| format!("'{key}': {literal}"))
            .collect::<Vec<_>>()
            .join(", ");
        let meta = evaluate(&format!("{{ {body} }}"), &EvaluationContext::default()).unwrap();
        let expected: fmgen_core::Metadata = entries.into_iter().map(|(key, (_, value))| (key, value)).collect();
        prop_assert_eq!(meta, expected);
    }
}
