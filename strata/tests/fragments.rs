//! Integration tests for the fragment language and YAML fragments, driven
//! through the public loading API.

use std::path::Path;

use chrono::NaiveDate;
use strata::{load_fragment_source, Context, Error, Mapping, Node, Value};

fn script(source: &str) -> Mapping {
    load_fragment_source(source, Path::new("strata_data.strata"), &Context::new()).unwrap()
}

fn script_err(source: &str) -> Error {
    load_fragment_source(source, Path::new("strata_data.strata"), &Context::new()).unwrap_err()
}

fn yaml(source: &str) -> Mapping {
    load_fragment_source(source, Path::new("strata_data.yaml"), &Context::new()).unwrap()
}

fn field(source: &str, name: &str) -> Value {
    let root = Node::new(script(source)).unwrap();
    root.get(name).unwrap()
}

#[test]
fn test_literals() {
    let data = script(
        r#"{
            int: 1_000,
            float: 2.5,
            yes: true,
            nothing: null,
            raw: 'it\'s',
            cooked: "tab\there",
            list: [1, 'two', [3]],
            "quoted key": 1,
            7: 'seven',
        }"#,
    );
    assert_eq!(data["int"], Value::from(1000));
    assert_eq!(data["float"], Value::from(2.5));
    assert_eq!(data["yes"], Value::from(true));
    assert!(data["nothing"].is_null());
    assert_eq!(data["raw"], Value::from("it's"));
    assert_eq!(data["cooked"], Value::from("tab\there"));
    assert_eq!(data["list"].to_string(), "[1, \"two\", [3]]");
    assert!(data.contains_key("quoted key"));
    assert_eq!(data["7"], Value::from("seven"));
}

#[test]
fn test_arithmetic_and_comparison() {
    let data = script(
        "{ a: 1 + 2 * 3, b: (1 + 2) * 3, c: 7 % 4, d: 7 / 2,
           e: 7.0 / 2, f: 3 > 2, g: 'a' < 'b' }",
    );
    assert_eq!(data["a"], Value::from(7));
    assert_eq!(data["b"], Value::from(9));
    assert_eq!(data["c"], Value::from(3));
    assert_eq!(data["d"], Value::from(3));
    assert_eq!(data["e"], Value::from(3.5));
    assert_eq!(data["f"], Value::from(true));
    assert_eq!(data["g"], Value::from(true));
}

#[test]
fn test_division_by_zero() {
    let err = script_err("{ x: 1 / 0 }");
    assert!(matches!(err, Error::Evaluation { .. }));
}

#[test]
fn test_type_errors() {
    let err = script_err("{ x: true - 1 }");
    assert!(matches!(err, Error::Type { .. }));
}

#[test]
fn test_logic_and_conditionals() {
    let data = script(
        "{ a: null || 'fallback', b: 0 && 'never', c: 3 > 2 ? 'big' : 'small', d: !false }",
    );
    assert_eq!(data["a"], Value::from("fallback"));
    assert_eq!(data["b"], Value::from("never"));
    assert_eq!(data["c"], Value::from("big"));
    assert_eq!(data["d"], Value::from(true));
}

#[test]
fn test_strings_and_lists() {
    let data = script(
        "let name = 'CIS';
         { s: \"${name} ${100 + 62}\", cat: 'a' + 1, l: [1] + [2, 3],
           last: [1, 2, 3][-1], past: [1][5], ch: 'abc'[1] }",
    );
    assert_eq!(data["s"], Value::from("CIS 162"));
    assert_eq!(data["cat"], Value::from("a1"));
    assert_eq!(data["l"].to_string(), "[1, 2, 3]");
    assert_eq!(data["last"], Value::from(3));
    assert!(data["past"].is_null());
    assert_eq!(data["ch"], Value::from("b"));
}

#[test]
fn test_dates() {
    let data = script(
        "let start = date('2020-08-24');
         { start: start, later: start + 7, earlier: start - 1,
           span: date(2020, 12, 7) - start, same: start == date(2020, 8, 24) }",
    );
    assert_eq!(data["start"], Value::Date(NaiveDate::from_ymd_opt(2020, 8, 24).unwrap()));
    assert_eq!(data["later"].to_string(), "2020-08-31");
    assert_eq!(data["earlier"].to_string(), "2020-08-23");
    assert_eq!(data["span"], Value::from(105));
    assert_eq!(data["same"], Value::from(true));
}

#[test]
fn test_builtins() {
    let data = script(
        "{ n: len([1, 2]), s: str(5), u: upper('x'), j: join(['a', 'b'], ', '), l: len('héllo') }",
    );
    assert_eq!(data["n"], Value::from(2));
    assert_eq!(data["s"], Value::from("5"));
    assert_eq!(data["u"], Value::from("X"));
    assert_eq!(data["j"], Value::from("a, b"));
    assert_eq!(data["l"], Value::from(5));
}

#[test]
fn test_lambda_parameters() {
    let source = "{ f: fn(a, b = a + 1, scale: 1, label:) => \"${label}: ${(a + b) * scale}\" }";
    let root = Node::new(script(source)).unwrap();

    let value = root.evaluate("f(1, label: 'x')").unwrap();
    assert_eq!(value, Value::from("x: 3"));
    let value = root.evaluate("f(1, 5, scale: 2, label: 'y')").unwrap();
    assert_eq!(value, Value::from("y: 12"));

    let err = root.evaluate("f(1)").unwrap_err();
    assert!(matches!(err, Error::Argument { ref function, .. } if function == "f"));
}

#[test]
fn test_function_introspection() {
    let data = script("{ f: fn(a, b = 2, fred:) => a, g: fn() => 1 }");
    let Value::Function(f) = &data["f"] else {
        panic!("expected a function");
    };
    assert_eq!(f.parameter_names(), vec!["a", "b", "fred"]);
    assert!(f.takes_arguments());
    let Value::Function(g) = &data["g"] else {
        panic!("expected a function");
    };
    assert!(!g.takes_arguments());
}

#[test]
fn test_computed_field_evaluated_on_each_access() {
    let context = Context::new();
    context.set("calls", 0);
    let data = load_fragment_source(
        "{ tick: fn() => (calls = calls + 1; calls) }",
        Path::new("strata_data.strata"),
        &context,
    )
    .unwrap();
    let sink = std::rc::Rc::new(strata::CollectingSink::new());
    let root = Node::build(data, Some(context), sink).unwrap();
    assert_eq!(field_of(&root, "tick"), Value::from(1));
    assert_eq!(field_of(&root, "tick"), Value::from(2));
}

fn field_of(root: &Node, name: &str) -> Value {
    root.get(name).unwrap()
}

#[test]
fn test_plain_field_via_helper() {
    assert_eq!(field("{ a: 40 + 2 }", "a"), Value::from(42));
}

#[test]
fn test_syntax_errors() {
    let err = script_err("{\n  a: 1,\n  b: 'unterminated\n}");
    let Error::Syntax { path, line, .. } = err else {
        panic!("expected a syntax error");
    };
    assert_eq!(path, Path::new("strata_data.strata"));
    assert_eq!(line, 3);

    assert!(matches!(script_err("{ f: fn(a = 1, b) => a }"), Error::Syntax { .. }));
    assert!(matches!(script_err("{ f: fn(a, a) => a }"), Error::Syntax { .. }));
    assert!(matches!(script_err("let = 1;"), Error::Syntax { .. }));
}

#[test]
fn test_deeply_nested_fragment_is_a_syntax_error() {
    let depth = 150;
    let source = format!("{{ x: {}1{} }}", "[".repeat(depth), "]".repeat(depth));
    let Error::Syntax { line, column, message, .. } = script_err(&source) else {
        panic!("expected a syntax error");
    };
    assert_eq!(line, 1);
    assert!(column > 60);
    assert!(message.contains("nested"));

    let shallow = format!("{{ x: {}1{} }}", "[".repeat(20), "]".repeat(20));
    assert!(script(&shallow)["x"].as_list().is_some());
}

#[test]
fn test_undefined_variable_at_top_level() {
    let err = script_err("{ a: missing }");
    assert!(matches!(err, Error::UndefinedVariable { ref name } if name == "missing"));
}

#[test]
fn test_non_mapping_results() {
    for source in ["42", "[1]", "'text'", "fn() => 1"] {
        let err = script_err(source);
        assert!(matches!(err, Error::Loading { .. }), "{source} should fail to load");
    }
}

#[test]
fn test_yaml_fragments() {
    let data = yaml(concat!(
        "course:\n",
        "  number: CIS 162\n",
        "  title: !fn '\"${number} Intro\"'\n",
        "  start: !date 2020-08-24\n",
    ));
    let root = Node::new(data).unwrap();
    assert_eq!(root.lookup("course.title").unwrap(), Value::from("CIS 162 Intro"));
    assert_eq!(root.lookup("course.start").unwrap().to_string(), "2020-08-24");
    assert!(root.get("course").unwrap().as_node().unwrap().is_computed("title"));
}

#[test]
fn test_yaml_empty_and_scalar_documents() {
    assert!(yaml("").is_empty());
    assert!(yaml("# nothing\n").is_empty());
    let err = load_fragment_source("- 1\n- 2\n", Path::new("strata_data.yml"), &Context::new())
        .unwrap_err();
    assert!(matches!(err, Error::Loading { .. }));
}

#[test]
fn test_yaml_unknown_tag() {
    let err =
        load_fragment_source("x: !color red\n", Path::new("strata_data.yaml"), &Context::new())
            .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}
