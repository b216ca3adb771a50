use sneaql_core::parser::StepParser;
use sneaql_core::recordset::RecordsetStore;
use sneaql_core::tokenizer::Tokenizer;
use sneaql_core::value::record;
use sneaql_core::{EvaluatorOptions, ExpressionEvaluator, SneaqlError, Value};

fn evaluator() -> ExpressionEvaluator {
    ExpressionEvaluator::with_environment(Vec::new(), &EvaluatorOptions::default()).unwrap()
}

#[test]
fn test_tokenize_quoted_literal() {
    let tokens = Tokenizer::new()
        .tokenize("execute_if a = 'hello world'")
        .unwrap();
    assert_eq!(tokens, vec!["execute_if", "a", "=", "'hello world'"]);
}

#[test]
fn test_quote_inside_word_is_rejected() {
    assert!(matches!(
        Tokenizer::new().tokenize("assign a'b 1"),
        Err(SneaqlError::Tokenization { .. })
    ));
}

#[test]
fn test_parse_never_returns_empty() {
    let parser = StepParser::new();
    for contents in [
        "/*-execute-*/ select 1;",
        "-- lead\n/*-assign a 1-*/\n/*-execute-*/ select :a;",
        "/*-exit_if 1 = 2-*/",
    ] {
        assert!(!parser.parse(contents).unwrap().is_empty());
    }
    assert!(matches!(parser.parse(""), Err(SneaqlError::NoStatementsFound)));
    assert!(matches!(
        parser.parse("select 1;"),
        Err(SneaqlError::NoStatementsFound)
    ));
}

#[test]
fn test_evaluate_all_without_markers_is_identity() {
    let mut e = evaluator();
    e.set_session_variable("table_name", Value::from("orders"))
        .unwrap();
    for sql in [
        "select 1;",
        "select * from t where a = 'x';",
        "insert into t values (1, 2, 3);",
    ] {
        let once = e.evaluate_all(sql).unwrap();
        assert_eq!(once, sql);
        assert_eq!(e.evaluate_all(&once).unwrap(), once);
    }
}

#[test]
fn test_longer_names_substitute_first() {
    let mut e = evaluator();
    e.set_session_variable("var", Value::from("short")).unwrap();
    e.set_session_variable("var_foo", Value::from("long")).unwrap();
    assert_eq!(
        e.evaluate_all("select :var_foo, :var;").unwrap(),
        "select long, short;"
    );
}

#[test]
fn test_comparisons() {
    let e = evaluator();
    assert!(e.compare("=", &Value::from("true"), &Value::Integer(1)).unwrap());
    assert!(e.compare("=", &Value::from("false"), &Value::Integer(0)).unwrap());
    assert!(e
        .compare("like", &Value::from("turkey"), &Value::from("turk%"))
        .unwrap());
    assert!(!e
        .compare("notlike", &Value::from("turkey"), &Value::from("turk%"))
        .unwrap());
    assert!(matches!(
        e.compare("=~", &Value::Integer(1), &Value::Integer(1)),
        Err(SneaqlError::InvalidComparisonOperator(_))
    ));
}

#[test]
fn test_recordset_field_sets_must_match() {
    let mut store = RecordsetStore::new();
    let first = record([("a", Value::Integer(1)), ("b", Value::from("x"))]);
    for second in [
        record([("a", Value::Integer(2))]),
        record([("a", Value::Integer(2)), ("c", Value::from("y"))]),
        record([
            ("a", Value::Integer(2)),
            ("b", Value::from("y")),
            ("c", Value::from("z")),
        ]),
    ] {
        assert!(matches!(
            store.store("rs", vec![first.clone(), second]),
            Err(SneaqlError::InvalidRecordset(_))
        ));
        assert!(!store.contains("rs"));
    }

    store
        .store("rs", vec![first.clone(), record([("a", Value::Integer(3)), ("b", Value::from("z"))])])
        .unwrap();
    assert_eq!(store.get("rs").unwrap().len(), 2);
}
