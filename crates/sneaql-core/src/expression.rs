//! Session variables, environment variables and expression evaluation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::error::{SneaqlError, SneaqlResult};
use crate::value::Value;

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^:env_(\w+)$").unwrap());
static SESSION_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:(\w+)$").unwrap());
static BRACE_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{(\w+)\}$").unwrap());
static VARIABLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());
static EXPRESSION_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+|-?\d+\.\d*|'.*'|:\w+|\{\w+\}|(?i:true|false))$").unwrap()
});
static INJECTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)('|;|(drop|alter)\s.*(table|view|user|database|schema|function|sequence|procedure))",
    )
    .unwrap()
});

/// Environment variable holding a comma separated allow-list.
pub const AVAILABLE_ENV_VARS: &str = "SNEAQL_AVAILABLE_ENV_VARS";
/// Environment variable that disables the injection filter when present.
pub const DISABLE_SQL_INJECTION_CHECK: &str = "SNEAQL_DISABLE_SQL_INJECTION_CHECK";

/// Options applied when the environment is captured.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorOptions {
    /// Only these names are captured when set.
    pub available_env_vars: Option<Vec<String>>,
    pub disable_injection_check: bool,
}

impl EvaluatorOptions {
    /// Read the options from the process environment.
    pub fn from_env() -> Self {
        let available_env_vars = std::env::var(AVAILABLE_ENV_VARS).ok().map(|list| {
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });
        Self {
            available_env_vars,
            disable_injection_check: std::env::var_os(DISABLE_SQL_INJECTION_CHECK).is_some(),
        }
    }
}

/// Supported comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Like,
    NotLike,
}

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 8] = [
        ComparisonOperator::Eq,
        ComparisonOperator::NotEq,
        ComparisonOperator::Gt,
        ComparisonOperator::Lt,
        ComparisonOperator::GtEq,
        ComparisonOperator::LtEq,
        ComparisonOperator::Like,
        ComparisonOperator::NotLike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::NotEq => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::GtEq => ">=",
            ComparisonOperator::LtEq => "<=",
            ComparisonOperator::Like => "like",
            ComparisonOperator::NotLike => "notlike",
        }
    }

    fn apply<T: PartialOrd>(&self, a: &T, b: &T) -> bool {
        match self {
            ComparisonOperator::Eq => a == b,
            ComparisonOperator::NotEq => a != b,
            ComparisonOperator::Gt => a > b,
            ComparisonOperator::Lt => a < b,
            ComparisonOperator::GtEq => a >= b,
            ComparisonOperator::LtEq => a <= b,
            ComparisonOperator::Like | ComparisonOperator::NotLike => false,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = SneaqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ComparisonOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| SneaqlError::InvalidComparisonOperator(s.to_string()))
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operands after type unification.
#[derive(Debug, PartialEq)]
enum Coerced {
    Boolean(bool, bool),
    Timestamp(NaiveDateTime, NaiveDateTime),
    Float(f64, f64),
    Integer(i64, i64),
    Text(String, String),
}

/// Holds the session and environment variables for one transform run.
#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    environment: HashMap<String, String>,
    session: HashMap<String, Value>,
}

impl ExpressionEvaluator {
    /// Capture the process environment.
    pub fn new(options: &EvaluatorOptions) -> SneaqlResult<Self> {
        Self::with_environment(std::env::vars(), options)
    }

    /// Capture an explicit environment.
    pub fn with_environment<I>(environment: I, options: &EvaluatorOptions) -> SneaqlResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let environment: HashMap<String, String> = match &options.available_env_vars {
            Some(allowed) => {
                tracing::debug!(allowed = ?allowed, "Filtering environment variables");
                environment
                    .into_iter()
                    .filter(|(k, _)| allowed.iter().any(|a| a == k))
                    .collect()
            }
            None => environment.into_iter().collect(),
        };

        if !options.disable_injection_check {
            for (name, value) in &environment {
                if INJECTION_PATTERN.is_match(value) {
                    tracing::error!(variable = %name, "Environment variable failed SQL injection check");
                    return Err(SneaqlError::InjectionRejected(name.clone()));
                }
            }
        }

        Ok(Self {
            environment,
            session: HashMap::new(),
        })
    }

    pub fn set_session_variable(&mut self, name: &str, value: Value) -> SneaqlResult<()> {
        if !Self::valid_session_variable_name(name) {
            return Err(SneaqlError::InvalidVariableName(name.to_string()));
        }
        tracing::info!(variable = %name, value = %value, "Setting session variable");
        self.session.insert(name.to_string(), value);
        Ok(())
    }

    pub fn session_variable(&self, name: &str) -> Option<&Value> {
        self.session.get(name)
    }

    /// Environment lookup. Exact name first, then case-insensitive.
    pub fn environment_variable(&self, name: &str) -> Option<&str> {
        self.environment
            .get(name)
            .or_else(|| {
                self.environment
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(|v| v.as_str())
    }

    pub fn log_session_variables(&self) {
        tracing::debug!(variables = ?self.session, "Current session variables");
    }

    /// Names must be word characters only, must not start with a digit and
    /// must not start with `env_`.
    pub fn valid_session_variable_name(name: &str) -> bool {
        VARIABLE_NAME.is_match(name)
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && !name.to_ascii_lowercase().starts_with("env_")
    }

    /// True for a quoted literal, a number, a boolean literal or a variable reference.
    pub fn valid_expression_reference(expr: &str) -> bool {
        EXPRESSION_REFERENCE.is_match(expr.trim())
    }

    pub fn valid_operator(op: &str) -> bool {
        op.trim().parse::<ComparisonOperator>().is_ok()
    }

    /// Evaluate a single expression.
    pub fn evaluate(&self, expr: &Value) -> SneaqlResult<Value> {
        let text = match expr {
            Value::String(s) => s.trim(),
            other => return Ok(other.clone()),
        };

        if text == "''" {
            return Ok(Value::String(String::new()));
        }

        if let Some(caps) = ENV_REFERENCE.captures(text) {
            return Ok(self
                .environment_variable(&caps[1])
                .map(Value::from)
                .unwrap_or(Value::Null));
        }

        if let Some(caps) = SESSION_REFERENCE.captures(text) {
            return Ok(self.session.get(&caps[1]).cloned().unwrap_or(Value::Null));
        }

        if let Some(caps) = BRACE_REFERENCE.captures(text) {
            tracing::warn!(reference = %text, "{{var_name}} is deprecated, use :var_name");
            return Ok(self.session.get(&caps[1]).cloned().unwrap_or(Value::Null));
        }

        if text.eq_ignore_ascii_case("true") {
            return Ok(Value::Boolean(true));
        }
        if text.eq_ignore_ascii_case("false") {
            return Ok(Value::Boolean(false));
        }

        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            return unescape(&text[1..text.len() - 1]).map(Value::String);
        }

        Ok(Value::String(text.to_string()))
    }

    /// Substitute every environment, session and brace reference in `sql`.
    ///
    /// Names are substituted longest-prefix first (descending order) so that
    /// `:var_foo` is replaced before `:var`.
    pub fn evaluate_all(&self, sql: &str) -> SneaqlResult<String> {
        self.evaluate_all_reserving(sql, &[])
    }

    /// Like [`evaluate_all`](Self::evaluate_all), but `:<reserved>.field`
    /// references are left for the command that fills them in.
    pub fn evaluate_all_reserving(&self, sql: &str, reserved: &[&str]) -> SneaqlResult<String> {
        let mut statement = sql.to_string();

        let mut env_names: Vec<&String> = self.environment.keys().collect();
        env_names.sort_unstable_by(|a, b| b.cmp(a));
        for name in env_names {
            let pattern = Regex::new(&format!(r"(?i):env_{}", regex::escape(name)))
                .map_err(|e| SneaqlError::ExpressionEvaluation(e.to_string()))?;
            if let Some(value) = self.environment.get(name) {
                statement = pattern
                    .replace_all(&statement, NoExpand(value))
                    .into_owned();
            }
        }

        let mut names: Vec<&String> = self.session.keys().collect();
        names.sort_unstable_by(|a, b| b.cmp(a));
        for name in &names {
            if let Some(value) = self.session.get(*name) {
                statement = replace_session_reference(&statement, name, &value.to_string(), reserved);
            }
        }
        for name in &names {
            if let Some(value) = self.session.get(*name) {
                statement = statement.replace(&format!("{{{}}}", name), &value.to_string());
            }
        }

        Ok(statement)
    }

    /// Evaluate both operands, unify their types and compare them.
    pub fn compare(&self, operator: &str, left: &Value, right: &Value) -> SneaqlResult<bool> {
        let op: ComparisonOperator = operator.parse()?;
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        tracing::debug!(left = %left, operator = %op, right = %right, "Comparing");

        match op {
            ComparisonOperator::Like => like(&left.to_string(), &right.to_string()),
            ComparisonOperator::NotLike => like(&left.to_string(), &right.to_string()).map(|m| !m),
            _ => Ok(match coerce(&left, &right)? {
                Coerced::Boolean(a, b) => op.apply(&a, &b),
                Coerced::Timestamp(a, b) => op.apply(&a, &b),
                Coerced::Float(a, b) => op.apply(&a, &b),
                Coerced::Integer(a, b) => op.apply(&a, &b),
                Coerced::Text(a, b) => op.apply(&a, &b),
            }),
        }
    }
}

/// Decode `\'` and `\\` inside a quoted literal.
fn unescape(inner: &str) -> SneaqlResult<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => {
                    return Err(SneaqlError::ExpressionEvaluation(format!(
                        "dangling escape in '{}'",
                        inner
                    )))
                }
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Replace `:name` unless the occurrence starts a `:<reserved>.` field
/// reference.
fn replace_session_reference(text: &str, name: &str, value: &str, reserved: &[&str]) -> String {
    let needle = format!(":{}", name);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (pos, _) in text.match_indices(&needle) {
        let rest = &text[pos + 1..];
        let field_reference = reserved
            .iter()
            .any(|r| rest.strip_prefix(r).is_some_and(|tail| tail.starts_with('.')));
        if field_reference {
            continue;
        }
        out.push_str(&text[last..pos]);
        out.push_str(value);
        last = pos + needle.len();
    }
    out.push_str(&text[last..]);
    out
}

fn coerce(left: &Value, right: &Value) -> SneaqlResult<Coerced> {
    if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
        return Ok(Coerced::Boolean(to_bool(left)?, to_bool(right)?));
    }

    if matches!(left, Value::Timestamp(_)) || matches!(right, Value::Timestamp(_)) {
        return Ok(match (to_timestamp(left), to_timestamp(right)) {
            (Some(a), Some(b)) => Coerced::Timestamp(a, b),
            _ => text(left, right),
        });
    }

    if matches!(left, Value::Float(_)) || matches!(right, Value::Float(_)) {
        return Ok(match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Coerced::Float(a, b),
            _ => text(left, right),
        });
    }

    if matches!(left, Value::Integer(_)) || matches!(right, Value::Integer(_)) {
        return Ok(match (left.as_i64(), right.as_i64()) {
            (Some(a), Some(b)) => Coerced::Integer(a, b),
            _ => text(left, right),
        });
    }

    Ok(text(left, right))
}

fn text(left: &Value, right: &Value) -> Coerced {
    Coerced::Text(left.to_string(), right.to_string())
}

fn to_bool(value: &Value) -> SneaqlResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(0) => Ok(false),
        Value::Integer(1) => Ok(true),
        Value::Float(f) if *f == 0.0 => Ok(false),
        Value::Float(f) if *f == 1.0 => Ok(true),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            _ => Err(SneaqlError::ExpressionEvaluation(format!(
                "cannot coerce '{}' to boolean",
                s
            ))),
        },
        other => Err(SneaqlError::ExpressionEvaluation(format!(
            "cannot coerce {} '{}' to boolean",
            other.type_name(),
            other
        ))),
    }
}

fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(t) => Some(*t),
        Value::Integer(secs) => DateTime::from_timestamp(*secs, 0).map(|t| t.naive_utc()),
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_utc());
    }
    for format in FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.naive_utc())
}

/// SQL LIKE: `%` matches any run, `_` matches one character.
fn like(value: &str, pattern: &str) -> SneaqlResult<bool> {
    let mut re = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    let re = Regex::new(&re).map_err(|e| SneaqlError::ExpressionEvaluation(e.to_string()))?;
    Ok(re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(env: &[(&str, &str)]) -> ExpressionEvaluator {
        ExpressionEvaluator::with_environment(
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            &EvaluatorOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_variable_names() {
        assert!(ExpressionEvaluator::valid_session_variable_name("var_1"));
        assert!(!ExpressionEvaluator::valid_session_variable_name("1var"));
        assert!(!ExpressionEvaluator::valid_session_variable_name("env_home"));
        assert!(!ExpressionEvaluator::valid_session_variable_name("ENV_HOME"));
        assert!(!ExpressionEvaluator::valid_session_variable_name("a-b"));
        assert!(!ExpressionEvaluator::valid_session_variable_name(""));

        let mut e = evaluator(&[]);
        let err = e.set_session_variable("env_x", Value::Integer(1)).unwrap_err();
        assert!(matches!(err, SneaqlError::InvalidVariableName(_)));
    }

    #[test]
    fn test_expression_references() {
        for expr in ["'a b'", "''", ":var", ":env_HOME", "{var}", "12", "-12", "1.5", "TRUE"] {
            assert!(ExpressionEvaluator::valid_expression_reference(expr), "{}", expr);
        }
        for expr in ["a b", "var", ":", "{a b}", "1.2.3"] {
            assert!(!ExpressionEvaluator::valid_expression_reference(expr), "{}", expr);
        }
    }

    #[test]
    fn test_evaluate() {
        let mut e = evaluator(&[("HOSTNAME", "box")]);
        e.set_session_variable("count", Value::Integer(3)).unwrap();

        assert_eq!(e.evaluate(&Value::Integer(7)).unwrap(), Value::Integer(7));
        assert_eq!(e.evaluate(&"''".into()).unwrap(), Value::from(""));
        assert_eq!(e.evaluate(&":env_HOSTNAME".into()).unwrap(), Value::from("box"));
        assert_eq!(e.evaluate(&":ENV_hostname".into()).unwrap(), Value::from("box"));
        assert_eq!(e.evaluate(&":count".into()).unwrap(), Value::Integer(3));
        assert_eq!(e.evaluate(&"{count}".into()).unwrap(), Value::Integer(3));
        assert_eq!(e.evaluate(&":missing".into()).unwrap(), Value::Null);
        assert_eq!(e.evaluate(&"True".into()).unwrap(), Value::Boolean(true));
        assert_eq!(e.evaluate(&"'hello world'".into()).unwrap(), Value::from("hello world"));
        assert_eq!(e.evaluate(&r"'it\'s'".into()).unwrap(), Value::from("it's"));
        assert_eq!(e.evaluate(&" 42 ".into()).unwrap(), Value::from("42"));
    }

    #[test]
    fn test_evaluate_all_descending_order() {
        let mut e = evaluator(&[]);
        e.set_session_variable("var", Value::from("short")).unwrap();
        e.set_session_variable("var_foo", Value::from("long")).unwrap();

        assert_eq!(
            e.evaluate_all("select :var_foo, :var, {var};").unwrap(),
            "select long, short, short;"
        );
    }

    #[test]
    fn test_evaluate_all_leaves_reserved_field_references() {
        let mut e = evaluator(&[]);
        e.set_session_variable("src", Value::from("oops")).unwrap();
        e.set_session_variable("err", Value::from("oops")).unwrap();

        assert_eq!(
            e.evaluate_all_reserving(
                "insert into t values (:src.id, :err_record.id, :src, :err, ':src_x');",
                &["src", "err_record"],
            )
            .unwrap(),
            "insert into t values (:src.id, :err_record.id, oops, oops, 'oops_x');"
        );
        assert_eq!(
            e.evaluate_all("select :src.id;").unwrap(),
            "select oops.id;"
        );
    }

    #[test]
    fn test_evaluate_all_environment() {
        let e = evaluator(&[("HOME", "/root"), ("HOMEDIR", "/home")]);
        assert_eq!(
            e.evaluate_all("select ':env_HOMEDIR', ':ENV_home';").unwrap(),
            "select '/home', '/root';"
        );
    }

    #[test]
    fn test_evaluate_all_idempotent_without_markers() {
        let mut e = evaluator(&[("HOME", "/root")]);
        e.set_session_variable("a", Value::Integer(1)).unwrap();
        let sql = "select 1 from dual where x = 'y';";
        assert_eq!(e.evaluate_all(sql).unwrap(), sql);
        assert_eq!(e.evaluate_all(&e.evaluate_all(sql).unwrap()).unwrap(), sql);
    }

    #[test]
    fn test_compare_booleans() {
        let e = evaluator(&[]);
        assert!(e.compare("=", &"true".into(), &Value::Integer(1)).unwrap());
        assert!(e.compare("=", &"false".into(), &Value::Integer(0)).unwrap());
        assert!(e.compare("=", &Value::Boolean(true), &"t".into()).unwrap());
        assert!(e.compare("!=", &Value::Boolean(true), &"0".into()).unwrap());
        assert!(e.compare("=", &Value::Boolean(true), &"maybe".into()).is_err());
    }

    #[test]
    fn test_compare_numbers() {
        let e = evaluator(&[]);
        assert!(e.compare(">", &Value::Integer(10), &"9".into()).unwrap());
        assert!(e.compare("<", &Value::Float(1.5), &"2".into()).unwrap());
        assert!(e.compare(">=", &Value::Integer(-2), &"-2".into()).unwrap());
        assert!(e.compare("=", &Value::Integer(3), &"abc".into()).is_ok());
        assert!(!e.compare("=", &Value::Integer(3), &"abc".into()).unwrap());
        // strings compare as text
        assert!(e.compare("<", &"10".into(), &"9".into()).unwrap());
    }

    #[test]
    fn test_compare_timestamps() {
        let e = evaluator(&[]);
        let t = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert!(e
            .compare("=", &Value::Timestamp(t), &"2020-01-02 03:04:05".into())
            .unwrap());
        assert!(e
            .compare(">", &Value::Timestamp(t), &"2020-01-01".into())
            .unwrap());
        assert!(e
            .compare("=", &Value::Timestamp(t), &Value::Integer(1577934245))
            .unwrap());
    }

    #[test]
    fn test_compare_like() {
        let e = evaluator(&[]);
        assert!(e.compare("like", &"turkey".into(), &"turk%".into()).unwrap());
        assert!(!e.compare("notlike", &"turkey".into(), &"turk%".into()).unwrap());
        assert!(e.compare("like", &"turkey".into(), &"t_rkey".into()).unwrap());
        assert!(!e.compare("like", &"turkey".into(), &"urk".into()).unwrap());
        assert!(!e.compare("like", &"a+b".into(), &"a.b".into()).unwrap());
    }

    #[test]
    fn test_invalid_operator() {
        let e = evaluator(&[]);
        let err = e.compare("<>", &Value::Integer(1), &Value::Integer(2)).unwrap_err();
        assert!(matches!(err, SneaqlError::InvalidComparisonOperator(_)));
    }

    #[test]
    fn test_injection_filter() {
        let err = ExpressionEvaluator::with_environment(
            vec![("BAD".to_string(), "x; drop table users".to_string())],
            &EvaluatorOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SneaqlError::InjectionRejected(name) if name == "BAD"));

        let options = EvaluatorOptions {
            disable_injection_check: true,
            ..Default::default()
        };
        assert!(ExpressionEvaluator::with_environment(
            vec![("BAD".to_string(), "x; drop table users".to_string())],
            &options,
        )
        .is_ok());
    }

    #[test]
    fn test_allow_list() {
        let options = EvaluatorOptions {
            available_env_vars: Some(vec!["KEEP".to_string()]),
            disable_injection_check: false,
        };
        let e = ExpressionEvaluator::with_environment(
            vec![
                ("KEEP".to_string(), "yes".to_string()),
                ("BAD".to_string(), "'quoted'".to_string()),
            ],
            &options,
        )
        .unwrap();
        assert_eq!(e.environment_variable("KEEP"), Some("yes"));
        assert_eq!(e.environment_variable("BAD"), None);
    }
}
