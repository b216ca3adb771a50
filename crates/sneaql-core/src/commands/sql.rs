//! Commands that bind variables and run the statement body.

use super::{arg_text, arg_value, CommandContext, CommandOutcome, ControlSignal};
use crate::value::Value;

/// `assign var expr`
pub(super) fn assign(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let name = arg_text(args, 0)?;
    let value = arg_value(args, 1)?.clone();
    ctx.evaluator.set_session_variable(&name, value)?;
    Ok(None)
}

/// `assign_result var`: first column of the first row, `Null` when empty.
pub(super) fn assign_result(
    ctx: &mut CommandContext<'_>,
    args: &[Value],
) -> CommandOutcome {
    let name = arg_text(args, 0)?;
    let value = ctx.database()?.query_single_value(ctx.statement)?;
    ctx.evaluator.set_session_variable(&name, value)?;
    Ok(None)
}

/// `execute`
pub(super) fn execute(ctx: &mut CommandContext<'_>) -> CommandOutcome {
    let rows = ctx.database()?.execute(ctx.statement)?;
    tracing::debug!(rows_affected = rows, "Executed statement");
    ctx.set_rows_affected(rows)?;
    Ok(None)
}

/// `execute_if left op right`
pub(super) fn execute_if(
    ctx: &mut CommandContext<'_>,
    args: &[Value],
) -> CommandOutcome {
    let operator = arg_text(args, 1)?;
    if ctx
        .evaluator
        .compare(&operator, arg_value(args, 0)?, arg_value(args, 2)?)?
    {
        execute(ctx)
    } else {
        tracing::debug!("Condition false, statement skipped");
        Ok(None)
    }
}

/// `test op expr`: compares the query's first value against `expr` and
/// exits the step when the comparison is false.
pub(super) fn test(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let operator = arg_text(args, 0)?;
    let expected = arg_value(args, 1)?;
    let actual = ctx.database()?.query_single_value(ctx.statement)?;

    if ctx.evaluator.compare(&operator, &actual, expected)? {
        Ok(None)
    } else {
        tracing::info!(
            actual = %actual,
            operator = %operator,
            expected = %expected,
            "Test failed, exiting step"
        );
        Ok(Some(ControlSignal::StepExit))
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::Harness;
    use crate::commands::{BuiltinCommand, ControlSignal, ROWS_AFFECTED_VARIABLE};
    use crate::error::SneaqlError;
    use crate::value::Value;

    #[test]
    fn test_assign() {
        let mut h = Harness::new();
        h.run(BuiltinCommand::Assign, &["greeting", "'hello world'"], "").unwrap();
        assert_eq!(h.var("greeting"), Some(Value::from("hello world")));

        h.run(BuiltinCommand::Assign, &["copy", ":greeting"], "").unwrap();
        assert_eq!(h.var("copy"), Some(Value::from("hello world")));
    }

    #[test]
    fn test_assign_invalid_name_goes_to_channel() {
        let mut h = Harness::new();
        let outcome = h.run(BuiltinCommand::Assign, &["env_x", "1"], "").unwrap();
        assert_eq!(outcome, None);
        assert!(matches!(
            h.errors.pending_error(),
            Some(SneaqlError::InvalidVariableName(_))
        ));
    }

    #[test]
    fn test_assign_result() {
        let mut h = Harness::new();
        h.run(BuiltinCommand::AssignResult, &["n"], "select 42 as a, 7 as b;")
            .unwrap();
        assert_eq!(h.var("n"), Some(Value::Integer(42)));

        h.run(BuiltinCommand::AssignResult, &["empty"], "select 1 where 1 = 0;")
            .unwrap();
        assert_eq!(h.var("empty"), Some(Value::Null));
    }

    #[test]
    fn test_execute_sets_rows_affected() {
        let mut h = Harness::new();
        h.run(BuiltinCommand::Execute, &[], "create table t (x integer);")
            .unwrap();
        h.run(BuiltinCommand::Execute, &[], "insert into t values (1), (2), (3);")
            .unwrap();
        assert_eq!(h.var(ROWS_AFFECTED_VARIABLE), Some(Value::Integer(3)));
    }

    #[test]
    fn test_execute_failure_goes_to_channel() {
        let mut h = Harness::new();
        let outcome = h
            .run(BuiltinCommand::Execute, &[], "insert into missing values (1);")
            .unwrap();
        assert_eq!(outcome, None);
        assert!(matches!(h.errors.pending_error(), Some(SneaqlError::Database(_))));
    }

    #[test]
    fn test_execute_if() {
        let mut h = Harness::new();
        h.run(BuiltinCommand::Execute, &[], "create table t (x integer);")
            .unwrap();
        h.run(BuiltinCommand::Assign, &["flag", "1"], "").unwrap();

        h.run(BuiltinCommand::ExecuteIf, &[":flag", "=", "0"], "insert into t values (1);")
            .unwrap();
        h.run(BuiltinCommand::ExecuteIf, &[":flag", "=", "1"], "insert into t values (2);")
            .unwrap();

        assert_eq!(
            h.db.query_single_value("select count(*) from t").unwrap(),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_test_command() {
        let mut h = Harness::new();
        let outcome = h.run(BuiltinCommand::Test, &["=", "1"], "select 1;").unwrap();
        assert_eq!(outcome, None);

        let outcome = h.run(BuiltinCommand::Test, &[">", "5"], "select 1;").unwrap();
        assert_eq!(outcome, Some(ControlSignal::StepExit));
        assert!(!h.errors.has_pending());
    }
}
