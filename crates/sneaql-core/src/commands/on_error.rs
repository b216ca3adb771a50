//! `on_error` handler.

use std::str::FromStr;

use super::{arg_text, CommandContext, CommandOutcome, ControlSignal};
use crate::error::SneaqlError;
use crate::value::{Record, Value};

/// What `on_error` does with a pending error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnErrorAction {
    /// Log and clear the error.
    Continue,
    /// Clear the error and skip the rest of the step.
    ExitStep,
    /// Run the statement body with error details substituted, then clear.
    Execute,
    /// Fail the transform.
    Fail,
}

impl FromStr for OnErrorAction {
    type Err = SneaqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(OnErrorAction::Continue),
            "exit_step" => Ok(OnErrorAction::ExitStep),
            "execute" => Ok(OnErrorAction::Execute),
            "fail" => Ok(OnErrorAction::Fail),
            other => Err(SneaqlError::StatementParsing(format!(
                "unknown on_error action '{}'",
                other
            ))),
        }
    }
}

pub(super) fn validate_args(args: &[String]) -> bool {
    matches!(args, [action] if action.parse::<OnErrorAction>().is_ok())
}

/// Prefix of the failing record's field references.
pub(crate) const ERR_RECORD: &str = "err_record";

/// Substitute `:err_record.<field>`, `:err_message` and `:err_type`.
pub(crate) fn error_sql(statement: &str, record: Option<&Record>, error: &SneaqlError) -> String {
    let mut sql = statement.to_string();
    if let Some(record) = record {
        for (field, value) in record.iter().rev() {
            sql = sql.replace(&format!(":{}.{}", ERR_RECORD, field), &value.to_string());
        }
    }
    sql.replace(":err_message", &error.to_string().replace('\'', "''"))
        .replace(":err_type", &error.qualified_name())
}

pub(super) fn on_error(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    let action: OnErrorAction = arg_text(args, 0)?.parse()?;
    let Some(error) = ctx.errors.pending_error().cloned() else {
        return Ok(None);
    };

    tracing::error!(error = %error, action = ?action, "Handling error");
    match action {
        OnErrorAction::Continue => {
            ctx.errors.clear();
            tracing::info!("Continuing after error due to on_error handling");
            Ok(None)
        }
        OnErrorAction::ExitStep => {
            ctx.errors.clear();
            tracing::info!("Exiting step due to on_error handling");
            Ok(Some(ControlSignal::StepExit))
        }
        OnErrorAction::Execute => {
            let sql = error_sql(ctx.statement, ctx.errors.last_iterated_record(), &error);
            tracing::info!("Executing sql block due to on_error handling");
            let rows = ctx.database()?.execute(&sql)?;
            ctx.set_rows_affected(rows)?;
            ctx.errors.clear();
            Ok(None)
        }
        OnErrorAction::Fail => {
            tracing::info!("Exiting due to failure");
            Err(SneaqlError::ForcedFailure(error.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Harness;
    use crate::commands::BuiltinCommand;
    use crate::value::record;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn fail_insert(h: &mut Harness) {
        h.run(BuiltinCommand::Execute, &[], "insert into missing values (1);")
            .unwrap();
        assert!(h.errors.has_pending());
    }

    #[test]
    fn test_validate_args() {
        assert!(validate_args(&strings(&["continue"])));
        assert!(validate_args(&strings(&["EXIT_STEP"])));
        assert!(validate_args(&strings(&["execute"])));
        assert!(validate_args(&strings(&["fail"])));
        assert!(!validate_args(&strings(&["retry"])));
        assert!(!validate_args(&strings(&["continue", "fail"])));
        assert!(!validate_args(&[]));
    }

    #[test]
    fn test_no_pending_error_is_noop() {
        let mut h = Harness::new();
        assert_eq!(h.run(BuiltinCommand::OnError, &["fail"], "").unwrap(), None);
    }

    #[test]
    fn test_continue() {
        let mut h = Harness::new();
        fail_insert(&mut h);
        assert_eq!(h.run(BuiltinCommand::OnError, &["continue"], "").unwrap(), None);
        assert!(!h.errors.has_pending());
    }

    #[test]
    fn test_exit_step() {
        let mut h = Harness::new();
        fail_insert(&mut h);
        assert_eq!(
            h.run(BuiltinCommand::OnError, &["exit_step"], "").unwrap(),
            Some(ControlSignal::StepExit)
        );
        assert!(!h.errors.has_pending());
    }

    #[test]
    fn test_fail_keeps_error() {
        let mut h = Harness::new();
        fail_insert(&mut h);
        let err = h.run(BuiltinCommand::OnError, &["fail"], "").unwrap_err();
        assert!(matches!(err, SneaqlError::ForcedFailure(_)));
        assert!(h.errors.has_pending());
    }

    #[test]
    fn test_execute_substitutes_error_details() {
        let mut h = Harness::new();
        h.run(
            BuiltinCommand::Execute,
            &[],
            "create table errors (field1 integer, err_type varchar, err_message varchar);",
        )
        .unwrap();
        fail_insert(&mut h);
        h.errors
            .set_last_iterated_record(record([("field1", Value::Integer(1))]));

        h.run(
            BuiltinCommand::OnError,
            &["execute"],
            "insert into errors values (:err_record.field1, ':err_type', ':err_message');",
        )
        .unwrap();
        assert!(!h.errors.has_pending());

        let rows = h.db.query_rows("select * from errors").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["field1"], Value::Integer(1));
        assert_eq!(
            rows[0]["err_type"],
            Value::from("sneaql_core::error::SneaqlError::Database")
        );
    }

    #[test]
    fn test_execute_failure_is_fatal() {
        let mut h = Harness::new();
        fail_insert(&mut h);
        let err = h
            .run(BuiltinCommand::OnError, &["execute"], "insert into nowhere values (1);")
            .unwrap_err();
        assert!(matches!(err, SneaqlError::Database(_)));
    }

    #[test]
    fn test_error_sql() {
        let r = record([("id", Value::Integer(7)), ("id_text", Value::from("seven"))]);
        let err = SneaqlError::Database("it's broken".to_string());
        assert_eq!(
            error_sql(
                "values (:err_record.id_text, :err_record.id, ':err_message')",
                Some(&r),
                &err
            ),
            "values (seven, 7, 'Database error: it''s broken')"
        );
    }
}
