//! Commands named in statement tags.
//!
//! Built-in commands are the [`BuiltinCommand`] variants. Extensions
//! implement [`Command`] and register a factory with the
//! [`Registry`](crate::registry::Registry).

mod flow;
mod on_error;
mod recordset;
mod sql;

pub use on_error::OnErrorAction;

use std::fmt;

use crate::database::Database;
use crate::error::{SneaqlError, SneaqlResult};
use crate::exceptions::ErrorChannel;
use crate::expression::ExpressionEvaluator;
use crate::recordset::RecordsetStore;
use crate::registry::{Capability, Registry};
use crate::value::Value;

/// Session variable holding the row count of the last executed statement.
pub const ROWS_AFFECTED_VARIABLE: &str = "last_statement_rows_affected";

/// Names whose `:<name>.field` references are filled in by commands
/// rather than by session-variable substitution.
pub fn reserved_references(recordsets: &RecordsetStore) -> Vec<&str> {
    let mut reserved = recordsets.names();
    reserved.push(on_error::ERR_RECORD);
    reserved
}

/// Designed control flow, distinct from failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Skip the rest of the current step.
    StepExit,
    /// Stop the whole transform without error.
    TransformExit,
}

/// Declared argument shape used by generic validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Variable,
    Expression,
    Operator,
    Recordset,
}

impl ArgKind {
    pub fn accepts(&self, arg: &str) -> bool {
        let arg = arg.trim();
        match self {
            ArgKind::Variable => ExpressionEvaluator::valid_session_variable_name(arg),
            ArgKind::Expression => ExpressionEvaluator::valid_expression_reference(arg),
            ArgKind::Operator => ExpressionEvaluator::valid_operator(arg),
            ArgKind::Recordset => RecordsetStore::valid_recordset_name(arg),
        }
    }
}

/// Check raw tag arguments against declared shapes.
pub fn validate_arg_kinds(kinds: &[ArgKind], args: &[String]) -> bool {
    kinds.len() == args.len() && kinds.iter().zip(args).all(|(kind, arg)| kind.accepts(arg))
}

/// Everything a command may touch while it runs.
pub struct CommandContext<'a> {
    pub database: Option<&'a dyn Database>,
    pub evaluator: &'a mut ExpressionEvaluator,
    pub errors: &'a mut ErrorChannel,
    pub recordsets: &'a mut RecordsetStore,
    /// Statement body with variables already substituted.
    pub statement: &'a str,
}

impl<'a> CommandContext<'a> {
    pub fn database(&self) -> SneaqlResult<&'a dyn Database> {
        self.database
            .ok_or_else(|| SneaqlError::Database("no database connection".to_string()))
    }

    /// Bind the rows-affected session variable.
    pub fn set_rows_affected(&mut self, rows: u64) -> SneaqlResult<()> {
        let rows = i64::try_from(rows).unwrap_or(i64::MAX);
        self.evaluator
            .set_session_variable(ROWS_AFFECTED_VARIABLE, Value::Integer(rows))
    }
}

/// Result of running a command.
pub type CommandOutcome = SneaqlResult<Option<ControlSignal>>;

/// A tag command.
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    /// Argument shapes checked by the default `validate_args`.
    fn arg_definition(&self) -> &[ArgKind] {
        &[]
    }

    /// Check raw tag arguments before anything runs.
    fn validate_args(&self, args: &[String]) -> bool {
        validate_arg_kinds(self.arg_definition(), args)
    }

    /// Run the command with evaluated arguments.
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome;
}

/// The built-in command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCommand {
    Assign,
    AssignResult,
    Execute,
    ExecuteIf,
    Test,
    ExitIf,
    ExitStepIf,
    FailIf,
    Recordset,
    RemoveRecordset,
    Iterate,
    RsFromLocalDir,
    OnError,
}

impl BuiltinCommand {
    pub const ALL: [BuiltinCommand; 13] = [
        BuiltinCommand::Assign,
        BuiltinCommand::AssignResult,
        BuiltinCommand::Execute,
        BuiltinCommand::ExecuteIf,
        BuiltinCommand::Test,
        BuiltinCommand::ExitIf,
        BuiltinCommand::ExitStepIf,
        BuiltinCommand::FailIf,
        BuiltinCommand::Recordset,
        BuiltinCommand::RemoveRecordset,
        BuiltinCommand::Iterate,
        BuiltinCommand::RsFromLocalDir,
        BuiltinCommand::OnError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinCommand::Assign => "assign",
            BuiltinCommand::AssignResult => "assign_result",
            BuiltinCommand::Execute => "execute",
            BuiltinCommand::ExecuteIf => "execute_if",
            BuiltinCommand::Test => "test",
            BuiltinCommand::ExitIf => "exit_if",
            BuiltinCommand::ExitStepIf => "exit_step_if",
            BuiltinCommand::FailIf => "fail_if",
            BuiltinCommand::Recordset => "recordset",
            BuiltinCommand::RemoveRecordset => "remove_recordset",
            BuiltinCommand::Iterate => "iterate",
            BuiltinCommand::RsFromLocalDir => "rs_from_local_dir",
            BuiltinCommand::OnError => "on_error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Flow commands let their errors propagate; all others deposit
    /// failures into the error channel.
    pub fn captures_errors(&self) -> bool {
        !matches!(
            self,
            BuiltinCommand::ExitIf
                | BuiltinCommand::ExitStepIf
                | BuiltinCommand::FailIf
                | BuiltinCommand::OnError
        )
    }
}

impl fmt::Display for BuiltinCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NO_ARGS: &[ArgKind] = &[];
const VARIABLE: &[ArgKind] = &[ArgKind::Variable];
const VARIABLE_EXPRESSION: &[ArgKind] = &[ArgKind::Variable, ArgKind::Expression];
const COMPARISON: &[ArgKind] = &[ArgKind::Expression, ArgKind::Operator, ArgKind::Expression];
const OPERATOR_EXPRESSION: &[ArgKind] = &[ArgKind::Operator, ArgKind::Expression];
const RECORDSET: &[ArgKind] = &[ArgKind::Recordset];
const RECORDSET_EXPRESSION: &[ArgKind] = &[ArgKind::Recordset, ArgKind::Expression];

impl Command for BuiltinCommand {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn arg_definition(&self) -> &[ArgKind] {
        match self {
            BuiltinCommand::Assign => VARIABLE_EXPRESSION,
            BuiltinCommand::AssignResult => VARIABLE,
            BuiltinCommand::Execute => NO_ARGS,
            BuiltinCommand::ExecuteIf
            | BuiltinCommand::ExitIf
            | BuiltinCommand::ExitStepIf
            | BuiltinCommand::FailIf => COMPARISON,
            BuiltinCommand::Test => OPERATOR_EXPRESSION,
            BuiltinCommand::Recordset | BuiltinCommand::RemoveRecordset => RECORDSET,
            BuiltinCommand::Iterate => RECORDSET,
            BuiltinCommand::RsFromLocalDir => RECORDSET_EXPRESSION,
            BuiltinCommand::OnError => NO_ARGS,
        }
    }

    fn validate_args(&self, args: &[String]) -> bool {
        match self {
            BuiltinCommand::Iterate => recordset::validate_iterate_args(args),
            BuiltinCommand::OnError => on_error::validate_args(args),
            _ => validate_arg_kinds(self.arg_definition(), args),
        }
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
        let outcome = match self {
            BuiltinCommand::Assign => sql::assign(ctx, args),
            BuiltinCommand::AssignResult => sql::assign_result(ctx, args),
            BuiltinCommand::Execute => sql::execute(ctx),
            BuiltinCommand::ExecuteIf => sql::execute_if(ctx, args),
            BuiltinCommand::Test => sql::test(ctx, args),
            BuiltinCommand::ExitIf => flow::exit_if(ctx, args),
            BuiltinCommand::ExitStepIf => flow::exit_step_if(ctx, args),
            BuiltinCommand::FailIf => flow::fail_if(ctx, args),
            BuiltinCommand::Recordset => recordset::recordset_from_query(ctx, args),
            BuiltinCommand::RemoveRecordset => recordset::remove_recordset(ctx, args),
            BuiltinCommand::Iterate => recordset::iterate(ctx, args),
            BuiltinCommand::RsFromLocalDir => recordset::rs_from_local_dir(ctx, args),
            BuiltinCommand::OnError => on_error::on_error(ctx, args),
        };

        match outcome {
            Err(e) if self.captures_errors() => {
                ctx.errors.set_pending(e);
                Ok(None)
            }
            other => other,
        }
    }
}

/// Argument `index` rendered as text.
pub(crate) fn arg_text(args: &[Value], index: usize) -> SneaqlResult<String> {
    args.get(index)
        .map(|v| v.to_string())
        .ok_or_else(|| SneaqlError::StatementParsing(format!("missing argument {}", index + 1)))
}

pub(crate) fn arg_value(args: &[Value], index: usize) -> SneaqlResult<&Value> {
    args.get(index)
        .ok_or_else(|| SneaqlError::StatementParsing(format!("missing argument {}", index + 1)))
}

pub(crate) fn register_builtins(registry: &mut Registry) {
    for command in BuiltinCommand::ALL {
        registry.register(
            command.as_str(),
            Capability::command(move || Box::new(command) as Box<dyn Command>),
        );
    }
}
