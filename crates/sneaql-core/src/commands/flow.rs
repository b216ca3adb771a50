//! Flow control: `exit_if`, `exit_step_if`, `fail_if`.
//!
//! These commands never deposit errors in the channel.

use super::{arg_text, arg_value, CommandContext, CommandOutcome, ControlSignal};
use crate::error::{SneaqlError, SneaqlResult};
use crate::value::Value;

fn condition(ctx: &CommandContext<'_>, args: &[Value]) -> SneaqlResult<bool> {
    let operator = arg_text(args, 1)?;
    ctx.evaluator
        .compare(&operator, arg_value(args, 0)?, arg_value(args, 2)?)
}

pub(super) fn exit_if(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    if condition(ctx, args)? {
        tracing::info!("exit_if condition met, exiting transform");
        Ok(Some(ControlSignal::TransformExit))
    } else {
        Ok(None)
    }
}

pub(super) fn exit_step_if(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    if condition(ctx, args)? {
        tracing::info!("exit_step_if condition met, exiting step");
        Ok(Some(ControlSignal::StepExit))
    } else {
        Ok(None)
    }
}

pub(super) fn fail_if(ctx: &mut CommandContext<'_>, args: &[Value]) -> CommandOutcome {
    if condition(ctx, args)? {
        let detail = args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Err(SneaqlError::ForcedFailure(format!("fail_if {}", detail)))
    } else {
        Ok(None)
    }
}
