//! Flow-Control Builtins
//!
//! `exit`, `return`, `break`, `continue`, plus the trivial `:`/`true`/
//! `false`. The unwinding builtins signal through `ControlFlow`; the
//! numeric sentinel codes never appear.

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::interpreter::control_flow::ControlFlow;
use crate::shell::Shell;

pub fn colon(_shell: &mut Shell, _argv: &[String]) -> BuiltinResult {
    Ok(0)
}

pub fn true_cmd(_shell: &mut Shell, _argv: &[String]) -> BuiltinResult {
    Ok(0)
}

pub fn false_cmd(_shell: &mut Shell, _argv: &[String]) -> BuiltinResult {
    Ok(1)
}

pub fn exit_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let status = match argv.get(1) {
        Some(arg) => match arg.parse::<i32>() {
            // the process exit status is the low byte
            Ok(n) => n & 0xff,
            Err(_) => {
                report(&ShellError::invalid_argument(
                    "exit",
                    format!("{}: numeric argument required", arg),
                ));
                2
            }
        },
        None => shell.last_status,
    };
    Err(ControlFlow::Exit(status))
}

pub fn return_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if shell.function_depth == 0 {
        return Ok(report(&ShellError::invalid_argument(
            "return",
            "can only `return' from a function or sourced script",
        )));
    }
    let status = match argv.get(1) {
        Some(arg) => match arg.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => {
                return Ok(report(&ShellError::invalid_argument(
                    "return",
                    format!("{}: numeric argument required", arg),
                )))
            }
        },
        None => shell.last_status,
    };
    Err(ControlFlow::Return(status))
}

pub fn break_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let count = parse_loop_count(argv, "break")?;
    if shell.loop_depth == 0 {
        // POSIX: break outside a loop is not an error
        return Ok(0);
    }
    Err(ControlFlow::Break(count))
}

pub fn continue_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let count = parse_loop_count(argv, "continue")?;
    if shell.loop_depth == 0 {
        return Ok(0);
    }
    Err(ControlFlow::Continue(count))
}

fn parse_loop_count(argv: &[String], what: &str) -> Result<u32, ControlFlow> {
    match argv.get(1) {
        None => Ok(1),
        Some(arg) => match arg.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => {
                report(&ShellError::invalid_argument(
                    what,
                    format!("{}: loop count must be >= 1", arg),
                ));
                // treated as 1 so the loop still unwinds
                Ok(1)
            }
        },
    }
}
