//! history

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::shell::Shell;

pub fn history_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    match argv.get(1).map(|s| s.as_str()) {
        None => {
            print!("{}", shell.history.listing());
            Ok(0)
        }
        Some("-c") => {
            shell.history.clear();
            Ok(0)
        }
        Some(other) => Ok(report(&ShellError::invalid_argument(
            "history",
            format!("{}: invalid option", other),
        ))),
    }
}
