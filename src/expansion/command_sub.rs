//! Command Substitution
//!
//! `$( ... )` and `` ` ... ` ``. The body runs in the current shell
//! context - it shares the variable store - but its stdout is captured
//! through a temp file swapped onto fd 1 for the duration. Trailing
//! newlines are stripped from the captured output.

use std::io::Write;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::unistd::{close, dup, dup2};

use crate::errors::ShellError;
use crate::interpreter::control_flow::ControlFlow;
use crate::parser::parser::parse_into_lines;
use crate::parser::preprocessor::preprocess;
use crate::shell::Shell;

static CAPTURE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Run `body` with stdout captured; returns the output with trailing
/// newlines removed. `$?` afterwards is the body's exit status.
pub fn command_substitute(shell: &mut Shell, body: &str) -> Result<String, ShellError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(String::new());
    }

    let pre = preprocess(body)?;
    shell.here_docs.extend(pre.here_docs.clone());
    let lines = parse_into_lines(&pre.text);

    let tmp_path = std::env::temp_dir().join(format!(
        "cjsh_capture_{}_{}",
        std::process::id(),
        CAPTURE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let file = std::fs::File::create(&tmp_path)
        .map_err(|e| ShellError::runtime("command substitution", e.to_string()))?;

    // swap the temp file onto fd 1 around the body
    std::io::stdout()
        .flush()
        .map_err(|e| ShellError::runtime("command substitution", e.to_string()))?;
    let saved_stdout = dup(libc::STDOUT_FILENO)
        .map_err(|e| ShellError::runtime("command substitution", e.to_string()))?;
    if let Err(e) = dup2(file.as_raw_fd(), libc::STDOUT_FILENO) {
        let _ = close(saved_stdout);
        let _ = std::fs::remove_file(&tmp_path);
        return Err(ShellError::runtime("command substitution", e.to_string()));
    }

    let status = match crate::interpreter::execute_block(shell, &lines) {
        Ok(status) => status,
        // `exit` inside a substitution ends the substitution, not the shell
        Err(ControlFlow::Exit(code)) => code,
        Err(_) => shell.last_status,
    };

    let _ = std::io::stdout().flush();
    let _ = dup2(saved_stdout, libc::STDOUT_FILENO);
    let _ = close(saved_stdout);
    drop(file);

    shell.last_status = status;

    let mut output = std::fs::read_to_string(&tmp_path).unwrap_or_default();
    let _ = std::fs::remove_file(&tmp_path);
    while output.ends_with('\n') {
        output.pop();
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::redirect::test_support::FD_LOCK;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    #[test]
    fn test_empty_body() {
        let mut sh = shell();
        assert_eq!(command_substitute(&mut sh, "").unwrap(), "");
        assert_eq!(command_substitute(&mut sh, "  ").unwrap(), "");
    }

    #[test]
    fn test_captures_builtin_output() {
        let _lock = FD_LOCK.lock().unwrap();
        let mut sh = shell();
        assert_eq!(command_substitute(&mut sh, "echo hello").unwrap(), "hello");
    }

    #[test]
    fn test_trailing_newlines_stripped() {
        let _lock = FD_LOCK.lock().unwrap();
        let mut sh = shell();
        let out = command_substitute(&mut sh, "echo a; echo; echo").unwrap();
        assert_eq!(out, "a");
    }

    #[test]
    fn test_shares_variable_store() {
        let _lock = FD_LOCK.lock().unwrap();
        let mut sh = shell();
        sh.vars.set("v", "shared").unwrap();
        assert_eq!(command_substitute(&mut sh, "echo $v").unwrap(), "shared");
    }

    #[test]
    fn test_status_propagates() {
        let _lock = FD_LOCK.lock().unwrap();
        let mut sh = shell();
        let _ = command_substitute(&mut sh, "false").unwrap();
        assert_eq!(sh.last_status, 1);
    }
}
