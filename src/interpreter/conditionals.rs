//! Conditionals
//!
//! `if LIST; then LIST; [elif LIST; then LIST;]* [else LIST;] fi`.
//! The exit status is that of the last executed branch, or 0 when no
//! branch ran. Condition lists run in a tested context, so `set -e` and
//! the ERR trap stay quiet inside them.

use crate::errors::report;
use crate::interpreter::control_flow::ExecResult;
use crate::interpreter::interpreter::{construct_sections, execute_text};
use crate::parser::types::syntax_error;
use crate::shell::Shell;

pub fn execute_if(shell: &mut Shell, text: &str) -> ExecResult {
    let sections = match construct_sections(text, &["then", "elif", "else"], "fi") {
        Ok(s) => s,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };

    // sections come in (condition, then-body) pairs with an optional
    // trailing else
    let mut i = 0;
    while i < sections.len() {
        match sections[i].0.as_str() {
            "if" | "elif" => {
                let condition = &sections[i].1;
                let Some((keyword, body)) = sections.get(i + 1) else {
                    return Ok(shell
                        .set_last_status(report(&syntax_error("missing `then'", text))));
                };
                if keyword != "then" {
                    return Ok(shell
                        .set_last_status(report(&syntax_error("missing `then'", text))));
                }
                let taken = evaluate_condition(shell, condition)? == 0;
                if taken {
                    return execute_text(shell, body);
                }
                i += 2;
            }
            "else" => {
                return execute_text(shell, &sections[i].1);
            }
            _ => {
                return Ok(shell.set_last_status(report(&syntax_error(
                    "malformed if statement",
                    text,
                ))));
            }
        }
    }
    Ok(0)
}

/// Run a condition list in a tested context.
pub fn evaluate_condition(shell: &mut Shell, condition: &str) -> ExecResult {
    shell.condition_depth += 1;
    let result = execute_text(shell, condition);
    shell.condition_depth -= 1;
    result
}

#[cfg(test)]
mod tests {
    use crate::shell::{Shell, ShellOptions};

    fn run(src: &str) -> (Shell, i32) {
        let mut shell = Shell::new(ShellOptions::default());
        let status = shell.run_source(src);
        (shell, status)
    }

    #[test]
    fn test_if_true_branch() {
        let (shell, status) = run("if true; then x=then; fi");
        assert_eq!(status, 0);
        assert_eq!(shell.vars.get("x"), Some("then"));
    }

    #[test]
    fn test_if_else_branch() {
        let (shell, _) = run("if false; then x=then; else x=else; fi");
        assert_eq!(shell.vars.get("x"), Some("else"));
    }

    #[test]
    fn test_elif_chain() {
        let (shell, _) = run("if false; then x=a; elif true; then x=b; else x=c; fi");
        assert_eq!(shell.vars.get("x"), Some("b"));
    }

    #[test]
    fn test_no_branch_taken_status_zero() {
        let (_, status) = run("if false; then false; fi");
        assert_eq!(status, 0);
    }

    #[test]
    fn test_status_of_taken_branch() {
        let (_, status) = run("if true; then false; fi");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_nested_if() {
        let (shell, _) = run("if true; then if true; then x=inner; fi; fi");
        assert_eq!(shell.vars.get("x"), Some("inner"));
    }

    #[test]
    fn test_condition_is_tested_context_under_errexit() {
        let (shell, status) =
            run("set -e\nif false; then x=no; else x=yes; fi");
        assert_eq!(status, 0);
        assert_eq!(shell.vars.get("x"), Some("yes"));
    }

    #[test]
    fn test_multiline_if() {
        let (shell, _) = run("if true\nthen\nx=multi\nfi");
        assert_eq!(shell.vars.get("x"), Some("multi"));
    }
}
