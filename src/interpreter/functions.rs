//! Functions
//!
//! Definition (`NAME() COMPOUND` and `function NAME COMPOUND`) and
//! invocation. A call pushes a local variable frame and rebinds the
//! positional parameters; `return [n]` unwinds exactly that frame. The
//! stored body is the preprocessed compound text (usually a
//! `BRACEGROUP{...}` marker), so invocation is just interpretation.

use crate::errors::{report, ShellError};
use crate::interpreter::control_flow::{ControlFlow, ExecResult};
use crate::interpreter::interpreter::{execute_text, is_group_unit};
use crate::parser::types::syntax_error;
use crate::shell::Shell;
use crate::traps::TRAP_RETURN;
use crate::vars::is_valid_identifier;

/// Does this unit define a function via the `NAME()` form?
pub fn is_function_definition(text: &str) -> bool {
    parse_paren_form(text).is_some()
}

/// Parse `NAME() rest` / `NAME () rest`; returns (name, rest).
fn parse_paren_form(text: &str) -> Option<(String, String)> {
    let text = text.trim_start();
    let name_end = text.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    if name_end == 0 {
        return None;
    }
    let name = &text[..name_end];
    let rest = text[name_end..].trim_start();
    let rest = rest.strip_prefix('(')?;
    let rest = rest.trim_start().strip_prefix(')')?;
    Some((name.to_string(), rest.trim_start().to_string()))
}

/// Register a function definition. Redefinition replaces the old body.
pub fn define_function(shell: &mut Shell, text: &str) -> ExecResult {
    let (name, compound) = if let Some(rest) = text.trim_start().strip_prefix("function ") {
        let rest = rest.trim_start();
        match parse_paren_form(rest) {
            Some(parts) => parts,
            None => {
                // `function NAME COMPOUND` without parentheses
                let name_end = rest
                    .find(char::is_whitespace)
                    .unwrap_or(rest.len());
                (
                    rest[..name_end].to_string(),
                    rest[name_end..].trim_start().to_string(),
                )
            }
        }
    } else {
        match parse_paren_form(text) {
            Some(parts) => parts,
            None => {
                return Ok(shell
                    .set_last_status(report(&syntax_error("malformed function definition", text))))
            }
        }
    };

    if !is_valid_identifier(&name) {
        return Ok(shell.set_last_status(report(&ShellError::syntax(
            "function",
            format!("`{}' is not a valid identifier", name),
        ))));
    }
    if compound.is_empty() || !is_group_unit(&compound) {
        return Ok(shell
            .set_last_status(report(&syntax_error("missing function body", text))));
    }

    shell.register_function(&name, &compound);
    Ok(0)
}

/// Invoke a function: new local frame, fresh positionals, RETURN trap on
/// the way out. `$0` keeps the shell name.
pub fn invoke_function(shell: &mut Shell, name: &str, args: &[String]) -> ExecResult {
    let body = match shell.get_function(name) {
        Some(b) => b.to_string(),
        None => {
            return Ok(shell.set_last_status(report(&ShellError::CommandNotFound {
                name: name.to_string(),
                suggestions: vec![],
            })))
        }
    };

    let saved_positionals = shell.vars.positional_take();
    shell.vars.positional_set(args.to_vec());
    shell.vars.push_frame();
    shell.function_depth += 1;
    // loops outside the function are not visible to break/continue inside
    let saved_loop_depth = std::mem::replace(&mut shell.loop_depth, 0);

    let result = execute_text(shell, &body);

    fire_return_trap(shell);
    shell.loop_depth = saved_loop_depth;
    shell.function_depth -= 1;
    shell.vars.pop_frame();
    shell.vars.positional_set(saved_positionals);

    match result {
        Err(ControlFlow::Return(status)) => Ok(status),
        Err(ControlFlow::Break(_)) | Err(ControlFlow::Continue(_)) => Ok(0),
        other => other,
    }
}

fn fire_return_trap(shell: &mut Shell) {
    if let Some(body) = shell.traps.get_trap(TRAP_RETURN).map(|s| s.to_string()) {
        if !shell.traps.in_trap {
            shell.traps.in_trap = true;
            let _ = execute_text(shell, &body);
            shell.traps.in_trap = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn run(src: &str) -> (Shell, i32) {
        let mut shell = Shell::new(ShellOptions::default());
        let status = shell.run_source(src);
        (shell, status)
    }

    #[test]
    fn test_is_function_definition() {
        assert!(is_function_definition("f() BRACEGROUP{echo hi}"));
        assert!(is_function_definition("my_func () BRACEGROUP{echo hi}"));
        assert!(!is_function_definition("echo hi"));
        assert!(!is_function_definition("f ( x )"));
    }

    #[test]
    fn test_define_and_call() {
        let (shell, status) = run("f() { x=called; }\nf");
        assert_eq!(status, 0);
        assert_eq!(shell.vars.get("x"), Some("called"));
    }

    #[test]
    fn test_function_keyword_form() {
        let (shell, _) = run("function g { y=keyword; }\ng");
        assert_eq!(shell.vars.get("y"), Some("keyword"));
    }

    #[test]
    fn test_redefinition_replaces() {
        let (shell, _) = run("f() { x=one; }\nf() { x=two; }\nf");
        assert_eq!(shell.vars.get("x"), Some("two"));
    }

    #[test]
    fn test_arguments_are_positional() {
        let (shell, _) = run("f() { out=$1-$2-$#; }\nf a b");
        assert_eq!(shell.vars.get("out"), Some("a-b-2"));
    }

    #[test]
    fn test_positionals_restored_after_call() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.positional_set(vec!["outer".into()]);
        shell.run_source("f() { :; }\nf inner1 inner2");
        assert_eq!(shell.vars.positional(), &["outer".to_string()]);
    }

    #[test]
    fn test_local_scoping() {
        let (shell, _) = run("f() { local a=1; inner=$a; }\na=outer\nf");
        assert_eq!(shell.vars.get("inner"), Some("1"));
        assert_eq!(shell.vars.get("a"), Some("outer"));
    }

    #[test]
    fn test_return_status() {
        let (_, status) = run("f() { return 5; }\nf");
        assert_eq!(status, 5);
    }

    #[test]
    fn test_return_unwinds_one_frame_only() {
        let (shell, status) = run("f() { return 3; }\ng() { f; rc=$?; return 7; }\ng");
        assert_eq!(status, 7);
        assert_eq!(shell.vars.get("rc"), Some("3"));
    }

    #[test]
    fn test_undefined_function_is_command_not_found() {
        let (_, status) = run("definitely_not_defined_zz");
        assert_eq!(status, 127);
    }
}
