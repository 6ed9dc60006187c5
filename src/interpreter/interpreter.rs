//! Script Interpreter
//!
//! Drives execution of logical lines: recognizes control structures by
//! their reserved word at command-start position, splits everything else
//! into logical units, applies `&&`/`||` short-circuiting, and hands
//! pipelines to the execution engine. Safe points between commands reap
//! children and deliver pending traps.

use crate::errors::{print_error, report, ShellError};
use crate::interpreter::control_flow::{ControlFlow, ExecResult};
use crate::interpreter::{case_eval, conditionals, functions, loops};
use crate::parser::parser::{first_word, split_logical_units, Combinator};
use crate::parser::preprocessor::{BRACEGROUP_MARKER, SUBSHELL_MARKER};
use crate::shell::Shell;
use crate::traps::{TRAP_DEBUG, TRAP_ERR};

/// Execute a block of logical lines, returning the status of the last one.
pub fn execute_block(shell: &mut Shell, lines: &[String]) -> ExecResult {
    let mut status = 0;
    for line in lines {
        status = execute_line(shell, line)?;
        if let Some(code) = shell.pending_exit.take() {
            return Err(ControlFlow::Exit(code));
        }
    }
    Ok(status)
}

/// Execute arbitrary (already preprocessed) source text.
pub fn execute_text(shell: &mut Shell, text: &str) -> ExecResult {
    let lines = crate::parser::parser::parse_into_lines(text);
    execute_block(shell, &lines)
}

/// Execute one logical line: split into units and run them with
/// combinator logic.
fn execute_line(shell: &mut Shell, line: &str) -> ExecResult {
    safe_point(shell);

    let units = match split_logical_units(line) {
        Ok(units) => units,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };

    let mut status = 0;
    let mut prev: Option<Combinator> = None;
    for unit in &units {
        let skip = match prev {
            Some(Combinator::And) => status != 0,
            Some(Combinator::Or) => status == 0,
            _ => false,
        };
        prev = Some(unit.combinator);
        if skip {
            continue;
        }

        let tested = matches!(unit.combinator, Combinator::And | Combinator::Or);
        let background = unit.combinator == Combinator::Background;
        status = execute_unit(shell, &unit.text, background, tested)?;
        shell.set_last_status(status);
        safe_point(shell);
    }
    Ok(status)
}

/// Execute a single logical unit: a control structure, a function
/// definition, or a pipeline.
pub fn execute_unit(
    shell: &mut Shell,
    text: &str,
    background: bool,
    tested: bool,
) -> ExecResult {
    if shell.opts.noexec {
        return Ok(0);
    }

    if background {
        return crate::exec::run_text_in_background(shell, text);
    }

    let first = first_word(text);
    let status = match first {
        "if" => conditionals::execute_if(shell, text)?,
        "while" => loops::execute_while(shell, text, false)?,
        "until" => loops::execute_while(shell, text, true)?,
        "for" => loops::execute_for(shell, text)?,
        "case" => case_eval::execute_case(shell, text)?,
        "function" => functions::define_function(shell, text)?,
        _ if functions::is_function_definition(text) => functions::define_function(shell, text)?,
        _ => {
            fire_debug_trap(shell);
            run_preexec_hooks(shell, text);
            let pipeline = match crate::parser::parser::parse_pipeline(text, &shell.aliases.clone())
            {
                Ok(p) => p,
                Err(err) => return Ok(shell.set_last_status(report(&err))),
            };
            crate::exec::run_pipeline(shell, &pipeline, false)?
        }
    };

    if status != 0 && !tested && shell.condition_depth == 0 {
        handle_errexit(shell, status)?;
    }
    Ok(status)
}

/// Fire the ERR trap and, under `set -e`, exit the shell.
fn handle_errexit(shell: &mut Shell, status: i32) -> ExecResult {
    if let Some(body) = shell.traps.get_trap(TRAP_ERR).map(|s| s.to_string()) {
        if !shell.traps.in_trap {
            shell.traps.in_trap = true;
            let _ = execute_saved_status(shell, &body, status);
            shell.traps.in_trap = false;
        }
    }
    if shell.opts.errexit {
        return Err(ControlFlow::Exit(status));
    }
    Ok(status)
}

fn fire_debug_trap(shell: &mut Shell) {
    if let Some(body) = shell.traps.get_trap(TRAP_DEBUG).map(|s| s.to_string()) {
        if !shell.traps.in_trap {
            shell.traps.in_trap = true;
            let saved = shell.last_status;
            let _ = execute_text(shell, &body);
            shell.last_status = saved;
            shell.traps.in_trap = false;
        }
    }
}

/// Run a trap body with `$?` showing the interrupted point's status.
fn execute_saved_status(shell: &mut Shell, body: &str, status: i32) -> ExecResult {
    shell.last_status = status;
    let result = execute_text(shell, body);
    shell.last_status = status;
    result
}

/// Safe point: reap children after SIGCHLD and deliver pending traps.
/// Trap bodies never nest.
pub fn safe_point(shell: &mut Shell) {
    if crate::traps::take_sigchld() {
        shell.jobs.reap_pending();
    }
    run_pending_traps(shell);
}

pub fn run_pending_traps(shell: &mut Shell) {
    if shell.traps.in_trap {
        return;
    }
    let pending = shell.traps.take_pending();
    for sig in pending {
        if let Some(body) = shell.traps.get_trap(sig).map(|s| s.to_string()) {
            shell.traps.in_trap = true;
            let saved = shell.last_status;
            let _ = execute_saved_status(shell, &body, saved);
            shell.traps.in_trap = false;
        }
    }
}

/// Run the registered hook functions of one kind, in registration order.
/// Hook failures are reported and otherwise ignored.
pub fn run_hooks(shell: &mut Shell, kind: crate::hooks::HookType) {
    let names: Vec<String> = shell.hooks.list(kind).to_vec();
    for name in names {
        if shell.get_function(&name).is_some() {
            let saved = shell.last_status;
            if let Err(flow) = functions::invoke_function(shell, &name, &[]) {
                if let ControlFlow::Exit(code) = flow {
                    shell.pending_exit = Some(code);
                }
            }
            shell.last_status = saved;
        } else {
            print_error(&ShellError::runtime(
                format!("{} hook", kind.as_str()),
                format!("no such function: {}", name),
            ));
        }
    }
}

fn run_preexec_hooks(shell: &mut Shell, _command: &str) {
    if shell.opts.interactive && !shell.hooks.list(crate::hooks::HookType::Preexec).is_empty() {
        run_hooks(shell, crate::hooks::HookType::Preexec);
    }
}

/// Split a construct's text into keyword-delimited sections.
///
/// For `if c1; then b1; elif c2; then b2; else b3; fi` the result is
/// `[("if", "c1"), ("then", "b1"), ("elif", "c2"), ("then", "b2"),
/// ("else", "b3")]`. Nested constructs stay inside their section; the
/// terminating closer is consumed and validated.
pub fn construct_sections(
    text: &str,
    boundaries: &[&str],
    closer: &str,
) -> Result<Vec<(String, String)>, ShellError> {
    let chars: Vec<char> = text.chars().collect();
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current_keyword: Option<String> = None;
    let mut current = String::new();
    let mut i = 0;
    let mut depth = 0i32;
    let mut group_depth = 0i32;
    let mut at_command_pos = true;
    let mut in_single = false;
    let mut in_double = false;
    let mut closed = false;

    while i < chars.len() {
        let c = chars[i];
        if in_single {
            current.push(c);
            if c == '\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }
        if in_double {
            if c == '\\' && i + 1 < chars.len() {
                current.push(c);
                current.push(chars[i + 1]);
                i += 2;
                continue;
            }
            current.push(c);
            if c == '"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                if i + 1 < chars.len() {
                    current.push(chars[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
                at_command_pos = false;
            }
            '\'' => {
                in_single = true;
                current.push(c);
                i += 1;
                at_command_pos = false;
            }
            '"' => {
                in_double = true;
                current.push(c);
                i += 1;
                at_command_pos = false;
            }
            '{' | '(' => {
                group_depth += 1;
                current.push(c);
                i += 1;
                at_command_pos = false;
            }
            '}' | ')' => {
                group_depth -= 1;
                current.push(c);
                i += 1;
                at_command_pos = true;
            }
            ';' | '&' | '|' | '\n' => {
                current.push(c);
                i += 1;
                at_command_pos = true;
            }
            ' ' | '\t' => {
                current.push(c);
                i += 1;
            }
            _ => {
                if c.is_ascii_alphanumeric() || c == '_' {
                    let mut j = i;
                    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    i = j;

                    if at_command_pos && group_depth == 0 {
                        if matches!(word.as_str(), "if" | "while" | "until" | "for" | "case") {
                            depth += 1;
                            if depth == 1 {
                                // the construct's own opener starts section 0
                                current_keyword = Some(word.clone());
                                at_command_pos = true;
                                continue;
                            }
                        } else if matches!(word.as_str(), "fi" | "done" | "esac") {
                            depth -= 1;
                            if depth == 0 {
                                if word != closer {
                                    return Err(ShellError::syntax(
                                        text_fragment(text),
                                        format!("expected `{}', found `{}'", closer, word),
                                    ));
                                }
                                closed = true;
                                break;
                            }
                        } else if depth == 1 && boundaries.contains(&word.as_str()) {
                            sections.push((
                                current_keyword.take().unwrap_or_default(),
                                std::mem::take(&mut current),
                            ));
                            current_keyword = Some(word);
                            at_command_pos = true;
                            continue;
                        }
                    }
                    current.push_str(&word);
                    at_command_pos = false;
                } else {
                    current.push(c);
                    i += 1;
                    at_command_pos = false;
                }
            }
        }
    }

    if !closed {
        return Err(ShellError::syntax(
            text_fragment(text),
            format!("missing `{}'", closer),
        ));
    }
    sections.push((
        current_keyword.unwrap_or_default(),
        std::mem::take(&mut current),
    ));
    Ok(sections)
}

fn text_fragment(text: &str) -> String {
    let t = text.trim();
    if t.chars().count() > 32 {
        let cut: String = t.chars().take(32).collect();
        format!("{}...", cut)
    } else {
        t.to_string()
    }
}

/// A unit beginning with a group marker and nothing else.
pub fn is_group_unit(text: &str) -> bool {
    text.starts_with(SUBSHELL_MARKER) || text.starts_with(BRACEGROUP_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn run(shell: &mut Shell, src: &str) -> i32 {
        shell.run_source(src)
    }

    #[test]
    fn test_construct_sections_if() {
        let sections =
            construct_sections("if a; then b; elif c; then d; else e; fi", &["then", "elif", "else"], "fi")
                .unwrap();
        let keys: Vec<&str> = sections.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["if", "then", "elif", "then", "else"]);
        assert_eq!(sections[0].1.trim().trim_end_matches(';'), "a");
        assert_eq!(sections[4].1.trim(), "e");
    }

    #[test]
    fn test_construct_sections_nested() {
        let sections = construct_sections(
            "if a; then if b; then c; fi; else d; fi",
            &["then", "elif", "else"],
            "fi",
        )
        .unwrap();
        let keys: Vec<&str> = sections.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["if", "then", "else"]);
        assert!(sections[1].1.contains("if b; then c; fi"));
    }

    #[test]
    fn test_construct_sections_missing_closer() {
        assert!(construct_sections("if a; then b", &["then", "elif", "else"], "fi").is_err());
    }

    #[test]
    fn test_and_or_chains() {
        let mut sh = shell();
        assert_eq!(run(&mut sh, "true && true"), 0);
        assert_eq!(run(&mut sh, "false && true"), 1);
        assert_eq!(run(&mut sh, "false || true"), 0);
        assert_eq!(run(&mut sh, "true || false"), 0);
    }

    #[test]
    fn test_sequence_status_is_last() {
        let mut sh = shell();
        assert_eq!(run(&mut sh, "false; true"), 0);
        assert_eq!(run(&mut sh, "true; false"), 1);
    }

    #[test]
    fn test_last_status_variable() {
        let mut sh = shell();
        run(&mut sh, "false");
        assert_eq!(sh.last_status, 1);
        run(&mut sh, "true");
        assert_eq!(sh.last_status, 0);
    }

    #[test]
    fn test_variable_assignment_line() {
        let mut sh = shell();
        assert_eq!(run(&mut sh, "x=5"), 0);
        assert_eq!(sh.vars.get("x"), Some("5"));
    }

    #[test]
    fn test_exit_propagates() {
        let mut sh = shell();
        run(&mut sh, "exit 7");
        assert_eq!(sh.pending_exit, Some(7));
    }
}
