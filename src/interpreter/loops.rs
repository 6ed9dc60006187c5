//! Loops
//!
//! `while LIST; do LIST; done`, `until`, and `for NAME in WORDS`.
//! `break [n]` / `continue [n]` unwind exactly n enclosing loops; counts
//! larger than the nesting unwind everything and succeed.

use crate::errors::{report, ShellError};
use crate::expansion;
use crate::interpreter::conditionals::evaluate_condition;
use crate::interpreter::control_flow::{ControlFlow, ExecResult};
use crate::interpreter::interpreter::{construct_sections, execute_text, safe_point};
use crate::parser::types::syntax_error;
use crate::shell::Shell;
use crate::vars::is_valid_identifier;

pub fn execute_while(shell: &mut Shell, text: &str, until: bool) -> ExecResult {
    let opener = if until { "until" } else { "while" };
    let sections = match construct_sections(text, &["do"], "done") {
        Ok(s) => s,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };
    let (condition, body) = match sections.as_slice() {
        [(kw, cond), (do_kw, body)] if kw == opener && do_kw == "do" => {
            (cond.clone(), body.clone())
        }
        _ => {
            return Ok(shell.set_last_status(report(&syntax_error(
                format!("malformed {} loop", opener),
                text,
            ))))
        }
    };

    shell.loop_depth += 1;
    let result = run_condition_loop(shell, &condition, &body, until);
    shell.loop_depth -= 1;
    result
}

fn run_condition_loop(shell: &mut Shell, condition: &str, body: &str, until: bool) -> ExecResult {
    let mut status = 0;
    loop {
        safe_point(shell);
        let cond_status = evaluate_condition(shell, condition)?;
        let proceed = if until {
            cond_status != 0
        } else {
            cond_status == 0
        };
        if !proceed {
            break;
        }
        match execute_text(shell, body) {
            Ok(s) => status = s,
            Err(flow) => match handle_loop_flow(flow)? {
                LoopAction::Break => break,
                LoopAction::Continue => continue,
            },
        }
    }
    Ok(status)
}

pub fn execute_for(shell: &mut Shell, text: &str) -> ExecResult {
    let sections = match construct_sections(text, &["do"], "done") {
        Ok(s) => s,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };
    let (header, body) = match sections.as_slice() {
        [(kw, header), (do_kw, body)] if kw == "for" && do_kw == "do" => {
            (header.clone(), body.clone())
        }
        _ => {
            return Ok(shell.set_last_status(report(&syntax_error("malformed for loop", text))))
        }
    };

    // header: NAME [in WORD...] with an optional trailing separator
    let header = header.trim().trim_end_matches([';', '\n']).trim();
    let mut parts = header.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_string();
    let rest = parts.next().unwrap_or("").trim();

    if !is_valid_identifier(&name) {
        return Ok(shell.set_last_status(report(&ShellError::syntax(
            "for",
            format!("`{}' is not a valid identifier", name),
        ))));
    }

    // WORDS are fully expanded before the first iteration
    let words: Vec<String> = if rest.is_empty() {
        shell.vars.positional().to_vec()
    } else {
        let word_list = match rest.strip_prefix("in") {
            Some(tail) if tail.is_empty() || tail.starts_with(char::is_whitespace) => tail,
            _ => {
                return Ok(shell.set_last_status(report(&syntax_error("expected `in'", text))))
            }
        };
        let mut words = Vec::new();
        for raw in split_header_words(word_list) {
            match expansion::expand_word(shell, &raw) {
                Ok(expanded) => words.extend(expanded),
                Err(err) => return Ok(shell.set_last_status(report(&err))),
            }
        }
        words
    };

    shell.loop_depth += 1;
    let result = run_for_loop(shell, &name, &words, &body);
    shell.loop_depth -= 1;
    result
}

fn run_for_loop(shell: &mut Shell, name: &str, words: &[String], body: &str) -> ExecResult {
    let mut status = 0;
    for word in words {
        safe_point(shell);
        if let Err(err) = shell.vars.set(name, word.clone()) {
            // a readonly loop variable aborts the loop
            return Ok(shell.set_last_status(report(&err)));
        }
        match execute_text(shell, body) {
            Ok(s) => status = s,
            Err(flow) => match handle_loop_flow(flow)? {
                LoopAction::Break => break,
                LoopAction::Continue => continue,
            },
        }
    }
    Ok(status)
}

enum LoopAction {
    Break,
    Continue,
}

/// Consume one level of break/continue; rethrow everything else.
fn handle_loop_flow(flow: ControlFlow) -> Result<LoopAction, ControlFlow> {
    match flow {
        ControlFlow::Break(1) => Ok(LoopAction::Break),
        ControlFlow::Break(n) => Err(ControlFlow::Break(n - 1)),
        ControlFlow::Continue(1) => Ok(LoopAction::Continue),
        ControlFlow::Continue(n) => Err(ControlFlow::Continue(n - 1)),
        other => Err(other),
    }
}

/// Split the `in WORD...` list on unquoted whitespace, keeping quoted and
/// expansion text intact for the expansion pipeline.
fn split_header_words(list: &str) -> Vec<String> {
    match crate::parser::lexer::tokenize(list) {
        Ok(tokens) => tokens
            .into_iter()
            .filter(|t| t.kind != crate::parser::types::TokenKind::Newline)
            .map(|t| t.text)
            .collect(),
        Err(_) => list.split_whitespace().map(|s| s.to_string()).collect(),
    }
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
    fn test_for_loop_iterates() {
        let (shell, status) = run("acc=\nfor i in 1 2 3; do acc=$acc$i; done");
        assert_eq!(status, 0);
        assert_eq!(shell.vars.get("acc"), Some("123"));
    }

    #[test]
    fn test_for_loop_variable_persists() {
        let (shell, _) = run("for i in a b; do :; done");
        assert_eq!(shell.vars.get("i"), Some("b"));
    }

    #[test]
    fn test_while_loop_counts() {
        let (shell, _) = run("n=0\nwhile [ $n != 3 ]; do n=$((n+1)); done");
        assert_eq!(shell.vars.get("n"), Some("3"));
    }

    #[test]
    fn test_until_loop() {
        let (shell, _) = run("n=0\nuntil [ $n = 3 ]; do n=$((n+1)); done");
        assert_eq!(shell.vars.get("n"), Some("3"));
    }

    #[test]
    fn test_zero_iterations_status_zero() {
        let (_, status) = run("while false; do exit 9; done");
        assert_eq!(status, 0);
    }

    #[test]
    fn test_break() {
        let (shell, _) = run("acc=\nfor i in 1 2 3; do [ $i = 2 ] && break; acc=$acc$i; done");
        assert_eq!(shell.vars.get("acc"), Some("1"));
    }

    #[test]
    fn test_continue() {
        let (shell, _) =
            run("acc=\nfor i in 1 2 3; do [ $i = 2 ] && continue; acc=$acc$i; done");
        assert_eq!(shell.vars.get("acc"), Some("13"));
    }

    #[test]
    fn test_break_n_unwinds_nested_loops() {
        let (shell, _) = run(
            "acc=\nfor i in 1 2; do for j in a b; do acc=$acc$i$j; break 2; done; done",
        );
        assert_eq!(shell.vars.get("acc"), Some("1a"));
    }

    #[test]
    fn test_break_n_larger_than_nesting_succeeds() {
        let (shell, status) = run("for i in 1 2; do break 9; done; x=after");
        assert_eq!(status, 0);
        assert_eq!(shell.vars.get("x"), Some("after"));
    }

    #[test]
    fn test_for_without_in_uses_positionals() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.positional_set(vec!["p".into(), "q".into()]);
        shell.run_source("acc=\nfor v; do acc=$acc$v; done");
        assert_eq!(shell.vars.get("acc"), Some("pq"));
    }

    #[test]
    fn test_for_invalid_identifier_fails() {
        let (_, status) = run("for 1bad in x; do :; done");
        assert_ne!(status, 0);
    }

    #[test]
    fn test_readonly_loop_variable_fails() {
        let (_, status) = run("readonly r=1\nfor r in a; do :; done");
        assert_ne!(status, 0);
    }
}
