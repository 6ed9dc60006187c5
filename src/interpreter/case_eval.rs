//! Case Statements
//!
//! `case WORD in (PAT[|PAT]*) LIST ;; ... esac`. The first matching
//! pattern wins; `;;` terminates the statement, `;&` falls through into
//! the next arm's list without matching it. `;;&` is rejected as a syntax
//! error. The exit status is that of the last command run, or 0 when no
//! pattern matched.

use crate::errors::report;
use crate::expansion;
use crate::interpreter::control_flow::ExecResult;
use crate::interpreter::interpreter::execute_text;
use crate::parser::types::syntax_error;
use crate::pattern;
use crate::shell::Shell;

/// One `PAT) LIST` arm and how it was terminated.
#[derive(Debug, Clone, PartialEq)]
struct CaseArm {
    pattern: String,
    body: String,
    fall_through: bool,
}

pub fn execute_case(shell: &mut Shell, text: &str) -> ExecResult {
    let (subject_raw, arms_text) = match split_case(text) {
        Ok(parts) => parts,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };
    let arms = match parse_arms(&arms_text) {
        Ok(arms) => arms,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };

    let subject = match expansion::expand_word_no_split(shell, &subject_raw) {
        Ok(s) => s,
        Err(err) => return Ok(shell.set_last_status(report(&err))),
    };

    let mut status = 0;
    let mut matched = false;
    for (idx, arm) in arms.iter().enumerate() {
        let hit = if matched {
            true // reached via `;&` fall-through
        } else {
            let pat = match expansion::expand_as_pattern(shell, &arm.pattern) {
                Ok(p) => p,
                Err(err) => return Ok(shell.set_last_status(report(&err))),
            };
            pattern::matches_case_pattern(&subject, &pat)
        };
        if !hit {
            continue;
        }
        status = execute_text(shell, &arm.body)?;
        if arm.fall_through && idx + 1 < arms.len() {
            matched = true;
            continue;
        }
        return Ok(status);
    }
    Ok(status)
}

/// Split `case WORD in ... esac` into the subject word and the arm text.
fn split_case(text: &str) -> Result<(String, String), crate::errors::ShellError> {
    let rest = text
        .trim_start()
        .strip_prefix("case")
        .ok_or_else(|| syntax_error("expected `case'", text))?;
    let rest = rest.trim_start();

    // subject word (quote-aware)
    let chars: Vec<char> = rest.chars().collect();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    while i < chars.len() {
        let c = chars[i];
        if in_single {
            if c == '\'' {
                in_single = false;
            }
        } else if in_double {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '"' {
                in_double = false;
            }
        } else {
            match c {
                '\'' => in_single = true,
                '"' => in_double = true,
                '\\' => {
                    i += 2;
                    continue;
                }
                c if c.is_whitespace() => break,
                _ => {}
            }
        }
        i += 1;
    }
    let subject: String = chars[..i].iter().collect();
    if subject.is_empty() {
        return Err(syntax_error("missing case subject", text));
    }
    let after: String = chars[i..].iter().collect();
    let after = after.trim_start();
    let after = after
        .strip_prefix("in")
        .filter(|r| r.is_empty() || r.starts_with(char::is_whitespace))
        .ok_or_else(|| syntax_error("expected `in'", text))?;

    // the arm text runs to the matching esac
    let body = after.trim();
    let Some(stripped) = body.strip_suffix("esac") else {
        return Err(syntax_error("missing `esac'", text));
    };
    Ok((subject, stripped.trim().to_string()))
}

/// Parse `PAT) LIST ;;` arms. Nested case statements inside arm bodies are
/// honored while scanning for terminators.
fn parse_arms(text: &str) -> Result<Vec<CaseArm>, crate::errors::ShellError> {
    let chars: Vec<char> = text.chars().collect();
    let mut arms = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ';') {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        if chars[i] == '(' {
            i += 1;
        }

        // pattern: up to the unquoted ) that closes it
        let mut pattern = String::new();
        let mut in_single = false;
        let mut in_double = false;
        while i < chars.len() {
            let c = chars[i];
            if in_single {
                pattern.push(c);
                if c == '\'' {
                    in_single = false;
                }
                i += 1;
                continue;
            }
            if in_double {
                pattern.push(c);
                if c == '"' {
                    in_double = false;
                }
                i += 1;
                continue;
            }
            match c {
                '\\' => {
                    pattern.push(c);
                    if i + 1 < chars.len() {
                        pattern.push(chars[i + 1]);
                    }
                    i += 2;
                }
                '\'' => {
                    in_single = true;
                    pattern.push(c);
                    i += 1;
                }
                '"' => {
                    in_double = true;
                    pattern.push(c);
                    i += 1;
                }
                ')' => {
                    i += 1;
                    break;
                }
                _ => {
                    pattern.push(c);
                    i += 1;
                }
            }
        }
        let pattern = pattern.trim().to_string();
        if pattern.is_empty() {
            return Err(syntax_error("missing case pattern", text));
        }

        // body: up to ;; or ;& at nesting depth 0
        let (body, fall_through, next) = scan_arm_body(&chars, i, text)?;
        arms.push(CaseArm {
            pattern,
            body: body.trim().to_string(),
            fall_through,
        });
        i = next;
    }
    Ok(arms)
}

fn scan_arm_body(
    chars: &[char],
    start: usize,
    src: &str,
) -> Result<(String, bool, usize), crate::errors::ShellError> {
    let mut body = String::new();
    let mut i = start;
    let mut in_single = false;
    let mut in_double = false;
    let mut case_depth = 0usize;
    let mut at_command_pos = true;

    while i < chars.len() {
        let c = chars[i];
        if in_single {
            body.push(c);
            if c == '\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }
        if in_double {
            if c == '\\' && i + 1 < chars.len() {
                body.push(c);
                body.push(chars[i + 1]);
                i += 2;
                continue;
            }
            body.push(c);
            if c == '"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\\' => {
                body.push(c);
                if i + 1 < chars.len() {
                    body.push(chars[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
                at_command_pos = false;
            }
            '\'' => {
                in_single = true;
                body.push(c);
                i += 1;
                at_command_pos = false;
            }
            '"' => {
                in_double = true;
                body.push(c);
                i += 1;
                at_command_pos = false;
            }
            ';' if case_depth == 0 && chars.get(i + 1) == Some(&';') => {
                if chars.get(i + 2) == Some(&'&') {
                    return Err(syntax_error("`;;&' is not supported", src));
                }
                return Ok((body, false, i + 2));
            }
            ';' if case_depth == 0 && chars.get(i + 1) == Some(&'&') => {
                return Ok((body, true, i + 2));
            }
            ';' | '\n' | '&' | '|' => {
                body.push(c);
                i += 1;
                at_command_pos = true;
            }
            ' ' | '\t' => {
                body.push(c);
                i += 1;
            }
            _ => {
                if c.is_ascii_alphanumeric() || c == '_' {
                    let mut j = i;
                    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    if at_command_pos && word == "case" {
                        case_depth += 1;
                    } else if word == "esac" {
                        case_depth = case_depth.saturating_sub(1);
                    }
                    body.push_str(&word);
                    i = j;
                } else {
                    body.push(c);
                    i += 1;
                }
                at_command_pos = false;
            }
        }
    }
    // last arm may omit its terminator
    Ok((body, false, i))
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
    fn test_first_match_wins() {
        let (shell, status) = run("case foo in f*|bar) x=M;; *) x=N;; esac");
        assert_eq!(status, 0);
        assert_eq!(shell.vars.get("x"), Some("M"));
    }

    #[test]
    fn test_default_arm() {
        let (shell, _) = run("case zzz in f*) x=M;; *) x=N;; esac");
        assert_eq!(shell.vars.get("x"), Some("N"));
    }

    #[test]
    fn test_no_match_status_zero() {
        let (_, status) = run("case x in y) false;; esac");
        assert_eq!(status, 0);
    }

    #[test]
    fn test_status_is_last_command() {
        let (_, status) = run("case x in x) false;; esac");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_subject_expansion() {
        let (shell, _) = run("v=hello\ncase $v in h*) x=yes;; *) x=no;; esac");
        assert_eq!(shell.vars.get("x"), Some("yes"));
    }

    #[test]
    fn test_fall_through() {
        let (shell, _) = run("acc=\ncase a in a) acc=${acc}1 ;& b) acc=${acc}2;; c) acc=${acc}3;; esac");
        assert_eq!(shell.vars.get("acc"), Some("12"));
    }

    #[test]
    fn test_paren_prefixed_pattern() {
        let (shell, _) = run("case b in (a) x=1;; (b) x=2;; esac");
        assert_eq!(shell.vars.get("x"), Some("2"));
    }

    #[test]
    fn test_quoted_pattern_is_literal() {
        let (shell, _) = run("case '*' in '*') x=literal;; *) x=glob;; esac");
        assert_eq!(shell.vars.get("x"), Some("literal"));
    }

    #[test]
    fn test_multiline_case() {
        let (shell, _) = run("case two in\n  one) x=1 ;;\n  two) x=2 ;;\nesac");
        assert_eq!(shell.vars.get("x"), Some("2"));
    }

    #[test]
    fn test_semisemi_amp_rejected() {
        let (_, status) = run("case a in a) x=1;;& b) x=2;; esac");
        assert_ne!(status, 0);
    }

    #[test]
    fn test_nested_case() {
        let (shell, _) = run(
            "case a in a) case b in b) x=nested;; esac;; esac",
        );
        assert_eq!(shell.vars.get("x"), Some("nested"));
    }
}
