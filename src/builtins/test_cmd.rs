//! Conditional Expressions
//!
//! `test` / `[ ... ]` with POSIX string, numeric, and file operators, and
//! `[[ ... ]]` which adds pattern matching on `=`/`==`/`!=` plus `&&`,
//! `||`, and `!`. The `[[` arguments arrive pattern-expanded: quoted
//! glob characters are backslash-protected, so string comparisons strip
//! the escapes and pattern matches feed them to the matcher.

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::pattern::matches_pattern;
use crate::shell::Shell;

pub fn test_cmd(_shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    Ok(truth(eval_test(&argv[1..])))
}

pub fn bracket_cmd(_shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let args = &argv[1..];
    let Some((last, body)) = args.split_last() else {
        return Ok(report(&ShellError::invalid_argument("[", "missing `]'")));
    };
    if last != "]" {
        return Ok(report(&ShellError::invalid_argument("[", "missing `]'")));
    }
    Ok(truth(eval_test(body)))
}

pub fn double_bracket_cmd(_shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let args = &argv[1..];
    let Some((last, body)) = args.split_last() else {
        return Ok(report(&ShellError::invalid_argument("[[", "missing `]]'")));
    };
    if last != "]]" {
        return Ok(report(&ShellError::invalid_argument("[[", "missing `]]'")));
    }
    Ok(truth(eval_double_bracket(body)))
}

fn truth(value: bool) -> i32 {
    if value {
        0
    } else {
        1
    }
}

/// Strip the backslash protection added for quoted characters.
fn unescape(word: &str) -> String {
    let mut out = String::new();
    let mut chars = word.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// `[[ ... ]]`: split on `||`, then `&&`, then primaries.
fn eval_double_bracket(args: &[String]) -> bool {
    for (i, arg) in args.iter().enumerate() {
        if arg == "||" {
            return eval_double_bracket(&args[..i]) || eval_double_bracket(&args[i + 1..]);
        }
    }
    for (i, arg) in args.iter().enumerate() {
        if arg == "&&" {
            return eval_double_bracket(&args[..i]) && eval_double_bracket(&args[i + 1..]);
        }
    }
    if args.first().map(|a| a == "!").unwrap_or(false) {
        return !eval_double_bracket(&args[1..]);
    }
    match args.len() {
        0 => false,
        1 => !unescape(&args[0]).is_empty(),
        2 => eval_unary(&args[0], &unescape(&args[1])),
        3 => {
            let lhs = unescape(&args[0]);
            match args[1].as_str() {
                // pattern match: the raw rhs keeps its escapes for the matcher
                "=" | "==" => matches_pattern(&lhs, &args[2]),
                "!=" => !matches_pattern(&lhs, &args[2]),
                "<" => lhs < unescape(&args[2]),
                ">" => lhs > unescape(&args[2]),
                op => eval_binary(&lhs, op, &unescape(&args[2])),
            }
        }
        _ => false,
    }
}

/// `test` / `[`: plain string comparison, with `-a`/`-o` conjunctions.
fn eval_test(args: &[String]) -> bool {
    for (i, arg) in args.iter().enumerate() {
        if arg == "-o" && i > 0 && i < args.len() - 1 {
            return eval_test(&args[..i]) || eval_test(&args[i + 1..]);
        }
    }
    for (i, arg) in args.iter().enumerate() {
        if arg == "-a" && i > 0 && i < args.len() - 1 {
            return eval_test(&args[..i]) && eval_test(&args[i + 1..]);
        }
    }
    if args.first().map(|a| a == "!").unwrap_or(false) {
        return !eval_test(&args[1..]);
    }
    match args.len() {
        0 => false,
        1 => !args[0].is_empty(),
        2 => eval_unary(&args[0], &args[1]),
        3 => match args[1].as_str() {
            "=" | "==" => args[0] == args[2],
            "!=" => args[0] != args[2],
            op => eval_binary(&args[0], op, &args[2]),
        },
        _ => false,
    }
}

fn eval_unary(op: &str, operand: &str) -> bool {
    let meta = || std::fs::metadata(operand);
    match op {
        "-z" => operand.is_empty(),
        "-n" => !operand.is_empty(),
        "-e" => std::path::Path::new(operand).exists(),
        "-f" => meta().map(|m| m.is_file()).unwrap_or(false),
        "-d" => meta().map(|m| m.is_dir()).unwrap_or(false),
        "-s" => meta().map(|m| m.len() > 0).unwrap_or(false),
        "-r" => file_access(operand, libc::R_OK),
        "-w" => file_access(operand, libc::W_OK),
        "-x" => file_access(operand, libc::X_OK),
        _ => false,
    }
}

fn file_access(path: &str, mode: libc::c_int) -> bool {
    let Ok(c_path) = std::ffi::CString::new(path) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}

fn eval_binary(lhs: &str, op: &str, rhs: &str) -> bool {
    let (Ok(a), Ok(b)) = (lhs.trim().parse::<i64>(), rhs.trim().parse::<i64>()) else {
        return false;
    };
    match op {
        "-eq" => a == b,
        "-ne" => a != b,
        "-lt" => a < b,
        "-le" => a <= b,
        "-gt" => a > b,
        "-ge" => a >= b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn argv(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_string_equality() {
        let mut sh = shell();
        assert_eq!(bracket_cmd(&mut sh, &argv(&["[", "a", "=", "a", "]"])).unwrap(), 0);
        assert_eq!(bracket_cmd(&mut sh, &argv(&["[", "a", "=", "b", "]"])).unwrap(), 1);
        assert_eq!(bracket_cmd(&mut sh, &argv(&["[", "a", "!=", "b", "]"])).unwrap(), 0);
    }

    #[test]
    fn test_numeric_comparisons() {
        let mut sh = shell();
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "3", "-lt", "5"])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "5", "-le", "5"])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "5", "-eq", "3"])).unwrap(), 1);
    }

    #[test]
    fn test_z_and_n() {
        let mut sh = shell();
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-z", ""])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-n", "x"])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-z", "x"])).unwrap(), 1);
    }

    #[test]
    fn test_missing_bracket() {
        let mut sh = shell();
        assert_eq!(bracket_cmd(&mut sh, &argv(&["[", "a", "=", "a"])).unwrap(), 2);
    }

    #[test]
    fn test_negation() {
        let mut sh = shell();
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "!", "a", "=", "b"])).unwrap(), 0);
    }

    #[test]
    fn test_file_operators() {
        let mut sh = shell();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "data").unwrap();
        let f = file.to_string_lossy().to_string();
        let d = dir.path().to_string_lossy().to_string();
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-e", &f])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-f", &f])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-d", &d])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-s", &f])).unwrap(), 0);
        assert_eq!(test_cmd(&mut sh, &argv(&["test", "-f", &d])).unwrap(), 1);
    }

    #[test]
    fn test_conjunctions() {
        let mut sh = shell();
        assert_eq!(
            test_cmd(&mut sh, &argv(&["test", "a", "=", "a", "-a", "b", "=", "b"])).unwrap(),
            0
        );
        assert_eq!(
            test_cmd(&mut sh, &argv(&["test", "a", "=", "x", "-o", "b", "=", "b"])).unwrap(),
            0
        );
    }

    #[test]
    fn test_double_bracket_pattern_match() {
        let mut sh = shell();
        assert_eq!(
            double_bracket_cmd(&mut sh, &argv(&["[[", "foobar", "=", "foo*", "]]"])).unwrap(),
            0
        );
        assert_eq!(
            double_bracket_cmd(&mut sh, &argv(&["[[", "foobar", "=", "\\*", "]]"])).unwrap(),
            1
        );
        assert_eq!(
            double_bracket_cmd(&mut sh, &argv(&["[[", "*", "=", "\\*", "]]"])).unwrap(),
            0
        );
    }

    #[test]
    fn test_double_bracket_logic() {
        let mut sh = shell();
        assert_eq!(
            double_bracket_cmd(
                &mut sh,
                &argv(&["[[", "a", "=", "a", "&&", "b", "=", "b", "]]"])
            )
            .unwrap(),
            0
        );
        assert_eq!(
            double_bracket_cmd(
                &mut sh,
                &argv(&["[[", "a", "=", "x", "||", "b", "=", "b", "]]"])
            )
            .unwrap(),
            0
        );
        assert_eq!(
            double_bracket_cmd(&mut sh, &argv(&["[[", "!", "-z", "x", "]]"])).unwrap(),
            0
        );
    }
}
