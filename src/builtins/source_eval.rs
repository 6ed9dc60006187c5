//! source / eval
//!
//! Both run text in the current shell context. `source FILE [ARGS...]`
//! temporarily rebinds the positional parameters when arguments are
//! given; `eval` concatenates its arguments into one input.

use crate::builtins::BuiltinResult;
use crate::errors::{report, ShellError};
use crate::parser::parser::parse_into_lines;
use crate::parser::preprocessor::preprocess;
use crate::shell::Shell;

pub fn eval_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    if argv.len() == 1 {
        return Ok(0);
    }
    let text = argv[1..].join(" ");
    // run in place so break/continue/return reach the enclosing construct
    let pre = match preprocess(&text) {
        Ok(p) => p,
        Err(err) => return Ok(report(&err)),
    };
    shell.here_docs.extend(pre.here_docs);
    let lines = parse_into_lines(&pre.text);
    crate::interpreter::execute_block(shell, &lines)
}

pub fn source_cmd(shell: &mut Shell, argv: &[String]) -> BuiltinResult {
    let Some(path) = argv.get(1) else {
        return Ok(report(&ShellError::invalid_argument(
            "source",
            "filename argument required",
        )));
    };

    let saved_positionals = if argv.len() > 2 {
        let saved = shell.vars.positional_take();
        shell.vars.positional_set(argv[2..].to_vec());
        Some(saved)
    } else {
        None
    };

    let status = match shell.source_file(std::path::Path::new(path)) {
        Ok(status) => status,
        Err(err) => report(&err),
    };

    if let Some(saved) = saved_positionals {
        shell.vars.positional_set(saved);
    }
    Ok(status)
}

/// Quote a word so it survives re-parsing verbatim.
pub(crate) fn quote_word(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:%+@,".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_eval_runs_in_current_shell() {
        let mut sh = shell();
        eval_cmd(&mut sh, &args(&["eval", "x=42"])).unwrap();
        assert_eq!(sh.vars.get("x"), Some("42"));
    }

    #[test]
    fn test_eval_joins_arguments() {
        let mut sh = shell();
        eval_cmd(&mut sh, &args(&["eval", "a=1", "b=2"])).unwrap();
        assert_eq!(sh.vars.get("a"), Some("1"));
        assert_eq!(sh.vars.get("b"), Some("2"));
    }

    #[test]
    fn test_source_runs_file() {
        let mut sh = shell();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.sh");
        std::fs::write(&path, "sourced=yes\n").unwrap();
        let status = source_cmd(
            &mut sh,
            &args(&["source", path.to_string_lossy().as_ref()]),
        )
        .unwrap();
        assert_eq!(status, 0);
        assert_eq!(sh.vars.get("sourced"), Some("yes"));
    }

    #[test]
    fn test_source_missing_file_fails() {
        let mut sh = shell();
        assert_ne!(
            source_cmd(&mut sh, &args(&["source", "/zz/missing.sh"])).unwrap(),
            0
        );
    }

    #[test]
    fn test_source_with_arguments_rebinds_positionals() {
        let mut sh = shell();
        sh.vars.positional_set(args(&["outer"]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.sh");
        std::fs::write(&path, "inner=$1\n").unwrap();
        source_cmd(
            &mut sh,
            &args(&["source", path.to_string_lossy().as_ref(), "given"]),
        )
        .unwrap();
        assert_eq!(sh.vars.get("inner"), Some("given"));
        assert_eq!(sh.vars.positional(), &["outer".to_string()]);
    }

    #[test]
    fn test_quote_word() {
        assert_eq!(quote_word("plain"), "plain");
        assert_eq!(quote_word("a b"), "'a b'");
        assert_eq!(quote_word("it's"), "'it'\\''s'");
    }
}
