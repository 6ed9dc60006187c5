//! Parameter Expansion
//!
//! `$NAME`, `${NAME}`, the special parameters, and the `${NAME...}`
//! modifier forms:
//!
//!   ${NAME:-word}  ${NAME:=word}  ${NAME:?word}  ${NAME:+word}
//!   ${NAME-word}   ${NAME=word}   ${NAME?word}   ${NAME+word}
//!   ${#NAME}       ${NAME#pat} ${NAME##pat} ${NAME%pat} ${NAME%%pat}
//!   ${NAME/pat/repl} ${NAME//pat/repl}
//!   ${NAME^} ${NAME^^} ${NAME,} ${NAME,,}

use crate::errors::ShellError;
use crate::pattern;
use crate::shell::Shell;

/// A parameter's expansion: a plain string, or the positional list for
/// `$@` / `$*` (which expand to multiple fields when quoted).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Fields(Vec<String>),
}

impl ParamValue {
    /// Flatten for contexts that need a single string.
    pub fn join(&self, sep: &str) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Fields(fields) => fields.join(sep),
        }
    }
}

/// Expand the text inside `${...}` (or a bare `$NAME` / `$1` / `$?`).
pub fn expand_parameter(
    shell: &mut Shell,
    expr: &str,
    in_double: bool,
) -> Result<ParamValue, ShellError> {
    if expr.is_empty() {
        return Err(ShellError::Expansion {
            context: "${}".to_string(),
            message: "bad substitution".to_string(),
        });
    }

    // ${#NAME}: length (or $# itself when expr is exactly "#")
    if let Some(rest) = expr.strip_prefix('#') {
        if !rest.is_empty() && parse_name(rest).map(|(_, end)| end == rest.len()).unwrap_or(false) {
            return Ok(ParamValue::Str(length_of(shell, rest)));
        }
    }

    let (name, name_end) = parse_name(expr).ok_or_else(|| ShellError::Expansion {
        context: format!("${{{}}}", expr),
        message: "bad substitution".to_string(),
    })?;
    let rest = &expr[name_end..];

    if rest.is_empty() {
        return lookup(shell, &name, in_double);
    }

    let value = lookup_optional(shell, &name)?;
    apply_modifier(shell, &name, value, rest)
}

/// Longest valid parameter name at the start of `expr`: an identifier, a
/// run of digits, or one special character.
fn parse_name(expr: &str) -> Option<(String, usize)> {
    let mut chars = expr.char_indices();
    let (_, first) = chars.next()?;
    if first.is_ascii_alphabetic() || first == '_' {
        let mut end = expr.len();
        for (i, c) in expr.char_indices().skip(1) {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                end = i;
                break;
            }
        }
        return Some((expr[..end].to_string(), end));
    }
    if first.is_ascii_digit() {
        let mut end = expr.len();
        for (i, c) in expr.char_indices().skip(1) {
            if !c.is_ascii_digit() {
                end = i;
                break;
            }
        }
        return Some((expr[..end].to_string(), end));
    }
    if "?#@*$!-_".contains(first) {
        return Some((first.to_string(), first.len_utf8()));
    }
    None
}

/// `${#NAME}`: character length; `${#@}`/`${#*}`: positional count.
fn length_of(shell: &Shell, name: &str) -> String {
    match name {
        "@" | "*" => shell.vars.positional_count().to_string(),
        _ => raw_value(shell, name)
            .unwrap_or_default()
            .chars()
            .count()
            .to_string(),
    }
}

/// The raw value of a parameter, None when unset.
fn raw_value(shell: &Shell, name: &str) -> Option<String> {
    match name {
        "?" => Some(shell.last_status.to_string()),
        "#" => Some(shell.vars.positional_count().to_string()),
        "$" => Some(shell.shell_pid.to_string()),
        "!" => shell.last_bg_pid.map(|p| p.to_string()),
        "-" => Some(shell.opts.flags_string()),
        "_" => Some(shell.last_arg.clone()),
        "0" => Some(shell.vars.arg0().to_string()),
        _ => {
            if let Ok(n) = name.parse::<usize>() {
                shell.vars.positional_get(n).map(|s| s.to_string())
            } else {
                shell.vars.get(name).map(|s| s.to_string())
            }
        }
    }
}

fn lookup_optional(shell: &Shell, name: &str) -> Result<Option<String>, ShellError> {
    if name == "@" || name == "*" {
        let fields = shell.vars.positional().to_vec();
        if fields.is_empty() {
            return Ok(None);
        }
        return Ok(Some(fields.join(" ")));
    }
    Ok(raw_value(shell, name))
}

fn lookup(shell: &mut Shell, name: &str, in_double: bool) -> Result<ParamValue, ShellError> {
    if name == "@" {
        return Ok(ParamValue::Fields(shell.vars.positional().to_vec()));
    }
    if name == "*" {
        if in_double {
            let ifs = shell.vars.get("IFS").unwrap_or(" ");
            let sep = ifs.chars().next().map(|c| c.to_string()).unwrap_or_default();
            return Ok(ParamValue::Str(shell.vars.positional().join(&sep)));
        }
        return Ok(ParamValue::Fields(shell.vars.positional().to_vec()));
    }
    match raw_value(shell, name) {
        Some(v) => Ok(ParamValue::Str(v)),
        None => {
            if shell.opts.nounset && name != "!" && name != "_" {
                return Err(ShellError::Unbound {
                    name: name.to_string(),
                });
            }
            Ok(ParamValue::Str(String::new()))
        }
    }
}

/// Apply a `${NAME<op><word>}` modifier to the looked-up value.
fn apply_modifier(
    shell: &mut Shell,
    name: &str,
    value: Option<String>,
    rest: &str,
) -> Result<ParamValue, ShellError> {
    // two-character operators first
    let (op, word) = if let Some(w) = rest.strip_prefix(":-") {
        (":-", w)
    } else if let Some(w) = rest.strip_prefix(":=") {
        (":=", w)
    } else if let Some(w) = rest.strip_prefix(":?") {
        (":?", w)
    } else if let Some(w) = rest.strip_prefix(":+") {
        (":+", w)
    } else if let Some(w) = rest.strip_prefix("##") {
        ("##", w)
    } else if let Some(w) = rest.strip_prefix("%%") {
        ("%%", w)
    } else if let Some(w) = rest.strip_prefix("//") {
        ("//", w)
    } else if let Some(w) = rest.strip_prefix("^^") {
        ("^^", w)
    } else if let Some(w) = rest.strip_prefix(",,") {
        (",,", w)
    } else if let Some(w) = rest.strip_prefix('-') {
        ("-", w)
    } else if let Some(w) = rest.strip_prefix('=') {
        ("=", w)
    } else if let Some(w) = rest.strip_prefix('?') {
        ("?", w)
    } else if let Some(w) = rest.strip_prefix('+') {
        ("+", w)
    } else if let Some(w) = rest.strip_prefix('#') {
        ("#", w)
    } else if let Some(w) = rest.strip_prefix('%') {
        ("%", w)
    } else if let Some(w) = rest.strip_prefix('/') {
        ("/", w)
    } else if let Some(w) = rest.strip_prefix('^') {
        ("^", w)
    } else if let Some(w) = rest.strip_prefix(',') {
        (",", w)
    } else {
        return Err(ShellError::Expansion {
            context: format!("${{{}{}}}", name, rest),
            message: "bad substitution".to_string(),
        });
    };

    // `:` variants treat empty as unset
    let use_word = match op {
        ":-" | ":=" | ":?" => value.as_deref().map(|v| v.is_empty()).unwrap_or(true),
        "-" | "=" | "?" => value.is_none(),
        ":+" => !value.as_deref().map(|v| v.is_empty()).unwrap_or(true),
        "+" => value.is_some(),
        _ => false,
    };

    match op {
        ":-" | "-" | ":+" | "+" => {
            if use_word {
                let expanded = super::expand_word_no_split(shell, word)?;
                Ok(ParamValue::Str(expanded))
            } else if matches!(op, ":+" | "+") {
                Ok(ParamValue::Str(String::new()))
            } else {
                Ok(ParamValue::Str(value.unwrap_or_default()))
            }
        }
        ":=" | "=" => {
            if use_word {
                if !crate::vars::is_valid_identifier(name) {
                    return Err(ShellError::Expansion {
                        context: format!("${{{}{}}}", name, rest),
                        message: "cannot assign in this way".to_string(),
                    });
                }
                let expanded = super::expand_word_no_split(shell, word)?;
                shell.vars.set(name, expanded.clone())?;
                Ok(ParamValue::Str(expanded))
            } else {
                Ok(ParamValue::Str(value.unwrap_or_default()))
            }
        }
        ":?" | "?" => {
            if use_word {
                let message = if word.is_empty() {
                    "parameter null or not set".to_string()
                } else {
                    super::expand_word_no_split(shell, word)?
                };
                // a failed `:?` exits a non-interactive shell
                if !shell.opts.interactive {
                    shell.pending_exit = Some(1);
                }
                Err(ShellError::Expansion {
                    context: name.to_string(),
                    message,
                })
            } else {
                Ok(ParamValue::Str(value.unwrap_or_default()))
            }
        }
        "#" | "##" => {
            let pat = super::expand_as_pattern(shell, word)?;
            let v = value.unwrap_or_default();
            Ok(ParamValue::Str(pattern::remove_prefix(&v, &pat, op == "##")))
        }
        "%" | "%%" => {
            let pat = super::expand_as_pattern(shell, word)?;
            let v = value.unwrap_or_default();
            Ok(ParamValue::Str(pattern::remove_suffix(&v, &pat, op == "%%")))
        }
        "/" | "//" => {
            let (pat_text, repl_text) = split_replacement(word);
            let pat = super::expand_as_pattern(shell, &pat_text)?;
            let repl = super::expand_word_no_split(shell, &repl_text)?;
            let v = value.unwrap_or_default();
            Ok(ParamValue::Str(pattern::replace_pattern(
                &v,
                &pat,
                &repl,
                op == "//",
            )))
        }
        "^" | "^^" | "," | ",," => {
            let v = value.unwrap_or_default();
            Ok(ParamValue::Str(convert_case(&v, op)))
        }
        _ => unreachable!(),
    }
}

/// Split `pat/repl` on the first unescaped slash.
fn split_replacement(word: &str) -> (String, String) {
    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '/' => {
                let pat: String = chars[..i].iter().collect();
                let repl: String = chars[i + 1..].iter().collect();
                return (pat, repl);
            }
            _ => i += 1,
        }
    }
    (word.to_string(), String::new())
}

fn convert_case(value: &str, op: &str) -> String {
    match op {
        "^" => {
            let mut chars = value.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        "^^" => value.to_uppercase(),
        "," => {
            let mut chars = value.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        ",," => value.to_lowercase(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        Shell::new(ShellOptions::default())
    }

    fn expand_str(shell: &mut Shell, expr: &str) -> String {
        expand_parameter(shell, expr, false).unwrap().join(" ")
    }

    #[test]
    fn test_plain_lookup() {
        let mut sh = shell();
        sh.vars.set("v", "hello").unwrap();
        assert_eq!(expand_str(&mut sh, "v"), "hello");
        assert_eq!(expand_str(&mut sh, "missing"), "");
    }

    #[test]
    fn test_default_value() {
        let mut sh = shell();
        assert_eq!(expand_str(&mut sh, "x:-fallback"), "fallback");
        sh.vars.set("x", "").unwrap();
        assert_eq!(expand_str(&mut sh, "x:-fallback"), "fallback");
        assert_eq!(expand_str(&mut sh, "x-fallback"), "");
        sh.vars.set("x", "real").unwrap();
        assert_eq!(expand_str(&mut sh, "x:-fallback"), "real");
    }

    #[test]
    fn test_assign_default() {
        let mut sh = shell();
        assert_eq!(expand_str(&mut sh, "y:=assigned"), "assigned");
        assert_eq!(sh.vars.get("y"), Some("assigned"));
    }

    #[test]
    fn test_error_if_unset() {
        let mut sh = shell();
        let err = expand_parameter(&mut sh, "z:?not set", false).unwrap_err();
        assert!(err.to_string().contains("not set"));
        // non-interactive shells exit after a failed :?
        assert_eq!(sh.pending_exit, Some(1));
    }

    #[test]
    fn test_alternate_value() {
        let mut sh = shell();
        assert_eq!(expand_str(&mut sh, "a:+alt"), "");
        sh.vars.set("a", "set").unwrap();
        assert_eq!(expand_str(&mut sh, "a:+alt"), "alt");
    }

    #[test]
    fn test_length() {
        let mut sh = shell();
        sh.vars.set("v", "hello").unwrap();
        assert_eq!(expand_str(&mut sh, "#v"), "5");
        sh.vars.positional_set(vec!["a".into(), "b".into()]);
        assert_eq!(expand_str(&mut sh, "#@"), "2");
    }

    #[test]
    fn test_prefix_suffix_strip() {
        let mut sh = shell();
        sh.vars.set("path", "/usr/local/bin").unwrap();
        assert_eq!(expand_str(&mut sh, "path#*/"), "usr/local/bin");
        assert_eq!(expand_str(&mut sh, "path##*/"), "bin");
        sh.vars.set("file", "archive.tar.gz").unwrap();
        assert_eq!(expand_str(&mut sh, "file%.*"), "archive.tar");
        assert_eq!(expand_str(&mut sh, "file%%.*"), "archive");
    }

    #[test]
    fn test_replace() {
        let mut sh = shell();
        sh.vars.set("v", "aaa").unwrap();
        assert_eq!(expand_str(&mut sh, "v/a/b"), "baa");
        assert_eq!(expand_str(&mut sh, "v//a/b"), "bbb");
    }

    #[test]
    fn test_case_conversion() {
        let mut sh = shell();
        sh.vars.set("v", "hello World").unwrap();
        assert_eq!(expand_str(&mut sh, "v^"), "Hello World");
        assert_eq!(expand_str(&mut sh, "v^^"), "HELLO WORLD");
        assert_eq!(expand_str(&mut sh, "v,,"), "hello world");
        sh.vars.set("u", "HELLO").unwrap();
        assert_eq!(expand_str(&mut sh, "u,"), "hELLO");
    }

    #[test]
    fn test_special_parameters() {
        let mut sh = shell();
        sh.last_status = 42;
        assert_eq!(expand_str(&mut sh, "?"), "42");
        sh.vars.positional_set(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(expand_str(&mut sh, "#"), "3");
        assert_eq!(expand_str(&mut sh, "1"), "a");
        assert_eq!(expand_str(&mut sh, "3"), "c");
        assert_eq!(expand_str(&mut sh, "4"), "");
    }

    #[test]
    fn test_nounset_errors() {
        let mut sh = shell();
        sh.opts.nounset = true;
        assert!(expand_parameter(&mut sh, "undefined_zz", false).is_err());
    }

    #[test]
    fn test_bad_substitution() {
        let mut sh = shell();
        assert!(expand_parameter(&mut sh, "v~oops", false).is_err());
    }
}
