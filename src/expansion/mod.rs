//! Expansion Engine
//!
//! For each word, in POSIX order:
//!
//! 1. brace expansion            (`brace`)
//! 2. tilde expansion            (`tilde`)
//! 3. parameter expansion        (`parameter`)
//! 4. arithmetic expansion       (`interpreter::arithmetic`)
//! 5. command substitution       (`command_sub`)
//! 6. word splitting             (`word_split`)
//! 7. pathname expansion         (`pathname`)
//! 8. quote removal              (inline in the scanner)
//!
//! Quoting is tracked per character, not per token: the scanner walks the
//! raw word text, removes quotes as it goes, and emits `FlaggedChar`s that
//! record whether each character was quoted and whether it came from an
//! unquoted expansion (and is therefore splittable).

pub mod brace;
pub mod command_sub;
pub mod parameter;
pub mod pathname;
pub mod tilde;
pub mod word_split;

use crate::errors::ShellError;
use crate::parser::types::Token;
use crate::shell::Shell;

use parameter::ParamValue;

/// One output character with its quoting provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlaggedChar {
    pub c: char,
    /// came from inside quotes (or a backslash escape)
    pub quoted: bool,
    /// came from an unquoted expansion result, so IFS may split it
    pub splittable: bool,
}

/// Scanner output: characters, forced field boundaries (from `"$@"`), and
/// anchors that let otherwise-empty quoted fields survive.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Chars(Vec<FlaggedChar>),
    HardBreak,
    Anchor,
}

/// Fully expand one command word into zero or more argv entries.
pub fn expand_word(shell: &mut Shell, word: &str) -> Result<Vec<String>, ShellError> {
    let mut results = Vec::new();
    for braced in brace::expand_braces(word) {
        let pieces = scan_word(shell, &braced)?;
        let ifs = shell.vars.get("IFS").unwrap_or(" \t\n").to_string();
        for field in word_split::split_fields(&pieces, &ifs) {
            results.extend(pathname::expand_field(&field, shell.opts.noglob));
        }
    }
    Ok(results)
}

/// Expand a token stream into a final argv.
pub fn expand_words(shell: &mut Shell, tokens: &[Token]) -> Result<Vec<String>, ShellError> {
    let mut argv = Vec::new();
    for token in tokens {
        argv.extend(expand_word(shell, &token.text)?);
    }
    Ok(argv)
}

/// Expand without word splitting or pathname expansion: assignment values,
/// redirection targets, case subjects, here-string words.
pub fn expand_word_no_split(shell: &mut Shell, word: &str) -> Result<String, ShellError> {
    let pieces = scan_word(shell, word)?;
    let mut out = String::new();
    for piece in &pieces {
        match piece {
            Piece::Chars(chars) => out.extend(chars.iter().map(|fc| fc.c)),
            Piece::HardBreak => out.push(' '),
            Piece::Anchor => {}
        }
    }
    Ok(out)
}

/// Expand an assignment value: tilde after `=` and after each `:` (the
/// PATH-like case), then the usual parameter/arithmetic/command
/// expansions, no splitting.
pub fn expand_assignment_value(shell: &mut Shell, value: &str) -> Result<String, ShellError> {
    // the colon split exists only for tilde expansion; a value without
    // tildes must stay intact (colons appear inside $(( ?: )) and $())
    if !value.contains('~') {
        return expand_word_no_split(shell, value);
    }
    let mut expanded_parts = Vec::new();
    for part in value.split(':') {
        let tilded = tilde::expand_tilde(shell, part);
        expanded_parts.push(expand_word_no_split(shell, &tilded)?);
    }
    Ok(expanded_parts.join(":"))
}

/// Expand a word for use as a pattern: quoted characters have glob
/// metacharacters backslash-protected so the matcher treats them literally.
pub fn expand_as_pattern(shell: &mut Shell, word: &str) -> Result<String, ShellError> {
    let pieces = scan_word(shell, word)?;
    let mut out = String::new();
    for piece in &pieces {
        if let Piece::Chars(chars) = piece {
            for fc in chars {
                if fc.quoted && "*?[]\\|".contains(fc.c) {
                    out.push('\\');
                }
                out.push(fc.c);
            }
        }
    }
    Ok(out)
}

/// Expand a here-document body: parameter, arithmetic, and command
/// substitution only. Quotes are ordinary characters; no splitting, no
/// globbing, no quote removal.
pub fn expand_heredoc(shell: &mut Shell, content: &str) -> Result<String, ShellError> {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if matches!(chars.get(i + 1), Some('$') | Some('`') | Some('\\')) => {
                out.push(chars[i + 1]);
                i += 2;
            }
            '$' => {
                let (value, consumed) = expand_dollar(shell, &chars, i, true)?;
                match value {
                    Some(ParamValue::Str(s)) => out.push_str(&s),
                    Some(ParamValue::Fields(fields)) => out.push_str(&fields.join(" ")),
                    None => out.push('$'),
                }
                i = consumed;
            }
            '`' => {
                let (body, consumed) = read_backtick_body(&chars, i)?;
                out.push_str(&command_sub::command_substitute(shell, &body)?);
                i = consumed;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Scan one raw word: quote removal plus parameter/arithmetic/command
/// expansion, with tilde applied to the unquoted leading run.
pub fn scan_word(shell: &mut Shell, word: &str) -> Result<Vec<Piece>, ShellError> {
    let tilded = tilde::expand_tilde(shell, word);
    let chars: Vec<char> = tilded.chars().collect();
    let mut pieces: Vec<Piece> = Vec::new();
    let mut current: Vec<FlaggedChar> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    current.push(FlaggedChar {
                        c: next,
                        quoted: true,
                        splittable: false,
                    });
                    i += 2;
                } else {
                    current.push(FlaggedChar {
                        c: '\\',
                        quoted: true,
                        splittable: false,
                    });
                    i += 1;
                }
            }
            '\'' => {
                pieces.push(Piece::Anchor);
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    current.push(FlaggedChar {
                        c: chars[i],
                        quoted: true,
                        splittable: false,
                    });
                    i += 1;
                }
                i += 1; // closing quote (the lexer guarantees it exists)
            }
            '"' => {
                i += 1;
                // anchor rule: `""` keeps an empty field alive, but a region
                // that was purely `"$@"` with zero positionals vanishes
                let mut saw_positional = false;
                let mut saw_other = false;
                let mut emitted_fields = false;
                while i < chars.len() && chars[i] != '"' {
                    let qc = chars[i];
                    match qc {
                        '\\' if matches!(chars.get(i + 1), Some('$') | Some('`') | Some('"') | Some('\\'))
                        => {
                            current.push(FlaggedChar {
                                c: chars[i + 1],
                                quoted: true,
                                splittable: false,
                            });
                            saw_other = true;
                            i += 2;
                        }
                        '$' => {
                            let (value, consumed) = expand_dollar(shell, &chars, i, true)?;
                            match value {
                                Some(ParamValue::Str(s)) => {
                                    for vc in s.chars() {
                                        current.push(FlaggedChar {
                                            c: vc,
                                            quoted: true,
                                            splittable: false,
                                        });
                                    }
                                    saw_other = true;
                                }
                                Some(ParamValue::Fields(fields)) => {
                                    saw_positional = true;
                                    if !fields.is_empty() {
                                        emitted_fields = true;
                                        emit_quoted_fields(&mut pieces, &mut current, &fields);
                                    }
                                }
                                None => {
                                    current.push(FlaggedChar {
                                        c: '$',
                                        quoted: true,
                                        splittable: false,
                                    });
                                    saw_other = true;
                                }
                            }
                            i = consumed;
                        }
                        '`' => {
                            let (body, consumed) = read_backtick_body(&chars, i)?;
                            let output = command_sub::command_substitute(shell, &body)?;
                            for vc in output.chars() {
                                current.push(FlaggedChar {
                                    c: vc,
                                    quoted: true,
                                    splittable: false,
                                });
                            }
                            saw_other = true;
                            i = consumed;
                        }
                        _ => {
                            current.push(FlaggedChar {
                                c: qc,
                                quoted: true,
                                splittable: false,
                            });
                            saw_other = true;
                            i += 1;
                        }
                    }
                }
                i += 1; // closing quote
                if saw_other || emitted_fields || !saw_positional {
                    pieces.push(Piece::Anchor);
                }
            }
            '$' => {
                let (value, consumed) = expand_dollar(shell, &chars, i, false)?;
                match value {
                    Some(ParamValue::Str(s)) => {
                        for vc in s.chars() {
                            current.push(FlaggedChar {
                                c: vc,
                                quoted: false,
                                splittable: true,
                            });
                        }
                    }
                    Some(ParamValue::Fields(fields)) => {
                        // unquoted $@/$*: the parameters and their joining
                        // separators are all subject to IFS splitting
                        for (n, field) in fields.iter().enumerate() {
                            if n > 0 {
                                current.push(FlaggedChar {
                                    c: ' ',
                                    quoted: false,
                                    splittable: true,
                                });
                            }
                            for vc in field.chars() {
                                current.push(FlaggedChar {
                                    c: vc,
                                    quoted: false,
                                    splittable: true,
                                });
                            }
                        }
                    }
                    None => {
                        current.push(FlaggedChar {
                            c: '$',
                            quoted: false,
                            splittable: false,
                        });
                    }
                }
                i = consumed;
            }
            '`' => {
                let (body, consumed) = read_backtick_body(&chars, i)?;
                let output = command_sub::command_substitute(shell, &body)?;
                for vc in output.chars() {
                    current.push(FlaggedChar {
                        c: vc,
                        quoted: false,
                        splittable: true,
                    });
                }
                i = consumed;
            }
            _ => {
                current.push(FlaggedChar {
                    c,
                    quoted: false,
                    splittable: false,
                });
                i += 1;
            }
        }
    }
    if !current.is_empty() {
        pieces.push(Piece::Chars(current));
    }
    Ok(pieces)
}

/// Emit `"$@"`-style fields: quoted characters with hard breaks between
/// the positional parameters.
fn emit_quoted_fields(pieces: &mut Vec<Piece>, current: &mut Vec<FlaggedChar>, fields: &[String]) {
    for (n, field) in fields.iter().enumerate() {
        if n > 0 {
            if !current.is_empty() {
                pieces.push(Piece::Chars(std::mem::take(current)));
            }
            pieces.push(Piece::HardBreak);
        }
        for c in field.chars() {
            current.push(FlaggedChar {
                c,
                quoted: true,
                splittable: false,
            });
        }
    }
}

/// Dispatch a `$...` expansion starting at `chars[start]` (which is `$`).
/// Returns the expansion (None when the `$` is literal) and the index just
/// past the consumed text.
fn expand_dollar(
    shell: &mut Shell,
    chars: &[char],
    start: usize,
    in_double: bool,
) -> Result<(Option<ParamValue>, usize), ShellError> {
    let next = match chars.get(start + 1) {
        Some(c) => *c,
        None => return Ok((None, start + 1)),
    };
    match next {
        '{' => {
            let end = find_closing_brace(chars, start + 1)?;
            let inner: String = chars[start + 2..end].iter().collect();
            let value = parameter::expand_parameter(shell, &inner, in_double)?;
            Ok((Some(value), end + 1))
        }
        '(' => {
            if chars.get(start + 2) == Some(&'(') {
                // try $(( ... )) arithmetic first
                if let Some(end) = find_closing_double_paren(chars, start + 1) {
                    let inner: String = chars[start + 3..end - 1].iter().collect();
                    let value = crate::interpreter::arithmetic::evaluate(shell, &inner)?;
                    return Ok((Some(ParamValue::Str(value.to_string())), end + 1));
                }
            }
            let end = find_closing_paren(chars, start + 1)?;
            let inner: String = chars[start + 2..end].iter().collect();
            let output = command_sub::command_substitute(shell, &inner)?;
            Ok((Some(ParamValue::Str(output)), end + 1))
        }
        c if c.is_ascii_alphabetic() || c == '_' => {
            let mut end = start + 1;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let name: String = chars[start + 1..end].iter().collect();
            let value = parameter::expand_parameter(shell, &name, in_double)?;
            Ok((Some(value), end))
        }
        c if c.is_ascii_digit() => {
            let name: String = c.to_string();
            let value = parameter::expand_parameter(shell, &name, in_double)?;
            Ok((Some(value), start + 2))
        }
        '?' | '#' | '@' | '*' | '$' | '!' | '-' | '_' => {
            let value = parameter::expand_parameter(shell, &next.to_string(), in_double)?;
            Ok((Some(value), start + 2))
        }
        _ => Ok((None, start + 1)),
    }
}

fn find_closing_brace(chars: &[char], open: usize) -> Result<usize, ShellError> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '\'' => {
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    i += 1;
                }
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(ShellError::syntax("${", "missing closing `}'"))
}

fn find_closing_paren(chars: &[char], open: usize) -> Result<usize, ShellError> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '\'' | '"' => {
                let quote = chars[i];
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && quote == '"' {
                        i += 2;
                        continue;
                    }
                    if chars[i] == quote {
                        break;
                    }
                    i += 1;
                }
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(ShellError::syntax("$(", "missing closing `)'"))
}

/// For `$((expr))`: find the index of the second of the two closing parens,
/// or None when the parens do not pair up as arithmetic.
fn find_closing_double_paren(chars: &[char], open: usize) -> Option<usize> {
    let end = find_closing_paren(chars, open).ok()?;
    if end >= 1 && chars.get(end.wrapping_sub(1)) == Some(&')') {
        // inner paren must close exactly at end-1
        let inner_end = find_closing_paren(chars, open + 1).ok()?;
        if inner_end == end - 1 {
            return Some(end);
        }
    }
    None
}

fn read_backtick_body(chars: &[char], start: usize) -> Result<(String, usize), ShellError> {
    let mut body = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if matches!(chars.get(i + 1), Some('`') | Some('\\') | Some('$')) => {
                body.push(chars[i + 1]);
                i += 2;
            }
            '`' => return Ok((body, i + 1)),
            c => {
                body.push(c);
                i += 1;
            }
        }
    }
    Err(ShellError::syntax("`", "missing closing backquote"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};

    fn shell() -> Shell {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set("IFS", " \t\n").unwrap();
        shell
    }

    #[test]
    fn test_literal_word() {
        let mut sh = shell();
        assert_eq!(expand_word(&mut sh, "plain").unwrap(), vec!["plain"]);
    }

    #[test]
    fn test_single_quotes_byte_for_byte() {
        let mut sh = shell();
        assert_eq!(
            expand_word(&mut sh, "'$HOME *'").unwrap(),
            vec!["$HOME *"]
        );
    }

    #[test]
    fn test_variable_expansion_and_split() {
        let mut sh = shell();
        sh.vars.set("v", "a b").unwrap();
        assert_eq!(expand_word(&mut sh, "$v").unwrap(), vec!["a", "b"]);
        assert_eq!(expand_word(&mut sh, "\"$v\"").unwrap(), vec!["a b"]);
    }

    #[test]
    fn test_unset_variable_vanishes() {
        let mut sh = shell();
        assert!(expand_word(&mut sh, "$nope").unwrap().is_empty());
        assert_eq!(expand_word(&mut sh, "\"$nope\"").unwrap(), vec![""]);
    }

    #[test]
    fn test_mixed_quoting_per_character() {
        let mut sh = shell();
        sh.vars.set("x", "1 2").unwrap();
        // unquoted $x splits, the quoted tail joins the last field
        assert_eq!(expand_word(&mut sh, "$x\"3 4\"").unwrap(), vec!["1", "23 4"]);
    }

    #[test]
    fn test_at_expands_to_separate_words() {
        let mut sh = shell();
        sh.vars
            .positional_set(vec!["one".into(), "two words".into()]);
        assert_eq!(
            expand_word(&mut sh, "\"$@\"").unwrap(),
            vec!["one", "two words"]
        );
    }

    #[test]
    fn test_at_with_no_positionals_vanishes() {
        let mut sh = shell();
        assert!(expand_word(&mut sh, "\"$@\"").unwrap().is_empty());
        assert_eq!(expand_word(&mut sh, "\"\"").unwrap(), vec![""]);
    }

    #[test]
    fn test_star_joins_with_first_ifs_char() {
        let mut sh = shell();
        sh.vars.positional_set(vec!["a".into(), "b".into()]);
        assert_eq!(expand_word(&mut sh, "\"$*\"").unwrap(), vec!["a b"]);
    }

    #[test]
    fn test_brace_then_expansion() {
        let mut sh = shell();
        assert_eq!(
            expand_word(&mut sh, "{a,b}{1,2}").unwrap(),
            vec!["a1", "a2", "b1", "b2"]
        );
    }

    #[test]
    fn test_arithmetic_expansion() {
        let mut sh = shell();
        sh.vars.set("x", "5").unwrap();
        assert_eq!(expand_word(&mut sh, "$((x*2 + 1))").unwrap(), vec!["11"]);
    }

    #[test]
    fn test_dollar_literal_when_not_expansion() {
        let mut sh = shell();
        assert_eq!(expand_word(&mut sh, "a$%b").unwrap(), vec!["a$%b"]);
    }

    #[test]
    fn test_no_split_expansion() {
        let mut sh = shell();
        sh.vars.set("v", "a b").unwrap();
        assert_eq!(expand_word_no_split(&mut sh, "$v").unwrap(), "a b");
    }

    #[test]
    fn test_escaped_dollar() {
        let mut sh = shell();
        sh.vars.set("v", "x").unwrap();
        assert_eq!(expand_word(&mut sh, "\\$v").unwrap(), vec!["$v"]);
    }

    #[test]
    fn test_heredoc_expansion_keeps_quotes() {
        let mut sh = shell();
        sh.vars.set("name", "world").unwrap();
        let out = expand_heredoc(&mut sh, "hello \"$name\"\n'$name'\n").unwrap();
        assert_eq!(out, "hello \"world\"\n'world'\n");
    }

    #[test]
    fn test_expand_as_pattern_protects_quoted_glob_chars() {
        let mut sh = shell();
        assert_eq!(expand_as_pattern(&mut sh, "'*'x*").unwrap(), "\\*x*");
    }
}
