//! Parser
//!
//! Turns preprocessed source into executable structure:
//!
//! 1. `parse_into_lines` - split into logical lines on unquoted newlines,
//!    keeping multi-line control structures, groups, and quoted strings
//!    together.
//! 2. `split_logical_units` - split a logical line on `;`, `&`, `&&`, `||`
//!    at depth 0, recording the combinator that follows each unit.
//! 3. `parse_pipeline` - split a unit on `|` / `|&` and parse each stage
//!    into a `Command` (argument words stay unexpanded; redirections are
//!    collected in declaration order). The first word of each simple
//!    command gets transitive alias expansion with cycle detection.

use std::collections::{HashMap, HashSet};

use crate::errors::ShellError;
use crate::parser::lexer::tokenize;
use crate::parser::preprocessor::{BRACEGROUP_MARKER, SUBSHELL_MARKER};
use crate::parser::types::{
    syntax_error, QuoteState, Token, TokenKind, MAX_ALIAS_DEPTH,
};

/// How a logical unit is joined to the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `;`, a newline, or end of line
    Seq,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `&` - the unit runs in the background
    Background,
}

/// A pipeline plus the combinator joining it to the next unit.
#[derive(Debug, Clone)]
pub struct LogicalUnit {
    pub text: String,
    pub combinator: Combinator,
}

/// One redirection attached to a command, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub fd: Option<i32>,
    pub kind: RedirKind,
    /// Unexpanded target word (filename, fd number, `-`, heredoc placeholder,
    /// or here-string text)
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirKind {
    InFile,
    OutFile,
    Append,
    HereString,
    DupIn,
    DupOut,
    ReadWrite,
    /// `>|`: overwrite even under noclobber
    Clobber,
}

/// A simple command: unexpanded argument words plus redirection metadata.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub args: Vec<Token>,
    /// Leading NAME=value words
    pub assignments: Vec<Token>,
    pub redirections: Vec<Redirection>,
    pub original_text: String,
}

impl Command {
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.assignments.is_empty() && self.redirections.is_empty()
    }
}

/// One stage of a pipeline.
#[derive(Debug, Clone)]
pub enum Stage {
    Simple(Command),
    Subshell {
        body: String,
        redirections: Vec<Redirection>,
    },
    BraceGroup {
        body: String,
        redirections: Vec<Redirection>,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub stage: Stage,
    /// stderr of this stage joins its stdout pipe (`|&` before the next stage)
    pub pipe_stderr: bool,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stages: Vec<PipelineStage>,
    pub negate: bool,
    pub background: bool,
    pub text: String,
}

/// Control-structure openers recognized at command position.
fn is_block_opener(word: &str) -> bool {
    matches!(word, "if" | "while" | "until" | "for" | "case")
}

fn is_block_closer(word: &str) -> bool {
    matches!(word, "fi" | "done" | "esac")
}

/// Words after which the next word is again at command position.
fn keeps_command_position(word: &str) -> bool {
    matches!(
        word,
        "if" | "then" | "else" | "elif" | "while" | "until" | "do" | "!" | "time"
    )
}

/// Split a preprocessed script into logical lines. Newlines inside quotes,
/// inside `(`/`{` groups, inside `[[ ]]`, after `\`, or inside an open
/// control structure do not split.
pub fn parse_into_lines(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut depth = 0i32;
    let mut control_depth = 0i32;
    let mut bracket_depth = 0i32;
    let mut at_command_pos = true;

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
                if i + 1 < chars.len() && chars[i + 1] == '\n' {
                    i += 2;
                } else if i + 1 < chars.len() {
                    current.push(c);
                    current.push(chars[i + 1]);
                    i += 2;
                } else {
                    current.push(c);
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
            '(' | '{' => {
                depth += 1;
                current.push(c);
                i += 1;
                at_command_pos = false;
            }
            ')' | '}' => {
                depth -= 1;
                current.push(c);
                i += 1;
                at_command_pos = true;
            }
            '#' if at_command_pos || current.ends_with(' ') || current.ends_with('\t') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\n' => {
                if depth > 0 || control_depth > 0 || bracket_depth > 0 {
                    current.push('\n');
                } else {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                    current.clear();
                }
                i += 1;
                at_command_pos = true;
            }
            ';' | '&' | '|' => {
                current.push(c);
                i += 1;
                at_command_pos = true;
            }
            ' ' | '\t' => {
                current.push(c);
                i += 1;
            }
            _ => {
                if c.is_ascii_alphanumeric() || c == '_' || c == '[' || c == ']' {
                    let mut j = i;
                    while j < chars.len()
                        && (chars[j].is_ascii_alphanumeric()
                            || chars[j] == '_'
                            || chars[j] == '['
                            || chars[j] == ']')
                    {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    if at_command_pos {
                        if is_block_opener(&word) {
                            control_depth += 1;
                        } else if word == "[[" {
                            bracket_depth += 1;
                        }
                    }
                    if is_block_closer(&word) {
                        control_depth -= 1;
                    } else if word == "]]" {
                        bracket_depth -= 1;
                    }
                    at_command_pos = keeps_command_position(&word);
                    current.push_str(&word);
                    i = j;
                } else {
                    current.push(c);
                    i += 1;
                    at_command_pos = false;
                }
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
    lines
}

/// Return the first whitespace-delimited word of a line.
pub fn first_word(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Split a logical line on unquoted `;`, `&`, `&&`, `||` at depth 0,
/// treating open control structures as depth. `;;` outside a `case` is a
/// syntax error.
pub fn split_logical_units(line: &str) -> Result<Vec<LogicalUnit>, ShellError> {
    let chars: Vec<char> = line.chars().collect();
    let mut units = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut depth = 0i32;
    let mut control_depth = 0i32;
    let mut bracket_depth = 0i32;
    let mut at_command_pos = true;

    let mut push_unit = |current: &mut String, combinator: Combinator| -> Result<(), ShellError> {
        let text = current.trim().to_string();
        if text.is_empty() {
            if combinator != Combinator::Seq {
                return Err(syntax_error("missing command before operator", line));
            }
            return Ok(());
        }
        units.push(LogicalUnit { text, combinator });
        current.clear();
        Ok(())
    };

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
            '(' | '{' => {
                depth += 1;
                current.push(c);
                i += 1;
            }
            ')' | '}' => {
                depth = (depth - 1).max(0);
                current.push(c);
                i += 1;
                at_command_pos = true;
            }
            '&' if depth == 0 && control_depth == 0 && bracket_depth == 0 => {
                if i + 1 < chars.len() && chars[i + 1] == '&' {
                    push_unit(&mut current, Combinator::And)?;
                    i += 2;
                    at_command_pos = true;
                } else if current.ends_with('>') || current.ends_with('<') {
                    // part of a redirection operator (>&, <&, 2>&1)
                    current.push(c);
                    i += 1;
                } else {
                    push_unit(&mut current, Combinator::Background)?;
                    i += 1;
                    at_command_pos = true;
                }
            }
            '&' => {
                current.push(c);
                i += 1;
            }
            '|' if depth == 0 && control_depth == 0 && bracket_depth == 0 => {
                if i + 1 < chars.len() && chars[i + 1] == '|' {
                    push_unit(&mut current, Combinator::Or)?;
                    i += 2;
                    at_command_pos = true;
                } else {
                    // pipeline operator, stays inside the unit
                    current.push(c);
                    i += 1;
                    at_command_pos = true;
                }
            }
            ';' if depth == 0 && control_depth == 0 && bracket_depth == 0 => {
                if i + 1 < chars.len() && chars[i + 1] == ';' {
                    return Err(syntax_error("`;;' outside a case statement", line));
                }
                push_unit(&mut current, Combinator::Seq)?;
                i += 1;
                at_command_pos = true;
            }
            ';' | '|' => {
                current.push(c);
                i += 1;
                at_command_pos = true;
            }
            '\n' if depth == 0 && control_depth == 0 && bracket_depth == 0 => {
                push_unit(&mut current, Combinator::Seq)?;
                i += 1;
                at_command_pos = true;
            }
            ' ' | '\t' | '\n' => {
                current.push(c);
                i += 1;
            }
            _ => {
                if c.is_ascii_alphanumeric() || c == '_' || c == '[' || c == ']' {
                    let mut j = i;
                    while j < chars.len()
                        && (chars[j].is_ascii_alphanumeric()
                            || chars[j] == '_'
                            || chars[j] == '['
                            || chars[j] == ']')
                    {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    if at_command_pos {
                        if is_block_opener(&word) {
                            control_depth += 1;
                        } else if word == "[[" {
                            bracket_depth += 1;
                        }
                    }
                    if is_block_closer(&word) {
                        control_depth -= 1;
                    } else if word == "]]" {
                        bracket_depth -= 1;
                    }
                    at_command_pos = keeps_command_position(&word);
                    current.push_str(&word);
                    i = j;
                } else {
                    current.push(c);
                    i += 1;
                    at_command_pos = false;
                }
            }
        }
    }
    push_unit(&mut current, Combinator::Seq)?;
    if let Some(last) = units.last() {
        if matches!(last.combinator, Combinator::And | Combinator::Or) {
            return Err(syntax_error("missing command after operator", line));
        }
    }
    Ok(units)
}

/// Split a logical unit on unquoted `|` / `|&` at depth 0 into pipeline
/// stage texts. Returns (stage_text, stderr_joins_pipe) pairs.
fn split_pipeline_stages(text: &str) -> Result<Vec<(String, bool)>, ShellError> {
    let chars: Vec<char> = text.chars().collect();
    let mut stages = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut depth = 0i32;

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
            }
            '\'' => {
                in_single = true;
                current.push(c);
                i += 1;
            }
            '"' => {
                in_double = true;
                current.push(c);
                i += 1;
            }
            '(' | '{' => {
                depth += 1;
                current.push(c);
                i += 1;
            }
            ')' | '}' => {
                depth = (depth - 1).max(0);
                current.push(c);
                i += 1;
            }
            '|' if depth == 0 => {
                let merge = i + 1 < chars.len() && chars[i + 1] == '&';
                let stage = current.trim().to_string();
                if stage.is_empty() {
                    return Err(syntax_error("missing command in pipeline", text));
                }
                stages.push((stage, merge));
                current.clear();
                i += if merge { 2 } else { 1 };
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    let stage = current.trim().to_string();
    if stage.is_empty() {
        return Err(syntax_error("missing command in pipeline", text));
    }
    stages.push((stage, false));
    Ok(stages)
}

/// Parse one logical unit into a pipeline.
pub fn parse_pipeline(
    text: &str,
    aliases: &HashMap<String, String>,
) -> Result<Pipeline, ShellError> {
    let mut work = text.trim().to_string();
    let mut negate = false;
    while work.starts_with("! ") || work == "!" {
        negate = !negate;
        work = work[1..].trim_start().to_string();
    }
    if work.is_empty() {
        return Err(syntax_error("missing command after `!'", text));
    }

    let raw_stages = split_pipeline_stages(&work)?;
    let mut stages = Vec::with_capacity(raw_stages.len());
    for (stage_text, merge) in raw_stages {
        let stage = parse_stage(&stage_text, aliases)?;
        stages.push(PipelineStage {
            stage,
            pipe_stderr: merge,
        });
    }
    Ok(Pipeline {
        stages,
        negate,
        background: false,
        text: text.trim().to_string(),
    })
}

/// Parse one pipeline stage: a group marker with trailing redirections, or
/// a simple command.
fn parse_stage(text: &str, aliases: &HashMap<String, String>) -> Result<Stage, ShellError> {
    for (marker, is_subshell) in [(SUBSHELL_MARKER, true), (BRACEGROUP_MARKER, false)] {
        if let Some(rest) = text.strip_prefix(marker) {
            let close = find_group_close(rest)
                .ok_or_else(|| syntax_error("unbalanced group", text))?;
            let body = rest[..close].to_string();
            let trailing = rest[close + 1..].trim();
            let redirections = if trailing.is_empty() {
                Vec::new()
            } else {
                parse_trailing_redirections(trailing)?
            };
            return Ok(if is_subshell {
                Stage::Subshell { body, redirections }
            } else {
                Stage::BraceGroup { body, redirections }
            });
        }
    }
    Ok(Stage::Simple(parse_simple_command(text, aliases)?))
}

/// Find the `}` closing a group marker body (quote- and nest-aware).
fn find_group_close(rest: &str) -> Option<usize> {
    let chars: Vec<char> = rest.chars().collect();
    let mut depth = 1i32;
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut byte = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if in_single {
            if c == '\'' {
                in_single = false;
            }
        } else if in_double {
            if c == '\\' {
                byte += c.len_utf8() + chars.get(i + 1).map(|n| n.len_utf8()).unwrap_or(0);
                i += 2;
                continue;
            }
            if c == '"' {
                in_double = false;
            }
        } else {
            match c {
                '\\' => {
                    byte += c.len_utf8() + chars.get(i + 1).map(|n| n.len_utf8()).unwrap_or(0);
                    i += 2;
                    continue;
                }
                '\'' => in_single = true,
                '"' => in_double = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(byte);
                    }
                }
                _ => {}
            }
        }
        byte += c.len_utf8();
        i += 1;
    }
    None
}

/// Parse redirections that trail a group, e.g. `SUBSHELL{...} > out 2>&1`.
fn parse_trailing_redirections(text: &str) -> Result<Vec<Redirection>, ShellError> {
    let tokens = tokenize(text)?;
    let mut redirections = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.kind == TokenKind::Redirection {
            let target = tokens
                .get(i + 1)
                .filter(|t| t.kind == TokenKind::Word || t.kind == TokenKind::Assignment)
                .ok_or_else(|| syntax_error("missing redirection target", text))?;
            redirections.push(build_redirection(&tok.text, &target.text)?);
            i += 2;
        } else {
            return Err(syntax_error("unexpected token after group", &tok.text));
        }
    }
    Ok(redirections)
}

/// Decompose a redirection operator token (`2>>`, `<`, `>&`, ...) into a
/// typed entry.
fn build_redirection(op_text: &str, target: &str) -> Result<Redirection, ShellError> {
    let digits: String = op_text.chars().take_while(|c| c.is_ascii_digit()).collect();
    let fd = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<i32>().map_err(|_| {
            syntax_error("bad file descriptor", op_text)
        })?)
    };
    let op = &op_text[digits.len()..];
    let kind = match op {
        "<" => RedirKind::InFile,
        ">" => RedirKind::OutFile,
        ">>" => RedirKind::Append,
        "<<<" => RedirKind::HereString,
        ">&" => RedirKind::DupOut,
        "<&" => RedirKind::DupIn,
        "<>" => RedirKind::ReadWrite,
        ">|" => RedirKind::Clobber,
        _ => return Err(syntax_error("unrecognized redirection", op_text)),
    };
    Ok(Redirection {
        fd,
        kind,
        target: target.to_string(),
    })
}

/// Parse a simple command, applying transitive alias expansion to the
/// first word.
pub fn parse_simple_command(
    text: &str,
    aliases: &HashMap<String, String>,
) -> Result<Command, ShellError> {
    let expanded_text = expand_aliases(text, aliases)?;
    let tokens = tokenize(&expanded_text)?;

    let mut cmd = Command {
        original_text: text.trim().to_string(),
        ..Default::default()
    };

    // inside [[ ... ]] the operator characters are ordinary words
    let in_double_bracket = tokens
        .first()
        .map(|t| t.text == "[[")
        .unwrap_or(false);

    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        if in_double_bracket && tok.kind != TokenKind::Newline {
            cmd.args.push(tok.clone());
            i += 1;
            continue;
        }
        match tok.kind {
            TokenKind::Redirection => {
                let target = tokens
                    .get(i + 1)
                    .filter(|t| {
                        matches!(t.kind, TokenKind::Word | TokenKind::Assignment | TokenKind::Reserved)
                    })
                    .ok_or_else(|| syntax_error("missing redirection target", text))?;
                cmd.redirections.push(build_redirection(&tok.text, &target.text)?);
                i += 2;
            }
            TokenKind::Assignment if cmd.args.is_empty() => {
                cmd.assignments.push(tok.clone());
                i += 1;
            }
            TokenKind::Newline => {
                i += 1;
            }
            TokenKind::Operator => {
                return Err(syntax_error(
                    format!("unexpected operator `{}'", tok.text),
                    text,
                ));
            }
            _ => {
                cmd.args.push(tok.clone());
                i += 1;
            }
        }
    }
    Ok(cmd)
}

/// Apply alias expansion to the first word, transitively, with cycle
/// detection. Quoted or escaped first words are not alias-expanded.
fn expand_aliases(text: &str, aliases: &HashMap<String, String>) -> Result<String, ShellError> {
    let mut work = text.trim_start().to_string();
    let mut seen: HashSet<String> = HashSet::new();

    for _ in 0..MAX_ALIAS_DEPTH {
        let first_end = work
            .find(|c: char| c.is_whitespace())
            .unwrap_or(work.len());
        let first = &work[..first_end];
        if first.is_empty()
            || first.starts_with('\'')
            || first.starts_with('"')
            || first.starts_with('\\')
        {
            break;
        }
        let Some(expansion) = aliases.get(first) else {
            break;
        };
        if !seen.insert(first.to_string()) {
            break;
        }
        work = format!("{}{}", expansion, &work[first_end..]);
    }
    Ok(work)
}

/// Convenience used by tests and `--no-exec` mode: token texts with quoting
/// re-applied parse back to an equivalent stream.
pub fn reserialize_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.kind == TokenKind::Newline {
                "\n".to_string()
            } else {
                t.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_parse_into_lines_basic() {
        let lines = parse_into_lines("echo a\necho b\n\necho c");
        assert_eq!(lines, vec!["echo a", "echo b", "echo c"]);
    }

    #[test]
    fn test_parse_into_lines_keeps_control_structure() {
        let lines = parse_into_lines("if true\nthen echo hi\nfi\necho after");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("then echo hi"));
        assert_eq!(lines[1], "echo after");
    }

    #[test]
    fn test_parse_into_lines_quoted_newline() {
        let lines = parse_into_lines("echo 'a\nb'\necho c");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "echo 'a\nb'");
    }

    #[test]
    fn test_split_units_sequence() {
        let units = split_logical_units("a; b && c || d &").unwrap();
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].combinator, Combinator::Seq);
        assert_eq!(units[1].combinator, Combinator::And);
        assert_eq!(units[2].combinator, Combinator::Or);
        assert_eq!(units[3].combinator, Combinator::Background);
    }

    #[test]
    fn test_split_units_redirection_amp_not_background() {
        let units = split_logical_units("cmd 2>&1").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "cmd 2>&1");
    }

    #[test]
    fn test_split_units_control_structure_intact() {
        let units = split_logical_units("if true; then echo a; fi; echo b").unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].text.starts_with("if"));
        assert_eq!(units[1].text, "echo b");
    }

    #[test]
    fn test_split_units_missing_operand_fails() {
        assert!(split_logical_units("a && ").is_err());
        assert!(split_logical_units("&& b").is_err());
    }

    #[test]
    fn test_double_semi_outside_case_rejected() {
        assert!(split_logical_units("a ;; b").is_err());
    }

    #[test]
    fn test_parse_pipeline_stages() {
        let p = parse_pipeline("a | b | c", &no_aliases()).unwrap();
        assert_eq!(p.stages.len(), 3);
        assert!(!p.negate);
    }

    #[test]
    fn test_parse_pipeline_negate() {
        let p = parse_pipeline("! true", &no_aliases()).unwrap();
        assert!(p.negate);
        assert_eq!(p.stages.len(), 1);
    }

    #[test]
    fn test_parse_pipeline_merge_stderr() {
        let p = parse_pipeline("a |& b", &no_aliases()).unwrap();
        assert!(p.stages[0].pipe_stderr);
        assert!(!p.stages[1].pipe_stderr);
    }

    #[test]
    fn test_simple_command_redirections_in_order() {
        let cmd = parse_simple_command("cmd >out 2>&1 <in", &no_aliases()).unwrap();
        assert_eq!(cmd.args.len(), 1);
        assert_eq!(cmd.redirections.len(), 3);
        assert_eq!(cmd.redirections[0].kind, RedirKind::OutFile);
        assert_eq!(cmd.redirections[0].target, "out");
        assert_eq!(cmd.redirections[1].kind, RedirKind::DupOut);
        assert_eq!(cmd.redirections[1].fd, Some(2));
        assert_eq!(cmd.redirections[1].target, "1");
        assert_eq!(cmd.redirections[2].kind, RedirKind::InFile);
    }

    #[test]
    fn test_simple_command_assignments() {
        let cmd = parse_simple_command("FOO=1 BAR=2 env", &no_aliases()).unwrap();
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.args.len(), 1);
        assert_eq!(cmd.args[0].text, "env");
    }

    #[test]
    fn test_missing_redirection_target_fails() {
        assert!(parse_simple_command("cmd >", &no_aliases()).is_err());
    }

    #[test]
    fn test_alias_expansion() {
        let mut aliases = HashMap::new();
        aliases.insert("ll".to_string(), "ls -l".to_string());
        let cmd = parse_simple_command("ll /tmp", &aliases).unwrap();
        let words: Vec<&str> = cmd.args.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_alias_cycle_detected() {
        let mut aliases = HashMap::new();
        aliases.insert("a".to_string(), "b".to_string());
        aliases.insert("b".to_string(), "a".to_string());
        // expansion terminates rather than looping
        let cmd = parse_simple_command("a", &aliases).unwrap();
        assert_eq!(cmd.args.len(), 1);
    }

    #[test]
    fn test_quoted_first_word_not_aliased() {
        let mut aliases = HashMap::new();
        aliases.insert("ls".to_string(), "echo nope".to_string());
        let cmd = parse_simple_command("'ls'", &aliases).unwrap();
        assert_eq!(cmd.args[0].text, "'ls'");
    }

    #[test]
    fn test_subshell_stage_with_redirection() {
        let p = parse_pipeline("SUBSHELL{echo a} > out", &no_aliases()).unwrap();
        match &p.stages[0].stage {
            Stage::Subshell { body, redirections } => {
                assert_eq!(body, "echo a");
                assert_eq!(redirections.len(), 1);
                assert_eq!(redirections[0].target, "out");
            }
            other => panic!("expected subshell stage, got {:?}", other),
        }
    }

    #[test]
    fn test_bracegroup_stage() {
        let p = parse_pipeline("BRACEGROUP{echo a; echo b}", &no_aliases()).unwrap();
        match &p.stages[0].stage {
            Stage::BraceGroup { body, .. } => assert_eq!(body, "echo a; echo b"),
            other => panic!("expected brace group stage, got {:?}", other),
        }
    }

    #[test]
    fn test_reserialize_round_trip() {
        let tokens = tokenize("echo 'a b' \"c d\" plain").unwrap();
        let text = reserialize_tokens(&tokens);
        let again = tokenize(&text).unwrap();
        assert_eq!(tokens, again);
    }

    #[test]
    fn test_quote_state_preserved() {
        let cmd = parse_simple_command("echo 'x'", &no_aliases()).unwrap();
        assert_eq!(cmd.args[1].quote_state, QuoteState::SingleQuoted);
    }
}
