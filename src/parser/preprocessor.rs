//! Command Preprocessor
//!
//! Runs once over the raw input before parsing proper:
//!
//! 1. Here-document extraction: `<<WORD` (or `<<-WORD`) and the following
//!    body lines are replaced with `< __CJSH_HEREDOC_<n>__`; the body is
//!    recorded in a placeholder map together with whether it should be
//!    expanded (`false` iff the delimiter was quoted).
//! 2. Group rewriting: a `( ... )` at command position becomes
//!    `SUBSHELL{...}`; a `{ ...; }` at command position becomes
//!    `BRACEGROUP{...}`. Balance scanning honors quotes. Only leading
//!    groups are rewritten; anything nested is left to the parser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ShellError;
use crate::parser::types::syntax_error;

pub const SUBSHELL_MARKER: &str = "SUBSHELL{";
pub const BRACEGROUP_MARKER: &str = "BRACEGROUP{";

static HEREDOC_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A captured here-document body.
#[derive(Debug, Clone)]
pub struct HereDoc {
    pub content: String,
    /// false iff the delimiter was quoted; quoted delimiters suppress
    /// parameter/arithmetic/command expansion of the body
    pub expand: bool,
}

/// Result of preprocessing one top-level input.
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    pub text: String,
    pub here_docs: HashMap<String, HereDoc>,
}

fn next_placeholder() -> String {
    let id = HEREDOC_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("__CJSH_HEREDOC_{}__", id)
}

pub fn is_heredoc_placeholder(target: &str) -> bool {
    target.starts_with("__CJSH_HEREDOC_") && target.ends_with("__")
}

/// Preprocess raw input: extract here-documents, rewrite leading groups.
pub fn preprocess(input: &str) -> Result<Preprocessed, ShellError> {
    let mut result = Preprocessed::default();
    let with_heredocs = extract_here_documents(input, &mut result.here_docs)?;
    result.text = rewrite_groups(&with_heredocs)?;
    Ok(result)
}

/// A pending heredoc found on the current line, waiting for its body.
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
    expand: bool,
    placeholder: String,
}

fn extract_here_documents(
    input: &str,
    here_docs: &mut HashMap<String, HereDoc>,
) -> Result<String, ShellError> {
    if !input.contains("<<") {
        return Ok(input.to_string());
    }

    let mut out = String::new();
    let mut lines = input.split('\n').peekable();

    while let Some(line) = lines.next() {
        let (processed, pending) = scan_line_for_heredocs(line)?;
        out.push_str(&processed);

        for p in pending {
            let mut content = String::new();
            let mut closed = false;
            for body_line in lines.by_ref() {
                let check = if p.strip_tabs {
                    body_line.trim_start_matches('\t')
                } else {
                    body_line
                };
                if check == p.delimiter {
                    closed = true;
                    break;
                }
                content.push_str(check);
                content.push('\n');
            }
            if !closed {
                return Err(syntax_error(
                    format!("here-document delimited by end-of-file (wanted `{}')", p.delimiter),
                    line,
                ));
            }
            here_docs.insert(
                p.placeholder,
                HereDoc {
                    content,
                    expand: p.expand,
                },
            );
        }

        if lines.peek().is_some() {
            out.push('\n');
        }
    }
    Ok(out)
}

/// Replace `<<WORD` operators on a single line with placeholder redirections,
/// returning the rewritten line and the heredocs awaiting bodies, in order.
fn scan_line_for_heredocs(line: &str) -> Result<(String, Vec<PendingHeredoc>), ShellError> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::new();
    let mut pending = Vec::new();
    let mut i = 0;
    let mut in_single = false;
    let mut in_double = false;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && !in_single {
            out.push(c);
            if i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if c == '\'' && !in_double {
            in_single = !in_single;
            out.push(c);
            i += 1;
            continue;
        }
        if c == '"' && !in_single {
            in_double = !in_double;
            out.push(c);
            i += 1;
            continue;
        }
        if c == '<' && !in_single && !in_double && i + 1 < chars.len() && chars[i + 1] == '<' {
            // <<< is a here-string, not a here-document
            if i + 2 < chars.len() && chars[i + 2] == '<' {
                out.push_str("<<<");
                i += 3;
                continue;
            }
            let strip_tabs = i + 2 < chars.len() && chars[i + 2] == '-';
            let mut j = i + 2 + usize::from(strip_tabs);
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
                j += 1;
            }
            let (delimiter, quoted, end) = read_heredoc_delimiter(&chars, j)?;
            if delimiter.is_empty() {
                return Err(syntax_error("missing here-document delimiter", line));
            }
            let placeholder = next_placeholder();
            out.push_str("< ");
            out.push_str(&placeholder);
            pending.push(PendingHeredoc {
                delimiter,
                strip_tabs,
                expand: !quoted,
                placeholder,
            });
            i = end;
            continue;
        }
        out.push(c);
        i += 1;
    }
    Ok((out, pending))
}

/// Read a heredoc delimiter word; returns (delimiter, was_quoted, end_index).
fn read_heredoc_delimiter(
    chars: &[char],
    start: usize,
) -> Result<(String, bool, usize), ShellError> {
    let mut delim = String::new();
    let mut quoted = false;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>' | '(' | ')' => break,
            '\'' => {
                quoted = true;
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    delim.push(chars[i]);
                    i += 1;
                }
                i += 1;
            }
            '"' => {
                quoted = true;
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    delim.push(chars[i]);
                    i += 1;
                }
                i += 1;
            }
            '\\' => {
                quoted = true;
                i += 1;
                if i < chars.len() {
                    delim.push(chars[i]);
                    i += 1;
                }
            }
            c => {
                delim.push(c);
                i += 1;
            }
        }
    }
    Ok((delim, quoted, i))
}

/// Rewrite leading `( ... )` and `{ ... }` groups to internal markers.
fn rewrite_groups(input: &str) -> Result<String, ShellError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    let mut at_command_pos = true;
    let mut case_depth = 0usize;
    // after `function NAME` the next token is a compound body
    let mut function_name_pending = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
                at_command_pos = false;
            }
            '\'' | '"' => {
                let end = skip_quoted(&chars, i)?;
                for ch in &chars[i..end] {
                    out.push(*ch);
                }
                i = end;
                at_command_pos = false;
            }
            '$' if i + 1 < chars.len() && chars[i + 1] == '(' => {
                let end = find_matching(&chars, i + 1, '(', ')')?;
                for ch in &chars[i..=end] {
                    out.push(*ch);
                }
                i = end + 1;
                at_command_pos = false;
            }
            '(' if at_command_pos && case_depth == 0 => {
                let end = find_matching(&chars, i, '(', ')')?;
                let inner: String = chars[i + 1..end].iter().collect();
                out.push_str(SUBSHELL_MARKER);
                out.push_str(inner.trim());
                out.push('}');
                i = end + 1;
                at_command_pos = false;
            }
            '{' if at_command_pos && matches!(chars.get(i + 1), Some(' ') | Some('\t') | Some('\n')) =>
            {
                let end = find_matching(&chars, i, '{', '}')?;
                let mut inner: String = chars[i + 1..end].iter().collect();
                inner = inner.trim().trim_end_matches(';').trim_end().to_string();
                out.push_str(BRACEGROUP_MARKER);
                out.push_str(&inner);
                out.push('}');
                i = end + 1;
                at_command_pos = false;
            }
            ';' | '&' | '|' | '\n' => {
                out.push(c);
                i += 1;
                at_command_pos = true;
            }
            // `)` closes a function's `()`; a compound command may follow
            ')' => {
                out.push(c);
                i += 1;
                at_command_pos = true;
            }
            ' ' | '\t' => {
                out.push(c);
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
                    out.push_str(&word);
                    i = j;
                    if at_command_pos && word == "function" {
                        function_name_pending = true;
                        at_command_pos = false;
                        continue;
                    }
                    if function_name_pending {
                        // the word was the function's name; its body follows
                        function_name_pending = false;
                        at_command_pos = true;
                        continue;
                    }
                } else {
                    out.push(c);
                    i += 1;
                }
                at_command_pos = false;
            }
        }
    }
    Ok(out)
}

fn skip_quoted(chars: &[char], start: usize) -> Result<usize, ShellError> {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if quote == '"' && chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(syntax_error("unterminated quote", &chars.iter().collect::<String>()))
}

/// Find the close matching `chars[start]`, honoring quotes and nesting.
fn find_matching(chars: &[char], start: usize, open: char, close: char) -> Result<usize, ShellError> {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                i += 2;
                continue;
            }
            '\'' | '"' => {
                i = skip_quoted(chars, i)?;
                continue;
            }
            _ => {}
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
        i += 1;
    }
    Err(syntax_error(
        format!("unbalanced `{}'", open),
        &chars.iter().collect::<String>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_heredoc_passthrough() {
        let p = preprocess("echo hello").unwrap();
        assert_eq!(p.text, "echo hello");
        assert!(p.here_docs.is_empty());
    }

    #[test]
    fn test_heredoc_extracted() {
        let p = preprocess("cat <<EOF\nline one\nline two\nEOF\necho after").unwrap();
        assert!(p.text.starts_with("cat < __CJSH_HEREDOC_"));
        assert!(p.text.contains("echo after"));
        assert_eq!(p.here_docs.len(), 1);
        let hd = p.here_docs.values().next().unwrap();
        assert_eq!(hd.content, "line one\nline two\n");
        assert!(hd.expand);
    }

    #[test]
    fn test_quoted_delimiter_disables_expansion() {
        let p = preprocess("cat <<'EOF'\n$HOME\nEOF").unwrap();
        let hd = p.here_docs.values().next().unwrap();
        assert_eq!(hd.content, "$HOME\n");
        assert!(!hd.expand);
    }

    #[test]
    fn test_dash_strips_leading_tabs() {
        let p = preprocess("cat <<-EOF\n\tindented\n\tEOF").unwrap();
        let hd = p.here_docs.values().next().unwrap();
        assert_eq!(hd.content, "indented\n");
    }

    #[test]
    fn test_unterminated_heredoc_fails() {
        assert!(preprocess("cat <<EOF\nno terminator").is_err());
    }

    #[test]
    fn test_here_string_untouched() {
        let p = preprocess("cat <<<word").unwrap();
        assert_eq!(p.text, "cat <<<word");
    }

    #[test]
    fn test_subshell_rewritten() {
        let p = preprocess("(echo a; echo b)").unwrap();
        assert_eq!(p.text, "SUBSHELL{echo a; echo b}");
    }

    #[test]
    fn test_brace_group_rewritten() {
        let p = preprocess("{ echo a; echo b; }").unwrap();
        assert_eq!(p.text, "BRACEGROUP{echo a; echo b}");
    }

    #[test]
    fn test_group_after_operator_rewritten() {
        let p = preprocess("true && (echo y)").unwrap();
        assert_eq!(p.text, "true && SUBSHELL{echo y}");
    }

    #[test]
    fn test_non_leading_paren_left_alone() {
        let p = preprocess("echo $(date)").unwrap();
        assert_eq!(p.text, "echo $(date)");
    }

    #[test]
    fn test_brace_expansion_not_a_group() {
        let p = preprocess("echo {a,b}").unwrap();
        assert_eq!(p.text, "echo {a,b}");
    }

    #[test]
    fn test_quotes_honored_in_balance_scan() {
        let p = preprocess("(echo ')')").unwrap();
        assert_eq!(p.text, "SUBSHELL{echo ')'}");
    }

    #[test]
    fn test_function_body_group_rewritten() {
        let p = preprocess("f() { echo hi; }").unwrap();
        assert_eq!(p.text, "f() BRACEGROUP{echo hi}");
    }

    #[test]
    fn test_function_keyword_body_rewritten() {
        let p = preprocess("function greet { echo hi; }").unwrap();
        assert_eq!(p.text, "function greet BRACEGROUP{echo hi}");
    }

    #[test]
    fn test_case_patterns_not_rewritten() {
        let p = preprocess("case $x in\n(a) echo a;;\nesac").unwrap();
        assert!(p.text.contains("(a) echo a"));
        assert!(!p.text.contains("SUBSHELL"));
    }
}
