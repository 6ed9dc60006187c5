//! Lexer
//!
//! Tokenizes shell source into a stream of tokens the parser consumes.
//! Handles:
//! - Operators and redirections (with optional fd prefixes)
//! - Words with quoting rules (single, double, mixed)
//! - `$(...)`, `$((...))`, `${...}` and backtick runs kept intact inside words
//! - Comments and line continuations
//! - Reserved words at command-start position
//! - Assignment words before the command word

use crate::errors::ShellError;
use crate::parser::types::{
    is_reserved_word, parse_assignment, syntax_error, QuoteState, Token, TokenKind, MAX_INPUT_SIZE,
    MAX_TOKENS,
};

lazy_static::lazy_static! {
    /// Multi-character operators, longest first so that greedy matching works.
    static ref OPERATORS: Vec<&'static str> = vec![
        ";;&", "<<-", "<<<", "&&", "||", ";;", ";&", "|&", ">>", "<<",
        ">&", "<&", "<>", ">|", "|", "&", ";", "(", ")", "<", ">",
    ];
}

fn is_redirection_op(op: &str) -> bool {
    matches!(
        op,
        "<" | ">" | "<<" | ">>" | "<<-" | "<<<" | ">&" | "<&" | "<>" | ">|"
    )
}

struct Lexer<'a> {
    chars: Vec<char>,
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    at_command_start: bool,
    seen_command_word: bool,
}

/// Tokenize one logical line (or a whole script) into tokens.
/// Newlines outside quotes become `Newline` tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ShellError> {
    if input.len() > MAX_INPUT_SIZE {
        return Err(syntax_error("input too large", ""));
    }
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        src: input,
        pos: 0,
        tokens: Vec::new(),
        at_command_start: true,
        seen_command_word: false,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<(), ShellError> {
        while self.pos < self.chars.len() {
            if self.tokens.len() > MAX_TOKENS {
                return Err(syntax_error("too many tokens", self.src));
            }
            let c = self.chars[self.pos];

            // line continuation
            if c == '\\' && self.peek(1) == Some('\n') {
                self.pos += 2;
                continue;
            }
            if c == ' ' || c == '\t' {
                self.pos += 1;
                continue;
            }
            if c == '\n' {
                self.push(Token::new(TokenKind::Newline, "\n", QuoteState::Unquoted));
                self.at_command_start = true;
                self.seen_command_word = false;
                self.pos += 1;
                continue;
            }
            // comment runs to end of line
            if c == '#' {
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.pos += 1;
                }
                continue;
            }
            if let Some(op) = self.match_operator() {
                self.emit_operator(op, None);
                continue;
            }
            self.read_word()?;
        }
        Ok(())
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Try to match an operator at the current position (without consuming
    /// word characters). Returns the matched operator text.
    fn match_operator(&mut self) -> Option<&'static str> {
        for op in OPERATORS.iter() {
            if self.src_matches(op) {
                self.pos += op.chars().count();
                return Some(op);
            }
        }
        None
    }

    fn src_matches(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn emit_operator(&mut self, op: &str, fd_prefix: Option<String>) {
        let kind = if is_redirection_op(op) {
            TokenKind::Redirection
        } else {
            TokenKind::Operator
        };
        let text = match fd_prefix {
            Some(fd) => format!("{}{}", fd, op),
            None => op.to_string(),
        };
        self.push(Token::new(kind, text, QuoteState::Unquoted));
        if kind == TokenKind::Operator {
            self.at_command_start = true;
            self.seen_command_word = false;
        }
    }

    /// Read one word, preserving quote characters in the token text.
    fn read_word(&mut self) -> Result<(), ShellError> {
        let start = self.pos;
        let mut text = String::new();
        let mut saw_single = false;
        let mut saw_double = false;
        let mut saw_unquoted = false;

        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                ' ' | '\t' | '\n' => break,
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.pos += 2;
                        continue;
                    }
                    text.push('\\');
                    if let Some(next) = self.peek(1) {
                        text.push(next);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                    saw_unquoted = true;
                }
                '\'' => {
                    saw_single = true;
                    self.read_single_quoted(&mut text)?;
                }
                '"' => {
                    saw_double = true;
                    self.read_double_quoted(&mut text)?;
                }
                '`' => {
                    saw_unquoted = true;
                    self.read_backtick(&mut text)?;
                }
                '$' => {
                    saw_unquoted = true;
                    self.read_dollar(&mut text)?;
                }
                _ => {
                    // a digits-only word glued to < or > is an fd prefix
                    if (c == '<' || c == '>')
                        && !text.is_empty()
                        && saw_unquoted
                        && !saw_single
                        && !saw_double
                        && text.chars().all(|d| d.is_ascii_digit())
                    {
                        let fd = std::mem::take(&mut text);
                        if let Some(op) = self.match_operator() {
                            self.emit_operator(op, Some(fd));
                            return Ok(());
                        }
                        text = fd;
                    }
                    if c == '<' || c == '>' || c == '|' || c == '&' || c == ';' || c == '(' || c == ')'
                    {
                        break;
                    }
                    text.push(c);
                    saw_unquoted = true;
                    self.pos += 1;
                }
            }
        }

        if text.is_empty() && self.pos == start {
            // skip a character we cannot otherwise classify
            self.pos += 1;
            return Ok(());
        }

        let quote_state = match (saw_single, saw_double, saw_unquoted) {
            (true, false, false) => QuoteState::SingleQuoted,
            (false, true, false) => QuoteState::DoubleQuoted,
            (false, false, _) => QuoteState::Unquoted,
            _ => QuoteState::Mixed,
        };

        self.classify_and_push(text, quote_state);
        Ok(())
    }

    fn classify_and_push(&mut self, text: String, quote_state: QuoteState) {
        if quote_state == QuoteState::Unquoted {
            if self.at_command_start && is_reserved_word(&text) && text != "in" {
                self.push(Token::new(TokenKind::Reserved, text.clone(), quote_state));
                // `fi`, `done`, `esac`, `}`, `]]` close a construct; the words
                // after them continue the surrounding command
                self.at_command_start =
                    !matches!(text.as_str(), "fi" | "done" | "esac" | "}" | "]]");
                return;
            }
            if !self.seen_command_word && parse_assignment(&text).is_some() {
                self.push(Token::new(TokenKind::Assignment, text, quote_state));
                self.at_command_start = false;
                return;
            }
        }
        self.push(Token::word(text, quote_state));
        self.at_command_start = false;
        self.seen_command_word = true;
    }

    fn read_single_quoted(&mut self, text: &mut String) -> Result<(), ShellError> {
        text.push('\'');
        self.pos += 1;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            text.push(c);
            self.pos += 1;
            if c == '\'' {
                return Ok(());
            }
        }
        Err(syntax_error("unterminated single quote", self.src))
    }

    fn read_double_quoted(&mut self, text: &mut String) -> Result<(), ShellError> {
        text.push('"');
        self.pos += 1;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                '"' => {
                    text.push('"');
                    self.pos += 1;
                    return Ok(());
                }
                '\\' => {
                    text.push('\\');
                    if let Some(next) = self.peek(1) {
                        text.push(next);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                '$' => self.read_dollar(text)?,
                '`' => self.read_backtick(text)?,
                _ => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        Err(syntax_error("unterminated double quote", self.src))
    }

    /// Consume `$NAME`, `${...}`, `$(...)`, `$((...))` into the word text.
    /// Balanced scanning keeps embedded `;`/`|`/newlines from splitting the word.
    fn read_dollar(&mut self, text: &mut String) -> Result<(), ShellError> {
        text.push('$');
        self.pos += 1;
        match self.chars.get(self.pos) {
            Some('{') => self.consume_balanced(text, '{', '}', "unterminated ${"),
            Some('(') => self.consume_balanced(text, '(', ')', "unterminated $("),
            _ => Ok(()),
        }
    }

    fn read_backtick(&mut self, text: &mut String) -> Result<(), ShellError> {
        text.push('`');
        self.pos += 1;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            text.push(c);
            self.pos += 1;
            if c == '\\' {
                if let Some(&next) = self.chars.get(self.pos) {
                    text.push(next);
                    self.pos += 1;
                }
                continue;
            }
            if c == '`' {
                return Ok(());
            }
        }
        Err(syntax_error("unterminated backquote", self.src))
    }

    fn consume_balanced(
        &mut self,
        text: &mut String,
        open: char,
        close: char,
        err: &str,
    ) -> Result<(), ShellError> {
        let mut depth = 0usize;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                '\\' => {
                    text.push('\\');
                    if let Some(next) = self.peek(1) {
                        text.push(next);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                    continue;
                }
                '\'' => {
                    self.read_single_quoted(text)?;
                    continue;
                }
                '"' => {
                    self.read_double_quoted(text)?;
                    continue;
                }
                _ => {}
            }
            text.push(c);
            self.pos += 1;
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(syntax_error(err, self.src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn test_simple_words() {
        let t = tokenize("echo hello world").unwrap();
        assert_eq!(texts(&t), vec!["echo", "hello", "world"]);
        assert!(t.iter().all(|tok| tok.kind == TokenKind::Word));
    }

    #[test]
    fn test_operators() {
        let t = tokenize("a | b && c; d &").unwrap();
        assert_eq!(texts(&t), vec!["a", "|", "b", "&&", "c", ";", "d", "&"]);
        assert_eq!(t[1].kind, TokenKind::Operator);
        assert_eq!(t[3].kind, TokenKind::Operator);
    }

    #[test]
    fn test_redirections_with_fd() {
        let t = tokenize("cmd 2>&1 >out <in").unwrap();
        assert_eq!(texts(&t), vec!["cmd", "2>&", "1", ">", "out", "<", "in"]);
        assert_eq!(t[1].kind, TokenKind::Redirection);
        assert_eq!(t[3].kind, TokenKind::Redirection);
    }

    #[test]
    fn test_quote_states() {
        let t = tokenize("'single' \"double\" plain a'b'").unwrap();
        assert_eq!(t[0].quote_state, QuoteState::SingleQuoted);
        assert_eq!(t[1].quote_state, QuoteState::DoubleQuoted);
        assert_eq!(t[2].quote_state, QuoteState::Unquoted);
        assert_eq!(t[3].quote_state, QuoteState::Mixed);
    }

    #[test]
    fn test_quotes_preserved_in_text() {
        let t = tokenize("echo 'a b' \"c d\"").unwrap();
        assert_eq!(t[1].text, "'a b'");
        assert_eq!(t[2].text, "\"c d\"");
    }

    #[test]
    fn test_unterminated_quote_fails() {
        assert!(tokenize("echo 'oops").is_err());
        assert!(tokenize("echo \"oops").is_err());
    }

    #[test]
    fn test_reserved_only_at_command_start() {
        let t = tokenize("if true; then echo if; fi").unwrap();
        assert_eq!(t[0].kind, TokenKind::Reserved);
        assert!(t[3].is_reserved("then"));
        // the `if` argument to echo is a plain word
        let word_if = &t[5];
        assert_eq!(word_if.text, "if");
        assert_eq!(word_if.kind, TokenKind::Word);
        assert!(t[7].is_reserved("fi"));
    }

    #[test]
    fn test_assignment_words() {
        let t = tokenize("FOO=bar BAZ+=x cmd FOO=notassign").unwrap();
        assert_eq!(t[0].kind, TokenKind::Assignment);
        assert_eq!(t[1].kind, TokenKind::Assignment);
        assert_eq!(t[2].kind, TokenKind::Word);
        // after the command word, NAME=v is an ordinary argument
        assert_eq!(t[3].kind, TokenKind::Word);
    }

    #[test]
    fn test_command_substitution_not_split() {
        let t = tokenize("echo $(ls; pwd) x").unwrap();
        assert_eq!(texts(&t), vec!["echo", "$(ls; pwd)", "x"]);
    }

    #[test]
    fn test_arithmetic_not_split() {
        let t = tokenize("echo $((x*2 + 1))").unwrap();
        assert_eq!(texts(&t), vec!["echo", "$((x*2 + 1))"]);
    }

    #[test]
    fn test_comment_skipped() {
        let t = tokenize("echo hi # a comment").unwrap();
        assert_eq!(texts(&t), vec!["echo", "hi"]);
    }

    #[test]
    fn test_line_continuation() {
        let t = tokenize("echo a\\\nb").unwrap();
        assert_eq!(texts(&t), vec!["echo", "ab"]);
    }

    #[test]
    fn test_newline_token() {
        let t = tokenize("a\nb").unwrap();
        assert_eq!(t[1].kind, TokenKind::Newline);
    }

    #[test]
    fn test_double_quoted_substitution_with_inner_quotes() {
        let t = tokenize("echo \"$(echo \"x y\")\"").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].text, "\"$(echo \"x y\")\"");
    }

    #[test]
    fn test_case_operators() {
        let t = tokenize("a) echo m ;; b) echo n ;&").unwrap();
        assert!(t.iter().any(|tok| tok.is_operator(";;")));
        assert!(t.iter().any(|tok| tok.is_operator(";&")));
    }
}
