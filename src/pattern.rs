//! Pattern Matching
//!
//! Shell glob patterns converted to regex equivalents, used by:
//! - `case` patterns (with `|` alternation)
//! - parameter expansion prefix/suffix strip and replace
//! - `[[ word = pattern ]]`
//!
//! Glob semantics: `*` matches any run (including empty), `?` exactly one
//! character, `[abc]` / `[a-z]` / `[!...]` character classes, `\c` a literal.

use regex_lite::Regex;
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// Valid POSIX character class names for `[[:name:]]`.
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("blank", " \\t");
        m.insert("digit", "0-9");
        m.insert("lower", "a-z");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r");
        m.insert("upper", "A-Z");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

/// Convert a shell glob pattern to a regex string.
/// `greedy` controls whether `*` prefers the longest run, which decides
/// shortest-vs-longest semantics for `${var#pat}` / `${var##pat}`.
pub fn pattern_to_regex(pattern: &str, greedy: bool) -> String {
    let mut regex = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            // \X means literal X
            if i + 1 < chars.len() {
                let next = chars[i + 1];
                if is_regex_special(next) {
                    regex.push('\\');
                }
                regex.push(next);
                i += 2;
            } else {
                regex.push_str("\\\\");
                i += 1;
            }
        } else if c == '*' {
            regex.push_str(if greedy { ".*" } else { ".*?" });
            i += 1;
        } else if c == '?' {
            regex.push('.');
            i += 1;
        } else if c == '[' {
            let class_end = find_char_class_end(&chars, i);
            if class_end == usize::MAX {
                // no matching ], the [ is literal
                regex.push_str("\\[");
                i += 1;
            } else {
                let class_content: String = chars[i + 1..class_end].iter().collect();
                regex.push_str(&convert_char_class(&class_content));
                i = class_end + 1;
            }
        } else if "^$.|+(){}".contains(c) {
            regex.push('\\');
            regex.push(c);
            i += 1;
        } else {
            regex.push(c);
            i += 1;
        }
    }
    regex
}

fn is_regex_special(c: char) -> bool {
    "\\^$.|+(){}[]*?".contains(c)
}

/// Find the end of a character class starting at `start` (chars[start] == '[').
fn find_char_class_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    if i < chars.len() && (chars[i] == '!' || chars[i] == '^') {
        i += 1;
    }
    // a ] immediately after [ or [! is literal
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }
        if chars[i] == ']' {
            return i;
        }
        if chars[i] == '[' && i + 1 < chars.len() && chars[i + 1] == ':' {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(close) = rest.find(":]") {
                i = i + 2 + close + 2;
                continue;
            }
        }
        i += 1;
    }
    usize::MAX
}

/// Convert the content inside `[...]` to a regex character class.
fn convert_char_class(content: &str) -> String {
    let mut result = String::from("[");
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    if !chars.is_empty() && (chars[0] == '!' || chars[0] == '^') {
        result.push('^');
        i += 1;
    }

    while i < chars.len() {
        // POSIX classes like [:alpha:]
        if chars[i] == '[' && i + 1 < chars.len() && chars[i + 1] == ':' {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(close) = rest.find(":]") {
                let name: String = chars[i + 2..i + 2 + close].iter().collect();
                result.push_str(POSIX_CLASSES.get(name.as_str()).copied().unwrap_or(""));
                i = i + 2 + close + 2;
                continue;
            }
        }

        let c = chars[i];
        if c == '\\' {
            if i + 1 < chars.len() {
                result.push('\\');
                result.push(chars[i + 1]);
                i += 2;
            } else {
                result.push_str("\\\\");
                i += 1;
            }
        } else if c == ']' && i == 0 {
            result.push_str("\\]");
            i += 1;
        } else {
            result.push(c);
            i += 1;
        }
    }

    result.push(']');
    result
}

/// Full anchored match of `text` against one glob pattern.
pub fn matches_pattern(text: &str, pattern: &str) -> bool {
    let regex_str = format!("^(?:{})$", pattern_to_regex(pattern, true));
    match Regex::new(&regex_str) {
        Ok(re) => re.is_match(text),
        Err(_) => text == pattern,
    }
}

/// Match against a case-style pattern list: `pat1|pat2|...`.
/// The split honors escapes and character classes, not quote removal;
/// callers strip quoting before matching.
pub fn matches_case_pattern(text: &str, pattern: &str) -> bool {
    split_alternatives(pattern)
        .iter()
        .any(|alt| matches_pattern(text, alt))
}

/// Split a case pattern on top-level unescaped `|`.
pub fn split_alternatives(pattern: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            current.push(c);
            current.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == '[' {
            let end = find_char_class_end(&chars, i);
            if end != usize::MAX {
                for ch in &chars[i..=end] {
                    current.push(*ch);
                }
                i = end + 1;
                continue;
            }
        }
        if c == '|' {
            alternatives.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        i += 1;
    }
    alternatives.push(current);
    alternatives
}

/// Does the word contain unquoted glob metacharacters?
/// `\`-escaped metacharacters do not count.
pub fn has_glob_chars(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '*' | '?' | '[' => return true,
            _ => i += 1,
        }
    }
    false
}

/// Strip the shortest or longest prefix matching `pattern` (`${var#pat}`,
/// `${var##pat}`).
pub fn remove_prefix(value: &str, pattern: &str, longest: bool) -> String {
    let regex_str = format!("^(?:{})$", pattern_to_regex(pattern, true));
    let re = match Regex::new(&regex_str) {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };
    let boundaries: Vec<usize> = char_boundaries(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(boundaries.iter().rev())
    } else {
        Box::new(boundaries.iter())
    };
    for &end in candidates {
        if re.is_match(&value[..end]) {
            return value[end..].to_string();
        }
    }
    value.to_string()
}

/// Strip the shortest or longest suffix matching `pattern` (`${var%pat}`,
/// `${var%%pat}`).
pub fn remove_suffix(value: &str, pattern: &str, longest: bool) -> String {
    let regex_str = format!("^(?:{})$", pattern_to_regex(pattern, true));
    let re = match Regex::new(&regex_str) {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };
    let boundaries: Vec<usize> = char_boundaries(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(boundaries.iter())
    } else {
        Box::new(boundaries.iter().rev())
    };
    for &start in candidates {
        if re.is_match(&value[start..]) {
            return value[..start].to_string();
        }
    }
    value.to_string()
}

/// `${var/pat/repl}` and `${var//pat/repl}`. Replacement text is literal.
pub fn replace_pattern(value: &str, pattern: &str, replacement: &str, all: bool) -> String {
    if pattern.is_empty() {
        return value.to_string();
    }
    let regex_str = pattern_to_regex(pattern, true);
    let re = match Regex::new(&regex_str) {
        Ok(re) => re,
        Err(_) => return value.to_string(),
    };
    let limit = if all { 0 } else { 1 };
    re.replacen(value, limit, |_: &regex_lite::Captures| {
        replacement.to_string()
    })
    .into_owned()
}

fn char_boundaries(s: &str) -> Vec<usize> {
    let mut v: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    v.push(s.len());
    v
}
