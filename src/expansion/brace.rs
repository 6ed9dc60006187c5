//! Brace Expansion
//!
//! Comma lists `{a,b,c}` (nested, with preamble/postscript cartesian
//! product) and ranges: numeric `{1..5}` / `{1..10..2}` with zero-padding,
//! and character `{a..e}`. Runs before every other expansion on the raw
//! word text; quoted and escaped braces are left alone. Oversized
//! expansions abort and leave the word unchanged.

/// Upper bound on generated elements; beyond this the word stays literal.
const MAX_BRACE_ELEMENTS: usize = 10_000_000;

/// Expand every brace construct in `word`. Returns the word itself when
/// nothing expands.
pub fn expand_braces(word: &str) -> Vec<String> {
    match try_expand(word, 0) {
        Some(list) if !list.is_empty() => list,
        _ => vec![word.to_string()],
    }
}

fn try_expand(word: &str, depth: usize) -> Option<Vec<String>> {
    if depth > 16 {
        return None;
    }
    let chars: Vec<char> = word.chars().collect();

    // scan past braces that hold no list or range (`{single}` stays literal)
    let mut from = 0;
    let (open, close, items) = loop {
        let (open, close) = find_brace_pair(&chars, from)?;
        let content: String = chars[open + 1..close].iter().collect();
        if let Some(range) = expand_range(&content) {
            break (open, close, range);
        }
        if let Some(parts) = split_top_level_commas(&content) {
            if parts.len() >= 2 {
                break (open, close, parts);
            }
        }
        from = open + 1;
    };

    let preamble: String = chars[..open].iter().collect();
    let postscript: String = chars[close + 1..].iter().collect();

    let mut results = Vec::new();
    for item in items {
        let candidate = format!("{}{}{}", preamble, item, postscript);
        // the postscript (or the item itself) may hold further braces
        match try_expand(&candidate, depth + 1) {
            Some(sub) => results.extend(sub),
            None => results.push(candidate),
        }
        if results.len() > MAX_BRACE_ELEMENTS {
            return None;
        }
    }
    Some(results)
}

/// Find the next `{ ... }` pair at or after `from`, skipping quotes,
/// escapes, and `${...}` parameter expansions.
fn find_brace_pair(chars: &[char], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' => {
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    i += 1;
                }
                i += 1;
            }
            '"' => {
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                i += 2;
                let mut depth = 1;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
            }
            '{' => {
                if let Some(close) = find_close(chars, i) {
                    return Some((i, close));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

fn find_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
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
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split brace content on commas at nesting depth 0. Returns None when
/// there is no top-level comma (not a list).
fn split_top_level_commas(content: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = content.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut i = 0;
    let mut saw_comma = false;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                current.push(c);
                if i + 1 < chars.len() {
                    current.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
            }
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                saw_comma = true;
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
        i += 1;
    }
    parts.push(current);
    if saw_comma {
        Some(parts)
    } else {
        None
    }
}

/// Expand `start..end` / `start..end..step` ranges, numeric or single-char.
fn expand_range(content: &str) -> Option<Vec<String>> {
    let parts: Vec<&str> = content.split("..").collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }
    let step = if parts.len() == 3 {
        match parts[2].parse::<i64>() {
            Ok(s) => Some(s),
            Err(_) => return None,
        }
    } else {
        None
    };

    if let (Ok(start), Ok(end)) = (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
        return Some(numeric_range(start, end, step, parts[0], parts[1]));
    }

    let (s, e) = (single_char(parts[0])?, single_char(parts[1])?);
    if s.is_ascii_alphabetic() && e.is_ascii_alphabetic() {
        return Some(char_range(s, e, step));
    }
    None
}

fn single_char(s: &str) -> Option<char> {
    let mut it = s.chars();
    let c = it.next()?;
    if it.next().is_some() {
        return None;
    }
    Some(c)
}

/// Numeric range with bash's rules: step 0 acts as 1, step sign is
/// ignored, zero-padding uses the widest padded endpoint.
fn numeric_range(start: i64, end: i64, step: Option<i64>, start_str: &str, end_str: &str) -> Vec<String> {
    let step = step.unwrap_or(1).abs().max(1);

    let mut pad_width = 0usize;
    for s in [start_str, end_str] {
        let bare = s.trim_start_matches('-');
        if bare.len() > 1 && bare.starts_with('0') {
            pad_width = pad_width.max(bare.len());
        }
    }
    let format_num = |n: i64| -> String {
        if pad_width > 0 {
            let sign = if n < 0 { "-" } else { "" };
            format!("{}{:0>width$}", sign, n.abs(), width = pad_width)
        } else {
            n.to_string()
        }
    };

    let mut results = Vec::new();
    if start <= end {
        let mut i = start;
        while i <= end && results.len() <= MAX_BRACE_ELEMENTS {
            results.push(format_num(i));
            i += step;
        }
    } else {
        let mut i = start;
        while i >= end && results.len() <= MAX_BRACE_ELEMENTS {
            results.push(format_num(i));
            i -= step;
        }
    }
    results
}

fn char_range(start: char, end: char, step: Option<i64>) -> Vec<String> {
    let step = step.unwrap_or(1).abs().max(1) as u32;
    let (s, e) = (start as u32, end as u32);
    let mut results = Vec::new();
    if s <= e {
        let mut i = s;
        while i <= e {
            if let Some(c) = char::from_u32(i) {
                results.push(c.to_string());
            }
            i += step;
        }
    } else {
        let mut i = s as i64;
        while i >= e as i64 {
            if let Some(c) = char::from_u32(i as u32) {
                results.push(c.to_string());
            }
            i -= step as i64;
        }
    }
    results
}
